//! Tuning constants for structure parsing, gap recovery and deduplication.

use crate::error::{ParserError, Result};

/// Minimum number of consecutive page-numbered lines that form a table of contents.
pub const TOC_MIN_ENTRIES: usize = 5;

/// A table of contents must start within this fraction of the document.
pub const TOC_MAX_POSITION_RATIO: f64 = 0.4;

/// A section token this close to the start of the document is always a heading.
pub const DOCUMENT_HEAD_CHARS: usize = 80;

/// Leading label allowance before a heading token on its line (e.g. `(a) `).
pub const LINE_START_SLACK: usize = 5;

/// Mid-line tokens further than this from the previous line break are rejected.
pub const MAX_HEADING_LINE_OFFSET: usize = 80;

/// Keyword headings below this count trigger the bare-number retry.
pub const MIN_KEYWORD_HEADINGS: usize = 5;

/// Fewer sections than this trigger the paragraph fallback.
pub const MIN_SECTIONS: usize = 3;

/// Text after the number token shorter than this marks a section as noise.
pub const MIN_SECTION_BODY_CHARS: usize = 20;

/// Paragraphs shorter than this are ignored by the paragraph fallback.
pub const MIN_PARAGRAPH_CHARS: usize = 50;

/// Upper bound on the span of a recovered section.
pub const RECOVERY_SPAN_CAP: usize = 5_000;

/// Recovered sections shorter than this are discarded.
pub const MIN_RECOVERED_CHARS: usize = 30;

/// Share of the shorter text used as the duplicate check prefix.
pub const DEDUP_PREFIX_RATIO: f64 = 0.8;

/// Check prefixes must be longer than this to count as a duplicate.
pub const DEDUP_MIN_PREFIX_CHARS: usize = 50;

/// Maximum distance between a quoted term and its meaning verb.
pub const DEFINITION_VERB_WINDOW: usize = 40;

/// Reject empty or whitespace-only source text.
///
/// # Examples
/// ```
/// use clausebank_parser::config::validate_source;
///
/// assert!(validate_source("Section 1.1 Definitions.").is_ok());
/// assert!(validate_source("   \n").is_err());
/// ```
pub fn validate_source(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        Err(ParserError::EmptyInput)
    } else {
        Ok(())
    }
}

/// Walk back to the nearest char boundary at or before `index`.
#[must_use]
pub fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_source() {
        assert!(validate_source("text").is_ok());
        assert!(matches!(validate_source(""), Err(ParserError::EmptyInput)));
    }

    #[test]
    fn test_floor_char_boundary() {
        let text = "a§b";
        // '§' is two bytes starting at index 1
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(floor_char_boundary(text, 3), 3);
        assert_eq!(floor_char_boundary(text, 99), text.len());
    }
}
