//! Heading detection and cross-reference disambiguation.
//!
//! A `Section 4.2` token is either a heading or a reference to one. The
//! test here favors precision: a missed heading is recovered later by gap
//! detection, while a false heading corrupts section boundaries.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::{DOCUMENT_HEAD_CHARS, LINE_START_SLACK, MAX_HEADING_LINE_OFFSET};
use crate::types::{ArticleRef, SectionNumber};

/// Keyword-prefixed section token: `Section 4.2`, `SECTION 4.02`, `Sec. 4.2`, `§ 4.2`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static SECTION_KEYWORD_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\b(?:Section|SECTION|Sec\.|SEC\.)|§)[ \t]*(\d{1,3})\.(\d{1,3})\b")
        .expect("valid regex")
});

/// Bare section token at a line start: `4.2 Title`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static BARE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*(\d{1,2})\.(\d{1,2})\b").expect("valid regex"));

/// Article heading at a line start: `ARTICLE IV`, `Article 4`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ARTICLE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:ARTICLE|Article)[ \t]+([IVXLC]+|\d{1,2})\b\.?")
        .expect("valid regex")
});

/// Cross-reference signal phrase immediately before a token.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static CROSS_REFERENCE_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:under|pursuant\s+to|set\s+forth\s+in|referred\s+to\s+in|described\s+in|provided\s+(?:for\s+)?in|in\s+accordance\s+with|subject\s+to|contemplated\s+by|defined\s+in|required\s+by|permitted\s+by|as|of|see|in|to|by|and|or|with)[\s,(]*$",
    )
    .expect("valid regex")
});

/// Which section-token shape to look for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingStyle {
    Keyword,
    Bare,
}

/// A section token accepted as a heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingMatch {
    /// Start of the token (the keyword, or the number for bare headings).
    pub start: usize,

    /// End of the number token.
    pub token_end: usize,

    pub number: SectionNumber,
}

/// An `ARTICLE` heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleHeading {
    pub start: usize,
    pub token_end: usize,
    pub number: String,
    pub title: String,
}

impl ArticleHeading {
    #[must_use]
    pub fn to_ref(&self) -> ArticleRef {
        ArticleRef {
            number: self.number.clone(),
            title: self.title.clone(),
        }
    }
}

/// Decide whether a token at `pos` sits in a heading position.
///
/// Accepted when the token leads its line (allowing a short label), or sits
/// in the first characters of the document. Otherwise a preceding
/// cross-reference phrase or a large offset from the line start rejects it.
#[must_use]
pub fn is_heading_position(text: &str, pos: usize) -> bool {
    if pos < DOCUMENT_HEAD_CHARS {
        return true;
    }

    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &text[line_start..pos];
    if prefix.trim().is_empty() || prefix.chars().count() <= LINE_START_SLACK {
        return true;
    }

    if CROSS_REFERENCE_TAIL.is_match(prefix) {
        return false;
    }

    prefix.chars().count() <= MAX_HEADING_LINE_OFFSET
}

/// Whether the text after a token looks like a heading title.
///
/// Accepts an optional period, then either end of text, or whitespace
/// followed by an uppercase letter, quote, bracket or parenthesis. With
/// `allow_line_break` the title may sit on a following line.
#[must_use]
pub fn has_heading_continuation(text: &str, token_end: usize, allow_line_break: bool) -> bool {
    let rest = &text[token_end..];
    let rest = rest.strip_prefix('.').unwrap_or(rest);
    let after_spaces = rest.trim_start_matches([' ', '\t']);

    let after = if after_spaces.starts_with('\n') {
        if !allow_line_break {
            return false;
        }
        after_spaces.trim_start()
    } else if after_spaces.len() == rest.len() {
        // Nothing separates the token from what follows, e.g. `4.2(a)`
        return rest.is_empty();
    } else {
        after_spaces
    };

    // `ARTICLE V - COVENANTS`
    let after = match after.strip_prefix(['-', '–', '—', ':']) {
        Some(titled) if titled.starts_with([' ', '\t']) => titled.trim_start(),
        _ => after,
    };

    match after.chars().next() {
        None => true,
        Some(c) => c.is_uppercase() || matches!(c, '"' | '“' | '(' | '['),
    }
}

/// Find every section heading at or after `from`.
#[must_use]
pub fn find_section_headings(text: &str, from: usize, style: HeadingStyle) -> Vec<HeadingMatch> {
    let (pattern, allow_line_break) = match style {
        HeadingStyle::Keyword => (&*SECTION_KEYWORD_TOKEN, true),
        HeadingStyle::Bare => (&*BARE_TOKEN, false),
    };

    let mut headings = Vec::new();
    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(major), Some(minor)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };

        // Bare matches include leading indentation
        let start = match style {
            HeadingStyle::Keyword => whole.start(),
            HeadingStyle::Bare => major.start(),
        };
        if start < from {
            continue;
        }

        let token_end = minor.end();
        if followed_by_subnumber(text, token_end) {
            continue;
        }
        if !is_heading_position(text, start) {
            tracing::trace!(pos = start, token = whole.as_str(), "rejected cross-reference");
            continue;
        }
        if !has_heading_continuation(text, token_end, allow_line_break) {
            tracing::trace!(pos = start, token = whole.as_str(), "rejected non-heading continuation");
            continue;
        }

        if let Some(number) = SectionNumber::parse(major.as_str(), minor.as_str()) {
            headings.push(HeadingMatch {
                start,
                token_end,
                number,
            });
        }
    }
    headings
}

/// `4.2.1` style numbering: the token is a sub-item, not a section.
fn followed_by_subnumber(text: &str, token_end: usize) -> bool {
    let mut chars = text[token_end..].chars();
    chars.next() == Some('.') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Find every article heading at or after `from`.
#[must_use]
pub fn find_article_headings(text: &str, from: usize) -> Vec<ArticleHeading> {
    let mut articles = Vec::new();
    for caps in ARTICLE_TOKEN.captures_iter(text) {
        let (Some(whole), Some(number)) = (caps.get(0), caps.get(1)) else {
            continue;
        };

        let start = whole.start() + (whole.as_str().len() - whole.as_str().trim_start().len());
        if start < from || !is_heading_position(text, start) {
            continue;
        }
        if !has_heading_continuation(text, whole.end(), true) {
            continue;
        }

        let Some(number) = article_number(number.as_str()) else {
            continue;
        };

        articles.push(ArticleHeading {
            start,
            token_end: whole.end(),
            number: number.to_string(),
            title: article_title(text, whole.end()),
        });
    }
    articles
}

/// Title on the heading line, or on the next non-empty line when the heading stands alone.
fn article_title(text: &str, token_end: usize) -> String {
    let rest = &text[token_end..];
    let line = rest.lines().next().unwrap_or_default();
    let same_line = line.trim().trim_start_matches(['-', '–', '—', ':', '.']).trim();
    if !same_line.is_empty() {
        return same_line.to_string();
    }

    rest.lines()
        .skip(1)
        .map(str::trim)
        .find(|l| !l.is_empty())
        .filter(|l| l.chars().count() <= 100 && !SECTION_KEYWORD_TOKEN.is_match(l))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Parse an arabic or roman article number.
#[must_use]
pub fn article_number(token: &str) -> Option<u32> {
    if let Ok(n) = token.parse() {
        return Some(n);
    }
    roman_to_arabic(token)
}

/// Convert an uppercase roman numeral (up to `CCCXCIX`).
///
/// # Examples
/// ```
/// use clausebank_parser::structure::roman_to_arabic;
///
/// assert_eq!(roman_to_arabic("IV"), Some(4));
/// assert_eq!(roman_to_arabic("XII"), Some(12));
/// assert_eq!(roman_to_arabic("ABC"), None);
/// ```
#[must_use]
pub fn roman_to_arabic(token: &str) -> Option<u32> {
    let values: Vec<u32> = token
        .chars()
        .map(|c| match c {
            'I' => Some(1),
            'V' => Some(5),
            'X' => Some(10),
            'L' => Some(50),
            'C' => Some(100),
            _ => None,
        })
        .collect::<Option<_>>()?;

    if values.is_empty() {
        return None;
    }

    let mut total: i64 = 0;
    for (i, value) in values.iter().enumerate() {
        match values.get(i + 1) {
            Some(next) if next > value => total -= i64::from(*value),
            _ => total += i64::from(*value),
        }
    }
    u32::try_from(total).ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(text: &str) -> String {
        // Push the interesting part past the document-head allowance
        format!("{}\n{text}", "x".repeat(DOCUMENT_HEAD_CHARS + 10))
    }

    #[test]
    fn test_line_start_token_is_heading() {
        let text = padded("Section 4.2 Indemnification. The Company shall indemnify.");
        let headings = find_section_headings(&text, 0, HeadingStyle::Keyword);
        assert_eq!(headings.len(), 1);
        assert_eq!(headings[0].number.key(), (4, 2));
    }

    #[test]
    fn test_cross_reference_is_rejected() {
        let text = padded(
            "Parent acknowledges the indemnification obligations set forth in Section 4.2 of this Agreement survive.",
        );
        assert!(find_section_headings(&text, 0, HeadingStyle::Keyword).is_empty());
    }

    #[test]
    fn test_wrapped_cross_reference_at_line_start_is_rejected() {
        let text = padded("the obligations set forth in\nSection 4.2 of this Agreement shall survive.");
        assert!(find_section_headings(&text, 0, HeadingStyle::Keyword).is_empty());
    }

    #[test]
    fn test_far_mid_line_token_is_rejected() {
        let filler = "word ".repeat(20);
        let text = padded(&format!("{filler}Section 4.2 Something Capitalized follows here."));
        assert!(find_section_headings(&text, 0, HeadingStyle::Keyword).is_empty());
    }

    #[test]
    fn test_short_label_before_token_is_heading() {
        let text = padded("(a) Section 5.1 Conditions. Each party shall comply.");
        assert_eq!(find_section_headings(&text, 0, HeadingStyle::Keyword).len(), 1);
    }

    #[test]
    fn test_subsection_reference_is_rejected() {
        let text = padded("Section 4.2(a) The Company shall deliver notice.");
        assert!(find_section_headings(&text, 0, HeadingStyle::Keyword).is_empty());
    }

    #[test]
    fn test_dotted_subnumber_is_rejected() {
        let text = padded("Section 4.2.1 Notice periods apply.");
        assert!(find_section_headings(&text, 0, HeadingStyle::Keyword).is_empty());
    }

    #[test]
    fn test_title_on_next_line() {
        let text = padded("SECTION 1.01.\nDefinitions.");
        let headings = find_section_headings(&text, 0, HeadingStyle::Keyword);
        assert_eq!(headings.len(), 1);
        assert!(headings[0].number.padded);
    }

    #[test]
    fn test_bare_headings_require_capitalized_title() {
        let text = padded("1.1 Definitions. Terms.\n1.2 of the parties\n1.3 Interpretation.");
        let headings = find_section_headings(&text, 0, HeadingStyle::Bare);
        let keys: Vec<_> = headings.iter().map(|h| h.number.key()).collect();
        assert_eq!(keys, vec![(1, 1), (1, 3)]);
    }

    #[test]
    fn test_document_head_token_is_heading() {
        let text = "Per Section 1.1 Scope. Body";
        assert!(is_heading_position(text, 4));
    }

    #[test]
    fn test_find_article_headings() {
        let text = padded("ARTICLE IV\nREPRESENTATIONS AND WARRANTIES\n\nArticle 5 - Covenants\n");
        let articles = find_article_headings(&text, 0);
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].number, "4");
        assert_eq!(articles[0].title, "REPRESENTATIONS AND WARRANTIES");
        assert_eq!(articles[1].number, "5");
        assert_eq!(articles[1].title, "Covenants");
    }

    #[test]
    fn test_article_cross_reference_rejected() {
        let text = padded("Article 5 of the Certificate of Incorporation applies.");
        assert!(find_article_headings(&text, 0).is_empty());
    }

    #[test]
    fn test_roman_to_arabic() {
        assert_eq!(roman_to_arabic("I"), Some(1));
        assert_eq!(roman_to_arabic("IX"), Some(9));
        assert_eq!(roman_to_arabic("XIV"), Some(14));
        assert_eq!(roman_to_arabic(""), None);
    }
}
