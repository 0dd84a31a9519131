//! Core data types for parsed agreements.
//!
//! All positions are byte offsets into the normalized source text and always
//! fall on UTF-8 char boundaries.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Structural level of a parsed section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionLevel {
    /// A numbered section (`Section 4.2`).
    Section,

    /// An article emitted whole because it has no child sections.
    Article,
}

impl SectionLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Section => "section",
            Self::Article => "article",
        }
    }
}

/// A two-part section number such as `4.2` or `4.02`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionNumber {
    /// Article (major) part.
    pub article: u32,

    /// Section (minor) part.
    pub section: u32,

    /// Whether the minor part was written zero-padded (`4.01`).
    pub padded: bool,
}

impl SectionNumber {
    /// Parse the two captured parts of a section token.
    ///
    /// # Examples
    /// ```
    /// use clausebank_parser::types::SectionNumber;
    ///
    /// let number = SectionNumber::parse("4", "01").unwrap();
    /// assert_eq!(number.section, 1);
    /// assert!(number.padded);
    /// assert_eq!(number.label(), "4.01");
    /// ```
    #[must_use]
    pub fn parse(article: &str, section: &str) -> Option<Self> {
        Some(Self {
            article: article.parse().ok()?,
            section: section.parse().ok()?,
            padded: section.len() > 1 && section.starts_with('0'),
        })
    }

    /// Label in the padding convention the number was written in.
    #[must_use]
    pub fn label(&self) -> String {
        format_label(self.article, self.section, self.padded)
    }

    /// Numeric identity, ignoring the padding convention.
    #[must_use]
    pub fn key(&self) -> (u32, u32) {
        (self.article, self.section)
    }
}

impl fmt::Display for SectionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Format a section label, zero-padding single-digit minors when requested.
#[must_use]
pub fn format_label(article: u32, section: u32, padded: bool) -> String {
    if padded {
        format!("{article}.{section:02}")
    } else {
        format!("{article}.{section}")
    }
}

/// The article a section belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRef {
    /// Article number as arabic digits (roman numerals are converted).
    pub number: String,

    /// Article title, empty when the heading carried none.
    pub title: String,
}

/// A contiguous, numbered division of the agreement body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Heading line as it appears in the text.
    pub heading: String,

    /// Verbatim text, equal to `source[start..end]`.
    pub text: String,

    pub level: SectionLevel,

    pub start: usize,

    pub end: usize,

    /// Parsed number, absent for article-level and paragraph sections.
    pub number: Option<SectionNumber>,

    /// Nearest preceding article heading.
    pub article: Option<ArticleRef>,
}

impl Section {
    /// Build a section from a span of the source, trimming trailing whitespace.
    #[must_use]
    pub fn from_span(source: &str, start: usize, end: usize, level: SectionLevel) -> Self {
        let text = source[start..end].trim_end();
        let heading = text.lines().next().unwrap_or_default().trim();
        Self {
            heading: truncate_heading(heading),
            text: text.to_string(),
            level,
            start,
            end: start + text.len(),
            number: None,
            article: None,
        }
    }

    #[must_use]
    pub fn with_number(mut self, number: Option<SectionNumber>) -> Self {
        self.number = number;
        self
    }

    #[must_use]
    pub fn with_article(mut self, article: Option<ArticleRef>) -> Self {
        self.article = article;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `pos` falls inside this section's span.
    #[must_use]
    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }

    /// Shrink the section so it ends at `end`, keeping text in sync.
    #[must_use]
    pub fn truncated_at(mut self, end: usize) -> Self {
        if end < self.end && end >= self.start {
            let text = self.text[..end - self.start].trim_end();
            self.end = self.start + text.len();
            self.text = text.to_string();
        }
        self
    }
}

const MAX_HEADING_CHARS: usize = 200;

fn truncate_heading(heading: &str) -> String {
    match heading.char_indices().nth(MAX_HEADING_CHARS) {
        Some((idx, _)) => heading[..idx].trim_end().to_string(),
        None => heading.to_string(),
    }
}

/// An inferred-missing numbered section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    pub article: u32,
    pub section: u32,
    /// Label in the surrounding padding convention (`1.3` or `1.03`).
    pub label: String,
}

/// Cross-check between a detected table of contents and the parsed sections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocComparison {
    pub found: bool,
    pub total_entries: usize,
    pub matched: usize,
    /// Listed in the TOC but not parsed.
    pub missing: Vec<String>,
    /// Parsed but not listed in the TOC.
    pub extra: Vec<String>,
}

/// Which delimiter pattern produced the section list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelimiterPattern {
    /// `Section 4.2` style headings.
    SectionKeyword,

    /// Bare `4.2 Title` headings at line starts.
    BareNumber,

    /// Blank-line delimited paragraphs.
    Paragraph,
}

impl DelimiterPattern {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SectionKeyword => "section_keyword",
            Self::BareNumber => "bare_number",
            Self::Paragraph => "paragraph",
        }
    }
}

/// Anything carrying a provision type and verbatim text.
///
/// Implemented by the pipeline's provision type so deduplication and
/// completeness checks stay independent of the async layer.
pub trait TypedText {
    fn provision_type(&self) -> &str;
    fn text(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_number_parse_plain() {
        let number = SectionNumber::parse("4", "2").unwrap();
        assert_eq!(number.key(), (4, 2));
        assert!(!number.padded);
        assert_eq!(number.to_string(), "4.2");
    }

    #[test]
    fn test_section_number_parse_padded() {
        let number = SectionNumber::parse("10", "07").unwrap();
        assert_eq!(number.key(), (10, 7));
        assert_eq!(number.label(), "10.07");
    }

    #[test]
    fn test_section_number_two_digit_minor_not_padded() {
        let number = SectionNumber::parse("4", "10").unwrap();
        assert!(!number.padded);
    }

    #[test]
    fn test_section_from_span_trims_and_syncs_end() {
        let source = "Section 1.1 Definitions.\nBody text here.\n\n\nSection 1.2";
        let section = Section::from_span(source, 0, 43, SectionLevel::Section);
        assert_eq!(section.heading, "Section 1.1 Definitions.");
        assert_eq!(section.text, &source[section.start..section.end]);
        assert!(section.text.ends_with("here."));
    }

    #[test]
    fn test_section_truncated_at() {
        let source = "Section 1.2 Other. Long body text.\nSection 1.3 Missing heading";
        let section = Section::from_span(source, 0, source.len(), SectionLevel::Section);
        let cut = section.truncated_at(35);
        assert_eq!(cut.text, "Section 1.2 Other. Long body text.");
        assert_eq!(cut.end, 34);
    }

    #[test]
    fn test_delimiter_pattern_as_str() {
        assert_eq!(DelimiterPattern::BareNumber.as_str(), "bare_number");
    }
}
