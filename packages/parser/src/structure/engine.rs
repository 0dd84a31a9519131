//! Structure parser that turns normalized text into an ordered section list.

use std::sync::LazyLock;

use regex::Regex;

use super::headings::{
    find_article_headings, find_section_headings, ArticleHeading, HeadingMatch, HeadingStyle,
};
use super::toc::{compare_toc, detect_toc, TocDetection};
use crate::config::{MIN_KEYWORD_HEADINGS, MIN_PARAGRAPH_CHARS, MIN_SECTIONS, MIN_SECTION_BODY_CHARS};
use crate::types::{DelimiterPattern, Section, SectionLevel, TocComparison};

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("valid regex"));

/// Output of structure parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStructure {
    /// Non-overlapping sections in document order.
    pub sections: Vec<Section>,

    /// Byte offset where the body begins (after any table of contents).
    pub body_start: usize,

    pub pattern: DelimiterPattern,

    /// Share of the body spanned by sections, in percent.
    pub coverage_pct: f64,

    pub toc: TocComparison,

    /// Raw TOC detection, for re-comparison after gap recovery.
    pub detection: TocDetection,
}

/// Parses agreement structure.
///
/// Parsing never fails. When no usable heading pattern is found the
/// document is split on blank lines instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructureParser;

impl StructureParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse normalized text into sections.
    #[must_use]
    pub fn parse(&self, text: &str) -> ParsedStructure {
        let detection = detect_toc(text);
        let body_start = detection.body_start;
        let articles = find_article_headings(text, body_start);

        let (headings, mut pattern) = select_headings(text, body_start);
        let mut sections = build_sections(text, &headings, &articles);

        if sections.len() < MIN_SECTIONS {
            tracing::debug!(
                found = sections.len(),
                "Too few sections, falling back to paragraph splitting"
            );
            sections = paragraph_sections(text, body_start, &articles);
            pattern = DelimiterPattern::Paragraph;
        }

        let coverage_pct = coverage(&sections, text.len().saturating_sub(body_start));
        let toc = compare_toc(&detection, &sections);

        tracing::debug!(
            sections = sections.len(),
            pattern = pattern.as_str(),
            coverage_pct,
            toc_found = toc.found,
            "Parsed structure"
        );

        ParsedStructure {
            sections,
            body_start,
            pattern,
            coverage_pct,
            toc,
            detection,
        }
    }
}

/// Keyword headings, or bare-number headings when those find more.
fn select_headings(text: &str, from: usize) -> (Vec<HeadingMatch>, DelimiterPattern) {
    let keyword = find_section_headings(text, from, HeadingStyle::Keyword);
    if keyword.len() >= MIN_KEYWORD_HEADINGS {
        return (keyword, DelimiterPattern::SectionKeyword);
    }

    let bare = find_section_headings(text, from, HeadingStyle::Bare);
    if bare.len() > keyword.len() {
        (bare, DelimiterPattern::BareNumber)
    } else {
        (keyword, DelimiterPattern::SectionKeyword)
    }
}

fn build_sections(
    text: &str,
    headings: &[HeadingMatch],
    articles: &[ArticleHeading],
) -> Vec<Section> {
    let mut boundaries: Vec<usize> = headings
        .iter()
        .map(|h| h.start)
        .chain(articles.iter().map(|a| a.start))
        .collect();
    boundaries.sort_unstable();
    boundaries.dedup();

    let next_boundary = |pos: usize| {
        boundaries
            .iter()
            .copied()
            .find(|b| *b > pos)
            .unwrap_or(text.len())
    };
    let enclosing_article = |pos: usize| {
        articles
            .iter()
            .rev()
            .find(|a| a.start <= pos)
            .map(ArticleHeading::to_ref)
    };

    let mut sections = Vec::new();
    for heading in headings {
        let end = next_boundary(heading.start);
        if end <= heading.token_end || is_noise(&text[heading.token_end..end]) {
            tracing::trace!(number = %heading.number, "Dropping noise section");
            continue;
        }

        sections.push(
            Section::from_span(text, heading.start, end, SectionLevel::Section)
                .with_number(Some(heading.number))
                .with_article(enclosing_article(heading.start)),
        );
    }

    // Articles without numbered children are emitted whole
    for (i, article) in articles.iter().enumerate() {
        let article_end = articles.get(i + 1).map_or(text.len(), |next| next.start);
        let has_children = sections.iter().any(|s| {
            s.level == SectionLevel::Section && s.start > article.start && s.start < article_end
        });
        let end = next_boundary(article.start);
        if has_children || is_noise(&text[article.token_end..end]) {
            continue;
        }

        sections.push(
            Section::from_span(text, article.start, end, SectionLevel::Article)
                .with_article(Some(article.to_ref())),
        );
    }

    sections.sort_by_key(|s| s.start);
    sections
}

fn is_noise(body: &str) -> bool {
    body.trim().chars().count() < MIN_SECTION_BODY_CHARS
}

/// Blank-line delimited paragraphs of meaningful length.
fn paragraph_sections(text: &str, from: usize, articles: &[ArticleHeading]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut push = |start: usize, end: usize| {
        let slice = &text[start..end];
        let start = start + (slice.len() - slice.trim_start().len());
        if text[start..end].trim().chars().count() < MIN_PARAGRAPH_CHARS {
            return;
        }
        let article = articles.iter().rev().find(|a| a.start <= start).map(ArticleHeading::to_ref);
        sections.push(Section::from_span(text, start, end, SectionLevel::Section).with_article(article));
    };

    let mut start = from;
    for split in PARAGRAPH_BREAK.find_iter(&text[from..]) {
        push(start, from + split.start());
        start = from + split.end();
    }
    push(start, text.len());

    sections
}

fn coverage(sections: &[Section], body_len: usize) -> f64 {
    if body_len == 0 {
        return 0.0;
    }
    let covered: usize = sections.iter().map(Section::len).sum();
    // Lengths are far below f64 precision limits
    #[allow(clippy::cast_precision_loss)]
    let pct = covered as f64 / body_len as f64 * 100.0;
    pct.min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agreement() -> String {
        let mut text = String::from("AGREEMENT AND PLAN OF MERGER\n\nARTICLE I\nDEFINITIONS\n\n");
        for minor in 1..=3 {
            text.push_str(&format!(
                "Section 1.{minor} Heading {minor}. The parties agree to the terms of this section number {minor}.\n\n"
            ));
        }
        text.push_str("ARTICLE II\nTHE MERGER\n\n");
        for minor in 1..=3 {
            text.push_str(&format!(
                "Section 2.{minor} Merger Step {minor}. Upon the terms and subject to the conditions, step {minor} occurs.\n\n"
            ));
        }
        text
    }

    #[test]
    fn test_parse_keyword_sections() {
        let text = agreement();
        let parsed = StructureParser::new().parse(&text);

        assert_eq!(parsed.pattern, DelimiterPattern::SectionKeyword);
        let labels: Vec<String> = parsed
            .sections
            .iter()
            .filter_map(|s| s.number.map(|n| n.label()))
            .collect();
        assert_eq!(labels, vec!["1.1", "1.2", "1.3", "2.1", "2.2", "2.3"]);
    }

    #[test]
    fn test_sections_are_verbatim_and_ordered() {
        let text = agreement();
        let parsed = StructureParser::new().parse(&text);

        for pair in parsed.sections.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
        for section in &parsed.sections {
            assert_eq!(section.text, &text[section.start..section.end]);
        }
    }

    #[test]
    fn test_section_ends_before_next_article() {
        let text = agreement();
        let parsed = StructureParser::new().parse(&text);
        let last_of_first = parsed.sections.iter().find(|s| s.heading.starts_with("Section 1.3")).unwrap();
        assert!(!last_of_first.text.contains("ARTICLE II"));
        assert_eq!(last_of_first.article.as_ref().unwrap().number, "1");
    }

    #[test]
    fn test_article_without_sections_emitted_whole() {
        let mut text = agreement();
        text.push_str("ARTICLE III\nMISCELLANEOUS\n\nThis Agreement shall be governed by the laws of Delaware.\n");
        let parsed = StructureParser::new().parse(&text);

        let article = parsed.sections.last().unwrap();
        assert_eq!(article.level, SectionLevel::Article);
        assert!(article.text.contains("governed by the laws of Delaware"));
    }

    #[test]
    fn test_article_with_long_title_not_duplicated() {
        let mut text = agreement();
        text.push_str("ARTICLE IV\nREPRESENTATIONS AND WARRANTIES OF THE COMPANY\n\n");
        for minor in 1..=3 {
            text.push_str(&format!(
                "Section 4.{minor} Company Matter {minor}. The Company represents that matter {minor} is true and correct.\n\n"
            ));
        }
        let parsed = StructureParser::new().parse(&text);

        assert!(parsed.sections.iter().all(|s| s.level == SectionLevel::Section));
        assert_eq!(parsed.sections.len(), 9);
        let first = parsed.sections.iter().find(|s| s.heading.starts_with("Section 4.1")).unwrap();
        assert_eq!(first.article.as_ref().unwrap().number, "4");
    }

    #[test]
    fn test_noise_sections_dropped() {
        let mut text = agreement();
        text.push_str("Section 9.9 Short.\n");
        let parsed = StructureParser::new().parse(&text);
        assert!(parsed.sections.iter().all(|s| s.number.map(|n| n.key()) != Some((9, 9))));
    }

    #[test]
    fn test_bare_number_fallback() {
        let mut text = String::new();
        for minor in 1..=4 {
            text.push_str(&format!(
                "1.{minor} Topic {minor}. The company shall comply with the covenant in this paragraph.\n"
            ));
        }
        let parsed = StructureParser::new().parse(&text);
        assert_eq!(parsed.pattern, DelimiterPattern::BareNumber);
        assert_eq!(parsed.sections.len(), 4);
    }

    #[test]
    fn test_paragraph_fallback() {
        let text = "This letter agreement sets out the understanding between the parties hereto.\n\n\
            Each party shall bear its own expenses in connection with the transactions herein.\n\n\
            Short.\n\n\
            This letter agreement shall be governed by the laws of the State of Delaware.";
        let parsed = StructureParser::new().parse(text);

        assert_eq!(parsed.pattern, DelimiterPattern::Paragraph);
        assert_eq!(parsed.sections.len(), 3);
        for section in &parsed.sections {
            assert_eq!(section.text, &text[section.start..section.end]);
        }
    }

    #[test]
    fn test_coverage_is_supermajority() {
        let text = agreement();
        let parsed = StructureParser::new().parse(&text);
        assert!(parsed.coverage_pct > 60.0, "coverage {}", parsed.coverage_pct);
    }
}
