//! Splitting strategies for section text.

use std::sync::LazyLock;

use regex::Regex;

use super::types::Marker;
use crate::config::{DEFINITION_VERB_WINDOW, LINE_START_SLACK};

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static QUOTED_TERM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[“"]([^”"\n]{1,100})[”"]"#).expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static MEANING_VERB: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^[^\n]{{0,{DEFINITION_VERB_WINDOW}}}?\b(?:means|shall\s+mean|has\s+the\s+meaning|shall\s+have\s+the\s+meaning)\b"
    ))
    .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LETTER_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([a-z])\)").expect("valid regex"));

/// Capitalized phrase ending in a period: `Organization.`
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LABEL_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z][^.;:\n]{1,59})\.(?:\s|$)").expect("valid regex"));

const MAX_CLAUSE_LABEL_CHARS: usize = 80;
const EXCERPT_LABEL_CHARS: usize = 60;

/// Trait for configurable splitting strategies.
///
/// Implementations find item boundaries and label the items.
pub trait SplitStrategy: Send + Sync {
    /// Find item markers in order of appearance.
    fn find_markers(&self, text: &str) -> Vec<Marker>;

    /// Category label for one item, given its marker and verbatim text.
    fn label(&self, marker: &Marker, item: &str) -> String;
}

/// Splits definition sections at quoted defined terms.
pub struct DefinitionSplitStrategy;

impl SplitStrategy for DefinitionSplitStrategy {
    fn find_markers(&self, text: &str) -> Vec<Marker> {
        let mut markers = Vec::new();
        let mut window_end = 0;

        for caps in QUOTED_TERM.captures_iter(text) {
            let (Some(quoted), Some(term)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            // A second quoted alias inside the previous term's verb window
            if quoted.start() < window_end {
                continue;
            }
            let Some(verb) = MEANING_VERB.find(&text[quoted.end()..]) else {
                continue;
            };

            let Some(offset) = definition_start(text, quoted.start()) else {
                continue;
            };

            window_end = quoted.end() + verb.end();
            markers.push(Marker {
                offset,
                term: Some(term.as_str().trim().to_string()),
            });
        }

        markers
    }

    fn label(&self, marker: &Marker, item: &str) -> String {
        marker
            .term
            .clone()
            .unwrap_or_else(|| excerpt_label(item))
    }
}

/// Where a definition starting with a quote at `pos` begins, if it is in a definition position.
///
/// A short label such as `(a) ` before the quote is pulled into the definition.
fn definition_start(text: &str, pos: usize) -> Option<usize> {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &text[line_start..pos];
    if prefix.trim().chars().count() <= LINE_START_SLACK {
        return Some(line_start + (prefix.len() - prefix.trim_start().len()));
    }
    follows_sentence_end(text, pos, &['.', ';', ':']).then_some(pos)
}

/// Whether the previous non-whitespace character before `pos` is one of `ends`.
fn follows_sentence_end(text: &str, pos: usize, ends: &[char]) -> bool {
    text[..pos]
        .trim_end()
        .chars()
        .next_back()
        .is_some_and(|c| ends.contains(&c))
}

/// Splits sections at `(a)`, `(b)`, ... markers.
///
/// Markers are accepted only in alphabetical sequence from `(a)`, at a line
/// start or right after a period, colon or semicolon.
pub struct LetteredClauseSplitStrategy;

impl SplitStrategy for LetteredClauseSplitStrategy {
    fn find_markers(&self, text: &str) -> Vec<Marker> {
        let mut markers = Vec::new();
        let mut expected = 'a';

        for caps in LETTER_MARKER.captures_iter(text) {
            let (Some(whole), Some(letter)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if !letter.as_str().starts_with(expected) {
                continue;
            }

            let line_start = text[..whole.start()].rfind('\n').map_or(0, |i| i + 1);
            let at_line_start = text[line_start..whole.start()].trim().is_empty();
            if !at_line_start && !follows_sentence_end(text, whole.start(), &['.', ':', ';']) {
                continue;
            }

            markers.push(Marker {
                offset: whole.start(),
                term: None,
            });
            match char::from_u32(u32::from(expected) + 1) {
                Some(next) if next <= 'z' => expected = next,
                _ => break,
            }
        }

        markers
    }

    fn label(&self, _marker: &Marker, item: &str) -> String {
        let body = LETTER_MARKER
            .find(item)
            .filter(|m| m.start() == 0)
            .map_or(item, |m| &item[m.end()..])
            .trim_start();

        if let Some(caps) = LABEL_PHRASE.captures(body) {
            return caps[1].trim().to_string();
        }

        let clause = body
            .split([';', ',', ':', '.', '\n'])
            .next()
            .unwrap_or_default()
            .trim();
        if !clause.is_empty() && clause.chars().count() <= MAX_CLAUSE_LABEL_CHARS {
            return clause.to_string();
        }

        excerpt_label(body)
    }
}

/// First words of `text`, cut at a word boundary.
fn excerpt_label(text: &str) -> String {
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let Some((cut, _)) = text.char_indices().nth(EXCERPT_LABEL_CHARS) else {
        return text;
    };
    let head = &text[..cut];
    let head = head.rfind(' ').map_or(head, |space| &head[..space]);
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFINITIONS: &str = "Section 1.1 Definitions.\n\
        “Affiliate” means, with respect to any Person, any other Person that controls such Person.\n\
        “Business Day” shall mean any day other than a Saturday, Sunday or legal holiday.\n\
        “Company Material Adverse Effect” or “MAE” has the meaning set forth in Section 3.1.";

    #[test]
    fn test_definition_markers() {
        let markers = DefinitionSplitStrategy.find_markers(DEFINITIONS);
        let terms: Vec<_> = markers.iter().filter_map(|m| m.term.as_deref()).collect();
        assert_eq!(terms, vec!["Affiliate", "Business Day", "Company Material Adverse Effect"]);
    }

    #[test]
    fn test_mid_sentence_quote_is_not_a_definition() {
        let text = "The parties agree that the term “Closing” means the closing of the Merger.";
        assert!(DefinitionSplitStrategy.find_markers(text).is_empty());
    }

    #[test]
    fn test_definition_after_sentence_end() {
        let text = "Terms have these meanings. “Person” means any individual or entity.";
        let markers = DefinitionSplitStrategy.find_markers(text);
        assert_eq!(markers.len(), 1);
        assert_eq!(&text[markers[0].offset..markers[0].offset + 3], "“");
    }

    #[test]
    fn test_definition_label_pulls_in_item_letter() {
        let text = "Defined terms:\n(a) “Merger Sub” means the merger subsidiary.";
        let markers = DefinitionSplitStrategy.find_markers(text);
        assert_eq!(markers.len(), 1);
        assert!(text[markers[0].offset..].starts_with("(a) “Merger Sub”"));
    }

    #[test]
    fn test_lettered_markers_in_sequence() {
        let text = "The Company shall:\n(a) conduct business;\n(c) skip this;\n(b) keep books.";
        let markers = LetteredClauseSplitStrategy.find_markers(text);
        // (c) is out of sequence, (b) follows (a)
        assert_eq!(markers.len(), 2);
        assert!(text[markers[1].offset..].starts_with("(b)"));
    }

    #[test]
    fn test_inline_lettered_markers_after_colon_and_period() {
        let text = "The Company shall: (a) conduct business. (b) keep books.";
        assert_eq!(LetteredClauseSplitStrategy.find_markers(text).len(), 2);
    }

    #[test]
    fn test_mid_sentence_lettered_reference_rejected() {
        let text = "as described in clause (a) above and clause (b) below";
        assert!(LetteredClauseSplitStrategy.find_markers(text).is_empty());
    }

    #[test]
    fn test_clause_label_capitalized_phrase() {
        let marker = Marker { offset: 0, term: None };
        let label = LetteredClauseSplitStrategy.label(&marker, "(a) Organization. The Company is duly organized.");
        assert_eq!(label, "Organization");
    }

    #[test]
    fn test_clause_label_short_clause() {
        let marker = Marker { offset: 0, term: None };
        let label = LetteredClauseSplitStrategy.label(&marker, "(b) conduct its business in the ordinary course; and");
        assert_eq!(label, "conduct its business in the ordinary course");
    }

    #[test]
    fn test_clause_label_truncated_excerpt() {
        let marker = Marker { offset: 0, term: None };
        let item = format!("(c) {}", "word ".repeat(40));
        let label = LetteredClauseSplitStrategy.label(&marker, &item);
        assert!(label.ends_with("..."));
        assert!(label.chars().count() <= EXCERPT_LABEL_CHARS + 3);
    }
}
