//! Deterministic classification: title cleaning, topic table, complexity.

use std::sync::LazyLock;

use clausebank_parser::taxonomy::{
    COB, COND, CONS, DEF, EFF, EMP, FIN, GOV, HIGH_VALUE_TYPES, IND, MAE, MISC, NOSOL, NOTICE,
    REM, REP, TERM, TFEE,
};
use clausebank_parser::Section;
use regex::Regex;

use crate::models::Complexity;

/// Longest title kept, in characters.
const MAX_TITLE_CHARS: usize = 120;

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:ARTICLE|Article)\s+(?:[IVXLC]+|\d{1,3})\b|(?:(?:Section|SECTION|Sec\.|SEC\.|§)\s*)?\d{1,3}(?:\.\d{1,3})*)?",
    )
    .expect("valid regex")
});

/// An entry in the topic table.
#[derive(Debug, Clone, Copy)]
pub struct TopicRule {
    /// Lowercase fragments, any of which selects this rule.
    pub patterns: &'static [&'static str],
    pub provision_type: &'static str,
    pub category: &'static str,
    pub display_tier: u8,
}

const fn rule(
    patterns: &'static [&'static str],
    provision_type: &'static str,
    category: &'static str,
    display_tier: u8,
) -> TopicRule {
    TopicRule {
        patterns,
        provision_type,
        category,
        display_tier,
    }
}

/// Ordered topic table; the first matching rule wins.
pub const TOPIC_RULES: &[TopicRule] = &[
    rule(
        &["material adverse effect", "material adverse change"],
        MAE,
        "Material Adverse Effect",
        1,
    ),
    rule(
        &["termination fee", "expense reimbursement", "break-up fee"],
        TFEE,
        "Termination Fee",
        1,
    ),
    rule(
        &[
            "no solicitation",
            "no-solicitation",
            "non-solicitation",
            "no shop",
            "no-shop",
            "acquisition proposal",
            "change of recommendation",
            "change in recommendation",
        ],
        NOSOL,
        "No Solicitation",
        2,
    ),
    rule(
        &["conditions to", "conditions precedent", "closing conditions"],
        COND,
        "Conditions to Closing",
        1,
    ),
    rule(&["terminat"], TERM, "Termination", 1),
    rule(
        &[
            "conduct of business",
            "conduct of the business",
            "operation of the business",
            "interim operations",
        ],
        COB,
        "Conduct of Business",
        2,
    ),
    rule(
        &[
            "merger consideration",
            "conversion of",
            "effect on capital stock",
            "exchange procedures",
        ],
        CONS,
        "Merger Consideration",
        1,
    ),
    rule(
        &["employee", "benefit plan", "compensation"],
        EMP,
        "Employee Matters",
        2,
    ),
    rule(
        &["indemnif", "officers' insurance", "d&o insurance"],
        IND,
        "Indemnification",
        2,
    ),
    rule(
        &["efforts", "regulatory approval", "antitrust"],
        EFF,
        "Efforts and Regulatory Approvals",
        2,
    ),
    rule(&["financing"], FIN, "Financing", 2),
    rule(
        &["governing law", "jurisdiction", "jury trial", "venue"],
        GOV,
        "Governing Law",
        3,
    ),
    rule(
        &["definitions", "defined terms", "interpretation"],
        DEF,
        "Definitions",
        3,
    ),
    rule(&["notices", "notice"], NOTICE, "Notices", 3),
    rule(
        &["specific performance", "remedies", "enforcement"],
        REM,
        "Remedies",
        3,
    ),
    rule(
        &["representations", "warranties"],
        REP,
        "Representations and Warranties",
        2,
    ),
    rule(
        &[
            "counterparts",
            "severability",
            "entire agreement",
            "assignment",
            "amendment",
            "waiver",
            "expenses",
            "headings",
            "third-party beneficiaries",
            "third party beneficiaries",
        ],
        MISC,
        "Miscellaneous",
        3,
    ),
];

/// Clean title from a heading line.
///
/// Drops the leading keyword and number, then cuts at the first sentence
/// period so "Section 2.1 Conduct of Business. The Company shall..."
/// becomes "Conduct of Business".
pub fn clean_title(heading: &str) -> String {
    let first_line = heading.lines().next().unwrap_or_default();
    let lead = LEADING_NUMBER.find(first_line).map_or(0, |m| m.end());
    let rest = first_line[lead..].trim_start_matches(|c: char| !c.is_alphanumeric());

    let cut = sentence_end(rest).unwrap_or(rest.len());
    let title = rest[..cut].trim().trim_end_matches(['.', ':', ';', ',']);

    match title.char_indices().nth(MAX_TITLE_CHARS) {
        Some((end, _)) => title[..end].trim_end().to_string(),
        None => title.to_string(),
    }
}

/// Byte offset of the first period that ends a sentence.
fn sentence_end(text: &str) -> Option<usize> {
    text.char_indices().find_map(|(i, c)| {
        if c != '.' {
            return None;
        }
        let next = text[i + 1..].chars().next();
        match next {
            None => Some(i),
            Some(n) if n.is_whitespace() => Some(i),
            _ => None,
        }
    })
}

/// Title used for classification, falling back to the article title.
pub fn section_title(section: &Section) -> String {
    let title = clean_title(&section.heading);
    if !title.is_empty() {
        return title;
    }
    section
        .article
        .as_ref()
        .map(|a| a.title.trim().to_string())
        .unwrap_or_default()
}

/// First topic rule matching the title.
pub fn match_topic(title: &str) -> Option<&'static TopicRule> {
    let lowered = title.to_lowercase();
    if lowered.is_empty() {
        return None;
    }
    TOPIC_RULES
        .iter()
        .find(|rule| rule.patterns.iter().any(|p| lowered.contains(p)))
}

/// High-value types and any no-solicitation title always need full extraction.
pub fn is_high_value(provision_type: &str, title: &str) -> bool {
    HIGH_VALUE_TYPES.contains(&provision_type) || title.to_lowercase().contains("solicit")
}

/// Complexity from sub-item count, with the high-value override.
pub fn complexity(provision_type: &str, title: &str, sub_items: usize) -> Complexity {
    if is_high_value(provision_type, title) {
        Complexity::High
    } else {
        Complexity::from_sub_items(sub_items)
    }
}
