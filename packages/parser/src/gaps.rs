//! Gap detection and targeted recovery of missed sections.
//!
//! Within each article, a missing number between the smallest and largest
//! parsed section numbers is a gap. Recovery searches the source for a
//! line-start heading carrying the missing number and carves it out of the
//! section that swallowed it.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;

use crate::config::{floor_char_boundary, MIN_RECOVERED_CHARS, RECOVERY_SPAN_CAP};
use crate::types::{format_label, Gap, Section, SectionLevel, SectionNumber};

/// Outcome of gap recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovery {
    /// Sections after recovery, in document order.
    pub sections: Vec<Section>,

    /// Number of gaps filled.
    pub recovered: usize,

    /// Gaps that are still open.
    pub remaining_gaps: Vec<Gap>,
}

/// Find missing section numbers within each article.
///
/// # Examples
/// ```
/// use clausebank_parser::gaps::detect_gaps;
/// use clausebank_parser::types::{Section, SectionLevel, SectionNumber};
///
/// let source = "Section 1.1 Alpha text.\nSection 1.4 Delta text.";
/// let sections = vec![
///     Section::from_span(source, 0, 23, SectionLevel::Section)
///         .with_number(SectionNumber::parse("1", "1")),
///     Section::from_span(source, 24, source.len(), SectionLevel::Section)
///         .with_number(SectionNumber::parse("1", "4")),
/// ];
/// let labels: Vec<String> = detect_gaps(&sections).into_iter().map(|g| g.label).collect();
/// assert_eq!(labels, vec!["1.2", "1.3"]);
/// ```
#[must_use]
pub fn detect_gaps(sections: &[Section]) -> Vec<Gap> {
    let mut by_article: BTreeMap<u32, Vec<SectionNumber>> = BTreeMap::new();
    for number in sections.iter().filter_map(|s| s.number) {
        by_article.entry(number.article).or_default().push(number);
    }

    let mut gaps = Vec::new();
    for (article, numbers) in by_article {
        let present: BTreeSet<u32> = numbers.iter().map(|n| n.section).collect();
        let (Some(&min), Some(&max)) = (present.first(), present.last()) else {
            continue;
        };
        let padded = numbers.iter().any(|n| n.padded);

        for section in (min + 1)..max {
            if !present.contains(&section) {
                gaps.push(Gap {
                    article,
                    section,
                    label: format_label(article, section, padded),
                });
            }
        }
    }
    gaps
}

/// Try to recover each gap from the source text.
///
/// A hit must start a line at or after `body_start` and must not already be
/// the heading of a known section. The recovered section runs to the next
/// known section start, capped in length. A section containing the hit is
/// truncated at it.
#[must_use]
pub fn recover_gaps(text: &str, body_start: usize, sections: Vec<Section>, gaps: &[Gap]) -> Recovery {
    let mut sections = sections;
    let mut recovered = 0;

    for gap in gaps {
        let Some(pos) = find_gap_heading(text, body_start, &sections, gap) else {
            tracing::debug!(label = %gap.label, "Gap not found in source");
            continue;
        };

        let next_start = sections
            .iter()
            .map(|s| s.start)
            .filter(|start| *start > pos)
            .min()
            .unwrap_or(text.len());
        let end = next_start.min(floor_char_boundary(text, pos + RECOVERY_SPAN_CAP));

        let candidate = Section::from_span(text, pos, end, SectionLevel::Section);
        if candidate.text.trim().chars().count() < MIN_RECOVERED_CHARS {
            tracing::debug!(label = %gap.label, "Recovered span too short, skipping");
            continue;
        }

        let article = sections
            .iter()
            .rev()
            .find(|s| s.start < pos)
            .and_then(|s| s.article.clone());
        let number = SectionNumber {
            article: gap.article,
            section: gap.section,
            padded: gap.label.rsplit('.').next().is_some_and(|m| m.len() > 1 && m.starts_with('0')),
        };

        sections = sections
            .into_iter()
            .map(|s| if s.contains(pos) { s.truncated_at(pos) } else { s })
            .collect();
        sections.push(candidate.with_number(Some(number)).with_article(article));
        sections.sort_by_key(|s| s.start);
        recovered += 1;
    }

    let remaining_gaps = detect_gaps(&sections);
    tracing::info!(
        gaps = gaps.len(),
        recovered,
        remaining = remaining_gaps.len(),
        "Gap recovery finished"
    );

    Recovery {
        sections,
        recovered,
        remaining_gaps,
    }
}

fn find_gap_heading(text: &str, body_start: usize, sections: &[Section], gap: &Gap) -> Option<usize> {
    let pattern = Regex::new(&format!(
        r"(?m)^[ \t]*((?:(?:Section|SECTION|Sec\.|§)[ \t]*)?{}\b)",
        regex::escape(&gap.label)
    ))
    .ok()?;

    #[allow(clippy::let_and_return)] // The iterator borrows `pattern`
    let found = pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter(|m| m.start() >= body_start)
        .filter(|m| !followed_by_subnumber(text, m.end()))
        .map(|m| m.start())
        .find(|pos| !sections.iter().any(|s| is_heading_of(s, *pos)));
    found
}

/// Whether `pos` lies in the heading line of `section`.
fn is_heading_of(section: &Section, pos: usize) -> bool {
    section.start <= pos && pos < section.start + section.heading.len().max(1)
}

fn followed_by_subnumber(text: &str, end: usize) -> bool {
    let mut chars = text[end..].chars();
    chars.next() == Some('.') && chars.next().is_some_and(|c| c.is_ascii_digit())
}
