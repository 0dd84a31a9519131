//! Table-of-contents detection and body start.
//!
//! Two shapes are recognized. A cluster of consecutive page-numbered entry
//! lines near the front of the document, or an explicit `TABLE OF CONTENTS`
//! marker whose first listed heading appears a second time where the body
//! begins.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::headings::find_article_headings;
use crate::config::{TOC_MAX_POSITION_RATIO, TOC_MIN_ENTRIES};
use crate::types::{Section, TocComparison};

/// Heading-shaped line ending in a page number after a dot leader or wide gap.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TOC_ENTRY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[ \t]*\S.{0,200}?[A-Za-z].{0,200}?(?:(?:\.[ \t]?){3,}|…+|[ \t]{3,}|\t)[ \t]*(?:[A-Z]-)?\d{1,3}[ \t]*$",
    )
    .expect("valid regex")
});

/// Lines that may sit inside a TOC without ending it.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TOC_FILLER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[ \t]*(?:article[ \t]+[ivxlc\d]+\b.{0,100}|table[ \t]+of[ \t]+contents|contents|page|section(?:[ \t]+page)?|(?:exhibits?|annex(?:es)?|schedules?)\b.{0,100})[ \t]*$",
    )
    .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static TOC_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:table[ \t]+of[ \t]+contents|contents)[ \t]*$").expect("valid regex")
});

/// First heading-like line after a TOC marker, captured as a comparison key.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static LEADING_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[ \t]*((?:article|section)[ \t]+[ivxlc\d]+(?:\.\d{1,3})?)\b")
        .expect("valid regex")
});

/// Line-start section heading used to locate the body after a TOC.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static BODY_SECTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:Section|SECTION)[ \t]+\d{1,3}\.\d{1,3}\b").expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PREAMBLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*(?:(?:This|THIS)[ \t]+(?:AGREEMENT|Agreement)\b|W\s*I\s*T\s*N\s*E\s*S\s*S\s*E\s*T\s*H|RECITALS\b)",
    )
    .expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static SECTION_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,3})\.(\d{1,3})\b").expect("valid regex"));

/// Result of table-of-contents detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocDetection {
    pub found: bool,

    /// Byte offset where body parsing begins.
    pub body_start: usize,

    /// Entry lines of the table of contents, in order.
    pub entries: Vec<String>,
}

struct LineSpan<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

fn line_spans(text: &str) -> Vec<LineSpan<'_>> {
    let mut offset = 0;
    text.split('\n')
        .map(|line| {
            let span = LineSpan {
                start: offset,
                end: offset + line.len(),
                text: line,
            };
            offset += line.len() + 1;
            span
        })
        .collect()
}

fn is_entry_line(line: &str) -> bool {
    line.chars().count() <= 250 && TOC_ENTRY_LINE.is_match(line)
}

/// Detect a table of contents and where the body begins.
#[must_use]
pub fn detect_toc(text: &str) -> TocDetection {
    let limit = front_limit(text);

    if let Some(detection) = detect_entry_cluster(text, limit) {
        tracing::debug!(
            entries = detection.entries.len(),
            body_start = detection.body_start,
            "TOC cluster detected"
        );
        return detection;
    }

    if let Some(detection) = detect_marked_toc(text, limit) {
        tracing::debug!(
            entries = detection.entries.len(),
            body_start = detection.body_start,
            "TOC marker detected"
        );
        return detection;
    }

    // No TOC: start at the first article heading when there is one
    let body_start = find_article_headings(text, 0).first().map_or(0, |a| a.start);
    TocDetection {
        found: false,
        body_start,
        entries: Vec::new(),
    }
}

fn front_limit(text: &str) -> usize {
    // Document lengths are far below f64 precision limits
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let limit = (text.len() as f64 * TOC_MAX_POSITION_RATIO) as usize;
    limit
}

fn detect_entry_cluster(text: &str, limit: usize) -> Option<TocDetection> {
    let lines = line_spans(text);
    let mut run: Vec<&LineSpan<'_>> = Vec::new();

    let mut finished = None;
    for line in &lines {
        if line.start > limit && run.is_empty() {
            break;
        }
        let trimmed = line.text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_entry_line(line.text) {
            run.push(line);
            continue;
        }
        if TOC_FILLER_LINE.is_match(line.text) {
            continue;
        }
        if run.len() >= TOC_MIN_ENTRIES {
            finished = Some(std::mem::take(&mut run));
            break;
        }
        run = Vec::new();
    }
    let run = finished.or_else(|| (run.len() >= TOC_MIN_ENTRIES).then_some(run))?;

    let first = run.first()?;
    if first.start > limit {
        return None;
    }
    let toc_end = run.last()?.end;

    Some(TocDetection {
        found: true,
        body_start: body_start_after(text, toc_end),
        entries: run.iter().map(|l| l.text.trim().to_string()).collect(),
    })
}

fn detect_marked_toc(text: &str, limit: usize) -> Option<TocDetection> {
    let marker = TOC_MARKER.find(text).filter(|m| m.start() <= limit)?;
    let lines = line_spans(text);

    let after_marker: Vec<&LineSpan<'_>> =
        lines.iter().filter(|l| l.start >= marker.end()).collect();

    let (first_index, key) = after_marker.iter().enumerate().find_map(|(i, line)| {
        LEADING_HEADING
            .captures(line.text)
            .and_then(|c| c.get(1))
            .map(|m| (i, heading_key(m.as_str())))
    })?;

    // The body starts where the first listed heading appears again
    let repeat = after_marker.iter().skip(first_index + 1).find(|line| {
        LEADING_HEADING
            .captures(line.text)
            .and_then(|c| c.get(1))
            .is_some_and(|m| heading_key(m.as_str()) == key)
    })?;

    let body_start = repeat.start + (repeat.text.len() - repeat.text.trim_start().len());
    let entries = after_marker
        .iter()
        .filter(|l| l.start < repeat.start)
        .map(|l| l.text.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    Some(TocDetection {
        found: true,
        body_start,
        entries,
    })
}

/// Uppercase, whitespace-collapsed heading key (`article  i` and `ARTICLE I` compare equal).
fn heading_key(heading: &str) -> String {
    heading.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase()
}

/// Earliest body marker after the TOC: article heading, preamble or section heading.
fn body_start_after(text: &str, from: usize) -> usize {
    let article = find_article_headings(text, from).first().map(|a| a.start);
    let preamble = PREAMBLE.find_at(text, from).map(|m| m.start());
    let section = BODY_SECTION_LINE
        .find_iter(text)
        .filter(|m| m.start() >= from)
        .find(|m| {
            let line_end = text[m.start()..].find('\n').map_or(text.len(), |i| m.start() + i);
            !is_entry_line(&text[m.start()..line_end])
        })
        .map(|m| m.start() + (m.as_str().len() - m.as_str().trim_start().len()));

    [article, preamble, section].into_iter().flatten().min().unwrap_or(from)
}

/// Compare TOC entries with parsed section numbers, numerically.
#[must_use]
pub fn compare_toc(detection: &TocDetection, sections: &[Section]) -> TocComparison {
    if !detection.found {
        return TocComparison::default();
    }

    let mut seen = HashSet::new();
    let listed: Vec<((u32, u32), String)> = detection
        .entries
        .iter()
        .filter_map(|entry| {
            let caps = SECTION_NUMBER.captures(entry)?;
            let key = (caps[1].parse().ok()?, caps[2].parse().ok()?);
            Some((key, caps[0].to_string()))
        })
        .filter(|(key, _)| seen.insert(*key))
        .collect();

    let parsed: Vec<((u32, u32), String)> = sections
        .iter()
        .filter_map(|s| s.number.map(|n| (n.key(), n.label())))
        .collect();
    let parsed_keys: HashSet<(u32, u32)> = parsed.iter().map(|(k, _)| *k).collect();
    let listed_keys: HashSet<(u32, u32)> = listed.iter().map(|(k, _)| *k).collect();

    let missing: Vec<String> = listed
        .iter()
        .filter(|(k, _)| !parsed_keys.contains(k))
        .map(|(_, label)| label.clone())
        .collect();
    let extra: Vec<String> = parsed
        .iter()
        .filter(|(k, _)| !listed_keys.contains(k))
        .map(|(_, label)| label.clone())
        .collect();

    TocComparison {
        found: true,
        total_entries: listed.len(),
        matched: listed.len() - missing.len(),
        missing,
        extra,
    }
}
