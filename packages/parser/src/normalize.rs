//! Text normalization for filing-format artifacts.
//!
//! Filings converted to plain text carry page breaks, running headers,
//! standalone page numbers, decorative rules and HTML entities. This module
//! removes them while leaving the legal text itself untouched.
//!
//! [`normalize`] is idempotent: running it on its own output is a no-op.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

/// Named or numeric HTML/SGML entity.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static ENTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});")
        .expect("valid regex")
});

/// Standalone page number: `12`, `- 12 -`, `Page 12`, `Page 12 of 80`, `ii`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PAGE_NUMBER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:[-–]\s*)?(?:page\s+)?\d{1,4}(?:\s+of\s+\d{1,4})?(?:\s*[-–])?$|^[ivx]{1,5}$")
        .expect("valid regex")
});

/// Decorative separator: `-----`, `=====`, `* * *`, `_____`.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static SEPARATOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-=_~*•·]\s*){3,}$").expect("valid regex"));

/// Page-number-shaped line after digit folding (`#` stands for any digit).
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static PAGE_SHAPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bpage\s*#+|#+\s+of\s+#+|[-–]\s*#+\s*[-–]?$|^#+$").expect("valid regex")
});

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static BLANK_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Headers must repeat at least this often to be stripped.
const MIN_HEADER_REPEATS: usize = 3;

/// Zero-width and other invisible characters removed outright.
const INVISIBLE: &[char] = &[
    '\u{200B}', '\u{200C}', '\u{200D}', '\u{200E}', '\u{200F}', '\u{2060}', '\u{FEFF}', '\u{00AD}',
];

/// Space variants mapped to a plain space.
const SPACE_VARIANTS: &[char] = &['\u{00A0}', '\u{2007}', '\u{202F}'];

/// Normalize raw agreement text.
///
/// # Examples
/// ```
/// use clausebank_parser::normalize::normalize;
///
/// let raw = "Section&nbsp;1.1 Definitions\n\n\n\n- 3 -\nTerms &amp; conditions";
/// assert_eq!(normalize(raw), "Section 1.1 Definitions\n\nTerms & conditions");
/// ```
#[must_use]
pub fn normalize(raw: &str) -> String {
    // Each decoding pass that changes the text shortens it, so this terminates
    let mut text = raw.to_string();
    loop {
        let next = strip_invisible(&decode_entities(&text));
        if next == text {
            break;
        }
        text = next;
    }

    let text: String = text.nfc().collect();
    let text = text
        .replace("\r\n", "\n")
        .replace(['\r', '\u{000C}', '\u{000B}'], "\n");

    let text = strip_artifact_lines(&text);
    BLANK_RUNS.replace_all(&text, "\n\n").trim().to_string()
}

/// Decode one layer of HTML entities, leaving unknown ones intact.
fn decode_entities(text: &str) -> String {
    ENTITY_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            decode_entity(&caps[1])
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn decode_entity(body: &str) -> Option<char> {
    if let Some(numeric) = body.strip_prefix('#') {
        let code = match numeric.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => numeric.parse().ok()?,
        };
        return char::from_u32(code).filter(|c| *c != '\0');
    }

    let decoded = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "sect" => '§',
        "para" => '¶',
        "ldquo" => '“',
        "rdquo" => '”',
        "lsquo" => '‘',
        "rsquo" => '’',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "bull" => '•',
        "middot" => '·',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "shy" => '\u{00AD}',
        "zwsp" => '\u{200B}',
        _ => return None,
    };
    Some(decoded)
}

fn strip_invisible(text: &str) -> String {
    text.chars()
        .filter(|c| !INVISIBLE.contains(c))
        .map(|c| if SPACE_VARIANTS.contains(&c) { ' ' } else { c })
        .collect()
}

/// Drop page numbers, separators and repeated running headers.
fn strip_artifact_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').map(str::trim_end).collect();

    let mut exact: HashMap<&str, usize> = HashMap::new();
    let mut folded: HashMap<String, usize> = HashMap::new();
    for line in &lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        *exact.entry(trimmed).or_default() += 1;
        *folded.entry(fold_digits(trimmed)).or_default() += 1;
    }

    let is_repeated_header = |line: &str| {
        let exact_repeats = exact.get(line).copied().unwrap_or_default();
        if exact_repeats >= MIN_HEADER_REPEATS && is_all_caps(line) {
            return true;
        }
        let key = fold_digits(line);
        let folded_repeats = folded.get(&key).copied().unwrap_or_default();
        folded_repeats >= MIN_HEADER_REPEATS && key.contains('#') && PAGE_SHAPED.is_match(&key)
    };

    lines
        .iter()
        .filter(|line| {
            let trimmed = line.trim();
            trimmed.is_empty()
                || !(PAGE_NUMBER_LINE.is_match(trimmed)
                    || SEPARATOR_LINE.is_match(trimmed)
                    || is_repeated_header(trimmed))
        })
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
}

fn fold_digits(line: &str) -> String {
    line.chars()
        .map(|c| if c.is_ascii_digit() { '#' } else { c })
        .collect()
}

fn is_all_caps(line: &str) -> bool {
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    letters >= 3 && line.chars().count() <= 120 && !line.chars().any(char::is_lowercase)
}
