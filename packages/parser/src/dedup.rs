//! Near-duplicate removal within each provision type.
//!
//! The shorter of two same-type texts is dropped when the first 80% of it
//! (whitespace-collapsed) appears in the longer one. Two provisions sharing
//! a long boilerplate lead-in but differing afterwards can be merged by
//! this rule; that trade-off is accepted.

use std::collections::HashMap;

use crate::config::{DEDUP_MIN_PREFIX_CHARS, DEDUP_PREFIX_RATIO};
use crate::types::TypedText;

/// Outcome of deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated<T> {
    /// Surviving items in their original order.
    pub items: Vec<T>,

    pub removed: usize,
}

/// Drop near-duplicate items of the same provision type.
#[must_use]
pub fn dedup<T: TypedText>(items: Vec<T>) -> Deduplicated<T> {
    let collapsed: Vec<String> = items.iter().map(|item| collapse_whitespace(item.text())).collect();
    let lengths: Vec<usize> = collapsed.iter().map(|t| t.chars().count()).collect();

    let mut partitions: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, item) in items.iter().enumerate() {
        partitions.entry(item.provision_type()).or_default().push(i);
    }

    let mut dropped = vec![false; items.len()];
    for indices in partitions.values() {
        for (pos, &i) in indices.iter().enumerate() {
            for &j in &indices[pos + 1..] {
                if dropped[i] || dropped[j] {
                    continue;
                }
                // On equal length the later item goes
                let (shorter, longer) = if lengths[i] < lengths[j] { (i, j) } else { (j, i) };
                if is_contained(&collapsed[shorter], lengths[shorter], &collapsed[longer]) {
                    dropped[shorter] = true;
                }
            }
        }
    }

    let removed = dropped.iter().filter(|d| **d).count();
    if removed > 0 {
        tracing::debug!(removed, "Removed duplicate provisions");
    }

    let items = items
        .into_iter()
        .zip(dropped)
        .filter_map(|(item, drop)| (!drop).then_some(item))
        .collect();

    Deduplicated { items, removed }
}

fn is_contained(shorter: &str, shorter_chars: usize, longer: &str) -> bool {
    // Text lengths are far below f64 precision limits
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let prefix_chars = (shorter_chars as f64 * DEDUP_PREFIX_RATIO) as usize;
    if prefix_chars <= DEDUP_MIN_PREFIX_CHARS {
        return false;
    }
    let prefix = match shorter.char_indices().nth(prefix_chars) {
        Some((idx, _)) => &shorter[..idx],
        None => shorter,
    };
    longer.contains(prefix)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
