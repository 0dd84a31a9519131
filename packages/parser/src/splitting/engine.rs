//! Split engine that applies registered split rules to section text.

use std::sync::LazyLock;

use regex::Regex;

use super::registry::SplitRegistry;
use super::strategy::{DefinitionSplitStrategy, LetteredClauseSplitStrategy, SplitStrategy};
use super::types::{ClauseKind, SplitMethod, SubClause};
use crate::config::MIN_SECTION_BODY_CHARS;

/// Leading section token and short title, ignored when judging a preamble.
#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static HEADING_LEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?:(?:Section|SECTION|Sec\.|§)\s*)?(?:\d{1,3}\.\d{1,3}\.?)?\s*(?:[A-Z][^.\n]{0,80}\.)?",
    )
    .expect("valid regex")
});

/// Engine for deterministic sub-clause splitting.
///
/// Looks up the provision type in the registry and, when the section
/// carries enough markers, cuts it into contiguous pieces marker-to-marker.
pub struct SplitEngine {
    registry: SplitRegistry,
    definitions: DefinitionSplitStrategy,
    lettered: LetteredClauseSplitStrategy,
}

impl SplitEngine {
    #[must_use]
    pub fn new(registry: SplitRegistry) -> Self {
        Self {
            registry,
            definitions: DefinitionSplitStrategy,
            lettered: LetteredClauseSplitStrategy,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SplitRegistry {
        &self.registry
    }

    /// Whether sections of this type are split without external calls.
    #[must_use]
    pub fn is_presplit(&self, provision_type: &str) -> bool {
        self.registry.is_presplit(provision_type)
    }

    fn strategy(&self, method: SplitMethod) -> &dyn SplitStrategy {
        match method {
            SplitMethod::Definitions => &self.definitions,
            SplitMethod::LetteredClauses => &self.lettered,
        }
    }

    /// Split section text for a provision type.
    ///
    /// Returns `None` when the type is not registered or the text has too
    /// few markers; the caller keeps the section whole.
    #[must_use]
    pub fn split(&self, provision_type: &str, text: &str) -> Option<Vec<SubClause>> {
        let spec = self.registry.get_spec(provision_type)?;
        let strategy = self.strategy(spec.method);
        let markers = strategy.find_markers(text);

        if markers.is_empty() || markers.len() < spec.min_markers {
            tracing::trace!(
                provision_type,
                markers = markers.len(),
                "Too few markers, keeping section whole"
            );
            return None;
        }

        let mut pieces = Vec::with_capacity(markers.len() + 1);

        let first = markers[0].offset;
        if let Some(preamble) = preamble(text, first) {
            pieces.push(preamble);
        }

        let kind = match spec.method {
            SplitMethod::Definitions => ClauseKind::Definition,
            SplitMethod::LetteredClauses => ClauseKind::Clause,
        };
        for (i, marker) in markers.iter().enumerate() {
            let end = markers.get(i + 1).map_or(text.len(), |next| next.offset);
            let item = text[marker.offset..end].trim_end();
            if item.is_empty() {
                continue;
            }
            pieces.push(SubClause {
                kind,
                label: strategy.label(marker, item),
                text: item.to_string(),
                offset: marker.offset,
            });
        }

        tracing::debug!(
            provision_type,
            method = spec.method.as_str(),
            pieces = pieces.len(),
            "Split section"
        );
        Some(pieces)
    }

    /// Count in-sequence lettered sub-items, used for complexity estimation.
    #[must_use]
    pub fn count_sub_items(&self, text: &str) -> usize {
        self.lettered.find_markers(text).len()
    }
}

/// Lead-in before the first marker, kept when it says more than its heading.
fn preamble(text: &str, first_marker: usize) -> Option<SubClause> {
    let lead = &text[..first_marker];
    let trimmed = lead.trim();
    if trimmed.is_empty() {
        return None;
    }

    let heading_len = HEADING_LEAD.find(lead).map_or(0, |m| m.end());
    if lead[heading_len..].trim().chars().count() < MIN_SECTION_BODY_CHARS {
        return None;
    }

    let offset = lead.len() - lead.trim_start().len();
    let label = HEADING_LEAD
        .find(lead)
        .map(|m| heading_title(m.as_str()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Preamble".to_string());

    Some(SubClause {
        kind: ClauseKind::Preamble,
        label,
        text: lead.trim().to_string(),
        offset,
    })
}

/// `Section 2.1 Conduct of Business.` -> `Conduct of Business`
fn heading_title(heading: &str) -> String {
    heading
        .trim()
        .trim_start_matches(|c: char| !c.is_alphabetic())
        .trim_start_matches("Section")
        .trim_start_matches("SECTION")
        .trim_start_matches("Sec.")
        .trim_start_matches(|c: char| !c.is_alphabetic())
        .trim_end_matches('.')
        .trim()
        .to_string()
}
