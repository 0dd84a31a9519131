//! Completeness checks against a checklist of expected provision types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::taxonomy::{COB, COND, DEF, GOV, MAE, NOSOL, TERM, TFEE};
use crate::types::TypedText;

/// One checklist entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessCheck {
    pub provision_type: String,

    /// Lowercase keywords whose presence in the source implies the type.
    pub keywords: Vec<String>,

    pub minimum: usize,
}

impl CompletenessCheck {
    #[must_use]
    pub fn new(provision_type: &str, keywords: &[&str], minimum: usize) -> Self {
        Self {
            provision_type: provision_type.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            minimum,
        }
    }
}

/// A checklist entry that came up short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessWarning {
    pub provision_type: String,
    pub expected: usize,
    pub found: usize,

    /// The keyword that was found in the source.
    pub keyword: String,
}

impl fmt::Display for CompletenessWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Expected at least {} {} provision(s) but found {} (source mentions '{}')",
            self.expected, self.provision_type, self.found, self.keyword
        )
    }
}

/// The standard checklist for merger agreements.
#[must_use]
pub fn default_checklist() -> Vec<CompletenessCheck> {
    vec![
        CompletenessCheck::new(MAE, &["material adverse effect"], 1),
        CompletenessCheck::new(NOSOL, &["acquisition proposal", "no solicitation"], 1),
        CompletenessCheck::new(TERM, &["may be terminated"], 1),
        CompletenessCheck::new(TFEE, &["termination fee"], 1),
        CompletenessCheck::new(GOV, &["governed by", "governing law"], 1),
        CompletenessCheck::new(COND, &["conditions to"], 1),
        CompletenessCheck::new(COB, &["ordinary course"], 1),
        CompletenessCheck::new(DEF, &["shall mean", "means"], 1),
    ]
}

/// Evaluate the checklist. Warnings are diagnostic only.
#[must_use]
pub fn verify<T: TypedText>(
    provisions: &[T],
    source: &str,
    checklist: &[CompletenessCheck],
) -> Vec<CompletenessWarning> {
    let lowered = source.to_lowercase();

    checklist
        .iter()
        .filter_map(|check| {
            let found = provisions
                .iter()
                .filter(|p| p.provision_type() == check.provision_type)
                .count();
            if found >= check.minimum {
                return None;
            }
            let keyword = check.keywords.iter().find(|k| lowered.contains(k.as_str()))?;
            Some(CompletenessWarning {
                provision_type: check.provision_type.clone(),
                expected: check.minimum,
                found,
                keyword: keyword.clone(),
            })
        })
        .inspect(|warning| tracing::warn!("{warning}"))
        .collect()
}
