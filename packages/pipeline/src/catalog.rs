//! Historical catalog of provision categories and calibration examples.
//!
//! The catalog is read-only input. It is queried once per run before any
//! concurrent work starts; a failing source degrades to an empty snapshot.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::models::Favorability;

/// Maximum historical categories fetched per run.
pub const MAX_CATALOG_ENTRIES: usize = 500;

/// Maximum calibration examples per provision type.
pub const MAX_EXAMPLES_PER_TYPE: usize = 3;

/// A historical `(type, category, display tier)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub provision_type: String,
    pub category: String,
    pub display_tier: u8,
}

/// A previously verified provision used to calibrate favorability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationExample {
    pub provision_type: String,
    pub category: String,
    #[serde(default)]
    pub favorability: Favorability,
    #[serde(default)]
    pub text: String,
}

/// Source of catalog data.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Up to `limit` historical categories.
    async fn categories(&self, limit: usize) -> Result<Vec<CatalogEntry>>;

    /// Up to `per_type` recent examples for each of `provision_types`.
    async fn calibration_examples(
        &self,
        provision_types: &[String],
        per_type: usize,
    ) -> Result<Vec<CalibrationExample>>;
}

/// Catalog held in memory, typically loaded from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub categories: Vec<CatalogEntry>,
    #[serde(default)]
    pub examples: Vec<CalibrationExample>,
}

impl StaticCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| PipelineError::Catalog(e.to_string()))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn categories(&self, limit: usize) -> Result<Vec<CatalogEntry>> {
        Ok(self.categories.iter().take(limit).cloned().collect())
    }

    async fn calibration_examples(
        &self,
        provision_types: &[String],
        per_type: usize,
    ) -> Result<Vec<CalibrationExample>> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let mut selected = Vec::new();

        // Later entries are more recent
        for example in self.examples.iter().rev() {
            if !provision_types.contains(&example.provision_type) {
                continue;
            }
            let count = counts.entry(example.provision_type.as_str()).or_default();
            if *count < per_type {
                *count += 1;
                selected.push(example.clone());
            }
        }

        Ok(selected)
    }
}

/// Fetch historical categories, logging and swallowing source failures.
pub async fn load_categories(source: &dyn CatalogSource) -> Vec<CatalogEntry> {
    match source.categories(MAX_CATALOG_ENTRIES).await {
        Ok(mut entries) => {
            entries.truncate(MAX_CATALOG_ENTRIES);
            entries
        }
        Err(e) => {
            warn!(error = %e, "catalog unavailable, continuing without categories");
            Vec::new()
        }
    }
}

/// Fetch calibration examples grouped by provision type.
pub async fn load_examples(
    source: &dyn CatalogSource,
    provision_types: &[String],
) -> HashMap<String, Vec<CalibrationExample>> {
    let mut grouped: HashMap<String, Vec<CalibrationExample>> = HashMap::new();
    if provision_types.is_empty() {
        return grouped;
    }

    match source
        .calibration_examples(provision_types, MAX_EXAMPLES_PER_TYPE)
        .await
    {
        Ok(examples) => {
            for example in examples {
                let bucket = grouped.entry(example.provision_type.clone()).or_default();
                if bucket.len() < MAX_EXAMPLES_PER_TYPE {
                    bucket.push(example);
                }
            }
        }
        Err(e) => {
            warn!(error = %e, "calibration examples unavailable");
        }
    }

    grouped
}

/// Best catalog match for a section title.
///
/// Matches by case-insensitive containment in either direction; the longest
/// matching category label wins.
pub fn match_catalog<'a>(title: &str, entries: &'a [CatalogEntry]) -> Option<&'a CatalogEntry> {
    let title = title.trim().to_lowercase();
    if title.chars().count() < 3 {
        return None;
    }

    entries
        .iter()
        .filter(|entry| {
            let label = entry.category.trim().to_lowercase();
            !label.is_empty() && (title.contains(&label) || label.contains(&title))
        })
        .max_by_key(|entry| entry.category.len())
}
