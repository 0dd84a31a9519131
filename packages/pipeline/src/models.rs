use chrono::{DateTime, Utc};
use clausebank_parser::completeness::CompletenessWarning;
use clausebank_parser::{DelimiterPattern, Gap, Section, TocComparison, TypedText};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Sub-item count at or above which a section is high complexity.
pub const HIGH_COMPLEXITY_SUB_ITEMS: usize = 5;

/// Sub-item count at or above which a section is medium complexity.
pub const MEDIUM_COMPLEXITY_SUB_ITEMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn from_sub_items(count: usize) -> Self {
        if count >= HIGH_COMPLEXITY_SUB_ITEMS {
            Self::High
        } else if count >= MEDIUM_COMPLEXITY_SUB_ITEMS {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// Which resolver pass assigned a section's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ClassifiedBy {
    Rule,
    Catalog,
    External,
    /// Demoted after a failed or incomplete classification response.
    Overflow,
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case", from = "String")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum Favorability {
    BuyerFavorable,
    SellerFavorable,
    #[default]
    Neutral,
    Balanced,
}

impl Favorability {
    /// Decode a free-form label; anything unrecognised is neutral.
    pub fn from_label(label: &str) -> Self {
        label
            .trim()
            .replace(['_', ' '], "-")
            .parse()
            .unwrap_or_default()
    }
}

impl From<String> for Favorability {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

/// How a provision's text was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Deterministic definition or lettered sub-clause splitting.
    Deterministic,
    /// High complexity: per-section call with calibration examples.
    Semantic,
    /// Medium complexity: per-section exhaustive split.
    Exhaustive,
    /// Low complexity: section kept whole, favorability only.
    Whole,
}

/// A section with its resolved type, category and complexity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedSection {
    pub section: Section,

    /// Position in document order.
    pub index: usize,

    pub title: String,
    pub provision_type: String,
    pub category: String,
    pub display_tier: u8,
    pub complexity: Complexity,
    pub classified_by: ClassifiedBy,
    pub sub_item_count: usize,
}

/// A final, typed unit of extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provision {
    pub provision_type: String,
    pub category: String,

    /// Verbatim slice of the normalized source at `start`.
    pub text: String,

    pub favorability: Favorability,
    pub display_tier: u8,
    pub sort_order: usize,

    /// Byte offset into the normalized source.
    pub start: usize,

    pub strategy: ExtractionStrategy,

    /// Internal error note when a fallback was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TypedText for Provision {
    fn provision_type(&self) -> &str {
        &self.provision_type
    }

    fn text(&self) -> &str {
        &self.text
    }
}

/// Wall-clock duration of each phase in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimings {
    pub normalize_ms: u64,
    pub parse_ms: u64,
    pub gaps_ms: u64,
    pub classify_ms: u64,
    pub extract_ms: u64,
    pub dedup_ms: u64,
    pub verify_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    pub rule: usize,
    pub catalog: usize,
    pub external: usize,
    pub overflow: usize,
}

impl ClassificationCounts {
    pub fn record(&mut self, by: ClassifiedBy) {
        match by {
            ClassifiedBy::Rule => self.rule += 1,
            ClassifiedBy::Catalog => self.catalog += 1,
            ClassifiedBy::External => self.external += 1,
            ClassifiedBy::Overflow => self.overflow += 1,
        }
    }
}

/// External requests issued, per call type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalCallCounts {
    pub classification: usize,
    pub extraction: usize,
    pub favorability: usize,

    /// Extraction units answered from the per-run memo.
    pub memo_hits: usize,
}

/// Per-unit fallbacks applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackCounts {
    /// Sections demoted to the overflow category.
    pub classification_overflow: usize,

    /// Sections emitted whole after a failed extraction.
    pub extraction_whole: usize,

    /// Provisions defaulted to neutral favorability.
    pub favorability_neutral: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub timings: PhaseTimings,
    pub coverage_pct: f64,
    pub pattern: DelimiterPattern,
    pub body_start: usize,
    pub section_count: usize,
    pub recovered_sections: usize,
    pub provision_count: usize,
    pub duplicates_removed: usize,

    /// Gaps before recovery.
    pub gaps_found: Vec<Gap>,

    /// Gaps still open after recovery.
    pub remaining_gaps: Vec<Gap>,

    pub toc: TocComparison,
    pub classification: ClassificationCounts,
    pub external_calls: ExternalCallCounts,
    pub fallbacks: FallbackCounts,
    pub completeness_warnings: Vec<CompletenessWarning>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestOutput {
    pub provisions: Vec<Provision>,
    pub diagnostics: Diagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_thresholds() {
        assert_eq!(Complexity::from_sub_items(0), Complexity::Low);
        assert_eq!(Complexity::from_sub_items(2), Complexity::Low);
        assert_eq!(Complexity::from_sub_items(3), Complexity::Medium);
        assert_eq!(Complexity::from_sub_items(5), Complexity::High);
        assert_eq!(Complexity::from_sub_items(12), Complexity::High);
    }

    #[test]
    fn test_complexity_parse_case_insensitive() {
        assert_eq!("HIGH".parse::<Complexity>().unwrap(), Complexity::High);
        assert_eq!("medium".parse::<Complexity>().unwrap(), Complexity::Medium);
        assert!("extreme".parse::<Complexity>().is_err());
    }

    #[test]
    fn test_favorability_labels() {
        assert_eq!(
            Favorability::from_label("buyer-favorable"),
            Favorability::BuyerFavorable
        );
        assert_eq!(
            Favorability::from_label("Seller Favorable"),
            Favorability::SellerFavorable
        );
        assert_eq!(Favorability::from_label("balanced"), Favorability::Balanced);
        assert_eq!(Favorability::from_label("pro-target"), Favorability::Neutral);
        assert_eq!(Favorability::from_label(""), Favorability::Neutral);
    }

    #[test]
    fn test_favorability_serde() {
        let json = serde_json::to_string(&Favorability::SellerFavorable).unwrap();
        assert_eq!(json, "\"seller-favorable\"");

        let decoded: Favorability = serde_json::from_str("\"something-else\"").unwrap();
        assert_eq!(decoded, Favorability::Neutral);
    }

    #[test]
    fn test_classification_counts_record() {
        let mut counts = ClassificationCounts::default();
        counts.record(ClassifiedBy::Rule);
        counts.record(ClassifiedBy::Rule);
        counts.record(ClassifiedBy::Overflow);
        assert_eq!(counts.rule, 2);
        assert_eq!(counts.overflow, 1);
        assert_eq!(counts.external, 0);
    }

    #[test]
    fn test_provision_skips_empty_note() {
        let provision = Provision {
            provision_type: "GOV".into(),
            category: "Governing Law".into(),
            text: "This Agreement is governed by Delaware law.".into(),
            favorability: Favorability::Neutral,
            display_tier: 3,
            sort_order: 0,
            start: 10,
            strategy: ExtractionStrategy::Whole,
            note: None,
        };
        let json = serde_json::to_value(&provision).unwrap();
        assert!(json.get("note").is_none());
        assert_eq!(json["strategy"], "whole");
        assert_eq!(json["favorability"], "neutral");
    }
}
