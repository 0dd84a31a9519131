//! Category resolver.
//!
//! Assigns provision type, category, display tier and complexity to every
//! section. Sections are tried against the topic table first, then the
//! historical catalog; only what remains goes to the external service, in
//! batches on the bounded pool. A batch that fails is demoted to the
//! overflow category, and so is any index the response leaves out.

pub mod rules;

use std::collections::HashMap;

use clausebank_parser::splitting::SplitEngine;
use clausebank_parser::taxonomy::{OTHER, OTHER_CATEGORY};
use clausebank_parser::Section;
use tracing::{debug, info, warn};

use crate::catalog::{match_catalog, CatalogEntry};
use crate::config::IngestConfig;
use crate::decode::{decode_array, ClassificationEntry};
use crate::error::Result;
use crate::llm::{CallKind, LlmClient};
use crate::models::{ClassificationCounts, ClassifiedBy, ClassifiedSection, Complexity};
use crate::pool::run_bounded;
use crate::prompt::{build_classification_request, preview, ClassifyItem};

pub use rules::{clean_title, complexity, match_topic, section_title, TopicRule, TOPIC_RULES};

/// Lowest-priority display tier.
const REFERENCE_TIER: u8 = 3;

/// Output of category resolution, in document order.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub sections: Vec<ClassifiedSection>,
    pub counts: ClassificationCounts,

    /// Classification requests issued.
    pub external_calls: usize,
}

/// A section awaiting external classification.
struct Pending {
    index: usize,
    section: Section,
    title: String,
    sub_items: usize,
}

impl Pending {
    fn classify(
        self,
        provision_type: &str,
        category: &str,
        display_tier: u8,
        complexity: Complexity,
        classified_by: ClassifiedBy,
    ) -> ClassifiedSection {
        ClassifiedSection {
            section: self.section,
            index: self.index,
            title: self.title,
            provision_type: provision_type.to_string(),
            category: category.to_string(),
            display_tier,
            complexity,
            classified_by,
            sub_item_count: self.sub_items,
        }
    }

    /// Overflow category, complexity from the sub-item count alone.
    fn overflow(self) -> ClassifiedSection {
        let complexity = Complexity::from_sub_items(self.sub_items);
        self.classify(
            OTHER,
            OTHER_CATEGORY,
            REFERENCE_TIER,
            complexity,
            ClassifiedBy::Overflow,
        )
    }

    fn apply_entry(self, entry: ClassificationEntry) -> ClassifiedSection {
        let provision_type = entry.provision_type.trim().to_uppercase();
        let category = match entry.category.trim() {
            "" => provision_type.clone(),
            label => label.to_string(),
        };
        let display_tier = entry.display_tier.unwrap_or(REFERENCE_TIER).clamp(1, REFERENCE_TIER);

        let reported = entry
            .complexity
            .as_deref()
            .and_then(|c| c.trim().parse::<Complexity>().ok())
            .unwrap_or_else(|| Complexity::from_sub_items(self.sub_items));
        let complexity = if rules::is_high_value(&provision_type, &self.title) {
            Complexity::High
        } else {
            reported
        };

        self.classify(
            &provision_type,
            &category,
            display_tier,
            complexity,
            ClassifiedBy::External,
        )
    }
}

pub struct CategoryResolver<'a, C: LlmClient> {
    client: &'a C,
    config: &'a IngestConfig,
    splitter: &'a SplitEngine,
    catalog: &'a [CatalogEntry],
    learned_rules: &'a [String],
}

impl<'a, C: LlmClient> CategoryResolver<'a, C> {
    pub fn new(
        client: &'a C,
        config: &'a IngestConfig,
        splitter: &'a SplitEngine,
        catalog: &'a [CatalogEntry],
        learned_rules: &'a [String],
    ) -> Self {
        Self {
            client,
            config,
            splitter,
            catalog,
            learned_rules,
        }
    }

    /// Classify every section. Never fails and never drops a section.
    #[tracing::instrument(skip_all, fields(sections = sections.len()))]
    pub async fn resolve(&self, sections: Vec<Section>) -> Resolution {
        let mut resolved = Vec::with_capacity(sections.len());
        let mut pending = Vec::new();

        for (index, section) in sections.into_iter().enumerate() {
            let title = section_title(&section);
            let sub_items = self.splitter.count_sub_items(&section.text);
            let unit = Pending {
                index,
                section,
                title,
                sub_items,
            };

            if let Some(rule) = match_topic(&unit.title) {
                let complexity = complexity(rule.provision_type, &unit.title, sub_items);
                resolved.push(unit.classify(
                    rule.provision_type,
                    rule.category,
                    rule.display_tier,
                    complexity,
                    ClassifiedBy::Rule,
                ));
            } else if let Some(entry) = match_catalog(&unit.title, self.catalog) {
                let complexity = complexity(&entry.provision_type, &unit.title, sub_items);
                resolved.push(unit.classify(
                    &entry.provision_type,
                    &entry.category,
                    entry.display_tier.clamp(1, REFERENCE_TIER),
                    complexity,
                    ClassifiedBy::Catalog,
                ));
            } else {
                pending.push(unit);
            }
        }

        let batches = into_batches(pending, self.config.classify_batch_size);
        let external_calls = batches.len();
        if external_calls > 0 {
            info!(
                deterministic = resolved.len(),
                batches = external_calls,
                "Classifying ambiguous sections externally"
            );
        }

        let classified = run_bounded(batches, self.config.concurrency, |batch| {
            self.classify_batch(batch)
        })
        .await;
        resolved.extend(classified.into_iter().flatten());
        resolved.sort_by_key(|s| s.index);

        let mut counts = ClassificationCounts::default();
        for section in &resolved {
            counts.record(section.classified_by);
        }

        Resolution {
            sections: resolved,
            counts,
            external_calls,
        }
    }

    async fn classify_batch(&self, batch: Vec<Pending>) -> Vec<ClassifiedSection> {
        let items: Vec<ClassifyItem> = batch
            .iter()
            .map(|p| ClassifyItem {
                index: p.index,
                heading: p.section.heading.clone(),
                title: p.title.clone(),
                text_preview: preview(&p.section.text, self.config.preview_chars),
                sub_item_count: p.sub_items,
                char_count: p.section.text.chars().count(),
            })
            .collect();

        let entries = match self.request(&items).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, batch_size = batch.len(), "classification batch failed, demoting to overflow");
                return batch.into_iter().map(Pending::overflow).collect();
            }
        };

        let mut by_index: HashMap<usize, ClassificationEntry> =
            entries.into_iter().map(|e| (e.index, e)).collect();

        batch
            .into_iter()
            .map(|unit| match by_index.remove(&unit.index) {
                Some(entry) if !entry.provision_type.trim().is_empty() => unit.apply_entry(entry),
                _ => {
                    debug!(index = unit.index, "section missing from classification response");
                    unit.overflow()
                }
            })
            .collect()
    }

    async fn request(&self, items: &[ClassifyItem]) -> Result<Vec<ClassificationEntry>> {
        let request = build_classification_request(items, self.learned_rules, self.config)?;
        let response = self.client.complete(&request).await?;
        decode_array(CallKind::Classification, &response.content)
    }
}

/// Split into owned batches of at most `size`.
fn into_batches<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut batches = Vec::new();
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::MockLlmClient;
    use crate::error::PipelineError;
    use clausebank_parser::splitting::create_presplit_registry;
    use clausebank_parser::taxonomy::{GOV, MAE};
    use clausebank_parser::SectionLevel;

    fn section(text: &str, start: usize) -> Section {
        let source = format!("{}{}", " ".repeat(start), text);
        Section::from_span(&source, start, source.len(), SectionLevel::Section)
    }

    fn sections() -> Vec<Section> {
        vec![
            section("Section 1.1 Material Adverse Effect. Any change that is materially adverse to the Company.", 0),
            section("Section 5.9 Takeover Statutes. If any takeover statute becomes applicable, the parties act.", 100),
            section("Section 6.1 Financing Cooperation. The Company shall cooperate with the debt financing.", 200),
            section("Section 6.2 Stock Exchange Delisting. Parent shall cause the shares to be delisted.", 300),
        ]
    }

    fn catalog() -> Vec<CatalogEntry> {
        vec![CatalogEntry {
            provision_type: "DELIST".into(),
            category: "Stock Exchange Delisting".into(),
            display_tier: 3,
        }]
    }

    #[test]
    fn test_into_batches() {
        let batches = into_batches((0..7).collect::<Vec<_>>(), 3);
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(into_batches(Vec::<i32>::new(), 3).is_empty());
    }

    #[tokio::test]
    async fn test_rule_catalog_and_external() {
        let client = MockLlmClient::with_router(|req| {
            assert!(req.user_content().contains("Takeover Statutes"));
            Ok(r#"[{"index": 1, "provisionType": "eff", "category": "Takeover Statutes", "displayTier": 2, "complexity": "low"}]"#.into())
        });
        let config = IngestConfig::default();
        let splitter = SplitEngine::new(create_presplit_registry());
        let catalog = catalog();
        let resolver = CategoryResolver::new(&client, &config, &splitter, &catalog, &[]);

        let resolution = resolver.resolve(sections()).await;
        let s = &resolution.sections;

        assert_eq!(s.len(), 4);
        assert_eq!(s.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2, 3]);

        assert_eq!(s[0].provision_type, MAE);
        assert_eq!(s[0].classified_by, ClassifiedBy::Rule);
        assert_eq!(s[0].complexity, Complexity::High);

        assert_eq!(s[1].provision_type, "EFF");
        assert_eq!(s[1].classified_by, ClassifiedBy::External);
        assert_eq!(s[1].display_tier, 2);

        assert_eq!(s[2].provision_type, "FIN");
        assert_eq!(s[2].classified_by, ClassifiedBy::Rule);

        assert_eq!(s[3].provision_type, "DELIST");
        assert_eq!(s[3].classified_by, ClassifiedBy::Catalog);

        assert_eq!(resolution.external_calls, 1);
        assert_eq!(resolution.counts.rule, 2);
        assert_eq!(resolution.counts.catalog, 1);
        assert_eq!(resolution.counts.external, 1);
    }

    #[tokio::test]
    async fn test_failed_batch_goes_to_overflow() {
        let client = MockLlmClient::with_router(|_| {
            Err(PipelineError::LlmApiError {
                status: 500,
                message: "overloaded".into(),
            })
        });
        let config = IngestConfig::default();
        let splitter = SplitEngine::new(create_presplit_registry());
        let resolver = CategoryResolver::new(&client, &config, &splitter, &[], &[]);

        let resolution = resolver.resolve(sections()).await;

        assert_eq!(resolution.sections.len(), 4);
        let overflow: Vec<&ClassifiedSection> = resolution
            .sections
            .iter()
            .filter(|s| s.classified_by == ClassifiedBy::Overflow)
            .collect();
        assert_eq!(overflow.len(), 2);
        for s in overflow {
            assert_eq!(s.provision_type, OTHER);
            assert_eq!(s.category, OTHER_CATEGORY);
            assert_eq!(s.display_tier, 3);
            assert_eq!(s.complexity, Complexity::Low);
        }
    }

    #[tokio::test]
    async fn test_missing_index_demoted_individually() {
        let client = MockLlmClient::with_router(|_| {
            Ok(r#"```json
[{"index": 3, "provisionType": "MISC", "category": "Delisting", "displayTier": 3}]
```"#
                .into())
        });
        let config = IngestConfig::default();
        let splitter = SplitEngine::new(create_presplit_registry());
        let resolver = CategoryResolver::new(&client, &config, &splitter, &[], &[]);

        let resolution = resolver.resolve(sections()).await;

        assert_eq!(resolution.sections[1].classified_by, ClassifiedBy::Overflow);
        assert_eq!(resolution.sections[3].classified_by, ClassifiedBy::External);
        assert_eq!(resolution.sections[3].provision_type, "MISC");
        assert_eq!(resolution.counts.overflow, 1);
    }

    #[tokio::test]
    async fn test_batches_respect_size_and_rules_are_sent() {
        let client = MockLlmClient::with_router(|_| Ok("[]".into()));
        let config = IngestConfig::default().with_classify_batch_size(1);
        let splitter = SplitEngine::new(create_presplit_registry());
        let learned = vec!["Delisting sections are MISC".to_string()];
        let resolver = CategoryResolver::new(&client, &config, &splitter, &[], &learned);

        let resolution = resolver.resolve(sections()).await;

        assert_eq!(resolution.external_calls, 2);
        assert_eq!(client.calls_of(CallKind::Classification), 2);
        assert!(client
            .requests()
            .iter()
            .all(|r| r.user_content().contains("Delisting sections are MISC")));
        assert_eq!(resolution.counts.overflow, 2);
    }

    #[tokio::test]
    async fn test_no_external_call_when_all_deterministic() {
        let client = MockLlmClient::with_responses(vec![]);
        let config = IngestConfig::default();
        let splitter = SplitEngine::new(create_presplit_registry());
        let resolver = CategoryResolver::new(&client, &config, &splitter, &[], &[]);

        let resolution = resolver
            .resolve(vec![section("Section 9.1 Governing Law. This Agreement is governed by Delaware law.", 0)])
            .await;

        assert_eq!(resolution.sections[0].provision_type, GOV);
        assert_eq!(client.call_count(), 0);
    }
}
