//! Sub-provision extraction.
//!
//! Each classified section becomes one or more provisions:
//! - registered pre-split types are cut deterministically,
//! - high and medium complexity sections get one external call each,
//! - everything else is kept whole.
//!
//! Deterministic and whole provisions then receive favorability through
//! batched calls. Every returned excerpt is located in its section so
//! provision text is always a verbatim slice of the normalized source.

use std::collections::HashMap;

use clausebank_parser::splitting::SplitEngine;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::catalog::CalibrationExample;
use crate::config::IngestConfig;
use crate::decode::{decode_array, ExtractedExcerpt, FavorabilityEntry};
use crate::error::{PipelineError, Result};
use crate::llm::{CallKind, LlmClient};
use crate::models::{
    ClassifiedSection, Complexity, ExtractionStrategy, ExternalCallCounts, FallbackCounts,
    Favorability, Provision,
};
use crate::pool::run_bounded;
use crate::prompt::{build_extraction_request, build_favorability_request, FavorabilityItem};

/// Shortest acceptable excerpt from a high complexity extraction.
pub const MIN_EXCERPT_CHARS: usize = 20;

#[derive(Debug, Clone)]
pub struct Extraction {
    pub provisions: Vec<Provision>,
    pub calls: ExternalCallCounts,
    pub fallbacks: FallbackCounts,
}

/// A provision before favorability and ordering are settled.
#[derive(Debug, Clone)]
struct Draft {
    /// Offset into the parent section's text.
    offset: usize,
    len: usize,
    category: String,
    strategy: ExtractionStrategy,
    favorability: Option<Favorability>,
    note: Option<String>,
}

impl Draft {
    fn whole(section: &ClassifiedSection, strategy: ExtractionStrategy) -> Self {
        Self {
            offset: 0,
            len: section.section.text.len(),
            category: section.category.clone(),
            strategy,
            favorability: None,
            note: None,
        }
    }

    /// Whole section, neutral, with an error note.
    fn fallback(section: &ClassifiedSection, strategy: ExtractionStrategy, note: String) -> Self {
        Self {
            favorability: Some(Favorability::Neutral),
            note: Some(note),
            ..Self::whole(section, strategy)
        }
    }
}

/// A per-section external extraction call.
struct Unit {
    section: usize,
    kind: CallKind,
}

/// Content hash of an extraction unit.
pub fn content_key(provision_type: &str, complexity: Complexity, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provision_type.as_bytes());
    hasher.update([0]);
    hasher.update(complexity.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Locate an excerpt in `haystack`, searching from `from` first.
///
/// Tries an exact match, then a whitespace-insensitive one. Returns the
/// byte span of the matching source slice.
pub fn locate(haystack: &str, excerpt: &str, from: usize) -> Option<(usize, usize)> {
    let needle = excerpt.trim();
    if needle.is_empty() {
        return None;
    }
    let from = if haystack.is_char_boundary(from) { from } else { 0 };

    let exact = haystack[from..]
        .find(needle)
        .map(|pos| from + pos)
        .or_else(|| haystack.find(needle));
    if let Some(pos) = exact {
        return Some((pos, pos + needle.len()));
    }

    let pattern = needle
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+");
    let re = Regex::new(&pattern).ok()?;
    re.find_at(haystack, from)
        .or_else(|| re.find(haystack))
        .map(|m| (m.start(), m.end()))
}

pub struct Extractor<'a, C: LlmClient> {
    client: &'a C,
    config: &'a IngestConfig,
    splitter: &'a SplitEngine,
    examples: &'a HashMap<String, Vec<CalibrationExample>>,
}

impl<'a, C: LlmClient> Extractor<'a, C> {
    pub fn new(
        client: &'a C,
        config: &'a IngestConfig,
        splitter: &'a SplitEngine,
        examples: &'a HashMap<String, Vec<CalibrationExample>>,
    ) -> Self {
        Self {
            client,
            config,
            splitter,
            examples,
        }
    }

    /// Turn classified sections into provisions in document order.
    #[tracing::instrument(skip_all, fields(sections = sections.len()))]
    pub async fn extract(&self, sections: &[ClassifiedSection]) -> Extraction {
        let mut calls = ExternalCallCounts::default();
        let mut fallbacks = FallbackCounts::default();
        let mut drafts: Vec<Vec<Draft>> = vec![Vec::new(); sections.len()];
        let mut units = Vec::new();

        for (pos, section) in sections.iter().enumerate() {
            if self.splitter.is_presplit(&section.provision_type) {
                drafts[pos] = self.presplit(section);
                continue;
            }
            match section.complexity {
                Complexity::High => units.push(Unit {
                    section: pos,
                    kind: CallKind::HighExtraction,
                }),
                Complexity::Medium => units.push(Unit {
                    section: pos,
                    kind: CallKind::MediumExtraction,
                }),
                Complexity::Low => drafts[pos].push(Draft::whole(section, ExtractionStrategy::Whole)),
            }
        }

        // Identical content is dispatched once per run
        let mut memo: HashMap<String, usize> = HashMap::new();
        let mut dispatch: Vec<&Unit> = Vec::new();
        let mut unit_slots = Vec::with_capacity(units.len());
        for unit in &units {
            let section = &sections[unit.section];
            let key = content_key(&section.provision_type, section.complexity, &section.section.text);
            let slot = *memo.entry(key).or_insert_with(|| {
                dispatch.push(unit);
                dispatch.len() - 1
            });
            unit_slots.push(slot);
        }
        calls.extraction = dispatch.len();
        calls.memo_hits = units.len() - dispatch.len();

        if !dispatch.is_empty() {
            info!(
                units = units.len(),
                calls = dispatch.len(),
                "Extracting sub-provisions externally"
            );
        }
        let outcomes = run_bounded(dispatch, self.config.concurrency, |unit| {
            self.request_extraction(&sections[unit.section], unit.kind)
        })
        .await;

        for (unit, slot) in units.iter().zip(unit_slots) {
            let section = &sections[unit.section];
            let result = build_drafts(section, unit.kind, &outcomes[slot]);
            if result.iter().any(|d| d.note.is_some()) {
                fallbacks.extraction_whole += 1;
            }
            drafts[unit.section] = result;
        }

        let mut ordered: Vec<(usize, Draft)> = Vec::new();
        for (pos, mut section_drafts) in drafts.into_iter().enumerate() {
            section_drafts.sort_by_key(|d| d.offset);
            ordered.extend(section_drafts.into_iter().map(|d| (pos, d)));
        }

        let (favorability_calls, defaulted) = self.fill_favorability(sections, &mut ordered).await;
        calls.favorability = favorability_calls;
        fallbacks.favorability_neutral = defaulted;

        let provisions = ordered
            .into_iter()
            .enumerate()
            .map(|(sort_order, (pos, draft))| to_provision(&sections[pos], draft, sort_order))
            .collect();

        Extraction {
            provisions,
            calls,
            fallbacks,
        }
    }

    fn presplit(&self, section: &ClassifiedSection) -> Vec<Draft> {
        let Some(pieces) = self
            .splitter
            .split(&section.provision_type, &section.section.text)
        else {
            return vec![Draft::whole(section, ExtractionStrategy::Whole)];
        };

        pieces
            .into_iter()
            .map(|piece| Draft {
                offset: piece.offset,
                len: piece.text.len(),
                category: piece.label,
                strategy: ExtractionStrategy::Deterministic,
                favorability: None,
                note: None,
            })
            .collect()
    }

    async fn request_extraction(
        &self,
        section: &ClassifiedSection,
        kind: CallKind,
    ) -> Result<Vec<ExtractedExcerpt>> {
        let examples = self
            .examples
            .get(&section.provision_type)
            .map_or(&[][..], Vec::as_slice);
        let request = build_extraction_request(
            kind,
            &section.provision_type,
            &section.category,
            &section.section.text,
            examples,
            self.config,
        );
        let response = self.client.complete(&request).await?;
        decode_array(kind, &response.content)
    }

    /// Fill missing favorability in batches. Returns (calls, defaulted).
    async fn fill_favorability(
        &self,
        sections: &[ClassifiedSection],
        drafts: &mut [(usize, Draft)],
    ) -> (usize, usize) {
        let pending: Vec<FavorabilityItem> = drafts
            .iter()
            .enumerate()
            .filter(|(_, (_, d))| d.favorability.is_none())
            .map(|(i, (pos, d))| {
                let section = &sections[*pos];
                let text = &section.section.text[d.offset..d.offset + d.len];
                FavorabilityItem::new(i, &section.provision_type, &d.category, text)
            })
            .collect();
        if pending.is_empty() {
            return (0, 0);
        }

        let batches: Vec<Vec<FavorabilityItem>> = pending
            .chunks(self.config.favorability_batch_size.max(1))
            .map(<[FavorabilityItem]>::to_vec)
            .collect();
        let calls = batches.len();

        let answers = run_bounded(batches, self.config.concurrency, |batch| async move {
            let result = self.request_favorability(&batch).await;
            (batch, result)
        })
        .await;

        let mut defaulted = 0;
        for (batch, result) in answers {
            let mut by_index: HashMap<usize, Favorability> = match result {
                Ok(entries) => entries.into_iter().map(|e| (e.index, e.favorability)).collect(),
                Err(e) => {
                    warn!(error = %e, batch_size = batch.len(), "favorability batch failed, defaulting to neutral");
                    HashMap::new()
                }
            };
            for item in batch {
                let favorability = by_index.remove(&item.index).unwrap_or_else(|| {
                    defaulted += 1;
                    Favorability::Neutral
                });
                if let Some((_, draft)) = drafts.get_mut(item.index) {
                    draft.favorability = Some(favorability);
                }
            }
        }

        (calls, defaulted)
    }

    async fn request_favorability(
        &self,
        items: &[FavorabilityItem],
    ) -> Result<Vec<FavorabilityEntry>> {
        let request = build_favorability_request(items, self.config)?;
        let response = self.client.complete(&request).await?;
        decode_array(CallKind::Favorability, &response.content)
    }
}

/// Drafts from an extraction outcome, or the whole-section fallback.
fn build_drafts(
    section: &ClassifiedSection,
    kind: CallKind,
    outcome: &std::result::Result<Vec<ExtractedExcerpt>, PipelineError>,
) -> Vec<Draft> {
    let strategy = match kind {
        CallKind::HighExtraction => ExtractionStrategy::Semantic,
        _ => ExtractionStrategy::Exhaustive,
    };
    let fallback = |note: String| {
        warn!(
            provision_type = %section.provision_type,
            start = section.section.start,
            note = %note,
            "Extraction fell back to whole section"
        );
        vec![Draft::fallback(section, strategy, note)]
    };

    let excerpts = match outcome {
        Ok(excerpts) => excerpts,
        Err(e) => return fallback(format!("extraction failed: {e}")),
    };
    if excerpts.is_empty() {
        return fallback("extraction returned no provisions".into());
    }
    if kind == CallKind::HighExtraction
        && excerpts
            .iter()
            .any(|e| e.text.trim().chars().count() < MIN_EXCERPT_CHARS)
    {
        return fallback(format!(
            "extraction returned an excerpt shorter than {MIN_EXCERPT_CHARS} characters"
        ));
    }

    let text = &section.section.text;
    let mut cursor = 0;
    let mut drafts = Vec::with_capacity(excerpts.len());
    for excerpt in excerpts {
        let Some((start, end)) = locate(text, &excerpt.text, cursor) else {
            debug!(category = %excerpt.category, "excerpt not found verbatim, dropping");
            continue;
        };
        cursor = end;
        let category = match excerpt.category.trim() {
            "" => section.category.clone(),
            label => label.to_string(),
        };
        drafts.push(Draft {
            offset: start,
            len: end - start,
            category,
            strategy,
            favorability: Some(excerpt.favorability),
            note: None,
        });
    }

    if drafts.is_empty() {
        return fallback("no excerpt could be located in the section".into());
    }
    drafts
}

fn to_provision(section: &ClassifiedSection, draft: Draft, sort_order: usize) -> Provision {
    let text = &section.section.text[draft.offset..draft.offset + draft.len];
    Provision {
        provision_type: section.provision_type.clone(),
        category: draft.category,
        text: text.to_string(),
        favorability: draft.favorability.unwrap_or_default(),
        display_tier: section.display_tier,
        sort_order,
        start: section.section.start + draft.offset,
        strategy: draft.strategy,
        note: draft.note,
    }
}
