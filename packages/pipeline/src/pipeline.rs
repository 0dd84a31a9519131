//! End-to-end ingestion run.
//!
//! Phases run strictly in sequence: normalize, parse, gaps, classify,
//! extract, dedup, verify. Only the classify and extract phases talk to the
//! external service, each through the bounded pool.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use clausebank_parser::completeness::{default_checklist, verify, CompletenessCheck};
use clausebank_parser::dedup::dedup;
use clausebank_parser::gaps::{detect_gaps, recover_gaps};
use clausebank_parser::normalize::normalize;
use clausebank_parser::splitting::{create_presplit_registry, SplitEngine};
use clausebank_parser::structure::{compare_toc, StructureParser};
use clausebank_parser::validate_source;
use tracing::info;
use uuid::Uuid;

use crate::catalog::{load_categories, load_examples, CatalogSource};
use crate::classify::CategoryResolver;
use crate::config::IngestConfig;
use crate::error::{PipelineError, Result};
use crate::extract::Extractor;
use crate::hook::{dispatch, PostIngestHook};
use crate::llm::LlmClient;
use crate::models::{
    Complexity, Diagnostics, ExternalCallCounts, FallbackCounts, IngestOutput, PhaseTimings,
};

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

pub struct Pipeline<C: LlmClient, S: CatalogSource> {
    client: C,
    catalog: S,
    config: IngestConfig,
    splitter: SplitEngine,
    checklist: Vec<CompletenessCheck>,
    hook: Option<Arc<dyn PostIngestHook>>,
}

impl<C: LlmClient, S: CatalogSource> Pipeline<C, S> {
    pub fn new(client: C, catalog: S, config: IngestConfig) -> Self {
        Self {
            client,
            catalog,
            config,
            splitter: SplitEngine::new(create_presplit_registry()),
            checklist: default_checklist(),
            hook: None,
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn PostIngestHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_checklist(mut self, checklist: Vec<CompletenessCheck>) -> Self {
        self.checklist = checklist;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Ingest one agreement.
    ///
    /// Fails only on empty source text; every later problem is absorbed by a
    /// per-unit fallback and reported in the diagnostics.
    #[tracing::instrument(skip_all, fields(source_len = raw.len(), rules = learned_rules.len()))]
    pub async fn run(&self, raw: &str, learned_rules: &[String]) -> Result<IngestOutput> {
        validate_source(raw).map_err(PipelineError::from_parser)?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let run_start = Instant::now();
        let mut timings = PhaseTimings::default();

        let t = Instant::now();
        let normalized = normalize(raw);
        validate_source(&normalized).map_err(PipelineError::from_parser)?;
        timings.normalize_ms = elapsed_ms(t);

        let t = Instant::now();
        let parsed = StructureParser::new().parse(&normalized);
        timings.parse_ms = elapsed_ms(t);

        let t = Instant::now();
        let gaps_found = detect_gaps(&parsed.sections);
        let recovery = recover_gaps(&normalized, parsed.body_start, parsed.sections, &gaps_found);
        let toc = compare_toc(&parsed.detection, &recovery.sections);
        timings.gaps_ms = elapsed_ms(t);

        let section_count = recovery.sections.len();
        info!(
            %run_id,
            sections = section_count,
            pattern = parsed.pattern.as_str(),
            recovered = recovery.recovered,
            "Parsed agreement"
        );

        let t = Instant::now();
        let categories = load_categories(&self.catalog).await;
        let resolution = CategoryResolver::new(
            &self.client,
            &self.config,
            &self.splitter,
            &categories,
            learned_rules,
        )
        .resolve(recovery.sections)
        .await;
        timings.classify_ms = elapsed_ms(t);

        let t = Instant::now();
        let mut high_types: Vec<String> = resolution
            .sections
            .iter()
            .filter(|s| {
                s.complexity == Complexity::High && !self.splitter.is_presplit(&s.provision_type)
            })
            .map(|s| s.provision_type.clone())
            .collect();
        high_types.sort();
        high_types.dedup();
        let examples = load_examples(&self.catalog, &high_types).await;
        let extraction = Extractor::new(&self.client, &self.config, &self.splitter, &examples)
            .extract(&resolution.sections)
            .await;
        timings.extract_ms = elapsed_ms(t);

        let t = Instant::now();
        let deduplicated = dedup(extraction.provisions);
        let mut provisions = deduplicated.items;
        for (sort_order, provision) in provisions.iter_mut().enumerate() {
            provision.sort_order = sort_order;
        }
        timings.dedup_ms = elapsed_ms(t);

        let t = Instant::now();
        let completeness_warnings = verify(&provisions, &normalized, &self.checklist);
        timings.verify_ms = elapsed_ms(t);
        timings.total_ms = elapsed_ms(run_start);

        let diagnostics = Diagnostics {
            run_id,
            started_at,
            timings,
            coverage_pct: parsed.coverage_pct,
            pattern: parsed.pattern,
            body_start: parsed.body_start,
            section_count,
            recovered_sections: recovery.recovered,
            provision_count: provisions.len(),
            duplicates_removed: deduplicated.removed,
            gaps_found,
            remaining_gaps: recovery.remaining_gaps,
            toc,
            classification: resolution.counts,
            external_calls: ExternalCallCounts {
                classification: resolution.external_calls,
                ..extraction.calls
            },
            fallbacks: FallbackCounts {
                classification_overflow: resolution.counts.overflow,
                ..extraction.fallbacks
            },
            completeness_warnings,
        };

        info!(
            %run_id,
            provisions = diagnostics.provision_count,
            duplicates = diagnostics.duplicates_removed,
            warnings = diagnostics.completeness_warnings.len(),
            total_ms = timings.total_ms,
            "Ingestion complete"
        );

        let output = IngestOutput {
            provisions,
            diagnostics,
        };

        if let Some(hook) = &self.hook {
            dispatch(Arc::clone(hook), output.clone());
        }

        Ok(output)
    }
}
