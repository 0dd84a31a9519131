//! End-to-end pipeline tests against a mocked service.
//!
//! Concurrent calls arrive in no fixed order, so the mock answers each
//! request by its call kind and content.

use std::sync::Arc;

use async_trait::async_trait;
use clausebank_parser::taxonomy::{COB, DEF, GOV, MAE, OTHER, TFEE};
use clausebank_pipeline::llm::test_support::MockLlmClient;
use clausebank_pipeline::{
    CalibrationExample, CallKind, ExtractionStrategy, Favorability, IngestConfig,
    IngestOutput, LlmRequest, Pipeline, PipelineError, PostIngestHook, Result, StaticCatalog,
};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

const THREE_SECTIONS: &str = "Section 1.1 Definitions.
\"Affiliate\" means, with respect to any Person, any other Person that controls such Person.
\"Business Day\" means any day other than a Saturday, Sunday or a day on which banks in New York are closed.

Section 2.1 Conduct of Business.
(a) The Company shall conduct its business in the ordinary course consistent with past practice.
(b) The Company shall not amend its certificate of incorporation or bylaws.

Section 9.1 Governing Law. This Agreement shall be governed by the laws of the State of Delaware.
";

const AMBIGUOUS: &str = "Section 1.1 Takeover Statutes. If any takeover statute becomes applicable to the Merger, the parties shall act.
Section 1.2 Stock Exchange Delisting. Parent shall cause the Shares to be delisted from the exchange.
Section 1.3 Transfer Taxes. All transfer taxes incurred in connection with the Merger shall be paid by Parent.
";

const WITH_MAE: &str = "Section 1.1 Material Adverse Effect. \"Company Material Adverse Effect\" shall mean any event, change or effect that is materially adverse to the business of the Company, other than changes in general economic conditions.
Section 1.2 Notices. All notices shall be in writing and delivered to the addresses set forth below.
Section 1.3 Counterparts. This Agreement may be executed in counterparts, each of which is an original.
";

/// Answer a favorability request for every index it carries.
fn favorability_answer(request: &LlmRequest, label: &str) -> String {
    let content = request.user_content();
    let start = content.find('[').unwrap();
    let end = content.rfind(']').unwrap();
    let items: Vec<serde_json::Value> = serde_json::from_str(&content[start..=end]).unwrap();
    let answers: Vec<serde_json::Value> = items
        .iter()
        .map(|item| serde_json::json!({"index": item["index"], "favorability": label}))
        .collect();
    serde_json::to_string(&answers).unwrap()
}

fn pipeline(client: MockLlmClient) -> Pipeline<MockLlmClient, StaticCatalog> {
    Pipeline::new(client, StaticCatalog::empty(), IngestConfig::default())
}

fn types(output: &IngestOutput) -> Vec<&str> {
    output
        .provisions
        .iter()
        .map(|p| p.provision_type.as_str())
        .collect()
}

fn assert_verbatim(output: &IngestOutput, source: &str) {
    for provision in &output.provisions {
        let slice = &source[provision.start..provision.start + provision.text.len()];
        assert_eq!(provision.text, slice);
    }
}

#[tokio::test]
async fn test_three_section_agreement() {
    let client = MockLlmClient::with_router(|req| match req.kind {
        CallKind::Favorability => Ok(favorability_answer(req, "neutral")),
        other => panic!("unexpected call: {other:?}"),
    });
    let pipeline = pipeline(client);

    let output = pipeline.run(THREE_SECTIONS, &[]).await.unwrap();

    assert_eq!(types(&output), vec![DEF, DEF, COB, COB, GOV]);
    let categories: Vec<&str> = output.provisions.iter().map(|p| p.category.as_str()).collect();
    assert_eq!(categories[..2], ["Affiliate", "Business Day"]);
    assert!(output.provisions[2].text.starts_with("(a) The Company shall conduct"));
    assert!(output.provisions[4].text.starts_with("Section 9.1 Governing Law."));
    assert_eq!(output.provisions[4].strategy, ExtractionStrategy::Whole);

    let d = &output.diagnostics;
    assert_eq!(d.section_count, 3);
    assert!(d.gaps_found.is_empty());
    assert!(d.remaining_gaps.is_empty());
    assert!(d.completeness_warnings.is_empty());
    assert_eq!(d.classification.rule, 3);
    assert_eq!(d.external_calls.classification, 0);
    assert_eq!(d.external_calls.extraction, 0);
    assert_eq!(d.external_calls.favorability, 1);
    assert_eq!(d.provision_count, 5);

    for (i, provision) in output.provisions.iter().enumerate() {
        assert_eq!(provision.sort_order, i);
    }

    // Offsets refer to the normalized text, which only lost the trailing newline here
    assert_verbatim(&output, THREE_SECTIONS.trim_end());
}

#[tokio::test]
async fn test_completeness_warning_for_unmet_entry() {
    let client = MockLlmClient::with_router(|req| Ok(favorability_answer(req, "neutral")));
    let source = format!(
        "{THREE_SECTIONS}\nSection 9.2 Expenses. Except for the termination fee, each party shall pay its own expenses.\n"
    );

    let output = pipeline(client).run(&source, &[]).await.unwrap();

    let warnings = &output.diagnostics.completeness_warnings;
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].provision_type, TFEE);
    assert_eq!(warnings[0].expected, 1);
    assert_eq!(warnings[0].found, 0);
}

#[tokio::test]
async fn test_failed_classification_goes_to_overflow() {
    let client = MockLlmClient::with_router(|req| match req.kind {
        CallKind::Classification => Ok("I'm sorry, I can only answer in prose.".into()),
        CallKind::Favorability => Ok(favorability_answer(req, "balanced")),
        other => panic!("unexpected call: {other:?}"),
    });

    let output = pipeline(client).run(AMBIGUOUS, &[]).await.unwrap();

    assert_eq!(types(&output), vec![OTHER, OTHER, OTHER]);
    assert!(output
        .provisions
        .iter()
        .all(|p| p.display_tier == 3 && p.favorability == Favorability::Balanced));

    let d = &output.diagnostics;
    assert_eq!(d.classification.overflow, 3);
    assert_eq!(d.fallbacks.classification_overflow, 3);
    assert_eq!(d.external_calls.classification, 1);
    assert_verbatim(&output, AMBIGUOUS.trim_end());
}

#[tokio::test]
async fn test_learned_rules_and_catalog_are_used() {
    let client = MockLlmClient::with_router(|req| match req.kind {
        CallKind::Classification => {
            assert!(req.user_content().contains("Transfer taxes are MISC"));
            assert!(!req.user_content().contains("Stock Exchange Delisting"));
            Ok(r#"[{"index": 0, "provisionType": "EFF", "category": "Takeover Statutes", "displayTier": 2, "complexity": "low"},
                   {"index": 2, "provisionType": "MISC", "category": "Transfer Taxes", "displayTier": 3, "complexity": "low"}]"#
                .into())
        }
        CallKind::Favorability => Ok(favorability_answer(req, "neutral")),
        other => panic!("unexpected call: {other:?}"),
    });
    let catalog = StaticCatalog::from_json(
        r#"{"categories": [{"provisionType": "DELIST", "category": "Stock Exchange Delisting", "displayTier": 3}]}"#,
    )
    .unwrap();
    let pipeline = Pipeline::new(client, catalog, IngestConfig::default());

    let output = pipeline
        .run(AMBIGUOUS, &["Transfer taxes are MISC".to_string()])
        .await
        .unwrap();

    assert_eq!(types(&output), vec!["EFF", "DELIST", "MISC"]);
    let d = &output.diagnostics;
    assert_eq!(d.classification.external, 2);
    assert_eq!(d.classification.catalog, 1);
}

#[tokio::test]
async fn test_failed_extraction_keeps_whole_section() {
    let client = MockLlmClient::with_router(|req| match req.kind {
        CallKind::HighExtraction => Err(PipelineError::LlmApiError {
            status: 503,
            message: "overloaded".into(),
        }),
        CallKind::Favorability => Ok(favorability_answer(req, "neutral")),
        other => panic!("unexpected call: {other:?}"),
    });

    let output = pipeline(client).run(WITH_MAE, &[]).await.unwrap();

    assert_eq!(output.provisions.len(), 3);
    let mae = &output.provisions[0];
    assert_eq!(mae.provision_type, MAE);
    assert!(mae.text.starts_with("Section 1.1 Material Adverse Effect."));
    assert!(mae.text.ends_with("general economic conditions."));
    assert_eq!(mae.favorability, Favorability::Neutral);
    assert!(mae.note.as_deref().unwrap().contains("overloaded"));
    assert_eq!(output.diagnostics.fallbacks.extraction_whole, 1);

    // "shall mean" inside the MAE section implies definitions that were never split out
    let warned: Vec<&str> = output
        .diagnostics
        .completeness_warnings
        .iter()
        .map(|w| w.provision_type.as_str())
        .collect();
    assert_eq!(warned, vec![DEF]);
}

#[tokio::test]
async fn test_high_extraction_with_calibration_examples() {
    let client = MockLlmClient::with_router(|req| match req.kind {
        CallKind::HighExtraction => {
            assert!(req.user_content().contains("changes in interest rates"));
            Ok(r#"```json
[
  {"category": "Definition", "text": "\"Company Material Adverse Effect\" shall mean any event, change or effect that is materially adverse to the business of the Company", "favorability": "neutral"},
  {"category": "Carve-outs", "text": "other than changes in general economic conditions", "favorability": "seller-favorable"}
]
```"#
                .into())
        }
        CallKind::Favorability => Ok(favorability_answer(req, "neutral")),
        other => panic!("unexpected call: {other:?}"),
    });
    let catalog = StaticCatalog {
        categories: Vec::new(),
        examples: vec![CalibrationExample {
            provision_type: MAE.into(),
            category: "Carve-outs".into(),
            favorability: Favorability::SellerFavorable,
            text: "changes in interest rates".into(),
        }],
    };
    let pipeline = Pipeline::new(client, catalog, IngestConfig::default());

    let output = pipeline.run(WITH_MAE, &[]).await.unwrap();

    let mae: Vec<_> = output
        .provisions
        .iter()
        .filter(|p| p.provision_type == MAE)
        .collect();
    assert_eq!(mae.len(), 2);
    assert_eq!(mae[1].category, "Carve-outs");
    assert_eq!(mae[1].favorability, Favorability::SellerFavorable);
    assert!(mae.iter().all(|p| p.strategy == ExtractionStrategy::Semantic));
    assert_verbatim(&output, WITH_MAE.trim_end());
}

#[tokio::test]
async fn test_empty_source_rejected() {
    let client = MockLlmClient::with_responses(vec![]);
    let err = pipeline(client).run(" \n\t ", &[]).await.unwrap_err();
    assert!(matches!(err, PipelineError::EmptySource));
}

struct ChannelHook {
    tx: mpsc::UnboundedSender<usize>,
}

#[async_trait]
impl PostIngestHook for ChannelHook {
    fn name(&self) -> &str {
        "channel"
    }

    async fn after_ingest(&self, output: &IngestOutput) -> Result<()> {
        self.tx
            .send(output.provisions.len())
            .map_err(|e| PipelineError::Config(e.to_string()))
    }
}

struct FailingHook;

#[async_trait]
impl PostIngestHook for FailingHook {
    fn name(&self) -> &str {
        "failing"
    }

    async fn after_ingest(&self, _output: &IngestOutput) -> Result<()> {
        Err(PipelineError::Config("downstream unavailable".into()))
    }
}

#[tokio::test]
async fn test_post_ingest_hook_runs_after_output() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = MockLlmClient::with_router(|req| Ok(favorability_answer(req, "neutral")));
    let pipeline = pipeline(client).with_hook(Arc::new(ChannelHook { tx }));

    let output = pipeline.run(THREE_SECTIONS, &[]).await.unwrap();

    assert_eq!(rx.recv().await, Some(output.provisions.len()));
}

#[tokio::test]
async fn test_failing_hook_does_not_affect_result() {
    let client = MockLlmClient::with_router(|req| Ok(favorability_answer(req, "neutral")));
    let pipeline = pipeline(client).with_hook(Arc::new(FailingHook));

    let output = pipeline.run(THREE_SECTIONS, &[]).await.unwrap();
    assert_eq!(output.provisions.len(), 5);
    assert_eq!(output.diagnostics.classification.rule, 3);
    assert!(output
        .provisions
        .iter()
        .all(|p| p.favorability == Favorability::Neutral));
    assert_eq!(pipeline.client().calls_of(CallKind::Favorability), 1);
}

#[tokio::test]
async fn test_catalog_loaded_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");
    std::fs::write(
        &path,
        r#"{"categories": [{"provisionType": "TAX", "category": "Transfer Taxes", "displayTier": 3}]}"#,
    )
    .unwrap();
    let catalog = StaticCatalog::from_path(&path).unwrap();

    let client = MockLlmClient::with_router(|req| match req.kind {
        CallKind::Classification => Ok("[]".into()),
        _ => Ok(favorability_answer(req, "neutral")),
    });
    let output = Pipeline::new(client, catalog, IngestConfig::default())
        .run(AMBIGUOUS, &[])
        .await
        .unwrap();

    assert_eq!(types(&output), vec![OTHER, OTHER, "TAX"]);
    assert_eq!(output.diagnostics.classification.catalog, 1);
    assert_eq!(output.diagnostics.classification.overflow, 2);
}

#[tokio::test]
async fn test_missing_catalog_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = StaticCatalog::from_path(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
}
