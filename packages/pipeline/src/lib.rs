//! Ingestion pipeline for merger agreements.
//!
//! Builds on `clausebank-parser` for the deterministic front half
//! (normalization, structure, gaps) and adds the parts that talk to the
//! external classification/extraction service: category resolution, tiered
//! sub-provision extraction, favorability, plus deduplication and the
//! completeness check on the final provision set.
//!
//! # Example
//!
//! ```no_run
//! use clausebank_pipeline::{AnthropicClient, IngestConfig, LlmConfig, Pipeline, StaticCatalog};
//!
//! # async fn example() -> clausebank_pipeline::Result<()> {
//! let llm = LlmConfig::from_env()?;
//! let client = AnthropicClient::new(&llm)?;
//! let pipeline = Pipeline::new(client, StaticCatalog::empty(), IngestConfig::from_env().with_llm(&llm));
//!
//! let output = pipeline.run("Section 1.1 Definitions. ...", &[]).await?;
//! println!("{} provisions", output.provisions.len());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod classify;
pub mod config;
pub mod decode;
pub mod error;
pub mod extract;
pub mod hook;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod prompt;

pub use catalog::{CalibrationExample, CatalogEntry, CatalogSource, StaticCatalog};
pub use config::{IngestConfig, LlmConfig};
pub use error::{PipelineError, Result};
pub use hook::PostIngestHook;
pub use llm::{AnthropicClient, CallKind, LlmClient, LlmRequest, LlmResponse};
pub use models::{
    ClassifiedBy, ClassifiedSection, Complexity, Diagnostics, ExtractionStrategy, Favorability,
    IngestOutput, Provision,
};
pub use pipeline::Pipeline;
pub use pool::run_bounded;
