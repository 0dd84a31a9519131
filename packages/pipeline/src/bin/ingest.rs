use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use clausebank_pipeline::{
    AnthropicClient, IngestConfig, LlmConfig, Pipeline, PipelineError, Result, StaticCatalog,
};

/// Ingest a merger agreement into typed provisions.
#[derive(Parser, Debug)]
#[command(name = "clausebank-ingest")]
#[command(version, about)]
struct Args {
    /// Plain-text agreement to ingest
    file: PathBuf,

    /// JSON catalog of historical categories and calibration examples
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Learned classification rules, one per line
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Write JSON output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Concurrent external calls (overrides INGEST_CONCURRENCY)
    #[arg(long)]
    concurrency: Option<usize>,
}

async fn run(args: Args) -> Result<()> {
    let llm = LlmConfig::from_env()?;
    let mut config = IngestConfig::from_env().with_llm(&llm);
    if let Some(concurrency) = args.concurrency {
        config = config.with_concurrency(concurrency);
    }

    let catalog = match &args.catalog {
        Some(path) => StaticCatalog::from_path(path)?,
        None => StaticCatalog::empty(),
    };

    let rules: Vec<String> = match &args.rules {
        Some(path) => tokio::fs::read_to_string(path)
            .await?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        None => Vec::new(),
    };

    let source = tokio::fs::read_to_string(&args.file).await?;
    let client = AnthropicClient::new(&llm)?;
    let pipeline = Pipeline::new(client, catalog, config);

    let output = pipeline.run(&source, &rules).await?;
    let json = serde_json::to_string_pretty(&output)?;

    match &args.output {
        Some(path) => {
            tokio::fs::write(path, json).await?;
            tracing::info!(path = %path.display(), "wrote ingestion output");
        }
        None => println!("{json}"),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        if matches!(e, PipelineError::Config(_)) {
            tracing::error!(error = %e, "failed to load configuration");
        } else {
            tracing::error!(error = %e, "ingestion failed");
        }
        std::process::exit(1);
    }
}
