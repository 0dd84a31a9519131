//! Command-line interface for offline structure inspection.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::document::{parse_document, ParsedDocument};
use crate::error::Result;

const WRAP_WIDTH: usize = 78;

/// Clausebank parser - inspect the structure of a merger agreement.
#[derive(Parser)]
#[command(name = "clausebank-parser")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Normalize and parse an agreement, then report sections, gaps and TOC.
    Parse {
        /// Plain-text agreement file
        file: PathBuf,

        /// Print the parse result as JSON
        #[arg(long)]
        json: bool,

        /// Write the JSON result to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Run the CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { file, json, output } => parse_command(&file, json, output.as_deref()),
    }
}

fn parse_command(file: &Path, json: bool, output: Option<&Path>) -> Result<()> {
    let raw = std::fs::read_to_string(file)?;

    if json || output.is_some() {
        let doc = parse_document(&raw)?;
        let rendered = serde_json::to_string_pretty(&doc)?;
        match output {
            Some(path) => std::fs::write(path, rendered)?,
            None => println!("{rendered}"),
        }
        return Ok(());
    }

    println!("{} {}", style("Parsing").bold(), style(file.display()).cyan());
    println!();

    let pb = ProgressBar::new_spinner();
    #[allow(clippy::expect_used)] // Static template string that is guaranteed to be valid
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    pb.set_message("Normalizing and parsing...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let doc = match parse_document(&raw) {
        Ok(doc) => doc,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e);
        }
    };
    pb.finish_and_clear();

    print_report(&doc);
    Ok(())
}

fn print_report(doc: &ParsedDocument) {
    println!("  Pattern: {}", style(doc.pattern.as_str()).green());
    println!("  Body start: {}", doc.body_start);
    println!("  Coverage: {:.1}%", doc.coverage_pct);
    println!("  Sections: {}", doc.sections.len());
    println!();

    for section in &doc.sections {
        let label = section
            .number
            .map_or_else(|| section.level.as_str().to_string(), |n| n.label());
        let heading = textwrap::fill(
            &section.heading,
            textwrap::Options::new(WRAP_WIDTH).subsequent_indent("          "),
        );
        println!("  {:>7} {}", style(label).cyan(), heading);
    }
    println!();

    if doc.toc.found {
        println!(
            "  TOC: {} entries, {} matched",
            doc.toc.total_entries, doc.toc.matched
        );
        if !doc.toc.missing.is_empty() {
            println!(
                "  {} {}",
                style("Missing from body:").yellow(),
                textwrap::fill(&doc.toc.missing.join(", "), WRAP_WIDTH)
            );
        }
        if !doc.toc.extra.is_empty() {
            println!(
                "  {} {}",
                style("Not in TOC:").yellow(),
                textwrap::fill(&doc.toc.extra.join(", "), WRAP_WIDTH)
            );
        }
    } else {
        println!("  TOC: {}", style("not found").dim());
    }

    if !doc.gaps_found.is_empty() {
        println!(
            "  Gaps: {} found, {} recovered",
            doc.gaps_found.len(),
            style(doc.recovered).green()
        );
    }
    if !doc.remaining_gaps.is_empty() {
        let labels: Vec<&str> = doc.remaining_gaps.iter().map(|g| g.label.as_str()).collect();
        println!(
            "  {} {}",
            style("Remaining gaps:").yellow().bold(),
            labels.join(", ")
        );
    }
}
