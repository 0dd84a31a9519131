//! Clausebank parser - deterministic structure parsing for merger agreements.
//!
//! This crate turns plain agreement text into ordered, position-accurate
//! sections and provides the deterministic building blocks of provision
//! ingestion. Nothing here performs I/O beyond the CLI.
//!
//! # Example
//!
//! ```
//! use clausebank_parser::normalize::normalize;
//! use clausebank_parser::structure::StructureParser;
//!
//! let text = normalize("Section 1.1 Definitions. Capitalized terms have the meanings below.\n\
//!                       Section 1.2 Interpretation. Headings do not affect interpretation.\n\
//!                       Section 1.3 Construction. No rule of strict construction applies.");
//! let parsed = StructureParser::new().parse(&text);
//! assert_eq!(parsed.sections.len(), 3);
//! ```
//!
//! # Architecture
//!
//! - [`config`]: Tuning constants and input validation
//! - [`types`]: Core data types (Section, Gap, TocComparison, etc.)
//! - [`error`]: Error types and Result alias
//! - [`normalize`]: Filing artifact removal
//! - [`structure`]: TOC detection, heading disambiguation, section spans
//! - [`gaps`]: Numbering gap detection and recovery
//! - [`splitting`]: Deterministic sub-clause splitting
//! - [`dedup`]: Near-duplicate removal
//! - [`completeness`]: Checklist verification
//! - [`taxonomy`]: Provision type codes
//! - [`document`]: Normalize, parse and recover in one call
//! - [`cli`]: Command-line interface

pub mod cli;
pub mod completeness;
pub mod config;
pub mod dedup;
pub mod document;
pub mod error;
pub mod gaps;
pub mod normalize;
pub mod splitting;
pub mod structure;
pub mod taxonomy;
pub mod types;

// Re-export main functions
pub use document::{parse_document, ParsedDocument};

// Re-export commonly used items
pub use config::validate_source;
pub use error::{ParserError, Result};
pub use types::{DelimiterPattern, Gap, Section, SectionLevel, SectionNumber, TocComparison, TypedText};
