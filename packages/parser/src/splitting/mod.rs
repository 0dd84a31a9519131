//! Deterministic sub-clause splitting for merger-agreement sections.
//!
//! Definition sections split at quoted defined terms; list-shaped sections
//! split at lettered `(a)`, `(b)`, ... markers. Every piece is a contiguous
//! slice of the section text.

mod config;
mod engine;
mod registry;
mod strategy;
mod types;

pub use config::create_presplit_registry;
pub use engine::SplitEngine;
pub use registry::SplitRegistry;
pub use strategy::{DefinitionSplitStrategy, LetteredClauseSplitStrategy, SplitStrategy};
pub use types::{ClauseKind, Marker, SplitMethod, SplitSpec, SubClause};
