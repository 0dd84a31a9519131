//! Types for deterministic sub-clause splitting.

use serde::{Deserialize, Serialize};

/// How a provision type's sections are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    /// One piece per quoted defined term.
    Definitions,

    /// One piece per `(a)`, `(b)`, ... sub-clause.
    LetteredClauses,
}

impl SplitMethod {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Definitions => "definitions",
            Self::LetteredClauses => "lettered_clauses",
        }
    }
}

/// Declarative split rule for one provision type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitSpec {
    pub provision_type: String,

    pub method: SplitMethod,

    /// Fewer markers than this keeps the section whole.
    pub min_markers: usize,
}

impl SplitSpec {
    /// Create a spec with the method's default marker minimum.
    #[must_use]
    pub fn new(provision_type: impl Into<String>, method: SplitMethod) -> Self {
        let min_markers = match method {
            SplitMethod::Definitions => 1,
            SplitMethod::LetteredClauses => 2,
        };
        Self {
            provision_type: provision_type.into(),
            method,
            min_markers,
        }
    }

    #[must_use]
    pub fn with_min_markers(mut self, min_markers: usize) -> Self {
        self.min_markers = min_markers;
        self
    }
}

/// An item boundary found by a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Byte offset into the section text where the item starts.
    pub offset: usize,

    /// Defined term, for definition markers.
    pub term: Option<String>,
}

/// What a split piece is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClauseKind {
    /// Lead-in text before the first marker.
    Preamble,
    Definition,
    Clause,
}

/// A contiguous piece of a section's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubClause {
    pub kind: ClauseKind,

    /// Category label (defined term, derived clause label, or heading title).
    pub label: String,

    /// Verbatim text, equal to `section_text[offset..offset + text.len()]`.
    pub text: String,

    pub offset: usize,
}
