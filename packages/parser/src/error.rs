//! Error types for the parser.
//!
//! Parsing itself never fails: structural ambiguity is resolved by fallbacks.
//! Errors only arise at the edges (missing input, IO, serialization).

use thiserror::Error;

/// Main error type for the parser library.
#[derive(Debug, Error)]
pub enum ParserError {
    /// Source text was empty or whitespace only.
    #[error("Source text is empty")]
    EmptyInput,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;
