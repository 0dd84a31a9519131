use clausebank_parser::ParserError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source text is empty")]
    EmptySource,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("LLM API request failed: {0}")]
    LlmApiRequest(#[from] reqwest::Error),

    #[error("LLM API error (status {status}): {message}")]
    LlmApiError { status: u16, message: String },

    #[error("LLM rate limited, retry after {retry_after_secs}s")]
    LlmRateLimited { retry_after_secs: u64 },

    #[error("failed to parse LLM response: {0}")]
    LlmResponseParse(String),

    #[error("LLM returned empty response")]
    LlmEmptyResponse,

    #[error("failed to decode {call} response: {message}")]
    ResponseDecode { call: &'static str, message: String },

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Map the parser's empty-input rejection onto the pipeline's own variant.
    pub fn from_parser(err: ParserError) -> Self {
        match err {
            ParserError::EmptyInput => Self::EmptySource,
            other => Self::Parser(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_maps_to_empty_source() {
        let err = PipelineError::from_parser(ParserError::EmptyInput);
        assert!(matches!(err, PipelineError::EmptySource));
        assert_eq!(err.to_string(), "source text is empty");
    }

    #[test]
    fn test_decode_error_display() {
        let err = PipelineError::ResponseDecode {
            call: "classification",
            message: "no JSON array found".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to decode classification response: no JSON array found"
        );
    }
}
