use crate::error::{PipelineError, Result};

const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

/// Configuration for the external classification/extraction service.
#[derive(Clone)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: String,
    pub temperature: f64,
    pub api_base_url: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

// Manual impl keeps the API key out of logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .field("api_base_url", &self.api_base_url)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| PipelineError::Config("LLM_API_KEY not set".into()))?;

        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let temperature = std::env::var("LLM_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0);

        let api_base_url =
            std::env::var("LLM_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.into());

        let max_tokens = std::env::var("LLM_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8192);

        let timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);

        Ok(Self {
            model,
            api_key,
            temperature,
            api_base_url,
            max_tokens,
            timeout_secs,
        })
    }

    /// Create a config builder for testing.
    pub fn builder(api_key: impl Into<String>) -> LlmConfigBuilder {
        LlmConfigBuilder {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            temperature: 0.0,
            api_base_url: DEFAULT_API_BASE_URL.into(),
            max_tokens: 8192,
            timeout_secs: 120,
        }
    }
}

/// Builder for constructing `LlmConfig` in tests.
pub struct LlmConfigBuilder {
    api_key: String,
    model: String,
    temperature: f64,
    api_base_url: String,
    max_tokens: u32,
    timeout_secs: u64,
}

impl LlmConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn build(self) -> LlmConfig {
        LlmConfig {
            model: self.model,
            api_key: self.api_key,
            temperature: self.temperature,
            api_base_url: self.api_base_url,
            max_tokens: self.max_tokens,
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Tuning knobs for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Concurrent external calls.
    pub concurrency: usize,

    /// Sections per classification request.
    pub classify_batch_size: usize,

    /// Sections per favorability request.
    pub favorability_batch_size: usize,

    /// Characters of section text sent as a classification preview.
    pub preview_chars: usize,

    pub max_tokens: u32,
    pub temperature: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            classify_batch_size: 100,
            favorability_batch_size: 15,
            preview_chars: 600,
            max_tokens: 8192,
            temperature: 0.0,
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let concurrency = std::env::var("INGEST_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.concurrency);

        let classify_batch_size = std::env::var("INGEST_CLASSIFY_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.classify_batch_size);

        let favorability_batch_size = std::env::var("INGEST_FAVORABILITY_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.favorability_batch_size);

        let preview_chars = std::env::var("INGEST_PREVIEW_CHARS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.preview_chars);

        Self {
            concurrency,
            classify_batch_size,
            favorability_batch_size,
            preview_chars,
            ..defaults
        }
    }

    /// Take request limits from the service configuration.
    pub fn with_llm(mut self, llm: &LlmConfig) -> Self {
        self.max_tokens = llm.max_tokens;
        self.temperature = llm.temperature;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_classify_batch_size(mut self, size: usize) -> Self {
        self.classify_batch_size = size.max(1);
        self
    }

    pub fn with_favorability_batch_size(mut self, size: usize) -> Self {
        self.favorability_batch_size = size.max(1);
        self
    }

    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = LlmConfig::builder("key").build();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.max_tokens, 8192);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = LlmConfig::builder("secret-key").build();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret-key"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_ingest_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.classify_batch_size, 100);
        assert_eq!(config.favorability_batch_size, 15);
    }

    #[test]
    fn test_setters_clamp_to_one() {
        let config = IngestConfig::default()
            .with_concurrency(0)
            .with_classify_batch_size(0)
            .with_favorability_batch_size(0);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.classify_batch_size, 1);
        assert_eq!(config.favorability_batch_size, 1);
    }

    #[test]
    fn test_with_llm_copies_limits() {
        let llm = LlmConfig::builder("k").max_tokens(1024).temperature(0.3).build();
        let config = IngestConfig::default().with_llm(&llm);
        assert_eq!(config.max_tokens, 1024);
        assert!((config.temperature - 0.3).abs() < f64::EPSILON);
    }
}
