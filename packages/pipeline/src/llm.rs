use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{PipelineError, Result};

/// Role of a message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// The request schema a call follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Classification,
    HighExtraction,
    MediumExtraction,
    Favorability,
}

impl CallKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::HighExtraction => "high_extraction",
            Self::MediumExtraction => "medium_extraction",
            Self::Favorability => "favorability",
        }
    }
}

/// Request to the LLM.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub kind: CallKind,
    pub system: String,
    pub messages: Vec<Message>,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl LlmRequest {
    /// Content of the last user message.
    pub fn user_content(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map_or("", |m| m.content.as_str())
    }
}

/// Response from the LLM.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Trait for LLM clients, enabling mocking in tests.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Anthropic Messages API client.
///
/// NOTE: Do NOT derive `Debug` on this struct, `api_key` would be exposed.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Fallback wait when a 429 carries no usable `retry-after`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Waits before the second, third and fourth attempt.
const BACKOFF: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct MessagesReply {
    content: Vec<ReplyBlock>,
    usage: TokenUsage,
}

#[derive(Deserialize)]
struct ReplyBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct TokenUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Result of one HTTP attempt.
enum Attempt {
    Done(Result<LlmResponse>),
    /// Transient failure; `wait` is a lower bound on the next backoff.
    Retry { error: PipelineError, wait: Duration },
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(PipelineError::LlmApiRequest)?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            endpoint: format!("{}/v1/messages", config.api_base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    async fn attempt(&self, body: &MessagesBody<'_>, call: &'static str) -> Attempt {
        let sent = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await;

        let resp = match sent {
            Ok(resp) => resp,
            Err(e) => {
                warn!(call, error = %e, "LLM request failed");
                return Attempt::Retry {
                    error: PipelineError::LlmApiRequest(e),
                    wait: Duration::ZERO,
                };
            }
        };

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!(call, retry_after_secs, "LLM rate limited");
            return Attempt::Retry {
                error: PipelineError::LlmRateLimited { retry_after_secs },
                wait: Duration::from_secs(retry_after_secs),
            };
        }

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if status.is_server_error() {
                warn!(call, status = status.as_u16(), body = %text, "LLM server error");
                return Attempt::Retry {
                    error: PipelineError::LlmApiError {
                        status: status.as_u16(),
                        message: text,
                    },
                    wait: Duration::ZERO,
                };
            }
            let message = serde_json::from_str::<ErrorEnvelope>(&text)
                .ok()
                .and_then(|envelope| envelope.error)
                .map_or(text, |body| body.message);
            return Attempt::Done(Err(PipelineError::LlmApiError {
                status: status.as_u16(),
                message,
            }));
        }

        let reply: MessagesReply = match resp.json().await {
            Ok(reply) => reply,
            Err(e) => return Attempt::Done(Err(PipelineError::LlmResponseParse(e.to_string()))),
        };

        let content: String = reply.content.into_iter().filter_map(|b| b.text).collect();
        if content.is_empty() {
            warn!(call, "LLM returned empty response");
            return Attempt::Retry {
                error: PipelineError::LlmEmptyResponse,
                wait: Duration::ZERO,
            };
        }

        debug!(
            call,
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            "LLM call completed"
        );
        Attempt::Done(Ok(LlmResponse {
            content,
            input_tokens: reply.usage.input_tokens,
            output_tokens: reply.usage.output_tokens,
        }))
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let call = request.kind.as_str();
        let body = MessagesBody {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: &request.messages,
        };

        let mut backoff = BACKOFF.iter();
        loop {
            let (error, wait) = match self.attempt(&body, call).await {
                Attempt::Done(result) => return result,
                Attempt::Retry { error, wait } => (error, wait),
            };
            let Some(delay) = backoff.next() else {
                return Err(error);
            };
            let delay = (*delay).max(wait);
            debug!(call, ?delay, error = %error, "retrying LLM request");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Test utilities for the LLM client.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support {
    use super::*;
    use std::sync::Mutex;

    type Router = Box<dyn Fn(&LlmRequest) -> Result<String> + Send + Sync>;

    /// Mock LLM client for testing.
    ///
    /// Either pops pre-configured responses in order, or answers each
    /// request through a routing closure. Concurrent callers arrive in no
    /// particular order, so pipeline tests use the router.
    pub struct MockLlmClient {
        responses: Mutex<Vec<Result<LlmResponse>>>,
        router: Option<Router>,
        requests: Mutex<Vec<LlmRequest>>,
    }

    fn response(content: impl Into<String>) -> LlmResponse {
        LlmResponse {
            content: content.into(),
            input_tokens: 100,
            output_tokens: 200,
        }
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<Result<LlmResponse>>) -> Self {
            // Reverse so we can pop from the end
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                router: None,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn with_response(content: &str) -> Self {
            Self::new(vec![Ok(response(content))])
        }

        pub fn with_responses(contents: Vec<&str>) -> Self {
            Self::new(contents.into_iter().map(|c| Ok(response(c))).collect())
        }

        /// Answer every request with the router's output.
        pub fn with_router(
            router: impl Fn(&LlmRequest) -> Result<String> + Send + Sync + 'static,
        ) -> Self {
            Self {
                responses: Mutex::new(Vec::new()),
                router: Some(Box::new(router)),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Every request received so far.
        pub fn requests(&self) -> Vec<LlmRequest> {
            self.requests
                .lock()
                .map(|r| r.clone())
                .unwrap_or_default()
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().map(|r| r.len()).unwrap_or_default()
        }

        /// Number of requests of one kind.
        pub fn calls_of(&self, kind: CallKind) -> usize {
            self.requests
                .lock()
                .map(|r| r.iter().filter(|req| req.kind == kind).count())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
            self.requests
                .lock()
                .map_err(|e| PipelineError::LlmResponseParse(format!("mock lock poisoned: {e}")))?
                .push(request.clone());

            if let Some(router) = &self.router {
                return router(request).map(response);
            }

            let mut responses = self.responses.lock().map_err(|e| {
                PipelineError::LlmResponseParse(format!("mock lock poisoned: {e}"))
            })?;
            responses.pop().unwrap_or(Err(PipelineError::LlmEmptyResponse))
        }
    }
}
