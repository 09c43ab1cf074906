//! Completion service client
//!
//! A single-shot chat completion against an OpenAI-compatible endpoint,
//! plus [`extract_json`] for pulling structured output out of model text.
//! Completions are never retried; callers own the fallback.

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

/// One completion call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    /// Ask the service for a JSON object response
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>, temperature: f32) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature,
            json_mode: false,
        }
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// Trait for text completion
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion and return the assistant text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completion client
pub struct ChatCompletionClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ChatCompletionClient {
    /// Create a new client
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    async fn call(&self, request: &CompletionRequest) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Completion {
                message: "completion API key not configured".to_string(),
            })?;

        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: &request.system },
                ChatMessage { role: "user", content: &request.user },
            ],
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::UpstreamTimeout {
                        timeout_ms: self.config.timeout_secs * 1000,
                    }
                } else {
                    AppError::Completion {
                        message: format!("Request failed: {}", e),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Completion {
                message: format!("API error {}: {}", status, body),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| AppError::Completion {
            message: format!("Failed to parse response: {}", e),
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| AppError::Completion {
                message: "Empty response from completion service".to_string(),
            })
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let result = self.call(request).await;
        metrics::record_upstream("llm", "complete", result.is_ok());
        if let Ok(text) = &result {
            debug!(model = %self.config.model, chars = text.len(), "Completion received");
        }
        result
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("fence pattern is valid")
    })
}

/// Parse JSON out of model output.
///
/// Accepts a bare document, one wrapped in a Markdown code fence, one wrapped
/// in quotes, or one surrounded by prose. In the prose case the first `{` or
/// `[` that starts a complete document wins and anything after it is ignored.
pub fn extract_json(text: &str) -> Result<Value> {
    let mut body = text.trim();

    if let Some(inner) = fence_regex().captures(body).and_then(|c| c.get(1)) {
        body = inner.as_str().trim();
    }

    for quote in ['"', '\'', '`'] {
        if body.len() >= 2 && body.starts_with(quote) && body.ends_with(quote) {
            body = body[1..body.len() - 1].trim();
        }
    }

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if value.is_object() || value.is_array() {
            return Ok(value);
        }
    }

    body.match_indices(['{', '['])
        .find_map(|(start, _)| {
            serde_json::Deserializer::from_str(&body[start..])
                .into_iter::<Value>()
                .next()
                .and_then(|parsed| parsed.ok())
        })
        .ok_or_else(|| AppError::Completion {
            message: "No JSON document in completion output".to_string(),
        })
}
