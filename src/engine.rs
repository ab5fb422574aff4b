//! External reasoning engine boundary.
//!
//! The arbiter treats the engine as a black-box function: structured
//! request in, raw text out. The HTTP implementation speaks the
//! OpenAI-compatible `chat/completions` shape so local and hosted
//! endpoints are interchangeable; tests substitute their own
//! [`ReasoningEngine`] implementations.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// One arbitration request: a fixed system instruction plus the
/// interpolated conflict description.
#[derive(Debug, Clone, Serialize)]
pub struct EngineRequest {
    pub system: String,
    pub user: String,
}

/// Black-box reasoning function. Implementations must be cheaply shareable
/// across the arbiter's worker pool.
pub trait ReasoningEngine: Send + Sync {
    /// Resolve one request to the engine's raw text response.
    fn resolve(&self, request: EngineRequest) -> impl Future<Output = Result<String>> + Send;
}

/// OpenAI-compatible `chat/completions` client.
#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
    max_tokens: u32,
}

impl HttpEngine {
    /// Build a client from the engine section of `.ei.toml`. The bearer
    /// token is read from the configured environment variable; local
    /// endpoints typically run without one.
    pub fn from_config(config: &EngineConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl ReasoningEngine for HttpEngine {
    fn resolve(&self, request: EngineRequest) -> impl Future<Output = Result<String>> + Send {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        // `json` serializes immediately, so the borrows end before the
        // returned future is constructed.
        let mut http = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }

        async move {
            let response = http.send().await?;
            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(Error::Engine(format!(
                    "endpoint returned {status}: {}",
                    truncate(&detail, 200)
                )));
            }

            let parsed: ChatResponse = response.json().await?;
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .filter(|content| !content.trim().is_empty())
                .ok_or_else(|| Error::Engine("endpoint returned no content".to_string()))
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}
