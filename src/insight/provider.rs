//! Text-generation providers.
//!
//! [`InsightProvider`] is the only seam between the pipeline and the
//! external service: one prompt in, raw reply text out. The HTTP
//! implementation talks to an OpenAI-style chat-completion endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::insight::prompt::Prompt;

/// Capability to turn a prompt into raw model text.
#[async_trait]
pub trait InsightProvider: Send + Sync {
    /// Send `prompt` and return the model's reply text, untouched.
    async fn generate(&self, prompt: &Prompt) -> Result<String>;

    /// Model identifier, for report metadata.
    fn model_name(&self) -> &str;
}

/// Settings for [`ChatCompletionProvider`].
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL; `/chat/completions` is appended.
    pub api_url: String,
    pub api_key: Option<String>,
    pub model_name: String,
    /// Transport timeout. `None` leaves the request unbounded.
    pub timeout_seconds: Option<u64>,
    /// Sent as `HTTP-Referer` when set.
    pub referer: Option<String>,
    /// Sent as `X-Title` when set.
    pub title: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://openrouter.ai/api/v1".to_string(),
            api_key: None,
            model_name: "x-ai/grok-4-fast".to_string(),
            timeout_seconds: Some(300),
            referer: None,
            title: None,
        }
    }
}

/// Message in the chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Chat-completion request body.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

/// Chat-completion response body. Only the first choice is read.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

/// Provider backed by an HTTPS chat-completion endpoint with bearer auth.
pub struct ChatCompletionProvider {
    config: ProviderConfig,
    http_client: reqwest::Client,
}

impl ChatCompletionProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        info!(
            "Initializing chat-completion provider with model {} at {}",
            config.model_name, config.api_url
        );

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| Error::ExternalService(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl InsightProvider for ChatCompletionProvider {
    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::ExternalService("No API key configured".to_string()))?;

        let request = ChatRequest {
            model: &self.config.model_name,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
        };

        debug!(
            "Sending chat request ({} prompt chars) to {}",
            prompt.user.len(),
            self.endpoint()
        );

        let mut call = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&request);
        if let Some(ref referer) = self.config.referer {
            call = call.header("HTTP-Referer", referer);
        }
        if let Some(ref title) = self.config.title {
            call = call.header("X-Title", title);
        }

        let response = call.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::ExternalService(format!(
                    "Request timed out after {}s",
                    self.config.timeout_seconds.unwrap_or_default()
                ))
            } else if e.is_connect() {
                Error::ExternalService(format!("Cannot connect to {}", self.config.api_url))
            } else {
                Error::ExternalService(format!("Failed to send request: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ExternalService(format!(
                "API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::ExternalService(format!("Failed to parse response: {}", e)))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::ExternalService("Response contained no choices".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
