//! Upstream text generation for the proxy.
//!
//! The proxy speaks to an OpenAI-compatible chat completions endpoint and
//! re-streams only the text deltas.

pub mod openai_compat;
pub mod sse;

use std::pin::Pin;

use async_trait::async_trait;
use branch_core::WireMessage;
use futures::Stream;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::error::{LLMError, Result};

use openai_compat::build_chat_body;
use sse::token_stream_from_sse;

/// Text deltas of one completion, in arrival order.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 800;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Stream a completion for `messages`.
    ///
    /// Any upstream status other than 200 is returned as an error before any
    /// token is produced.
    async fn chat_stream(&self, messages: &[WireMessage]) -> Result<TokenStream>;

    fn model(&self) -> &str;
}

pub struct OpenAICompatProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAICompatProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatProvider {
    async fn chat_stream(&self, messages: &[WireMessage]) -> Result<TokenStream> {
        let body = build_chat_body(&self.model, messages, self.temperature, self.max_tokens);
        log::debug!(
            "upstream request: model={} messages={}",
            self.model,
            messages.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            log::warn!("upstream returned HTTP {}: {}", status, text.trim());
            return Err(upstream_error(status.as_u16(), &text));
        }

        Ok(token_stream_from_sse(response))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Classify a rejected upstream body.
///
/// `{"error": {"message": ..}}` is unwrapped to its message, any other JSON is
/// kept whole so the proxy can relay it, and text is used as the message.
fn upstream_error(status: u16, body: &str) -> LLMError {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => match json.pointer("/error/message").and_then(Value::as_str) {
            Some(message) => LLMError::Api {
                status,
                message: message.to_string(),
            },
            None => LLMError::UpstreamBody { status, body: json },
        },
        Err(_) => {
            let text = body.trim();
            let message = if text.is_empty() {
                "Unknown error from upstream".to_string()
            } else {
                text.to_string()
            };
            LLMError::Api { status, message }
        }
    }
}
