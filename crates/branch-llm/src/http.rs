use async_trait::async_trait;
use branch_core::{BranchSummaryRequest, BranchTurnRequest, ChatRequest};
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::Value;

use crate::backend::{BranchBackend, ByteStream};
use crate::error::{LLMError, Result};

const CHAT_PATH: &str = "/api/chat";
const BRANCH_PATH: &str = "/api/branch";
const SUMMARY_PATH: &str = "/api/branch/summary";

/// Talks to the branch proxy over HTTP and hands back plain-text bodies.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<ByteStream> {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send().await?;
        let response = check_response(response).await?;

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(LLMError::from)),
        ))
    }
}

/// Reject failed or empty responses before any byte is streamed.
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = error_message_from_body(&text)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        log::warn!("request failed with HTTP {}: {}", status, message);
        return Err(LLMError::Api {
            status: status.as_u16(),
            message,
        });
    }

    if response.content_length() == Some(0) {
        return Err(LLMError::Api {
            status: status.as_u16(),
            message: "response had no body".to_string(),
        });
    }

    Ok(response)
}

/// Pull a readable message out of an error body.
///
/// Accepts `{"error": "..."}`, `{"error": {"message": "..."}}` or plain text.
pub(crate) fn error_message_from_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(json) => match &json["error"] {
            Value::String(message) => Some(message.clone()),
            Value::Object(error) => error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => Some(trimmed.to_string()),
        },
        Err(_) => Some(trimmed.to_string()),
    }
}

#[async_trait]
impl BranchBackend for HttpBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.post(CHAT_PATH, request).await
    }

    async fn branch_turn(&self, request: &BranchTurnRequest) -> Result<ByteStream> {
        self.post(BRANCH_PATH, request).await
    }

    async fn branch_summary(&self, request: &BranchSummaryRequest) -> Result<ByteStream> {
        self.post(SUMMARY_PATH, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new("http://localhost:5000/");
        assert_eq!(backend.base_url(), "http://localhost:5000");
    }

    #[test]
    fn flat_error_body_is_used_verbatim() {
        assert_eq!(
            error_message_from_body(r#"{"error": "selection required"}"#).as_deref(),
            Some("selection required")
        );
    }

    #[test]
    fn nested_error_message_is_extracted() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        assert_eq!(
            error_message_from_body(body).as_deref(),
            Some("Invalid API key")
        );
    }

    #[test]
    fn plain_text_and_empty_bodies() {
        assert_eq!(
            error_message_from_body("Bad Gateway").as_deref(),
            Some("Bad Gateway")
        );
        assert_eq!(error_message_from_body("   "), None);
    }
}
