//! OpenAI-compatible request body and stream frame parsing.

use branch_core::WireMessage;
use serde::Deserialize;
use serde_json::{json, Value};

/// Build a streaming chat completions body.
pub fn build_chat_body(
    model: &str,
    messages: &[WireMessage],
    temperature: f32,
    max_tokens: u32,
) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "temperature": temperature,
        "max_tokens": max_tokens,
        "stream": true,
    })
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Deserialize, Default)]
struct StreamDelta {
    content: Option<String>,
}

/// One decoded `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Done,
    /// Keep-alives, role-only deltas and malformed payloads.
    Skip,
}

/// Parse an SSE `data:` payload leniently: anything unreadable is skipped.
pub fn parse_frame(data: &str) -> Frame {
    let data = data.trim();
    if data.is_empty() {
        return Frame::Skip;
    }
    if data == "[DONE]" {
        return Frame::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(Frame::Text)
            .unwrap_or(Frame::Skip),
        Err(err) => {
            log::debug!("skipping malformed stream frame: {}", err);
            Frame::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use branch_core::Role;

    #[test]
    fn body_carries_sampling_settings_and_stream_flag() {
        let messages = vec![WireMessage::new(Role::User, "Hello")];
        let body = build_chat_body("llama-3.3-70b-versatile", &messages, 0.2, 800);

        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 800);
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Hello");
    }

    #[test]
    fn content_delta_becomes_text() {
        let data = r#"{"id":"chatcmpl-1","choices":[{"delta":{"content":"Hi"},"finish_reason":null}]}"#;
        assert_eq!(parse_frame(data), Frame::Text("Hi".to_string()));
    }

    #[test]
    fn done_marker_tolerates_whitespace() {
        assert_eq!(parse_frame("  [DONE] "), Frame::Done);
    }

    #[test]
    fn role_only_and_empty_deltas_are_skipped() {
        assert_eq!(
            parse_frame(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#),
            Frame::Skip
        );
        assert_eq!(parse_frame(r#"{"choices":[]}"#), Frame::Skip);
    }

    #[test]
    fn malformed_json_is_skipped() {
        assert_eq!(parse_frame("{not json"), Frame::Skip);
    }
}
