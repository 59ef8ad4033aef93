//! Request bodies for the three logical endpoints.
//!
//! Field names follow the proxy's wire format (`selection`, `popup_turns`,
//! `history`); the Rust names describe what the fields mean here.

use serde::{Deserialize, Serialize};

use crate::types::Role;
use crate::MAX_ANCHOR_CHARS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Body of a main-conversation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<WireMessage>,
}

/// Body of a branch turn request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchTurnRequest {
    #[serde(rename = "selection")]
    pub anchor_text: String,
    #[serde(rename = "popup_turns")]
    pub turns: Vec<WireMessage>,
    pub history: Vec<WireMessage>,
}

/// Body of a branch summary request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSummaryRequest {
    #[serde(rename = "selection")]
    pub anchor_text: String,
    #[serde(rename = "popup_turns")]
    pub turns: Vec<WireMessage>,
    pub history: Vec<WireMessage>,
}

/// Cap anchor text to [`MAX_ANCHOR_CHARS`] characters.
pub fn cap_anchor(anchor: &str) -> String {
    match anchor.char_indices().nth(MAX_ANCHOR_CHARS) {
        Some((byte_index, _)) => anchor[..byte_index].to_string(),
        None => anchor.to_string(),
    }
}
