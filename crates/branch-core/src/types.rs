use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::buffer::TurnBuffer;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// An entry of the main conversation.
///
/// Notes are system-role entries produced by merging a top-level branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub is_note: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            is_note: false,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    pub fn note(content: impl Into<String>) -> Self {
        Self {
            is_note: true,
            ..Self::with_role(Role::System, content)
        }
    }
}

/// One exchange entry inside a branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub is_note: bool,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            is_note: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            is_note: false,
        }
    }

    /// Note turns carry merged child content and are never branched from.
    pub fn note(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            is_note: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Idle,
    Generating,
    Merging,
    Error,
}

impl NodeStatus {
    /// A node with a request in flight accepts no other send, merge or close.
    pub fn is_busy(&self) -> bool {
        matches!(self, NodeStatus::Generating | NodeStatus::Merging)
    }
}

/// A side-conversation anchored to a span of selected text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchNode {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub depth: u32,
    pub anchor_text: String,
    pub input_draft: String,
    pub status: NodeStatus,
    pub turns: TurnBuffer,
    /// Opening order within the tree, used for stable listing.
    #[serde(default)]
    pub(crate) seq: u64,
}

impl BranchNode {
    pub(crate) fn new(parent_id: Option<Uuid>, depth: u32, anchor_text: &str, seq: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id,
            depth,
            anchor_text: anchor_text.to_string(),
            input_draft: anchor_text.to_string(),
            status: NodeStatus::Idle,
            turns: TurnBuffer::new(),
            seq,
        }
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    /// True when at least one non-note turn has visible content.
    pub fn has_mergeable_turns(&self) -> bool {
        self.turns
            .iter()
            .any(|turn| !turn.is_note && !turn.content.trim().is_empty())
    }
}
