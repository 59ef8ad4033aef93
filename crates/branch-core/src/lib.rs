//! `branch-core` holds the state of a conversation that can be forked into
//! anchored side-conversations ("branches"), nested up to [`MAX_DEPTH`], and
//! merged back as notes.
//!
//! Everything here is synchronous and free of I/O. Streaming and transport
//! live in `branch-llm`; `branch-session` drives the steps defined on
//! [`Workspace`] from completed network events.

pub mod buffer;
pub mod error;
pub mod note;
pub mod payload;
pub mod tree;
pub mod types;
pub mod workspace;

pub use buffer::{Entry, EntryLog, MessageLog, TurnBuffer};
pub use error::{BranchError, Result};
pub use note::{note_preview, summary_body, transcript_note};
pub use payload::{
    cap_anchor, BranchSummaryRequest, BranchTurnRequest, ChatRequest, WireMessage,
};
pub use tree::BranchTree;
pub use types::{BranchNode, Message, NodeStatus, Role, Turn};
pub use workspace::{
    failure_text, EditSlot, MainStatus, MainTicket, MergeDestination, MergeOutcome, Workspace,
};

/// Deepest nesting a branch may reach. Top-level branches are depth 1.
pub const MAX_DEPTH: u32 = 3;

/// Number of trailing `{role, content}` entries supplied as request context.
pub const MAX_HISTORY: usize = 5;

/// Anchor text is capped to this many characters before it is sent.
pub const MAX_ANCHOR_CHARS: usize = 3000;

/// Character budget for note previews.
pub const NOTE_PREVIEW_CHARS: usize = 140;
