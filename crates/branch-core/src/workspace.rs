//! The complete client-side state: the main conversation plus the branch
//! tree.
//!
//! Every public `&mut self` method is one atomic transition. Operations that
//! talk to the network are split in two: a `begin_*` step validates, mutates
//! and returns the request payload, and `apply_*`/`finish_*` steps fold in
//! stream snapshots and the terminal outcome. Structural errors are returned
//! from the `begin_*` step before anything changes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::buffer::{Entry, MessageLog};
use crate::error::{BranchError, Result};
use crate::note::{summary_body, transcript_note};
use crate::payload::{cap_anchor, BranchSummaryRequest, BranchTurnRequest, ChatRequest, WireMessage};
use crate::tree::BranchTree;
use crate::types::{BranchNode, Message, NodeStatus, Role, Turn};
use crate::MAX_HISTORY;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainStatus {
    #[default]
    Idle,
    Generating,
}

/// Single-slot edit state for the main conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditSlot {
    pub message_id: Uuid,
    pub draft: String,
    /// Set while the regenerated reply is streaming.
    pub sending: bool,
}

/// A main-conversation request ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct MainTicket {
    pub placeholder_id: Uuid,
    pub request: ChatRequest,
}

/// Where a merged branch's notes landed.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeDestination {
    Main { note_id: Uuid },
    Branch { parent_id: Uuid },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub merged: BranchNode,
    pub destination: MergeDestination,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    messages: MessageLog,
    tree: BranchTree,
    main_status: MainStatus,
    edit: Option<EditSlot>,
}

fn is_stream_placeholder(turn: &Turn) -> bool {
    turn.role == Role::Assistant && !turn.is_note
}

/// Text written into a placeholder when its request fails.
pub fn failure_text(err: &BranchError) -> String {
    format!("Error: {err}")
}

fn require_text(text: &str) -> Result<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BranchError::EmptyInput);
    }
    Ok(trimmed)
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing main conversation, e.g. a seeded system prompt.
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: MessageLog::from(messages),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> &MessageLog {
        &self.messages
    }

    pub fn message(&self, id: Uuid) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn tree(&self) -> &BranchTree {
        &self.tree
    }

    pub fn node(&self, id: Uuid) -> Option<&BranchNode> {
        self.tree.get(id)
    }

    pub fn main_status(&self) -> MainStatus {
        self.main_status
    }

    pub fn edit_slot(&self) -> Option<&EditSlot> {
        self.edit.as_ref()
    }

    /// Context window for requests issued by `node`: the tail of its parent's
    /// turns, or of the main log for a top-level node.
    pub fn history_for(&self, node: &BranchNode) -> Vec<WireMessage> {
        match node.parent_id {
            None => self.messages.window(MAX_HISTORY),
            Some(parent_id) => self
                .tree
                .get(parent_id)
                .map(|parent| parent.turns.window(MAX_HISTORY))
                .unwrap_or_default(),
        }
    }

    // ---- main conversation ----

    fn ensure_main_idle(&self) -> Result<()> {
        if self.main_status == MainStatus::Generating {
            return Err(BranchError::Busy("main conversation".to_string()));
        }
        Ok(())
    }

    fn start_main_request(&mut self, text: &str) -> MainTicket {
        let user = Message::user(text);
        let mut messages = self.messages.to_wire();
        messages.push(user.to_wire());

        let placeholder = Message::assistant("");
        let placeholder_id = placeholder.id;
        self.messages.append(user);
        self.messages.append(placeholder);
        self.main_status = MainStatus::Generating;

        MainTicket {
            placeholder_id,
            request: ChatRequest { messages },
        }
    }

    /// Append a user message and an empty assistant placeholder.
    pub fn begin_main_send(&mut self, text: &str) -> Result<MainTicket> {
        let text = require_text(text)?;
        self.ensure_main_idle()?;

        let ticket = self.start_main_request(text);
        tracing::info!(
            placeholder_id = %ticket.placeholder_id,
            request_messages = ticket.request.messages.len(),
            "Workspace: main send started"
        );
        Ok(ticket)
    }

    /// Reflect the latest accumulated reply text into the main placeholder.
    pub fn apply_main_update(&mut self, placeholder_id: Uuid, text: &str) -> bool {
        let applied = self
            .messages
            .rewrite_last_matching(|message| message.id == placeholder_id, text);
        if !applied {
            tracing::debug!(
                placeholder_id = %placeholder_id,
                "Workspace: main placeholder gone, update dropped"
            );
        }
        applied
    }

    /// Close out a main-conversation request (plain send or edit).
    pub fn finish_main(&mut self, placeholder_id: Uuid, outcome: Result<()>) {
        if let Err(err) = &outcome {
            tracing::warn!(
                placeholder_id = %placeholder_id,
                error = %err,
                "Workspace: main request failed"
            );
            self.apply_main_update(placeholder_id, &failure_text(err));
        }
        self.main_status = MainStatus::Idle;
        if self.edit.as_ref().is_some_and(|slot| slot.sending) {
            self.edit = None;
        }
    }

    fn user_message_index(&self, message_id: Uuid) -> Result<usize> {
        self.messages
            .position(|message| message.id == message_id && message.role == Role::User)
            .ok_or_else(|| BranchError::NotFound(format!("user message {message_id}")))
    }

    /// Put a user message into the edit slot and return its current text.
    pub fn begin_edit(&mut self, message_id: Uuid) -> Result<String> {
        self.ensure_main_idle()?;
        let index = self.user_message_index(message_id)?;
        let draft = self.messages.entries()[index].content.clone();
        self.edit = Some(EditSlot {
            message_id,
            draft: draft.clone(),
            sending: false,
        });
        Ok(draft)
    }

    /// Drop a pending edit. An edit already streaming is left in place.
    pub fn cancel_edit(&mut self) -> bool {
        match &self.edit {
            Some(slot) if !slot.sending => {
                self.edit = None;
                true
            }
            _ => false,
        }
    }

    /// Truncate the main log at `message_id` and regenerate from `new_text`.
    ///
    /// Everything from the target message on is discarded.
    pub fn submit_edit(&mut self, message_id: Uuid, new_text: &str) -> Result<MainTicket> {
        let text = require_text(new_text)?;
        let index = self.user_message_index(message_id)?;
        self.ensure_main_idle()?;

        let discarded = self.messages.truncate_at(index);
        let ticket = self.start_main_request(text);
        let new_message_id = self.messages.entries()[index].id;
        self.edit = Some(EditSlot {
            message_id: new_message_id,
            draft: text.to_string(),
            sending: true,
        });

        tracing::info!(
            edited_message = %message_id,
            new_message = %new_message_id,
            discarded = discarded.len(),
            "Workspace: edit submitted, conversation truncated"
        );
        Ok(ticket)
    }

    /// Delete a note from the main conversation.
    pub fn delete_note(&mut self, message_id: Uuid) -> Result<Message> {
        let index = self
            .messages
            .position(|message| message.id == message_id && message.is_note)
            .ok_or_else(|| BranchError::NotFound(format!("note {message_id}")))?;
        self.messages
            .remove_at(index)
            .ok_or_else(|| BranchError::NotFound(format!("note {message_id}")))
    }

    // ---- branch tree ----

    pub fn open_branch(&mut self, anchor_text: &str) -> Uuid {
        self.tree.open_top_level(anchor_text)
    }

    pub fn open_child_branch(&mut self, parent_id: Uuid, anchor_text: &str) -> Result<Uuid> {
        if self.tree.require(parent_id)?.status == NodeStatus::Merging {
            return Err(BranchError::Busy(format!("branch {parent_id}")));
        }
        self.tree.open_child(parent_id, anchor_text)
    }

    pub fn close_branch(&mut self, id: Uuid) -> Result<BranchNode> {
        self.tree.close(id)
    }

    pub fn set_draft(&mut self, id: Uuid, text: &str) -> Result<()> {
        self.tree.require_mut(id)?.input_draft = text.to_string();
        Ok(())
    }

    /// Append a user turn and an assistant placeholder to `id`.
    pub fn begin_branch_send(&mut self, id: Uuid, text: &str) -> Result<BranchTurnRequest> {
        let text = require_text(text)?;
        let node = self.tree.require(id)?;
        if node.status.is_busy() {
            return Err(BranchError::Busy(format!("branch {id}")));
        }

        let user = Turn::user(text);
        let history = self.history_for(node);
        let mut turns = node.turns.to_wire();
        turns.push(user.to_wire());
        let anchor_text = cap_anchor(&node.anchor_text);

        let node = self.tree.require_mut(id)?;
        node.turns.append(user);
        node.turns.append(Turn::assistant(""));
        node.input_draft.clear();
        node.status = NodeStatus::Generating;

        tracing::info!(
            node_id = %id,
            depth = node.depth,
            turns = turns.len(),
            history = history.len(),
            "Workspace: branch send started"
        );
        Ok(BranchTurnRequest {
            anchor_text,
            turns,
            history,
        })
    }

    /// Reflect accumulated reply text into the node's placeholder.
    pub fn apply_branch_update(&mut self, id: Uuid, text: &str) -> bool {
        match self.tree.get_mut(id) {
            Some(node) if node.status == NodeStatus::Generating => {
                node.turns.rewrite_last_matching(is_stream_placeholder, text)
            }
            _ => {
                tracing::debug!(node_id = %id, "Workspace: branch not streaming, update dropped");
                false
            }
        }
    }

    pub fn finish_branch_send(&mut self, id: Uuid, outcome: Result<()>) {
        let Some(node) = self.tree.get_mut(id) else {
            tracing::debug!(node_id = %id, "Workspace: finished send for removed branch");
            return;
        };
        match outcome {
            Ok(()) => node.status = NodeStatus::Idle,
            Err(err) => {
                tracing::warn!(node_id = %id, error = %err, "Workspace: branch send failed");
                node.turns
                    .rewrite_last_matching(is_stream_placeholder, &failure_text(&err));
                node.status = NodeStatus::Error;
            }
        }
    }

    /// Validate a merge of `id` and build its summary request.
    pub fn begin_merge(&mut self, id: Uuid) -> Result<BranchSummaryRequest> {
        let node = self.tree.ensure_removable(id)?;
        if !node.has_mergeable_turns() {
            return Err(BranchError::NothingToMerge);
        }

        let request = BranchSummaryRequest {
            anchor_text: cap_anchor(&node.anchor_text),
            turns: node.turns.to_wire(),
            history: self.history_for(node),
        };

        let node = self.tree.require_mut(id)?;
        node.status = NodeStatus::Merging;
        tracing::info!(
            node_id = %id,
            depth = node.depth,
            turns = request.turns.len(),
            "Workspace: merge started"
        );
        Ok(request)
    }

    /// Apply the summary (or failure) of a merge started with [`begin_merge`].
    ///
    /// On success the node is removed and its notes are appended to the main
    /// log (top-level) or to the parent's turns. On failure the node stays,
    /// marked [`NodeStatus::Error`], and nothing is appended.
    ///
    /// [`begin_merge`]: Workspace::begin_merge
    pub fn finish_merge(&mut self, id: Uuid, outcome: Result<String>) -> Result<MergeOutcome> {
        let summary = match outcome {
            Ok(summary) => summary,
            Err(err) => {
                tracing::warn!(node_id = %id, error = %err, "Workspace: merge failed");
                if let Some(node) = self.tree.get_mut(id) {
                    node.status = NodeStatus::Error;
                }
                return Err(err);
            }
        };

        let merged = self.tree.remove(id)?;
        let destination = match merged.parent_id {
            None => {
                let note = Message::note(summary_body(&summary));
                let note_id = note.id;
                self.messages.append(note);
                MergeDestination::Main { note_id }
            }
            Some(parent_id) => {
                let parent = self.tree.require_mut(parent_id)?;
                parent.turns.append(Turn::note(summary_body(&summary)));
                parent
                    .turns
                    .append(Turn::note(transcript_note(merged.depth, merged.turns.entries())));
                MergeDestination::Branch { parent_id }
            }
        };

        tracing::info!(
            node_id = %id,
            depth = merged.depth,
            destination = ?destination,
            "Workspace: branch merged"
        );
        Ok(MergeOutcome {
            merged,
            destination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_send_appends_user_and_placeholder() {
        let mut workspace = Workspace::new();
        let ticket = workspace.begin_main_send("  hello  ").unwrap();

        let messages = workspace.messages().entries();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].id, ticket.placeholder_id);
        assert_eq!(messages[1].content, "");
        assert_eq!(ticket.request.messages.len(), 1);
        assert_eq!(workspace.main_status(), MainStatus::Generating);
    }

    #[test]
    fn second_main_send_while_streaming_is_busy() {
        let mut workspace = Workspace::new();
        workspace.begin_main_send("one").unwrap();
        let err = workspace.begin_main_send("two").unwrap_err();
        assert!(matches!(err, BranchError::Busy(_)));
        assert_eq!(workspace.messages().len(), 2);
    }

    #[test]
    fn failed_main_send_writes_error_into_placeholder() {
        let mut workspace = Workspace::new();
        let ticket = workspace.begin_main_send("hi").unwrap();
        workspace.finish_main(ticket.placeholder_id, Err(BranchError::remote("HTTP 500")));

        let placeholder = workspace.message(ticket.placeholder_id).unwrap();
        assert_eq!(placeholder.content, "Error: HTTP 500");
        assert_eq!(workspace.main_status(), MainStatus::Idle);
    }

    #[test]
    fn delete_note_refuses_regular_messages() {
        let mut workspace = Workspace::with_messages(vec![Message::user("q"), Message::note("n")]);
        let user_id = workspace.messages().entries()[0].id;
        let note_id = workspace.messages().entries()[1].id;

        assert!(matches!(
            workspace.delete_note(user_id),
            Err(BranchError::NotFound(_))
        ));
        workspace.delete_note(note_id).unwrap();
        assert_eq!(workspace.messages().len(), 1);
    }

    #[test]
    fn child_cannot_open_under_merging_parent() {
        let mut workspace = Workspace::new();
        let id = workspace.open_branch("anchor");
        workspace.begin_branch_send(id, "q").unwrap();
        workspace.apply_branch_update(id, "a");
        workspace.finish_branch_send(id, Ok(()));
        workspace.begin_merge(id).unwrap();

        let err = workspace.open_child_branch(id, "nested").unwrap_err();
        assert!(matches!(err, BranchError::Busy(_)));
    }

    #[test]
    fn begin_edit_fills_slot_and_cancel_clears_it() {
        let mut workspace = Workspace::with_messages(vec![Message::user("original")]);
        let id = workspace.messages().entries()[0].id;

        assert_eq!(workspace.begin_edit(id).unwrap(), "original");
        assert_eq!(workspace.edit_slot().unwrap().message_id, id);
        assert!(workspace.cancel_edit());
        assert!(workspace.edit_slot().is_none());
    }
}
