use std::collections::HashMap;

use branch_core::{note_preview, BranchNode, Message, NodeStatus, Turn, Workspace};
use branch_session::SessionEvent;
use uuid::Uuid;

const ANCHOR_PREVIEW_CHARS: usize = 48;

/// Open branches in display order: each parent followed by its children.
pub fn ordered_branches(workspace: &Workspace) -> Vec<&BranchNode> {
    fn visit<'a>(workspace: &'a Workspace, node: &'a BranchNode, out: &mut Vec<&'a BranchNode>) {
        out.push(node);
        for child in workspace.tree().children(node.id) {
            visit(workspace, child, out);
        }
    }

    let mut out = Vec::with_capacity(workspace.tree().len());
    for root in workspace
        .tree()
        .nodes()
        .into_iter()
        .filter(|node| node.is_top_level())
    {
        visit(workspace, root, &mut out);
    }
    out
}

fn shorten(text: &str, limit: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}

fn status_label(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Idle => "idle",
        NodeStatus::Generating => "generating",
        NodeStatus::Merging => "merging",
        NodeStatus::Error => "error",
    }
}

pub fn branch_row(position: usize, node: &BranchNode, focused: bool) -> String {
    let marker = if focused { '>' } else { ' ' };
    let indent = "  ".repeat(node.depth.saturating_sub(1) as usize);
    format!(
        "{marker} {indent}[{position}] L{} {:<10} \"{}\" ({} turns)",
        node.depth,
        status_label(node.status),
        shorten(&node.anchor_text, ANCHOR_PREVIEW_CHARS),
        node.turns.len()
    )
}

pub fn message_line(position: usize, message: &Message) -> String {
    if message.is_note {
        format!("{position:>3}. note: {}", note_preview(&message.content))
    } else {
        format!("{position:>3}. {}: {}", message.role.as_str(), message.content)
    }
}

pub fn turn_line(turn: &Turn) -> String {
    if turn.is_note {
        format!("     note: {}", note_preview(&turn.content))
    } else {
        format!("     {}: {}", turn.role.as_str(), turn.content)
    }
}

/// Turns growing snapshots into the text that still has to be printed.
#[derive(Debug, Default)]
pub struct StreamPrinter {
    printed: HashMap<Uuid, usize>,
}

impl StreamPrinter {
    /// Text to print for `event`, if any.
    pub fn delta(&mut self, event: &SessionEvent) -> Option<String> {
        match event {
            SessionEvent::MainUpdated { text, .. }
            | SessionEvent::BranchUpdated { text, .. }
            | SessionEvent::MergeUpdated { text, .. } => {
                let printed = self.printed.entry(event.target()).or_insert(0);
                let suffix = text.get(*printed..).filter(|suffix| !suffix.is_empty())?;
                *printed = text.len();
                Some(suffix.to_string())
            }
            SessionEvent::MainFinished { .. }
            | SessionEvent::BranchFinished { .. }
            | SessionEvent::Merged { .. }
            | SessionEvent::MergeFailed { .. } => self
                .printed
                .remove(&event.target())
                .filter(|printed| *printed > 0)
                .map(|_| "\n".to_string()),
        }
    }
}
