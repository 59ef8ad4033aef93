use branch_core::MergeDestination;
use uuid::Uuid;

/// Notifications published after each applied step.
///
/// Events describe state that is already in the workspace; a subscriber
/// that lags simply re-reads the workspace.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MainUpdated { message_id: Uuid, text: String },
    MainFinished { message_id: Uuid, error: Option<String> },
    BranchUpdated { node_id: Uuid, text: String },
    BranchFinished { node_id: Uuid, error: Option<String> },
    /// Accumulated summary text while a merge streams.
    MergeUpdated { node_id: Uuid, text: String },
    Merged { node_id: Uuid, destination: MergeDestination },
    MergeFailed { node_id: Uuid, error: String },
}

impl SessionEvent {
    /// Id of the message or branch the event concerns.
    pub fn target(&self) -> Uuid {
        match self {
            SessionEvent::MainUpdated { message_id, .. }
            | SessionEvent::MainFinished { message_id, .. } => *message_id,
            SessionEvent::BranchUpdated { node_id, .. }
            | SessionEvent::BranchFinished { node_id, .. }
            | SessionEvent::MergeUpdated { node_id, .. }
            | SessionEvent::Merged { node_id, .. }
            | SessionEvent::MergeFailed { node_id, .. } => *node_id,
        }
    }
}
