//! Runs network-backed operations against the shared [`Workspace`].
//!
//! Each operation takes the write lock for one synchronous step, releases it
//! before awaiting the backend, and re-takes it per snapshot. Several
//! branches can therefore stream at once; overlapping work on the same node
//! is rejected by the workspace with `Busy`.

use std::sync::Arc;

use branch_core::{BranchNode, MainTicket, Message, MergeOutcome, Result, Workspace};
use branch_llm::{snapshots, BranchBackend, ByteStream, LLMError};
use futures::StreamExt;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::events::SessionEvent;

const EVENT_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Session {
    workspace: Arc<RwLock<Workspace>>,
    backend: Arc<dyn BranchBackend>,
    events: broadcast::Sender<SessionEvent>,
}

fn error_text(outcome: &Result<String>) -> Option<String> {
    outcome.as_ref().err().map(ToString::to_string)
}

impl Session {
    pub fn new(backend: Arc<dyn BranchBackend>) -> Self {
        Self::with_workspace(backend, Workspace::new())
    }

    pub fn with_workspace(backend: Arc<dyn BranchBackend>, workspace: Workspace) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            workspace: Arc::new(RwLock::new(workspace)),
            backend,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Clone of the current state.
    pub async fn snapshot(&self) -> Workspace {
        self.workspace.read().await.clone()
    }

    /// Run `f` against the current state without cloning it.
    pub async fn read<R>(&self, f: impl FnOnce(&Workspace) -> R) -> R {
        f(&*self.workspace.read().await)
    }

    fn publish(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    /// Drain a response body, applying every snapshot under the lock.
    async fn drain<F>(&self, opened: Result<ByteStream, LLMError>, mut apply: F) -> Result<String>
    where
        F: FnMut(&mut Workspace, &str) -> Option<SessionEvent> + Send,
    {
        let mut stream = snapshots(opened?);
        let mut latest = String::new();

        while let Some(snapshot) = stream.next().await {
            latest = snapshot?;
            let event = {
                let mut workspace = self.workspace.write().await;
                apply(&mut workspace, &latest)
            };
            if let Some(event) = event {
                self.publish(event);
            }
        }
        Ok(latest)
    }

    // ---- main conversation ----

    /// Send `text` on the main conversation and stream the reply.
    ///
    /// Returns the final reply. On a remote or decode failure the error is
    /// also written into the placeholder.
    pub async fn send_main(&self, text: &str) -> Result<String> {
        let ticket = self.workspace.write().await.begin_main_send(text)?;
        self.run_main(ticket).await
    }

    /// Truncate at `message_id` and regenerate from `new_text`.
    pub async fn submit_edit(&self, message_id: Uuid, new_text: &str) -> Result<String> {
        let ticket = self
            .workspace
            .write()
            .await
            .submit_edit(message_id, new_text)?;
        self.run_main(ticket).await
    }

    async fn run_main(&self, ticket: MainTicket) -> Result<String> {
        let placeholder_id = ticket.placeholder_id;
        let opened = self.backend.chat(&ticket.request).await;
        let outcome = self
            .drain(opened, |workspace, text| {
                workspace
                    .apply_main_update(placeholder_id, text)
                    .then(|| SessionEvent::MainUpdated {
                        message_id: placeholder_id,
                        text: text.to_string(),
                    })
            })
            .await;

        self.workspace
            .write()
            .await
            .finish_main(placeholder_id, outcome.clone().map(|_| ()));
        self.publish(SessionEvent::MainFinished {
            message_id: placeholder_id,
            error: error_text(&outcome),
        });
        outcome
    }

    pub async fn begin_edit(&self, message_id: Uuid) -> Result<String> {
        self.workspace.write().await.begin_edit(message_id)
    }

    pub async fn cancel_edit(&self) -> bool {
        self.workspace.write().await.cancel_edit()
    }

    pub async fn delete_note(&self, message_id: Uuid) -> Result<Message> {
        self.workspace.write().await.delete_note(message_id)
    }

    // ---- branches ----

    pub async fn open_branch(&self, anchor_text: &str) -> Uuid {
        self.workspace.write().await.open_branch(anchor_text)
    }

    pub async fn open_child_branch(&self, parent_id: Uuid, anchor_text: &str) -> Result<Uuid> {
        self.workspace
            .write()
            .await
            .open_child_branch(parent_id, anchor_text)
    }

    pub async fn close_branch(&self, id: Uuid) -> Result<BranchNode> {
        self.workspace.write().await.close_branch(id)
    }

    pub async fn set_draft(&self, id: Uuid, text: &str) -> Result<()> {
        self.workspace.write().await.set_draft(id, text)
    }

    /// Send `text` inside branch `id` and stream the reply into it.
    pub async fn send_branch(&self, id: Uuid, text: &str) -> Result<String> {
        let request = self.workspace.write().await.begin_branch_send(id, text)?;
        let opened = self.backend.branch_turn(&request).await;
        let outcome = self
            .drain(opened, |workspace, text| {
                workspace
                    .apply_branch_update(id, text)
                    .then(|| SessionEvent::BranchUpdated {
                        node_id: id,
                        text: text.to_string(),
                    })
            })
            .await;

        self.workspace
            .write()
            .await
            .finish_branch_send(id, outcome.clone().map(|_| ()));
        self.publish(SessionEvent::BranchFinished {
            node_id: id,
            error: error_text(&outcome),
        });
        outcome
    }

    /// Summarize branch `id` and fold it into its parent (or the main log).
    pub async fn merge(&self, id: Uuid) -> Result<MergeOutcome> {
        let request = self.workspace.write().await.begin_merge(id)?;
        tracing::debug!(node_id = %id, "Session: requesting branch summary");

        let opened = self.backend.branch_summary(&request).await;
        let summary = self.stream_summary(id, opened).await;

        let finished = self.workspace.write().await.finish_merge(id, summary);
        match &finished {
            Ok(outcome) => self.publish(SessionEvent::Merged {
                node_id: id,
                destination: outcome.destination.clone(),
            }),
            Err(err) => self.publish(SessionEvent::MergeFailed {
                node_id: id,
                error: err.to_string(),
            }),
        }
        finished
    }

    /// Collect a summary body, publishing its progress. The node stays
    /// `Merging` until the final text is applied.
    async fn stream_summary(
        &self,
        id: Uuid,
        opened: Result<ByteStream, LLMError>,
    ) -> Result<String> {
        let mut stream = snapshots(opened?);
        let mut latest = String::new();

        while let Some(snapshot) = stream.next().await {
            latest = snapshot?;
            self.publish(SessionEvent::MergeUpdated {
                node_id: id,
                text: latest.clone(),
            });
        }
        Ok(latest)
    }
}
