use std::future::Future;
use std::io::{self, Write};

use anyhow::{anyhow, Context};
use branch_core::{MergeDestination, NodeStatus, Workspace};
use branch_session::{Session, SessionEvent};
use colored::Colorize;
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use uuid::Uuid;

use crate::command::{parse, Command, Target, HELP};
use crate::render::{branch_row, message_line, ordered_branches, turn_line, StreamPrinter};

pub struct Repl {
    session: Session,
    /// `None` means the main conversation.
    focus: Option<Uuid>,
}

impl Repl {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            focus: None,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        println!("{}", "Branching chat".cyan().bold());
        println!("{}", "Type /help for commands, /quit to leave".dimmed());
        println!();

        loop {
            print!("{} ", self.prompt().await);
            io::stdout().flush()?;

            let mut line = String::new();
            if io::stdin().read_line(&mut line)? == 0 {
                break;
            }

            let command = match parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    println!("{}", format!("❌ {err}").red());
                    continue;
                }
            };
            if command == Command::Quit {
                println!("{}", "👋 Goodbye!".cyan());
                break;
            }
            if let Err(err) = self.execute(command).await {
                println!("{}", format!("❌ {err}").red());
            }
        }
        Ok(())
    }

    async fn prompt(&self) -> String {
        match self.focus {
            None => "main>".cyan().bold().to_string(),
            Some(id) => {
                let depth = self
                    .session
                    .read(|ws| ws.node(id).map(|node| node.depth))
                    .await
                    .unwrap_or_default();
                format!("branch L{depth}>").yellow().bold().to_string()
            }
        }
    }

    /// Resolve a `/tree` position, defaulting to the focused branch.
    async fn branch_at(&self, position: Option<usize>) -> anyhow::Result<Uuid> {
        match position {
            None => self
                .focus
                .ok_or_else(|| anyhow!("no branch focused; give a branch number")),
            Some(position) => self
                .session
                .read(|ws| ordered_branches(ws).get(position - 1).map(|node| node.id))
                .await
                .ok_or_else(|| anyhow!("no branch number {position}, see /tree")),
        }
    }

    async fn message_at(&self, position: usize) -> anyhow::Result<Uuid> {
        self.session
            .read(|ws| ws.messages().entries().get(position - 1).map(|m| m.id))
            .await
            .ok_or_else(|| anyhow!("no message number {position}, see /show"))
    }

    async fn execute(&mut self, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Say(text) => match self.focus {
                None => {
                    println!("{}", "Assistant:".green().bold());
                    with_live_output(&self.session, self.session.send_main(&text)).await?;
                }
                Some(id) => {
                    println!("{}", "Branch:".yellow().bold());
                    with_live_output(&self.session, self.session.send_branch(id, &text)).await?;
                }
            },
            Command::Open(anchor) => {
                let id = self.session.open_branch(&anchor).await;
                self.focus = Some(id);
                println!("{}", "Opened branch L1".green());
            }
            Command::Child(anchor) => {
                let parent = self.branch_at(None).await?;
                let id = self.session.open_child_branch(parent, &anchor).await?;
                self.focus = Some(id);
                let depth = self
                    .session
                    .read(|ws| ws.node(id).map(|node| node.depth))
                    .await
                    .unwrap_or_default();
                println!("{}", format!("Opened branch L{depth}").green());
            }
            Command::Focus(Target::Main) => self.focus = None,
            Command::Focus(Target::Branch(position)) => {
                self.focus = Some(self.branch_at(Some(position)).await?);
            }
            Command::Merge(position) => {
                let id = self.branch_at(position).await?;
                println!("{}", "Summarizing branch…".dimmed());
                let outcome = with_live_output(&self.session, self.session.merge(id)).await?;
                match outcome.destination {
                    MergeDestination::Main { .. } => {
                        println!("{}", "✅ Merged into the main conversation".green());
                        if self.focus == Some(id) {
                            self.focus = None;
                        }
                    }
                    MergeDestination::Branch { parent_id } => {
                        println!("{}", "✅ Merged into the parent branch".green());
                        if self.focus == Some(id) {
                            self.focus = Some(parent_id);
                        }
                    }
                }
            }
            Command::Close(position) => {
                let id = self.branch_at(position).await?;
                let closed = self.session.close_branch(id).await?;
                if self.focus == Some(id) {
                    self.focus = closed.parent_id;
                }
                println!("{}", "Branch closed".dimmed());
            }
            Command::Edit { message, text } => {
                let id = self.message_at(message).await?;
                self.session
                    .begin_edit(id)
                    .await
                    .context("cannot edit that message")?;
                self.focus = None;
                println!("{}", "Assistant:".green().bold());
                let result =
                    with_live_output(&self.session, self.session.submit_edit(id, &text)).await;
                if result.is_err() {
                    self.session.cancel_edit().await;
                }
                result?;
            }
            Command::DeleteNote(message) => {
                let id = self.message_at(message).await?;
                self.session.delete_note(id).await?;
                println!("{}", "Note deleted".dimmed());
            }
            Command::Tree => {
                let lines = self.session.read(|ws| tree_lines(ws, self.focus)).await;
                if lines.is_empty() {
                    println!("{}", "No open branches".dimmed());
                }
                for (line, status) in lines {
                    match status {
                        NodeStatus::Error => println!("{}", line.red()),
                        NodeStatus::Generating | NodeStatus::Merging => {
                            println!("{}", line.yellow())
                        }
                        NodeStatus::Idle => println!("{line}"),
                    }
                }
            }
            Command::Show => {
                let lines = self.session.read(|ws| conversation_lines(ws, self.focus)).await;
                for line in lines {
                    println!("{line}");
                }
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => {}
        }
        Ok(())
    }
}

/// Drive `op` while printing the text it streams as it arrives.
pub async fn with_live_output<F, T>(session: &Session, op: F) -> T
where
    F: Future<Output = T>,
{
    stream_output(session.subscribe(), op, print_now).await
}

/// Drive `op`, feeding the new text of every received event to `sink`.
///
/// Events carry accumulated text, so after a lag the next event still
/// yields everything not yet printed.
async fn stream_output<F, T>(
    mut events: broadcast::Receiver<SessionEvent>,
    op: F,
    mut sink: impl FnMut(&str),
) -> T
where
    F: Future<Output = T>,
{
    let mut printer = StreamPrinter::default();

    tokio::pin!(op);
    loop {
        tokio::select! {
            result = &mut op => {
                loop {
                    match events.try_recv() {
                        Ok(event) => {
                            if let Some(text) = printer.delta(&event) {
                                sink(&text);
                            }
                        }
                        Err(TryRecvError::Lagged(_)) => continue,
                        Err(_) => return result,
                    }
                }
            }
            received = events.recv() => match received {
                Ok(event) => {
                    if let Some(text) = printer.delta(&event) {
                        sink(&text);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "output fell behind the session");
                }
                Err(RecvError::Closed) => return (&mut op).await,
            },
        }
    }
}

fn print_now(text: &str) {
    print!("{text}");
    let _ = io::stdout().flush();
}

fn tree_lines(workspace: &Workspace, focus: Option<Uuid>) -> Vec<(String, NodeStatus)> {
    ordered_branches(workspace)
        .into_iter()
        .enumerate()
        .map(|(i, node)| (branch_row(i + 1, node, focus == Some(node.id)), node.status))
        .collect()
}

fn conversation_lines(workspace: &Workspace, focus: Option<Uuid>) -> Vec<String> {
    match focus.and_then(|id| workspace.node(id)) {
        None => workspace
            .messages()
            .iter()
            .enumerate()
            .map(|(i, message)| message_line(i + 1, message))
            .collect(),
        Some(node) => {
            let mut lines = vec![format!("anchor: {}", node.anchor_text)];
            lines.extend(node.turns.iter().map(turn_line));
            lines
        }
    }
}
