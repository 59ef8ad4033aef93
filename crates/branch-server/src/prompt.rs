//! Request bodies and upstream prompt assembly for the three endpoints.
//!
//! Bodies are parsed leniently: unreadable JSON becomes an empty body, and
//! list entries without a usable `role`/`content` pair are skipped.

use branch_core::{cap_anchor, Role, WireMessage};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{AppError, Result};

pub const SELECTED_CONTEXT_PREFIX: &str = "Selected Context:\n";
pub const TRANSCRIPT_HEADER: &str = "Below is the branch conversation transcript:";
pub const SUMMARY_INSTRUCTION: &str = "Write a concise summary of the branch conversation for a student.\n\
- 5–8 bullet points\n\
- 1-line key takeaway at the end\n\
- Do NOT repeat the full selected text; focus on the conversation's conclusions and clarifications.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ChatBody {
    pub messages: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BranchBody {
    pub selection: Option<String>,
    pub history: Option<Vec<Value>>,
    pub question: Option<String>,
    pub popup_turns: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SummaryBody {
    pub selection: Option<String>,
    pub history: Option<Vec<Value>>,
    pub popup_turns: Option<Vec<Value>>,
}

pub fn parse_body<T: DeserializeOwned + Default>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap_or_else(|err| {
        log::debug!("unreadable request body, treating as empty: {}", err);
        T::default()
    })
}

fn role_of(entry: &Value) -> Option<Role> {
    serde_json::from_value(entry.get("role")?.clone()).ok()
}

/// `{role, content}` entries passed through as given.
fn context_entries(entries: &[Value]) -> impl Iterator<Item = WireMessage> + '_ {
    entries.iter().filter_map(|entry| {
        let role = role_of(entry)?;
        let content = entry.get("content")?.as_str()?;
        Some(WireMessage::new(role, content))
    })
}

/// Branch turns: user and assistant only, a missing content counts as empty.
fn turn_entries(entries: &[Value]) -> impl Iterator<Item = (Role, String)> + '_ {
    entries.iter().filter_map(|entry| {
        let role = role_of(entry).filter(|role| matches!(role, Role::User | Role::Assistant))?;
        let content = match entry.get("content") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(content)) => content.clone(),
            Some(_) => return None,
        };
        Some((role, content))
    })
}

fn selected_context(selection: Option<&str>) -> Result<WireMessage> {
    let selection = cap_anchor(selection.unwrap_or_default());
    if selection.trim().is_empty() {
        return Err(AppError::BadRequest("selection required".to_string()));
    }
    Ok(WireMessage::new(
        Role::User,
        format!("{SELECTED_CONTEXT_PREFIX}{selection}"),
    ))
}

pub fn chat_messages(body: &ChatBody) -> Vec<WireMessage> {
    context_entries(body.messages.as_deref().unwrap_or_default()).collect()
}

/// History, then the selected context, then the branch turns or the single
/// question.
pub fn branch_messages(body: &BranchBody) -> Result<Vec<WireMessage>> {
    let context = selected_context(body.selection.as_deref())?;

    let mut messages: Vec<WireMessage> =
        context_entries(body.history.as_deref().unwrap_or_default()).collect();
    messages.push(context);

    let turns = body.popup_turns.as_deref().unwrap_or_default();
    let question = body.question.as_deref().map(str::trim).unwrap_or_default();
    if !turns.is_empty() {
        messages.extend(turn_entries(turns).map(|(role, content)| WireMessage::new(role, content)));
    } else if !question.is_empty() {
        messages.push(WireMessage::new(Role::User, question));
    } else {
        return Err(AppError::BadRequest(
            "Provide either popup_turns or question".to_string(),
        ));
    }
    Ok(messages)
}

/// History, selected context, a labelled transcript, then the summary
/// instruction. Every added entry is sent as a user message.
pub fn summary_messages(body: &SummaryBody) -> Result<Vec<WireMessage>> {
    let context = selected_context(body.selection.as_deref())?;

    let mut messages: Vec<WireMessage> =
        context_entries(body.history.as_deref().unwrap_or_default()).collect();
    messages.push(context);

    let turns = body.popup_turns.as_deref().unwrap_or_default();
    if !turns.is_empty() {
        messages.push(WireMessage::new(Role::User, TRANSCRIPT_HEADER));
        messages.extend(turn_entries(turns).map(|(role, content)| {
            let prefix = if role == Role::User { "User:" } else { "Assistant:" };
            WireMessage::new(Role::User, format!("{prefix} {content}"))
        }));
    }

    messages.push(WireMessage::new(Role::User, SUMMARY_INSTRUCTION));
    Ok(messages)
}
