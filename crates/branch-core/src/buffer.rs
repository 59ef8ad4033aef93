//! Append-only entry logs with in-place rewrite of a streaming entry.
//!
//! The main conversation ([`MessageLog`]) and every branch's transcript
//! ([`TurnBuffer`]) are mutated exclusively through the methods here.

use serde::{Deserialize, Serialize};

use crate::payload::WireMessage;
use crate::types::{Message, Role, Turn};

/// Common view over [`Message`] and [`Turn`].
pub trait Entry {
    fn role(&self) -> Role;
    fn content(&self) -> &str;
    fn is_note(&self) -> bool;
    fn set_content(&mut self, content: &str);

    fn to_wire(&self) -> WireMessage {
        WireMessage {
            role: self.role(),
            content: self.content().to_string(),
        }
    }
}

impl Entry for Message {
    fn role(&self) -> Role {
        self.role
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn is_note(&self) -> bool {
        self.is_note
    }

    fn set_content(&mut self, content: &str) {
        if self.content != content {
            self.content.clear();
            self.content.push_str(content);
        }
    }
}

impl Entry for Turn {
    fn role(&self) -> Role {
        self.role
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn is_note(&self) -> bool {
        self.is_note
    }

    fn set_content(&mut self, content: &str) {
        if self.content != content {
            self.content.clear();
            self.content.push_str(content);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryLog<T> {
    entries: Vec<T>,
}

pub type MessageLog = EntryLog<Message>;
pub type TurnBuffer = EntryLog<Turn>;

impl<T> Default for EntryLog<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> From<Vec<T>> for EntryLog<T> {
    fn from(entries: Vec<T>) -> Self {
        Self { entries }
    }
}

impl<T: Entry> EntryLog<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last()
    }

    pub fn append(&mut self, entry: T) {
        self.entries.push(entry);
    }

    pub fn extend<I: IntoIterator<Item = T>>(&mut self, entries: I) {
        self.entries.extend(entries);
    }

    /// Replace the content of the last entry matching `predicate`.
    ///
    /// Returns `false` when nothing matched. Rewriting with the text already
    /// present leaves the log unchanged.
    pub fn rewrite_last_matching<P>(&mut self, predicate: P, content: &str) -> bool
    where
        P: Fn(&T) -> bool,
    {
        match self.entries.iter_mut().rev().find(|entry| predicate(entry)) {
            Some(entry) => {
                entry.set_content(content);
                true
            }
            None => false,
        }
    }

    pub fn position<P>(&self, predicate: P) -> Option<usize>
    where
        P: Fn(&T) -> bool,
    {
        self.entries.iter().position(predicate)
    }

    /// Drop every entry from `index` on and return them.
    pub(crate) fn truncate_at(&mut self, index: usize) -> Vec<T> {
        if index >= self.entries.len() {
            return Vec::new();
        }
        self.entries.split_off(index)
    }

    pub(crate) fn remove_at(&mut self, index: usize) -> Option<T> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Wire form of every entry, in order.
    pub fn to_wire(&self) -> Vec<WireMessage> {
        self.entries.iter().map(T::to_wire).collect()
    }

    /// Owned snapshot of the last `size` entries in wire form.
    pub fn window(&self, size: usize) -> Vec<WireMessage> {
        let start = self.entries.len().saturating_sub(size);
        self.entries[start..].iter().map(T::to_wire).collect()
    }
}
