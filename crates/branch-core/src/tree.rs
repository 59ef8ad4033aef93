//! Arena of branch nodes keyed by id.
//!
//! Parent links are plain ids; children are found by scanning the arena, so
//! removing a node is a single key delete.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BranchError, Result};
use crate::types::BranchNode;
use crate::MAX_DEPTH;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchTree {
    nodes: HashMap<Uuid, BranchNode>,
    next_seq: u64,
}

impl BranchTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&BranchNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: Uuid) -> Option<&mut BranchNode> {
        self.nodes.get_mut(&id)
    }

    pub(crate) fn require(&self, id: Uuid) -> Result<&BranchNode> {
        self.nodes
            .get(&id)
            .ok_or_else(|| BranchError::NotFound(format!("branch {id}")))
    }

    pub(crate) fn require_mut(&mut self, id: Uuid) -> Result<&mut BranchNode> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| BranchError::NotFound(format!("branch {id}")))
    }

    /// All nodes in opening order.
    pub fn nodes(&self) -> Vec<&BranchNode> {
        let mut nodes: Vec<&BranchNode> = self.nodes.values().collect();
        nodes.sort_by_key(|node| node.seq);
        nodes
    }

    /// Direct children of `id`, in opening order.
    pub fn children(&self, id: Uuid) -> Vec<&BranchNode> {
        let mut children: Vec<&BranchNode> = self
            .nodes
            .values()
            .filter(|node| node.parent_id == Some(id))
            .collect();
        children.sort_by_key(|node| node.seq);
        children
    }

    pub fn child_count(&self, id: Uuid) -> usize {
        self.nodes
            .values()
            .filter(|node| node.parent_id == Some(id))
            .count()
    }

    /// Ids from the top-level ancestor down to `id` itself.
    pub fn lineage(&self, id: Uuid) -> Vec<Uuid> {
        let mut chain = Vec::new();
        let mut cursor = self.nodes.get(&id);
        while let Some(node) = cursor {
            chain.push(node.id);
            cursor = node.parent_id.and_then(|parent| self.nodes.get(&parent));
        }
        chain.reverse();
        chain
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Open a depth-1 branch hanging off the main conversation.
    pub fn open_top_level(&mut self, anchor_text: &str) -> Uuid {
        let seq = self.next_seq();
        let node = BranchNode::new(None, 1, anchor_text, seq);
        let id = node.id;
        tracing::info!(
            node_id = %id,
            anchor_len = anchor_text.len(),
            "BranchTree: opened top-level branch"
        );
        self.nodes.insert(id, node);
        id
    }

    /// Open a branch nested under `parent_id`.
    pub fn open_child(&mut self, parent_id: Uuid, anchor_text: &str) -> Result<Uuid> {
        let parent_depth = self.require(parent_id)?.depth;
        if parent_depth >= MAX_DEPTH {
            tracing::debug!(
                parent_id = %parent_id,
                parent_depth,
                "BranchTree: refusing child beyond depth limit"
            );
            return Err(BranchError::DepthExceeded {
                depth: parent_depth,
            });
        }

        let seq = self.next_seq();
        let node = BranchNode::new(Some(parent_id), parent_depth + 1, anchor_text, seq);
        let id = node.id;
        tracing::info!(
            node_id = %id,
            parent_id = %parent_id,
            depth = node.depth,
            "BranchTree: opened child branch"
        );
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Check that `id` exists, is not busy and has no children.
    pub(crate) fn ensure_removable(&self, id: Uuid) -> Result<&BranchNode> {
        let node = self.require(id)?;
        let children = self.child_count(id);
        if children > 0 {
            return Err(BranchError::HasLiveChildren { children });
        }
        if node.status.is_busy() {
            return Err(BranchError::Busy(format!("branch {id}")));
        }
        Ok(node)
    }

    /// Remove a childless, idle node. Ancestors and siblings are untouched.
    pub fn close(&mut self, id: Uuid) -> Result<BranchNode> {
        self.ensure_removable(id)?;
        self.remove(id)
    }

    pub(crate) fn remove(&mut self, id: Uuid) -> Result<BranchNode> {
        let node = self
            .nodes
            .remove(&id)
            .ok_or_else(|| BranchError::NotFound(format!("branch {id}")))?;
        tracing::info!(
            node_id = %id,
            depth = node.depth,
            turns = node.turns.len(),
            "BranchTree: removed branch"
        );
        Ok(node)
    }
}
