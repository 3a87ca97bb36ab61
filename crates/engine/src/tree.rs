// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent forest and its one-hop router. Pure in-memory data structure;
//! no I/O. The tree is *derived* from per-session event logs
//! (`agent.created`, `agent.terminated`) rather than persisted separately.

use std::collections::HashMap;
use substrat_core::{is_sentinel, AgentId, AgentNode, CoreError, SessionId};

#[derive(Default)]
pub struct AgentTree {
    nodes: HashMap<AgentId, AgentNode>,
    by_session: HashMap<SessionId, AgentId>,
}

impl AgentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `node`. Does not validate name uniqueness — that is
    /// [`ToolHandler`](crate::tools::ToolHandler)'s job before the node is
    /// constructed, since a duplicate must be rejected before any id is
    /// allocated.
    pub fn add(&mut self, node: AgentNode) {
        if let Some(parent_id) = node.parent_id.clone() {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                if !parent.children.contains(&node.id) {
                    parent.children.push(node.id.clone());
                }
            }
        }
        self.by_session.insert(node.session_id.clone(), node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    /// Removing a non-leaf is an error; callers must terminate leaves first.
    pub fn remove(&mut self, id: &AgentId) -> Result<AgentNode, CoreError> {
        let node = self
            .nodes
            .get(id)
            .ok_or_else(|| CoreError::not_found(format!("agent {id}")))?;
        if !node.children.is_empty() {
            return Err(CoreError::InvalidOperation(format!(
                "cannot remove non-leaf agent {id} with {} children",
                node.children.len()
            )));
        }
        let parent_id = node.parent_id.clone();
        let node = self.nodes.remove(id).expect("checked above");
        self.by_session.remove(&node.session_id);
        if let Some(parent_id) = parent_id {
            if let Some(parent) = self.nodes.get_mut(&parent_id) {
                parent.children.retain(|c| c != id);
            }
        }
        Ok(node)
    }

    pub fn get(&self, id: &AgentId) -> Option<&AgentNode> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &AgentId) -> Option<&mut AgentNode> {
        self.nodes.get_mut(id)
    }

    pub fn children(&self, id: &AgentId) -> Vec<AgentId> {
        self.nodes.get(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn parent(&self, id: &AgentId) -> Option<AgentId> {
        self.nodes.get(id).and_then(|n| n.parent_id.clone())
    }

    /// Siblings excluding `id` itself.
    pub fn team(&self, id: &AgentId) -> Vec<AgentId> {
        match self.parent(id) {
            Some(parent_id) => self
                .children(&parent_id)
                .into_iter()
                .filter(|c| c != id)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn roots(&self) -> Vec<AgentId> {
        self.nodes
            .values()
            .filter(|n| n.is_root())
            .map(|n| n.id.clone())
            .collect()
    }

    /// `id` and every descendant, in breadth-first order.
    pub fn subtree(&self, id: &AgentId) -> Vec<AgentId> {
        let mut out = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        queue.push_back(id.clone());
        while let Some(current) = queue.pop_front() {
            out.push(current.clone());
            for child in self.children(&current) {
                queue.push_back(child);
            }
        }
        out
    }

    pub fn by_name(&self, parent_id: &AgentId, name: &str) -> Option<AgentId> {
        self.children(parent_id)
            .into_iter()
            .find(|c| self.nodes.get(c).map(|n| n.name == name).unwrap_or(false))
    }

    pub fn by_session(&self, session_id: &SessionId) -> Option<AgentId> {
        self.by_session.get(session_id).cloned()
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Resolves `name` to an id among `sender`'s parent, children, and team
    /// (siblings) — the one-hop neighborhood `send_message` is allowed to
    /// address by name.
    pub fn resolve_one_hop_name(&self, sender: &AgentId, name: &str) -> Option<AgentId> {
        let candidates = self
            .parent(sender)
            .into_iter()
            .chain(self.children(sender))
            .chain(self.team(sender));
        candidates.filter(|id| id != sender).find(|id| {
            self.nodes
                .get(id)
                .map(|n| n.name == name)
                .unwrap_or(false)
        })
    }
}

/// One-hop validation and multicast resolution. Pure — no I/O.
pub struct Router;

impl Router {
    /// `recipient` is `parent(sender)`, a child of `sender`, or in
    /// `sender`'s team. Sentinels bypass the one-hop check but the
    /// non-sentinel side must exist.
    pub fn validate_route(
        tree: &AgentTree,
        sender: &AgentId,
        recipient: &AgentId,
    ) -> Result<(), CoreError> {
        if sender == recipient {
            return Err(CoreError::route_invalid("self-delivery is rejected"));
        }

        let sender_is_sentinel = is_sentinel(sender);
        let recipient_is_sentinel = is_sentinel(recipient);

        if sender_is_sentinel && recipient_is_sentinel {
            return Err(CoreError::route_invalid("both sender and recipient are sentinels"));
        }
        if sender_is_sentinel {
            if !tree.contains(recipient) {
                return Err(CoreError::route_invalid(format!("recipient {recipient} does not exist")));
            }
            return Ok(());
        }
        if recipient_is_sentinel {
            if !tree.contains(sender) {
                return Err(CoreError::route_invalid(format!("sender {sender} does not exist")));
            }
            return Ok(());
        }

        if !tree.contains(sender) {
            return Err(CoreError::route_invalid(format!("sender {sender} does not exist")));
        }
        if !tree.contains(recipient) {
            return Err(CoreError::route_invalid(format!("recipient {recipient} does not exist")));
        }

        let one_hop = tree.parent(sender).as_ref() == Some(recipient)
            || tree.children(sender).contains(recipient)
            || tree.team(sender).contains(recipient);

        if one_hop {
            Ok(())
        } else {
            Err(CoreError::route_invalid(format!(
                "{recipient} is not within one hop of {sender}"
            )))
        }
    }

    /// `recipient = None` expands to the sender's team.
    pub fn resolve_multicast(tree: &AgentTree, sender: &AgentId) -> Vec<AgentId> {
        tree.team(sender)
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tests;
