// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A named node in the agent tree; one-to-one with a [`crate::session::Session`].

use crate::id::{AgentId, SessionId, WorkspaceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Idle,
    Busy,
    Waiting,
    Terminated,
}

impl AgentState {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentState::Idle => "IDLE",
            AgentState::Busy => "BUSY",
            AgentState::Waiting => "WAITING",
            AgentState::Terminated => "TERMINATED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentNode {
    pub session_id: SessionId,
    pub id: AgentId,
    pub name: String,
    pub parent_id: Option<AgentId>,
    pub children: Vec<AgentId>,
    pub instructions: String,
    pub workspace_id: Option<WorkspaceId>,
    pub state: AgentState,
    pub created_at: DateTime<Utc>,
}

impl AgentNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub struct AgentNodeBuilder {
    session_id: SessionId,
    id: AgentId,
    name: String,
    parent_id: Option<AgentId>,
    children: Vec<AgentId>,
    instructions: String,
    workspace_id: Option<WorkspaceId>,
    state: AgentState,
    created_at: DateTime<Utc>,
}

#[cfg(any(test, feature = "test-support"))]
impl AgentNode {
    pub fn builder(id: impl Into<AgentId>, session_id: impl Into<SessionId>) -> AgentNodeBuilder {
        AgentNodeBuilder {
            session_id: session_id.into(),
            id: id.into(),
            name: "agent".into(),
            parent_id: None,
            children: Vec::new(),
            instructions: String::new(),
            workspace_id: None,
            state: AgentState::Idle,
            created_at: Utc::now(),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl AgentNodeBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn parent(mut self, parent: impl Into<AgentId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn state(mut self, state: AgentState) -> Self {
        self.state = state;
        self
    }

    pub fn build(self) -> AgentNode {
        AgentNode {
            session_id: self.session_id,
            id: self.id,
            name: self.name,
            parent_id: self.parent_id,
            children: self.children,
            instructions: self.instructions,
            workspace_id: self.workspace_id,
            state: self.state,
            created_at: self.created_at,
        }
    }
}
