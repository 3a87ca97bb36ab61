// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The recognized event vocabulary written to per-agent event logs.
//!
//! An [`Event`] is a typed, write-side convenience: it knows its own
//! `event` name and how to render its `data` payload as JSON. The storage
//! layer only ever sees `(name, data)` pairs — it has no notion of this
//! enum, which keeps the on-disk format (§6) independent of any one
//! language's enum representation.

use crate::id::{AgentId, MessageId, SessionId};
use crate::message::MessageKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub enum Event {
    TurnStart {
        prompt: String,
    },
    TurnComplete {
        response: String,
    },
    SuspendResult {
        state_size: usize,
    },
    SessionRestored {
        provider: String,
        model: String,
    },
    AgentCreated {
        agent_id: AgentId,
        name: String,
        parent_session_id: Option<SessionId>,
        instructions: String,
    },
    AgentTerminated {
        agent_id: AgentId,
    },
    MessageEnqueued {
        message_id: MessageId,
        sender: AgentId,
        recipient: Option<AgentId>,
        kind: MessageKind,
        payload: String,
        timestamp: DateTime<Utc>,
        reply_to: Option<MessageId>,
        metadata: HashMap<String, String>,
    },
    MessageDelivered {
        message_id: MessageId,
    },
    /// Not part of the recognized per-agent vocabulary; logged once to a
    /// daemon-level log at startup for observability only. Recovery never
    /// reads it back.
    DaemonStarted {
        version: String,
    },
    DaemonRecovered {
        agent_count: usize,
        session_count: usize,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::TurnStart { .. } => "turn.start",
            Event::TurnComplete { .. } => "turn.complete",
            Event::SuspendResult { .. } => "suspend.result",
            Event::SessionRestored { .. } => "session.restored",
            Event::AgentCreated { .. } => "agent.created",
            Event::AgentTerminated { .. } => "agent.terminated",
            Event::MessageEnqueued { .. } => "message.enqueued",
            Event::MessageDelivered { .. } => "message.delivered",
            Event::DaemonStarted { .. } => "daemon.started",
            Event::DaemonRecovered { .. } => "daemon.recovered",
        }
    }

    pub fn data(&self) -> Value {
        match self {
            Event::TurnStart { prompt } => json!({ "prompt": prompt }),
            Event::TurnComplete { response } => json!({ "response": response }),
            Event::SuspendResult { state_size } => json!({ "state_size": state_size }),
            Event::SessionRestored { provider, model } => {
                json!({ "provider": provider, "model": model })
            }
            Event::AgentCreated {
                agent_id,
                name,
                parent_session_id,
                instructions,
            } => json!({
                "agent_id": agent_id,
                "name": name,
                "parent_session_id": parent_session_id,
                "instructions": instructions,
            }),
            Event::AgentTerminated { agent_id } => json!({ "agent_id": agent_id }),
            Event::MessageEnqueued {
                message_id,
                sender,
                recipient,
                kind,
                payload,
                timestamp,
                reply_to,
                metadata,
            } => json!({
                "message_id": message_id,
                "sender": sender,
                "recipient": recipient,
                "kind": kind,
                "payload": payload,
                "timestamp": timestamp,
                "reply_to": reply_to,
                "metadata": metadata,
            }),
            Event::MessageDelivered { message_id } => json!({ "message_id": message_id }),
            Event::DaemonStarted { version } => json!({ "version": version }),
            Event::DaemonRecovered {
                agent_count,
                session_count,
            } => json!({ "agent_count": agent_count, "session_count": session_count }),
        }
    }
}

/// Read-side DTO for `agent.created`, used by recovery to rebuild the tree.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentCreatedData {
    pub agent_id: AgentId,
    pub name: String,
    pub parent_session_id: Option<SessionId>,
    pub instructions: String,
}

/// Read-side DTO for `message.enqueued`, used by recovery to rebuild inboxes.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageEnqueuedData {
    pub message_id: MessageId,
    pub sender: AgentId,
    pub recipient: Option<AgentId>,
    pub kind: MessageKind,
    pub payload: String,
    pub timestamp: DateTime<Utc>,
    pub reply_to: Option<MessageId>,
    pub metadata: HashMap<String, String>,
}

/// Read-side DTO for `message.delivered`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MessageDeliveredData {
    pub message_id: MessageId,
}
