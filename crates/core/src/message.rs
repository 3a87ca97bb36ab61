// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelopes routed one hop at a time between agents.

use crate::id::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "REQUEST")]
    Request,
    #[serde(rename = "RESPONSE")]
    Response,
    #[serde(rename = "NOTIFICATION")]
    Notification,
    #[serde(rename = "MULTICAST")]
    Multicast,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub id: crate::id::MessageId,
    pub timestamp: DateTime<Utc>,
    pub sender: AgentId,
    pub recipient: Option<AgentId>,
    pub reply_to: Option<crate::id::MessageId>,
    pub kind: MessageKind,
    pub payload: String,
    pub metadata: HashMap<String, String>,
}

/// Reserved sentinel uuid for the daemon/system itself: all-zeros.
pub fn system_id() -> AgentId {
    AgentId::new("00000000000000000000000000000000".chars().take(32).collect::<String>())
}

/// Reserved sentinel uuid for the human operator: all-ones with the low bit
/// set, per the on-disk id format (32 lowercase hex chars).
pub fn user_id() -> AgentId {
    AgentId::new("ffffffffffffffffffffffffffffffff".to_string())
}

pub fn is_sentinel(id: &AgentId) -> bool {
    *id == system_id() || *id == user_id()
}
