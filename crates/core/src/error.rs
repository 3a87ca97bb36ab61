// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The error taxonomy shared by every layer. Lower crates define their own
//! `thiserror` enums for their own failure modes and convert into this one
//! at the boundary where a caller-facing result is produced.

use crate::id::{AgentId, SessionId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid session state transition for {session_id}: {from} -> {to}")]
    SessionState {
        session_id: SessionId,
        from: String,
        to: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("multiplexer has no evictable slot")]
    SlotsExhausted,

    #[error("route invalid: {reason}")]
    RouteInvalid { reason: String },

    #[error("name conflict: '{name}' already used within team of {parent}")]
    NameConflict { parent: AgentId, name: String },

    #[error("provider failure: {0}")]
    ProviderFailure(String),

    #[error("io failure: {0}")]
    IoFailure(String),

    #[error("corrupt event log: {0}")]
    CorruptLog(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn route_invalid(reason: impl Into<String>) -> Self {
        Self::RouteInvalid {
            reason: reason.into(),
        }
    }
}
