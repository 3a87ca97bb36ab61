// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Newtype identifiers and the generators that produce them.
//!
//! Every id in this system is a 32-char lowercase hex string (no dashes),
//! produced by [`IdGen::next`]. Production code uses [`UuidIdGen`];
//! deterministic tests use [`SequentialIdGen`].

use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shorten a hex id for display in logs.
pub trait ShortId {
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        let end = self.len().min(n);
        &self[..end]
    }
}

macro_rules! define_id {
    ($(#[$meta:meta])* $vis:vis struct $name:ident;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        $vis struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn short(&self, n: usize) -> &str {
                self.0.short(n)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id! {
    /// Identifies a [`crate::session::Session`].
    pub struct SessionId;
}

define_id! {
    /// Identifies an [`crate::agent::AgentNode`].
    pub struct AgentId;
}

define_id! {
    /// Identifies a [`crate::message::MessageEnvelope`].
    pub struct MessageId;
}

define_id! {
    /// Opaque handle to a workspace directory; workspace sandboxing itself
    /// lives outside this crate.
    pub struct WorkspaceId;
}

/// Generates fresh ids. `Clone + Send + Sync` so it can be shared across the
/// event loop's worker-pool offloads without extra locking.
pub trait IdGen: Clone + Send + Sync {
    fn next(&self) -> String;
}

/// Production id generator: 32-char lowercase hex, no dashes.
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Deterministic id generator for tests: `{prefix}-{n}`.
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}
