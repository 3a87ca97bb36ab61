// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single-threaded cooperative core: the agent tree and its router,
//! per-agent inboxes, the provider-session multiplexer, the turn scheduler,
//! and the tool surface built on top of all four. Orchestration (startup,
//! recovery, the daemon's protocol loop) lives in `substrat-daemon`, which
//! composes these pieces but does not reimplement their invariants.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::panic))]

mod inbox;
mod multiplexer;
mod scheduler;
mod tools;
mod tree;
mod util;

pub use inbox::{Inbox, InboxTable};
pub use multiplexer::{EvictionSink, SessionMultiplexer};
pub use scheduler::{DeferredSpawn, DeferredWork, TurnScheduler};
pub use tools::ToolHandler;
pub use tree::{AgentTree, Router};
