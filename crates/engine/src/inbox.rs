// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent FIFO message queue. Not persisted — on recovery it is rebuilt
//! from event-log `message.enqueued`/`message.delivered` events.

use std::collections::{HashMap, VecDeque};
use substrat_core::{AgentId, MessageEnvelope};

#[derive(Default)]
pub struct Inbox {
    queue: VecDeque<MessageEnvelope>,
}

impl Inbox {
    pub fn deliver(&mut self, envelope: MessageEnvelope) {
        self.queue.push_back(envelope);
    }

    /// Drains and returns envelopes in delivery order. No size limit; the
    /// caller is expected to process batches.
    pub fn collect(&mut self) -> Vec<MessageEnvelope> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Per-agent inbox registry owned by the orchestrator.
#[derive(Default)]
pub struct InboxTable {
    inboxes: HashMap<AgentId, Inbox>,
}

impl InboxTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliver(&mut self, recipient: AgentId, envelope: MessageEnvelope) {
        self.inboxes.entry(recipient).or_default().deliver(envelope);
    }

    pub fn collect(&mut self, agent: &AgentId) -> Vec<MessageEnvelope> {
        self.inboxes.get_mut(agent).map(Inbox::collect).unwrap_or_default()
    }

    pub fn remove(&mut self, agent: &AgentId) {
        self.inboxes.remove(agent);
    }
}
