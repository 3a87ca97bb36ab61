// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixed-slot LRU holding live provider sessions, partitioned into held
//! (currently in a send) and released (evictable).
//!
//! The `released` partition is an [`IndexMap`] rather than a `HashMap`:
//! insertion order is preserved and moving an entry to "most recently
//! released" is a remove-then-reinsert, giving O(1) LRU bookkeeping without
//! a separate linked list — the same trick the rest of this codebase reaches
//! for wherever order-preserving map semantics are needed.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use substrat_core::{CoreError, SessionId};
use substrat_providers::{AgentProvider, ProviderSession};

/// Persistence hook invoked when the multiplexer needs to evict the LRU
/// released session to free a slot. Keeps the multiplexer itself free of
/// any dependency on storage.
#[async_trait]
pub trait EvictionSink: Send + Sync {
    async fn on_evict(&self, session_id: &SessionId, provider_state: Vec<u8>) -> Result<(), CoreError>;
}

pub struct SessionMultiplexer {
    max_slots: usize,
    held: HashMap<SessionId, Box<dyn ProviderSession>>,
    released: IndexMap<SessionId, Box<dyn ProviderSession>>,
}

impl SessionMultiplexer {
    pub fn new(max_slots: usize) -> Self {
        Self {
            max_slots,
            held: HashMap::new(),
            released: IndexMap::new(),
        }
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.held.contains_key(id) || self.released.contains_key(id)
    }

    fn total_len(&self) -> usize {
        self.held.len() + self.released.len()
    }

    /// Evicts the LRU released session if the multiplexer is at capacity.
    /// Fails with `SlotsExhausted` if all slots are held.
    async fn ensure_slot(&mut self, sink: &dyn EvictionSink) -> Result<(), CoreError> {
        if self.total_len() < self.max_slots {
            return Ok(());
        }
        let (victim_id, mut victim_ps) = self
            .released
            .shift_remove_index(0)
            .ok_or(CoreError::SlotsExhausted)?;
        let state = victim_ps
            .suspend()
            .await
            .map_err(|e| CoreError::ProviderFailure(e.to_string()))?;
        sink.on_evict(&victim_id, state).await
    }

    /// Inserts a freshly-created session into the held set, evicting the
    /// LRU released session first if the slot budget is exceeded.
    pub async fn put(
        &mut self,
        session_id: SessionId,
        ps: Box<dyn ProviderSession>,
        sink: &dyn EvictionSink,
    ) -> Result<(), CoreError> {
        self.ensure_slot(sink).await?;
        self.held.insert(session_id, ps);
        Ok(())
    }

    /// Returns `true` if the session had to be restored from
    /// `provider_state` (the caller should log `session.restored`), `false`
    /// if it was already cached.
    pub async fn acquire(
        &mut self,
        session_id: &SessionId,
        provider: &dyn AgentProvider,
        provider_state: &[u8],
        sink: &dyn EvictionSink,
    ) -> Result<bool, CoreError> {
        if let Some(ps) = self.released.shift_remove(session_id) {
            self.held.insert(session_id.clone(), ps);
            return Ok(false);
        }
        if self.held.contains_key(session_id) {
            return Ok(false);
        }
        self.ensure_slot(sink).await?;
        let ps = provider
            .restore(provider_state)
            .await
            .map_err(|e| CoreError::ProviderFailure(e.to_string()))?;
        self.held.insert(session_id.clone(), ps);
        Ok(true)
    }

    /// Moves a held session to released (most-recent end of the LRU).
    pub fn release(&mut self, session_id: &SessionId) {
        if let Some(ps) = self.held.remove(session_id) {
            self.released.shift_remove(session_id);
            self.released.insert(session_id.clone(), ps);
        }
    }

    /// Stops and drops the session without saving state; the caller owns
    /// persisting SUSPENDED/TERMINATED.
    pub async fn remove(&mut self, session_id: &SessionId) -> Result<(), CoreError> {
        let ps = self
            .held
            .remove(session_id)
            .or_else(|| self.released.shift_remove(session_id));
        if let Some(mut ps) = ps {
            ps.stop()
                .await
                .map_err(|e| CoreError::ProviderFailure(e.to_string()))?;
        }
        Ok(())
    }

    /// Forces a specific session out of memory via the eviction path,
    /// regardless of LRU order — used by `session.suspend` at the protocol
    /// layer. Returns `false` if the session isn't currently cached (it was
    /// already suspended/terminated on disk).
    pub async fn force_suspend(
        &mut self,
        session_id: &SessionId,
        sink: &dyn EvictionSink,
    ) -> Result<bool, CoreError> {
        let ps = self
            .held
            .remove(session_id)
            .or_else(|| self.released.shift_remove(session_id));
        let Some(mut ps) = ps else {
            return Ok(false);
        };
        let state = ps
            .suspend()
            .await
            .map_err(|e| CoreError::ProviderFailure(e.to_string()))?;
        sink.on_evict(session_id, state).await?;
        Ok(true)
    }

    pub fn held_mut(&mut self, id: &SessionId) -> Option<&mut Box<dyn ProviderSession>> {
        self.held.get_mut(id)
    }

    pub fn held_len(&self) -> usize {
        self.held.len()
    }

    pub fn released_len(&self) -> usize {
        self.released.len()
    }
}

#[cfg(test)]
#[path = "multiplexer_tests.rs"]
mod tests;
