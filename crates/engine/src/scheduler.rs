// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composes [`SessionStore`], providers, the [`SessionMultiplexer`], and
//! per-session [`EventLog`]s. Holds an in-memory session cache to avoid
//! re-reading the store every turn.
//!
//! The turn lifecycle in [`TurnScheduler::send_turn`] must be followed
//! exactly: acquire, send, *always* release, log and drain only on success.

use crate::multiplexer::{EvictionSink, SessionMultiplexer};
use crate::util::{log_err, open_log};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use substrat_core::{AgentId, Clock, CoreError, Event, IdGen, Session, SessionId, SessionState};
use substrat_providers::AgentProvider;
use substrat_storage::{EventLog, SessionStore, SessionStoreError};

/// Work deferred until after a turn's slot is released — today this is only
/// the provider-side half of `spawn_agent` (see [`crate::tools::ToolHandler`]).
#[derive(Debug, Clone)]
pub struct DeferredSpawn {
    pub agent_id: AgentId,
    pub session_id: SessionId,
    pub parent_session_id: Option<SessionId>,
    pub name: String,
    pub provider_name: String,
    pub model: String,
    pub instructions: String,
}

#[derive(Debug, Clone)]
pub enum DeferredWork {
    Spawn(DeferredSpawn),
}

pub struct TurnScheduler<C: Clock, G: IdGen> {
    agents_root: PathBuf,
    store: SessionStore,
    mux: SessionMultiplexer,
    providers: HashMap<String, Arc<dyn AgentProvider>>,
    cache: Mutex<HashMap<SessionId, Session>>,
    deferred: VecDeque<DeferredWork>,
    clock: C,
    id_gen: G,
}

impl<C: Clock, G: IdGen> TurnScheduler<C, G> {
    pub fn new(
        agents_root: PathBuf,
        providers: HashMap<String, Arc<dyn AgentProvider>>,
        max_slots: usize,
        clock: C,
        id_gen: G,
    ) -> Self {
        Self {
            store: SessionStore::new(agents_root.clone()),
            agents_root,
            mux: SessionMultiplexer::new(max_slots),
            providers,
            cache: Mutex::new(HashMap::new()),
            deferred: VecDeque::new(),
            clock,
            id_gen,
        }
    }

    pub fn session(&self, id: &SessionId) -> Option<Session> {
        self.cache.lock().get(id).cloned()
    }

    /// All cached sessions, in no particular order (the `session.list` RPC).
    pub fn all_sessions(&self) -> Vec<Session> {
        self.cache.lock().values().cloned().collect()
    }

    /// Seeds the cache from a recovery scan; does not touch the multiplexer.
    pub fn seed_cache(&mut self, sessions: Vec<Session>) {
        let mut cache = self.cache.lock();
        for session in sessions {
            cache.insert(session.id.clone(), session);
        }
    }

    /// Runs `SessionStore.recover()` (flip ACTIVE->SUSPENDED, persist) and
    /// seeds the cache with the result — recovery procedure step 1.
    pub fn recover(&mut self, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<Session>, CoreError> {
        let sessions = self.store.recover(now).map_err(store_err)?;
        self.seed_cache(sessions.clone());
        Ok(sessions)
    }

    /// Force-transitions a cached session straight to TERMINATED without
    /// touching the multiplexer — used for orphan sessions discovered
    /// during recovery, which never had a live provider session to stop.
    pub fn mark_terminated(&mut self, session_id: &SessionId) -> Result<(), CoreError> {
        let now = self.clock.now();
        let mut session = self
            .cache
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("session {session_id}")))?;
        session.transition_to(SessionState::Terminated, now)?;
        self.store.save(&session).map_err(store_err)?;
        self.cache.lock().insert(session_id.clone(), session);
        Ok(())
    }

    /// Deletes a session's on-disk record and event log. Only legal once
    /// TERMINATED — the `session.delete` RPC's precondition.
    pub async fn delete_session(&mut self, session_id: &SessionId) -> Result<(), CoreError> {
        let session = self
            .cache
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("session {session_id}")))?;
        if session.state != SessionState::Terminated {
            return Err(CoreError::InvalidOperation(format!(
                "session {session_id} must be TERMINATED before it can be deleted (is {})",
                session.state.as_str()
            )));
        }
        self.store.delete(session_id).map_err(store_err)?;
        self.cache.lock().remove(session_id);
        Ok(())
    }

    pub fn defer(&mut self, work: DeferredWork) {
        self.deferred.push_back(work);
    }

    fn provider_for(&self, name: &str) -> Result<Arc<dyn AgentProvider>, CoreError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("provider '{name}'")))
    }

    fn open_log(&self, session_id: &SessionId) -> Result<EventLog, CoreError> {
        open_log(&self.agents_root, session_id)
    }

    fn sink(&self) -> EvictionPersist<'_, C> {
        EvictionPersist {
            store: &self.store,
            agents_root: self.agents_root.as_path(),
            cache: &self.cache,
            clock: &self.clock,
        }
    }

    pub async fn create_session(
        &mut self,
        provider_name: &str,
        model: &str,
        system_prompt: &str,
    ) -> Result<Session, CoreError> {
        let now = self.clock.now();
        let id = SessionId::new(self.id_gen.next());
        let mut session = Session::new(id.clone(), provider_name.to_string(), model.to_string(), now);
        self.store.save(&session).map_err(store_err)?;
        self.open_log(&id)?;

        let provider = self.provider_for(provider_name)?;
        let ps = provider
            .create(model, system_prompt)
            .await
            .map_err(|e| CoreError::ProviderFailure(e.to_string()))?;

        let sink = self.sink();
        self.mux.put(id.clone(), ps, &sink).await?;

        session.transition_to(SessionState::Active, now)?;
        self.store.save(&session).map_err(store_err)?;
        self.cache.lock().insert(id.clone(), session.clone());

        Ok(session)
    }

    pub async fn terminate_session(&mut self, session_id: &SessionId) -> Result<(), CoreError> {
        self.mux.remove(session_id).await?;
        let now = self.clock.now();
        let mut session = self
            .cache
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("session {session_id}")))?;
        session.transition_to(SessionState::Terminated, now)?;
        self.store.save(&session).map_err(store_err)?;
        self.cache.lock().insert(session_id.clone(), session);
        Ok(())
    }

    /// Step 1 of the turn lifecycle: resolve the session, reloading from the
    /// store if the in-memory copy disagrees with the multiplexer (a
    /// background eviction happened since the cache was last written).
    fn ensure_session_loaded(&mut self, session_id: &SessionId) -> Result<(), CoreError> {
        let needs_reload = match self.cache.lock().get(session_id) {
            None => true,
            Some(s) => s.state == SessionState::Active && !self.mux.contains(session_id),
        };
        if needs_reload {
            let session = self.store.load(session_id).map_err(store_err)?;
            self.cache.lock().insert(session_id.clone(), session);
        }
        Ok(())
    }

    async fn send_and_collect(&mut self, session_id: &SessionId, prompt: &str) -> Result<String, CoreError> {
        use tokio_stream::StreamExt;
        let ps = self
            .mux
            .held_mut(session_id)
            .ok_or_else(|| CoreError::not_found(format!("session {session_id} is not held")))?;
        let mut stream = ps
            .send(prompt)
            .await
            .map_err(|e| CoreError::ProviderFailure(e.to_string()))?;
        let mut response = String::new();
        while let Some(chunk) = stream.next().await {
            response.push_str(&chunk.map_err(|e| CoreError::ProviderFailure(e.to_string()))?);
        }
        Ok(response)
    }

    /// The turn lifecycle (steps numbered per the component's contract).
    pub async fn send_turn(&mut self, session_id: &SessionId, prompt: &str) -> Result<String, CoreError> {
        // 1.
        self.ensure_session_loaded(session_id)?;

        // 2.
        let log = self.open_log(session_id)?;
        let start = Event::TurnStart { prompt: prompt.to_string() };
        log.log(self.clock.now(), start.name(), start.data())
            .map_err(log_err)?;

        let session = self
            .cache
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("session {session_id}")))?;
        let provider = self.provider_for(&session.provider_name)?;

        // 3.
        let restored = {
            let sink = self.sink();
            self.mux
                .acquire(session_id, provider.as_ref(), &session.provider_state, &sink)
                .await?
        };
        if restored {
            let ev = Event::SessionRestored {
                provider: session.provider_name.clone(),
                model: session.model.clone(),
            };
            if let Err(e) = log.log(self.clock.now(), ev.name(), ev.data()).map_err(log_err) {
                // The slot was already acquired above; release it before
                // propagating so a logging failure can't leak a held slot.
                self.mux.release(session_id);
                return Err(e);
            }
        }

        // 4.
        let send_result = self.send_and_collect(session_id, prompt).await;

        // 5. Always release, including on error above.
        self.mux.release(session_id);

        let response = send_result?;

        // 6. Success only: log completion, then drain deferred work in order.
        let complete = Event::TurnComplete { response: response.clone() };
        log.log(self.clock.now(), complete.name(), complete.data())
            .map_err(log_err)?;
        self.drain_deferred().await?;

        // 7.
        Ok(response)
    }

    /// Forces a session out of memory on demand (the `session.suspend` RPC),
    /// independent of LRU order. Returns `false` if the session wasn't
    /// cached — already suspended or terminated on disk, so this is a no-op
    /// rather than an error.
    pub async fn suspend_session(&mut self, session_id: &SessionId) -> Result<bool, CoreError> {
        let sink = self.sink();
        self.mux.force_suspend(session_id, &sink).await
    }

    /// Warm-restores a session into the multiplexer without running a turn
    /// (the `session.resume` RPC), then immediately releases it so it's
    /// evictable again. Leaves `Session.state` untouched, matching the
    /// restore-without-re-persisting-ACTIVE behavior of the turn lifecycle.
    pub async fn resume_session(&mut self, session_id: &SessionId) -> Result<(), CoreError> {
        self.ensure_session_loaded(session_id)?;

        let session = self
            .cache
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("session {session_id}")))?;
        let provider = self.provider_for(&session.provider_name)?;

        let restored = {
            let sink = self.sink();
            self.mux
                .acquire(session_id, provider.as_ref(), &session.provider_state, &sink)
                .await?
        };
        if restored {
            let log = self.open_log(session_id)?;
            let ev = Event::SessionRestored {
                provider: session.provider_name.clone(),
                model: session.model.clone(),
            };
            log.log(self.clock.now(), ev.name(), ev.data()).map_err(log_err)?;
        }

        self.mux.release(session_id);
        Ok(())
    }

    async fn drain_deferred(&mut self) -> Result<(), CoreError> {
        while let Some(work) = self.deferred.pop_front() {
            match work {
                DeferredWork::Spawn(spawn) => self.execute_deferred_spawn(spawn).await?,
            }
        }
        Ok(())
    }

    async fn execute_deferred_spawn(&mut self, spawn: DeferredSpawn) -> Result<(), CoreError> {
        let now = self.clock.now();
        let mut session = Session::new(
            spawn.session_id.clone(),
            spawn.provider_name.clone(),
            spawn.model.clone(),
            now,
        );
        self.store.save(&session).map_err(store_err)?;

        let provider = self.provider_for(&spawn.provider_name)?;
        let ps = provider
            .create(&spawn.model, &spawn.instructions)
            .await
            .map_err(|e| CoreError::ProviderFailure(e.to_string()))?;

        let sink = self.sink();
        self.mux.put(session.id.clone(), ps, &sink).await?;

        session.transition_to(SessionState::Active, now)?;
        self.store.save(&session).map_err(store_err)?;
        self.cache.lock().insert(session.id.clone(), session.clone());

        let log = self.open_log(&spawn.session_id)?;
        let ev = Event::AgentCreated {
            agent_id: spawn.agent_id,
            name: spawn.name,
            parent_session_id: spawn.parent_session_id,
            instructions: spawn.instructions,
        };
        log.log(now, ev.name(), ev.data()).map_err(log_err)?;

        Ok(())
    }
}

fn store_err(e: SessionStoreError) -> CoreError {
    match e {
        SessionStoreError::NotFound(id) => CoreError::not_found(format!("session {id}")),
        other => CoreError::IoFailure(other.to_string()),
    }
}

struct EvictionPersist<'a, C: Clock> {
    store: &'a SessionStore,
    agents_root: &'a Path,
    cache: &'a Mutex<HashMap<SessionId, Session>>,
    clock: &'a C,
}

#[async_trait]
impl<'a, C: Clock> EvictionSink for EvictionPersist<'a, C> {
    async fn on_evict(&self, session_id: &SessionId, provider_state: Vec<u8>) -> Result<(), CoreError> {
        let now = self.clock.now();
        let mut session = self
            .cache
            .lock()
            .get(session_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("session {session_id}")))?;

        let state_size = provider_state.len();
        session.provider_state = provider_state;
        session.transition_to(SessionState::Suspended, now)?;
        self.store.save(&session).map_err(store_err)?;
        self.cache.lock().insert(session_id.clone(), session);

        let log = open_log(self.agents_root, session_id)?;
        let ev = Event::SuspendResult { state_size };
        log.log(now, ev.name(), ev.data()).map_err(log_err)?;

        Ok(())
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
