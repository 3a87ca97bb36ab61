// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, shutdown, recovery.
//!
//! Grounded in the teacher's `lifecycle::startup`/`shutdown` shape — lock
//! file first, directories next, state loaded and replayed, socket bound
//! last — generalized from one global WAL/snapshot pair to Substrat's
//! per-session event logs driven through `Orchestrator::recover`.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use substrat_core::{SystemClock, UuidIdGen};
use substrat_providers::AgentProvider;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::orchestrator::{Orchestrator, RecoveryReport};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("recovery error: {0}")]
    Recovery(#[from] substrat_core::CoreError),
}

/// Owns the daemon's running state: the exclusive lock (released on
/// drop), the bound socket, and the orchestrator everything dispatches
/// through.
pub struct DaemonState {
    pub config: Config,
    #[allow(dead_code)]
    lock_file: File,
    pub listener: UnixListener,
    pub orchestrator: Arc<tokio::sync::Mutex<Orchestrator<SystemClock, UuidIdGen>>>,
    pub recovery: RecoveryReport,
}

/// Removes the socket/lock/version files. A free function rather than a
/// `DaemonState` method so callers can shut down after moving the socket
/// listener out of `DaemonState` into a spawned accept-loop task.
pub fn shutdown(config: &Config) -> Result<(), LifecycleError> {
    info!("shutting down daemon");
    if config.socket_path.exists() {
        if let Err(e) = std::fs::remove_file(&config.socket_path) {
            warn!("failed to remove socket file: {}", e);
        }
    }
    if config.lock_path.exists() {
        if let Err(e) = std::fs::remove_file(&config.lock_path) {
            warn!("failed to remove lock file: {}", e);
        }
    }
    if config.version_path.exists() {
        if let Err(e) = std::fs::remove_file(&config.version_path) {
            warn!("failed to remove version file: {}", e);
        }
    }
    info!("daemon shutdown complete");
    Ok(())
}

/// Starts the daemon: acquires the lock, creates directories, recovers
/// state from the per-session event logs, and binds the socket last so
/// a partially-started daemon never appears reachable.
pub async fn startup(
    config: &Config,
    providers: std::collections::HashMap<String, Arc<dyn AgentProvider>>,
    max_slots: usize,
    version: &str,
) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config, providers, max_slots, version).await {
        Ok(state) => Ok(state),
        Err(e) => {
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(
    config: &Config,
    providers: std::collections::HashMap<String, Arc<dyn AgentProvider>>,
    max_slots: usize,
    version: &str,
) -> Result<DaemonState, LifecycleError> {
    config.ensure_dirs()?;

    // Acquire the lock before touching anything else so a second daemon
    // never clobbers the running one's PID file.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    std::fs::write(&config.version_path, version)?;

    let clock = SystemClock;
    let id_gen = UuidIdGen;
    let mut orchestrator =
        Orchestrator::new(config.state_dir.clone(), config.agents_dir.clone(), providers, max_slots, clock, id_gen);

    let recovery = orchestrator.recover()?;
    info!(
        agent_count = recovery.agent_count,
        session_count = recovery.session_count,
        "recovered state from event logs"
    );
    orchestrator.log_daemon_started(version)?;

    // Bind the socket last, only after recovery has succeeded.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        listener,
        orchestrator: Arc::new(tokio::sync::Mutex::new(orchestrator)),
        recovery,
    })
}

fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.version_path.exists() {
        let _ = std::fs::remove_file(&config.version_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}
