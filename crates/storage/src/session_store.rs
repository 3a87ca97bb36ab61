// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic snapshot of a [`Session`] at `<root>/agents/<uuid>/session.json`.
//!
//! Grounded in the teacher's temp-file-then-fsync-then-rename snapshot
//! discipline, generalized from one global snapshot file to one snapshot
//! per session directory.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use substrat_core::{Session, SessionId, SessionState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("session not found: {0}")]
    NotFound(SessionId),
}

pub struct SessionStore {
    root: PathBuf,
}

const SESSION_FILE: &str = "session.json";

impl SessionStore {
    /// `root` is the `agents/` directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn session_dir(&self, id: &SessionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    pub fn session_path(&self, id: &SessionId) -> PathBuf {
        self.session_dir(id).join(SESSION_FILE)
    }

    /// Writes `<path>.tmp` in the same directory, fsyncs the fd, then
    /// renames over the target.
    pub fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let dir = self.session_dir(&session.id);
        fs::create_dir_all(&dir)?;
        let path = self.session_path(&session.id);
        let tmp_path = path.with_extension("json.tmp");

        let bytes = serde_json::to_vec(session)?;
        {
            let file = File::create(&tmp_path)?;
            {
                use std::io::Write;
                (&file).write_all(&bytes)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    /// Missing file raises not-found; stray `.tmp` files are ignored.
    pub fn load(&self, id: &SessionId) -> Result<Session, SessionStoreError> {
        let path = self.session_path(id);
        let bytes = fs::read(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SessionStoreError::NotFound(id.clone())
            } else {
                SessionStoreError::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Enumerates session subdirectories and loads each. Directories with a
    /// missing or unparseable `session.json` are skipped rather than
    /// failing the whole scan (e.g. a crash left only a stray `.tmp` file).
    pub fn scan(&self) -> Result<Vec<Session>, SessionStoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = SessionId::new(entry.file_name().to_string_lossy().into_owned());
            match self.load(&id) {
                Ok(session) => sessions.push(session),
                Err(SessionStoreError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(sessions)
    }

    /// Removes the session's entire on-disk directory (record + event log).
    /// Callers are responsible for only deleting TERMINATED sessions.
    pub fn delete(&self, id: &SessionId) -> Result<(), SessionStoreError> {
        let dir = self.session_dir(id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionStoreError::Io(e)),
        }
    }

    /// Loads every session and, for any in ACTIVE state, rewrites it as
    /// SUSPENDED — the daemon was not running, so no provider is alive.
    pub fn recover(&self, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<Session>, SessionStoreError> {
        let mut sessions = self.scan()?;
        for session in sessions.iter_mut() {
            if session.state == SessionState::Active {
                session.state = SessionState::Suspended;
                session.suspended_at = Some(now);
                self.save(session)?;
            }
        }
        Ok(sessions)
    }
}

/// Removes any stray `<name>.json.tmp` files under `root` without
/// inspecting them, per the atomic-write recovery contract.
pub fn sweep_stray_tmp_files(root: &Path) -> io::Result<()> {
    if !root.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            for file in fs::read_dir(entry.path())? {
                let file = file?;
                if file.path().extension().and_then(|e| e.to_str()) == Some("tmp") {
                    let _ = fs::remove_file(file.path());
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "session_store_tests.rs"]
mod tests;
