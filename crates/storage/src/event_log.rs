// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Crash-safe per-agent JSONL event log with a pending-file write-ahead
//! scratch file.
//!
//! Grounded in the same atomic-rewrite discipline as
//! [`crate::session_store`]'s snapshot: every durable write goes through a
//! temp/scratch file that is fsynced before the real file is touched, so a
//! crash between any two fsyncs leaves the log a valid JSONL prefix of
//! whatever was acknowledged to a caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use substrat_core::format_ts;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupt event log at {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// One parsed line: the context fields set at construction, plus `ts`,
/// `event`, `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    #[serde(flatten)]
    pub context: Map<String, Value>,
    #[serde(with = "ts_millis")]
    pub ts: DateTime<Utc>,
    pub event: String,
    pub data: Value,
}

/// Serializes `ts` through [`format_ts`] so on-disk event log entries are
/// always millisecond precision, matching spec §6's RFC 3339 contract
/// instead of chrono's default nanosecond-precision serde.
mod ts_millis {
    use super::format_ts;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_ts(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)).map_err(serde::de::Error::custom)
    }
}

pub struct EventLog {
    dir: PathBuf,
    context: Map<String, Value>,
}

const EVENTS_FILE: &str = "events.jsonl";
const PENDING_FILE: &str = "events.pending";

impl EventLog {
    /// Opens (creating if necessary) the event log directory for a session.
    /// `context` is merged into every entry written through this handle —
    /// at minimum it should contain `session_id`.
    pub fn open(dir: PathBuf, context: Map<String, Value>) -> Result<Self, EventLogError> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, context })
    }

    pub fn set_context_field(&mut self, key: impl Into<String>, value: Value) {
        self.context.insert(key.into(), value);
    }

    fn events_path(&self) -> PathBuf {
        self.dir.join(EVENTS_FILE)
    }

    fn pending_path(&self) -> PathBuf {
        self.dir.join(PENDING_FILE)
    }

    /// Append one entry. Pending-file WAL contract: (1) truncate+write+fsync
    /// `events.pending`; (2) append+fsync `events.jsonl`; (3) unlink
    /// `events.pending`. A crash between any two steps is recoverable via
    /// [`Self::recover_pending`].
    pub fn log(&self, now: DateTime<Utc>, event: &str, data: Value) -> Result<EventLogEntry, EventLogError> {
        let entry = self.build_entry(now, event, data);
        let line = render_line(&entry)?;

        write_all_fsync(&self.pending_path(), &line)?;
        append_fsync(&self.events_path(), &line)?;
        let _ = fs::remove_file(self.pending_path());

        Ok(entry)
    }

    fn build_entry(&self, ts: DateTime<Utc>, event: &str, data: Value) -> EventLogEntry {
        EventLogEntry {
            context: self.context.clone(),
            ts,
            event: event.to_string(),
            data,
        }
    }

    /// Parse the log, truncating any partial trailing line left by a crash
    /// mid-append before returning.
    pub fn read_all(&self) -> Result<Vec<EventLogEntry>, EventLogError> {
        let path = self.events_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        truncate_to_valid_prefix(&path)?;
        let bytes = fs::read(&path)?;
        parse_lines(&path, &bytes)
    }

    /// On startup, reconcile a crash that landed between the pending-file
    /// fsync and the main-file append.
    pub fn recover_pending(&self) -> Result<(), EventLogError> {
        let pending_path = self.pending_path();
        if !pending_path.exists() {
            return Ok(());
        }

        let events_path = self.events_path();
        truncate_to_valid_prefix(&events_path)?;

        let pending_bytes = fs::read(&pending_path)?;
        let pending_line = std::str::from_utf8(&pending_bytes)
            .map_err(|e| EventLogError::Corrupt {
                path: pending_path.clone(),
                message: e.to_string(),
            })?
            .trim_end_matches('\n');

        let existing = fs::read_to_string(&events_path).unwrap_or_default();
        let already_present = existing
            .lines()
            .next_back()
            .map(|last| last == pending_line)
            .unwrap_or(false);

        if !already_present && !pending_line.is_empty() {
            append_fsync(&events_path, &pending_bytes)?;
        }

        fs::remove_file(&pending_path)?;
        Ok(())
    }
}

fn render_line(entry: &EventLogEntry) -> Result<Vec<u8>, EventLogError> {
    let mut line = serde_json::to_vec(entry)?;
    line.push(b'\n');
    Ok(line)
}

fn write_all_fsync(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn append_fsync(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// The longest prefix of `bytes` that is a sequence of complete,
/// newline-terminated, individually-parseable JSON lines.
fn valid_prefix_len(bytes: &[u8]) -> u64 {
    let mut len = 0u64;
    let mut start = 0usize;
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            let line = &bytes[start..i];
            if serde_json::from_slice::<Value>(line).is_ok() {
                len = (i + 1) as u64;
            } else {
                break;
            }
            start = i + 1;
        }
    }
    len
}

fn truncate_to_valid_prefix(path: &Path) -> Result<(), EventLogError> {
    if !path.exists() {
        return Ok(());
    }
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    let valid_len = valid_prefix_len(&bytes);
    if valid_len != bytes.len() as u64 {
        file.set_len(valid_len)?;
        file.seek(SeekFrom::Start(valid_len))?;
        file.sync_all()?;
    }
    Ok(())
}

fn parse_lines(path: &Path, bytes: &[u8]) -> Result<Vec<EventLogEntry>, EventLogError> {
    let text = std::str::from_utf8(bytes).map_err(|e| EventLogError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    text.lines()
        .filter(|l| !l.is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|e| EventLogError::Corrupt {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
