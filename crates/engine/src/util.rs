// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small helpers shared by [`crate::scheduler`] and [`crate::tools`] for
//! opening a session's own event log.

use std::path::Path;
use substrat_core::{CoreError, SessionId};
use substrat_storage::{EventLog, EventLogError};

pub(crate) fn log_context(session_id: &SessionId) -> serde_json::Map<String, serde_json::Value> {
    let mut m = serde_json::Map::new();
    m.insert(
        "session_id".to_string(),
        serde_json::Value::String(session_id.to_string()),
    );
    m
}

pub(crate) fn open_log(agents_root: &Path, session_id: &SessionId) -> Result<EventLog, CoreError> {
    EventLog::open(agents_root.join(session_id.as_str()), log_context(session_id))
        .map_err(log_err)
}

pub(crate) fn log_err(e: EventLogError) -> CoreError {
    CoreError::IoFailure(e.to_string())
}
