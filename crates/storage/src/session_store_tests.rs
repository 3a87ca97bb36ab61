// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use substrat_core::Session;
use tempfile::tempdir;

fn sample(id: &str, state: SessionState) -> Session {
    let mut s = Session::builder(id).state(SessionState::Created).build();
    s.state = state;
    s
}

#[test]
fn save_then_load_is_byte_identical() {
    let tmp = tempdir().unwrap();
    let store = SessionStore::new(tmp.path().to_path_buf());
    let session = sample("s1", SessionState::Active);
    store.save(&session).unwrap();

    let loaded = store.load(&session.id).unwrap();
    assert_eq!(serde_json::to_vec(&loaded).unwrap(), serde_json::to_vec(&session).unwrap());
}

#[test]
fn load_missing_session_is_not_found() {
    let tmp = tempdir().unwrap();
    let store = SessionStore::new(tmp.path().to_path_buf());
    let err = store.load(&SessionId::new("nope")).unwrap_err();
    assert!(matches!(err, SessionStoreError::NotFound(_)));
}

#[test]
fn stray_tmp_file_is_ignored_by_load_and_scan() {
    let tmp = tempdir().unwrap();
    let store = SessionStore::new(tmp.path().to_path_buf());
    let session = sample("s1", SessionState::Active);
    store.save(&session).unwrap();

    let stray = store.session_path(&session.id).with_extension("json.tmp");
    fs::write(&stray, b"not valid json at all").unwrap();

    let scanned = store.scan().unwrap();
    assert_eq!(scanned.len(), 1);
    assert_eq!(scanned[0].id, session.id);
}

#[test]
fn recover_flips_active_sessions_to_suspended_and_persists() {
    let tmp = tempdir().unwrap();
    let store = SessionStore::new(tmp.path().to_path_buf());
    store.save(&sample("active", SessionState::Active)).unwrap();
    store.save(&sample("suspended", SessionState::Suspended)).unwrap();
    store.save(&sample("terminated", SessionState::Terminated)).unwrap();

    let now = chrono::Utc::now();
    let recovered = store.recover(now).unwrap();
    assert!(recovered.iter().all(|s| s.state != SessionState::Active));

    let reloaded = store.load(&SessionId::new("active")).unwrap();
    assert_eq!(reloaded.state, SessionState::Suspended);
    // suspended_at round-trips through millisecond-precision storage, so
    // compare at that precision rather than exact equality.
    assert_eq!(reloaded.suspended_at.map(|ts| ts.timestamp_millis()), Some(now.timestamp_millis()));
}

#[test]
fn recover_twice_is_idempotent() {
    let tmp = tempdir().unwrap();
    let store = SessionStore::new(tmp.path().to_path_buf());
    store.save(&sample("active", SessionState::Active)).unwrap();

    let now = chrono::Utc::now();
    store.recover(now).unwrap();
    let first = store.load(&SessionId::new("active")).unwrap();

    store.recover(now).unwrap();
    let second = store.load(&SessionId::new("active")).unwrap();

    assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
}

#[test]
fn delete_removes_session_directory() {
    let tmp = tempdir().unwrap();
    let store = SessionStore::new(tmp.path().to_path_buf());
    let session = sample("s1", SessionState::Terminated);
    store.save(&session).unwrap();

    store.delete(&session.id).unwrap();

    assert!(matches!(store.load(&session.id).unwrap_err(), SessionStoreError::NotFound(_)));
    assert!(!store.session_dir(&session.id).exists());
}

#[test]
fn delete_missing_session_is_not_an_error() {
    let tmp = tempdir().unwrap();
    let store = SessionStore::new(tmp.path().to_path_buf());
    store.delete(&SessionId::new("nope")).unwrap();
}

#[test]
fn scan_on_missing_root_returns_empty() {
    let tmp = tempdir().unwrap();
    let store = SessionStore::new(tmp.path().join("agents"));
    assert_eq!(store.scan().unwrap().len(), 0);
}
