//! `substrat session` specs.

use crate::prelude::Daemon;

#[test]
fn list_reflects_a_freshly_created_session() {
    let daemon = Daemon::start();
    let created = daemon
        .cli()
        .args(&["agent", "create", "researcher", "you are a researcher"])
        .passes()
        .stdout_json();
    let session_id = created["session_id"].as_str().unwrap();

    let listed = daemon.cli().args(&["session", "list"]).passes().stdout_json();
    let sessions = listed["sessions"].as_array().unwrap();
    assert!(sessions.iter().any(|s| s["id"] == session_id));
    assert!(sessions.iter().any(|s| s["state"] == "ACTIVE"));
}

#[test]
fn suspend_then_resume_round_trips_session_state() {
    let daemon = Daemon::start();
    let created = daemon
        .cli()
        .args(&["agent", "create", "researcher", "you are a researcher"])
        .passes()
        .stdout_json();
    let session_id = created["session_id"].as_str().unwrap();

    let suspended = daemon.cli().args(&["session", "suspend", session_id]).passes().stdout_json();
    assert_eq!(suspended["suspended"], true);

    let listed = daemon.cli().args(&["session", "list"]).passes().stdout_json();
    let sessions = listed["sessions"].as_array().unwrap();
    let session = sessions.iter().find(|s| s["id"] == session_id).unwrap();
    assert_eq!(session["state"], "SUSPENDED");

    daemon.cli().args(&["session", "resume", session_id]).passes();
    let listed = daemon.cli().args(&["session", "list"]).passes().stdout_json();
    let sessions = listed["sessions"].as_array().unwrap();
    let session = sessions.iter().find(|s| s["id"] == session_id).unwrap();
    assert_eq!(session["state"], "ACTIVE");
}

#[test]
fn delete_removes_the_session_from_the_list() {
    let daemon = Daemon::start();
    let created = daemon
        .cli()
        .args(&["agent", "create", "researcher", "you are a researcher"])
        .passes()
        .stdout_json();
    let session_id = created["session_id"].as_str().unwrap();

    daemon.cli().args(&["agent", "terminate", created["agent_id"].as_str().unwrap()]).passes();
    daemon.cli().args(&["session", "delete", session_id]).passes();

    let listed = daemon.cli().args(&["session", "list"]).passes().stdout_json();
    let sessions = listed["sessions"].as_array().unwrap();
    assert!(!sessions.iter().any(|s| s["id"] == session_id));
}
