//! `substrat agent` specs.

use crate::prelude::Daemon;

#[test]
fn create_root_agent_returns_agent_and_session_ids() {
    let daemon = Daemon::start();
    let result = daemon
        .cli()
        .args(&["agent", "create", "researcher", "you are a researcher"])
        .passes()
        .stdout_json();

    assert_eq!(result["status"], "created");
    assert!(result["agent_id"].is_string());
    assert!(result["session_id"].is_string());
}

#[test]
fn send_turn_echoes_through_the_fake_provider() {
    let daemon = Daemon::start();
    let created = daemon
        .cli()
        .args(&["agent", "create", "researcher", "you are a researcher"])
        .passes()
        .stdout_json();
    let agent_id = created["agent_id"].as_str().unwrap();

    let result = daemon.cli().args(&["agent", "send", agent_id, "hello"]).passes().stdout_json();
    assert_eq!(result["response"], "echo: hello");
}

#[test]
fn spawn_child_under_a_named_parent_conflict_is_rejected() {
    let daemon = Daemon::start();
    let parent = daemon
        .cli()
        .args(&["agent", "create", "lead", "you lead a team"])
        .passes()
        .stdout_json();
    let parent_id = parent["agent_id"].as_str().unwrap();

    daemon.cli().args(&["agent", "spawn", parent_id, "helper", "you help"]).passes();

    // Spawning a second child with the same name under the same parent
    // should fail rather than silently create a duplicate.
    daemon.cli().args(&["agent", "spawn", parent_id, "helper", "you help"]).fails();
}

#[test]
fn terminate_removes_the_agent_from_subsequent_sends() {
    let daemon = Daemon::start();
    let created = daemon
        .cli()
        .args(&["agent", "create", "researcher", "you are a researcher"])
        .passes()
        .stdout_json();
    let agent_id = created["agent_id"].as_str().unwrap();

    daemon.cli().args(&["agent", "terminate", agent_id]).passes();
    daemon.cli().args(&["agent", "send", agent_id, "hello"]).fails();
}
