//! Daemon startup/recovery specs driven through the CLI surface.

use crate::prelude::{binary_path, Daemon};

#[test]
fn session_list_is_empty_on_a_freshly_started_daemon() {
    let daemon = Daemon::start();
    let listed = daemon.cli().args(&["session", "list"]).passes().stdout_json();
    assert_eq!(listed["sessions"].as_array().unwrap().len(), 0);
}

#[test]
fn unknown_agent_id_is_rejected_with_a_nonzero_exit() {
    let daemon = Daemon::start();
    daemon.cli().args(&["agent", "send", "nonexistent-agent", "hello"]).fails();
}

#[test]
fn a_second_daemon_refuses_to_start_against_the_same_state_dir() {
    use std::process::{Command, Stdio};

    let daemon = Daemon::start();
    let status = Command::new(binary_path("substratd"))
        .env("SUBSTRAT_STATE_DIR", daemon.state_path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .expect("substratd should run");
    assert!(!status.success());
}
