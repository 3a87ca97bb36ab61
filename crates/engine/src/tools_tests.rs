// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::scheduler::TurnScheduler;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use substrat_core::{FakeClock, SequentialIdGen};
use substrat_providers::MockProvider;

fn clock() -> FakeClock {
    FakeClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
}

fn handler(dir: &tempfile::TempDir) -> ToolHandler<FakeClock, SequentialIdGen> {
    ToolHandler::new(dir.path().to_path_buf(), clock(), SequentialIdGen::new("id"))
}

fn scheduler(
    dir: &tempfile::TempDir,
    mock: MockProvider,
) -> TurnScheduler<FakeClock, SequentialIdGen> {
    let mut m: HashMap<String, Arc<dyn substrat_providers::AgentProvider>> = HashMap::new();
    m.insert("mock".to_string(), Arc::new(mock));
    TurnScheduler::new(dir.path().to_path_buf(), m, 4, clock(), SequentialIdGen::new("sess"))
}

fn root_node(id: &str, session: &str, name: &str) -> AgentNode {
    AgentNode::builder(id, session).name(name).build()
}

fn child_node(id: &str, session: &str, parent: &str, name: &str) -> AgentNode {
    AgentNode::builder(id, session).name(name).parent(parent).build()
}

#[test]
fn send_message_resolves_one_hop_delivers_and_logs_enqueued() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(&dir);
    let mut tree = AgentTree::new();
    tree.add(root_node("p", "sp", "p"));
    tree.add(child_node("a", "sa", "p", "a"));
    tree.add(child_node("b", "sb", "p", "b"));
    let mut inboxes = InboxTable::new();

    let result = h
        .send_message(&tree, &mut inboxes, &AgentId::new("a"), "b", "hello", true)
        .unwrap();

    assert_eq!(result["status"], "sent");
    assert_eq!(result["waiting_for_reply"], true);

    let drained = inboxes.collect(&AgentId::new("b"));
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].payload, "hello");

    let log = substrat_storage::EventLog::open(dir.path().join("sb"), serde_json::Map::new()).unwrap();
    let entries = log.read_all().unwrap();
    assert!(entries.iter().any(|e| e.event == "message.enqueued"));
}

#[test]
fn send_message_unknown_name_errors() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(&dir);
    let mut tree = AgentTree::new();
    tree.add(root_node("p", "sp", "p"));
    let mut inboxes = InboxTable::new();

    let err = h
        .send_message(&tree, &mut inboxes, &AgentId::new("p"), "nobody", "hi", true)
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[test]
fn broadcast_delivers_to_whole_team_and_reports_count() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(&dir);
    let mut tree = AgentTree::new();
    tree.add(root_node("p", "sp", "p"));
    tree.add(child_node("a", "sa", "p", "a"));
    tree.add(child_node("b", "sb", "p", "b"));
    tree.add(child_node("c", "sc", "p", "c"));
    let mut inboxes = InboxTable::new();

    let result = h.broadcast(&tree, &mut inboxes, &AgentId::new("a"), "news").unwrap();
    assert_eq!(result["recipient_count"], 2);
    assert_eq!(inboxes.collect(&AgentId::new("b")).len(), 1);
    assert_eq!(inboxes.collect(&AgentId::new("c")).len(), 1);
    assert_eq!(inboxes.collect(&AgentId::new("a")).len(), 0);
}

#[test]
fn check_inbox_drains_and_logs_delivered() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(&dir);
    let mut tree = AgentTree::new();
    tree.add(root_node("p", "sp", "p"));
    tree.add(child_node("a", "sa", "p", "a"));
    tree.add(child_node("b", "sb", "p", "b"));
    let mut inboxes = InboxTable::new();

    h.send_message(&tree, &mut inboxes, &AgentId::new("a"), "b", "hello", false).unwrap();
    let result = h.check_inbox(&tree, &mut inboxes, &AgentId::new("b")).unwrap();

    let messages = result["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "hello");

    let log = substrat_storage::EventLog::open(dir.path().join("sb"), serde_json::Map::new()).unwrap();
    let entries = log.read_all().unwrap();
    assert!(entries.iter().any(|e| e.event == "message.delivered"));
}

#[test]
fn spawn_agent_name_conflict_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(&dir);
    let mut tree = AgentTree::new();
    tree.add(root_node("p", "sp", "p"));
    let mut sched = scheduler(&dir, MockProvider::default());
    let parent_session = SessionId::new("sp");

    h.spawn_agent(&mut tree, &mut sched, &AgentId::new("p"), &parent_session, "kid", "do things", "mock", "m1")
        .unwrap();
    let err = h
        .spawn_agent(&mut tree, &mut sched, &AgentId::new("p"), &parent_session, "kid", "do things", "mock", "m1")
        .unwrap_err();
    assert!(matches!(err, CoreError::NameConflict { .. }));
}

#[tokio::test]
async fn spawn_agent_inserts_child_synchronously_and_defers_provider_creation() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(&dir);
    let mut tree = AgentTree::new();
    let mock = MockProvider::default();
    mock.push_response(vec!["parent reply".into()]);
    let mut sched = scheduler(&dir, mock);

    let parent = sched.create_session("mock", "m1", "sys").await.unwrap();
    tree.add(root_node("p", parent.id.as_str(), "p"));

    let result = h
        .spawn_agent(&mut tree, &mut sched, &AgentId::new("p"), &parent.id, "kid", "do things", "mock", "m1")
        .unwrap();
    assert_eq!(result["status"], "created");

    let child_id = tree.by_name(&AgentId::new("p"), "kid").unwrap();
    assert_eq!(tree.get(&child_id).unwrap().state, AgentState::Idle);
    // Provider creation is deferred: the child has no active session yet.
    assert!(sched.session(&tree.get(&child_id).unwrap().session_id).is_none());

    sched.send_turn(&parent.id, "go").await.unwrap();

    let child_session_id = tree.get(&child_id).unwrap().session_id.clone();
    let child_session = sched.session(&child_session_id).unwrap();
    assert_eq!(child_session.state, substrat_core::SessionState::Active);
}

#[test]
fn inspect_agent_reports_state_and_recent_messages() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(&dir);
    let mut tree = AgentTree::new();
    tree.add(root_node("p", "sp", "p"));
    tree.add(child_node("a", "sa", "p", "a"));
    let mut inboxes = InboxTable::new();

    h.send_message(&tree, &mut inboxes, &AgentId::new("p"), "a", "hi", false).unwrap();

    let result = h.inspect_agent(&tree, &AgentId::new("p"), "a").unwrap();
    assert_eq!(result["state"], "IDLE");
    let recent = result["recent_messages"].as_array().unwrap();
    assert_eq!(recent.len(), 1);
}

#[test]
fn inspect_agent_unknown_name_errors() {
    let dir = tempfile::tempdir().unwrap();
    let h = handler(&dir);
    let mut tree = AgentTree::new();
    tree.add(root_node("p", "sp", "p"));

    let err = h.inspect_agent(&tree, &AgentId::new("p"), "nobody").unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}
