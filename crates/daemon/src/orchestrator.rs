// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns the end-to-end lifecycle: wires providers, the multiplexer, the
//! store, the scheduler, the tree, inboxes, and the tool surface. Composes
//! `create_root_agent`, `spawn_child`, `run_turn`, `terminate_agent` from
//! lower-level primitives, and performs the startup recovery procedure.
//!
//! Grounded in `oj_daemon::lifecycle::{startup, reconcile_state}` — same
//! overall shape (load snapshot-equivalent state, replay durable log,
//! rebuild in-memory indices) generalized to "one store + one event log
//! per session" instead of one global WAL.

use crate::protocol::Request;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use substrat_core::{
    AgentCreatedData, AgentId, AgentNode, AgentState, Clock, CoreError, Event, IdGen,
    MessageDeliveredData, MessageEnqueuedData, MessageEnvelope, MessageId, MessageKind, Session,
    SessionId, SessionState,
};
use substrat_engine::{AgentTree, InboxTable, ToolHandler, TurnScheduler};
use substrat_providers::AgentProvider;
use substrat_storage::{EventLog, EventLogError};

/// An agent that is owed a reply: A sent B a sync request, tagged with
/// `message_id`; whichever of B's turns completes next is treated as the
/// reply and gets injected into A's inbox.
struct PendingReply {
    requester: AgentId,
    message_id: MessageId,
}

#[derive(Debug, Clone, Default)]
pub struct RecoveryReport {
    pub agent_count: usize,
    pub session_count: usize,
}

pub struct Orchestrator<C: Clock, G: IdGen> {
    state_dir: PathBuf,
    agents_dir: PathBuf,
    tree: AgentTree,
    inboxes: InboxTable,
    scheduler: TurnScheduler<C, G>,
    tools: ToolHandler<C, G>,
    pending_replies: HashMap<AgentId, VecDeque<PendingReply>>,
    clock: C,
    id_gen: G,
}

impl<C: Clock, G: IdGen> Orchestrator<C, G> {
    pub fn new(
        state_dir: PathBuf,
        agents_dir: PathBuf,
        providers: HashMap<String, Arc<dyn AgentProvider>>,
        max_slots: usize,
        clock: C,
        id_gen: G,
    ) -> Self {
        let scheduler = TurnScheduler::new(agents_dir.clone(), providers, max_slots, clock.clone(), id_gen.clone());
        let tools = ToolHandler::new(agents_dir.clone(), clock.clone(), id_gen.clone());
        Self {
            state_dir,
            agents_dir,
            tree: AgentTree::new(),
            inboxes: InboxTable::new(),
            scheduler,
            tools,
            pending_replies: HashMap::new(),
            clock,
            id_gen,
        }
    }

    fn daemon_log(&self) -> Result<EventLog, CoreError> {
        EventLog::open(self.state_dir.join("daemon"), serde_json::Map::new()).map_err(log_err)
    }

    /// Logged once at startup, independent of whether recovery finds
    /// anything to reconcile.
    pub fn log_daemon_started(&self, version: &str) -> Result<(), CoreError> {
        let ev = Event::DaemonStarted { version: version.to_string() };
        self.daemon_log()?.log(self.clock.now(), ev.name(), ev.data()).map_err(log_err)?;
        Ok(())
    }

    /// The recovery procedure (spec §4.9), steps 1-6; step 7 (root-agent
    /// resumption) is left to the caller, which may run a turn against any
    /// root agent id found in the returned tree afterward.
    pub fn recover(&mut self) -> Result<RecoveryReport, CoreError> {
        let now = self.clock.now();

        // 1. Flip ACTIVE -> SUSPENDED, persist, seed the session cache.
        let sessions = self.scheduler.recover(now)?;

        let mut created_by_session: HashMap<SessionId, AgentCreatedData> = HashMap::new();
        let mut enqueued_by_session: HashMap<SessionId, Vec<MessageEnqueuedData>> = HashMap::new();
        let mut delivered_by_session: HashMap<SessionId, HashSet<MessageId>> = HashMap::new();

        // 2. Per-session recover_pending + read_all; classify orphans and
        // already-terminated sessions.
        for session in &sessions {
            if session.state == SessionState::Terminated {
                continue;
            }
            let log = open_log(&self.agents_dir, &session.id)?;
            log.recover_pending().map_err(log_err)?;
            let entries = log.read_all().map_err(log_err)?;

            if entries.iter().any(|e| e.event == "agent.terminated") {
                continue;
            }

            let created_entry = entries.iter().find(|e| e.event == "agent.created");
            let Some(created_entry) = created_entry else {
                // Orphaned mid-creation: no provider was ever alive, so there
                // is nothing to stop — just mark the record dead.
                self.scheduler.mark_terminated(&session.id)?;
                continue;
            };
            let created: AgentCreatedData = serde_json::from_value(created_entry.data.clone())
                .map_err(|e| CoreError::CorruptLog(e.to_string()))?;
            created_by_session.insert(session.id.clone(), created);

            let mut my_enqueued = Vec::new();
            let mut my_delivered = HashSet::new();
            for entry in &entries {
                match entry.event.as_str() {
                    "message.enqueued" => {
                        let data: MessageEnqueuedData = serde_json::from_value(entry.data.clone())
                            .map_err(|e| CoreError::CorruptLog(e.to_string()))?;
                        my_enqueued.push(data);
                    }
                    "message.delivered" => {
                        let data: MessageDeliveredData = serde_json::from_value(entry.data.clone())
                            .map_err(|e| CoreError::CorruptLog(e.to_string()))?;
                        my_delivered.insert(data.message_id);
                    }
                    _ => {}
                }
            }
            enqueued_by_session.insert(session.id.clone(), my_enqueued);
            delivered_by_session.insert(session.id.clone(), my_delivered);
        }

        // 3. session_id -> agent_id index.
        let session_to_agent: HashMap<SessionId, AgentId> = created_by_session
            .iter()
            .map(|(sid, data)| (sid.clone(), data.agent_id.clone()))
            .collect();

        // 4-5. Resolve parents and insert in topological order (roots
        // first); a child whose parent session never got an agent.created
        // is itself unreachable and is dropped, cascading the orphan rule.
        let mut remaining: VecDeque<SessionId> = created_by_session.keys().cloned().collect();
        let mut inserted: HashSet<AgentId> = HashSet::new();
        loop {
            let mut next_round = VecDeque::new();
            let mut progressed = false;
            for session_id in remaining {
                let created = &created_by_session[&session_id];
                let parent_agent_id = match &created.parent_session_id {
                    None => None,
                    Some(parent_session_id) => match session_to_agent.get(parent_session_id) {
                        Some(id) if inserted.contains(id) => Some(id.clone()),
                        Some(_) => {
                            next_round.push_back(session_id);
                            continue;
                        }
                        None => continue, // parent was itself an orphan; drop this node too
                    },
                };
                let node = AgentNode {
                    session_id: session_id.clone(),
                    id: created.agent_id.clone(),
                    name: created.name.clone(),
                    parent_id: parent_agent_id,
                    children: Vec::new(),
                    instructions: created.instructions.clone(),
                    workspace_id: None,
                    state: AgentState::Idle,
                    created_at: now,
                };
                inserted.insert(node.id.clone());
                self.tree.add(node);
                progressed = true;
            }
            if next_round.is_empty() || !progressed {
                break;
            }
            remaining = next_round;
        }

        // 6. Rebuild inboxes: pending = enqueued - delivered, reconstructed
        // without re-logging (duplicate redelivery across crashes is fine).
        for (session_id, agent_id) in &session_to_agent {
            if !inserted.contains(agent_id) {
                continue;
            }
            let delivered = delivered_by_session.get(session_id).cloned().unwrap_or_default();
            for msg in enqueued_by_session.get(session_id).cloned().unwrap_or_default() {
                if delivered.contains(&msg.message_id) {
                    continue;
                }
                let envelope = MessageEnvelope {
                    id: msg.message_id,
                    timestamp: msg.timestamp,
                    sender: msg.sender,
                    recipient: msg.recipient,
                    reply_to: msg.reply_to,
                    kind: msg.kind,
                    payload: msg.payload,
                    metadata: msg.metadata,
                };
                self.inboxes.deliver(agent_id.clone(), envelope);
            }
        }

        let report = RecoveryReport { agent_count: inserted.len(), session_count: sessions.len() };
        let ev = Event::DaemonRecovered { agent_count: report.agent_count, session_count: report.session_count };
        self.daemon_log()?.log(self.clock.now(), ev.name(), ev.data()).map_err(log_err)?;
        Ok(report)
    }

    pub fn roots(&self) -> Vec<AgentId> {
        self.tree.roots()
    }

    pub async fn create_root_agent(
        &mut self,
        name: &str,
        instructions: &str,
        provider_name: &str,
        model: &str,
    ) -> Result<Value, CoreError> {
        let agent_id = AgentId::new(self.id_gen.next());
        let session = self.scheduler.create_session(provider_name, model, instructions).await?;
        let now = self.clock.now();
        let node = AgentNode {
            session_id: session.id.clone(),
            id: agent_id.clone(),
            name: name.to_string(),
            parent_id: None,
            children: Vec::new(),
            instructions: instructions.to_string(),
            workspace_id: None,
            state: AgentState::Idle,
            created_at: now,
        };
        self.tree.add(node);
        self.log_agent_created(&session.id, &agent_id, name, None, instructions)?;
        Ok(json!({ "status": "created", "agent_id": agent_id, "session_id": session.id }))
    }

    pub async fn spawn_child(
        &mut self,
        parent_agent_id: &AgentId,
        name: &str,
        instructions: &str,
        provider_name: &str,
        model: &str,
    ) -> Result<Value, CoreError> {
        if self.tree.by_name(parent_agent_id, name).is_some() {
            return Err(CoreError::NameConflict { parent: parent_agent_id.clone(), name: name.to_string() });
        }
        let parent_session_id = self
            .tree
            .get(parent_agent_id)
            .ok_or_else(|| CoreError::not_found(format!("agent {parent_agent_id}")))?
            .session_id
            .clone();

        let agent_id = AgentId::new(self.id_gen.next());
        let session = self.scheduler.create_session(provider_name, model, instructions).await?;
        let now = self.clock.now();
        let node = AgentNode {
            session_id: session.id.clone(),
            id: agent_id.clone(),
            name: name.to_string(),
            parent_id: Some(parent_agent_id.clone()),
            children: Vec::new(),
            instructions: instructions.to_string(),
            workspace_id: None,
            state: AgentState::Idle,
            created_at: now,
        };
        self.tree.add(node);
        self.log_agent_created(&session.id, &agent_id, name, Some(parent_session_id), instructions)?;
        Ok(json!({ "status": "created", "agent_id": agent_id, "name": name }))
    }

    pub async fn terminate_agent(&mut self, agent_id: &AgentId) -> Result<Value, CoreError> {
        let node = self.tree.get(agent_id).ok_or_else(|| CoreError::not_found(format!("agent {agent_id}")))?;
        let session_id = node.session_id.clone();

        self.scheduler.terminate_session(&session_id).await?;

        let log = open_log(&self.agents_dir, &session_id)?;
        let ev = Event::AgentTerminated { agent_id: agent_id.clone() };
        log.log(self.clock.now(), ev.name(), ev.data()).map_err(log_err)?;

        self.tree.remove(agent_id)?;
        self.inboxes.remove(agent_id);
        self.pending_replies.remove(agent_id);
        Ok(json!({ "status": "terminated", "agent_id": agent_id }))
    }

    pub async fn run_turn(&mut self, agent_id: &AgentId, prompt: &str) -> Result<Value, CoreError> {
        let session_id = self
            .tree
            .get(agent_id)
            .ok_or_else(|| CoreError::not_found(format!("agent {agent_id}")))?
            .session_id
            .clone();
        let response = self.scheduler.send_turn(&session_id, prompt).await?;
        self.inject_reply_if_pending(agent_id, &response)?;
        Ok(json!({ "response": response }))
    }

    /// Implements the reply-injection half of the two-turn synchronous
    /// messaging pattern (spec §4.8): if `agent_id` owes a reply, its
    /// latest completed turn's response becomes that reply.
    fn inject_reply_if_pending(&mut self, agent_id: &AgentId, response: &str) -> Result<(), CoreError> {
        let (pending, now_empty) = {
            let Some(queue) = self.pending_replies.get_mut(agent_id) else {
                return Ok(());
            };
            let Some(pending) = queue.pop_front() else {
                return Ok(());
            };
            (pending, queue.is_empty())
        };
        if now_empty {
            self.pending_replies.remove(agent_id);
        }

        let now = self.clock.now();
        let envelope = MessageEnvelope {
            id: MessageId::new(self.id_gen.next()),
            timestamp: now,
            sender: agent_id.clone(),
            recipient: Some(pending.requester.clone()),
            reply_to: Some(pending.message_id),
            kind: MessageKind::Response,
            payload: response.to_string(),
            metadata: HashMap::new(),
        };

        if let Some(requester_session_id) = self.tree.get(&pending.requester).map(|n| n.session_id.clone()) {
            let log = open_log(&self.agents_dir, &requester_session_id)?;
            let ev = Event::MessageEnqueued {
                message_id: envelope.id.clone(),
                sender: envelope.sender.clone(),
                recipient: envelope.recipient.clone(),
                kind: envelope.kind,
                payload: envelope.payload.clone(),
                timestamp: envelope.timestamp,
                reply_to: envelope.reply_to.clone(),
                metadata: envelope.metadata.clone(),
            };
            log.log(now, ev.name(), ev.data()).map_err(log_err)?;
        }
        self.inboxes.deliver(pending.requester.clone(), envelope);
        Ok(())
    }

    fn log_agent_created(
        &self,
        session_id: &SessionId,
        agent_id: &AgentId,
        name: &str,
        parent_session_id: Option<SessionId>,
        instructions: &str,
    ) -> Result<(), CoreError> {
        let log = open_log(&self.agents_dir, session_id)?;
        let ev = Event::AgentCreated {
            agent_id: agent_id.clone(),
            name: name.to_string(),
            parent_session_id,
            instructions: instructions.to_string(),
        };
        log.log(self.clock.now(), ev.name(), ev.data()).map_err(log_err)
    }

    pub fn list_sessions(&self) -> Value {
        let sessions: Vec<Value> = self
            .scheduler
            .all_sessions()
            .iter()
            .map(session_summary)
            .collect();
        json!({ "sessions": sessions })
    }

    pub async fn suspend_session(&mut self, session_id: &SessionId) -> Result<Value, CoreError> {
        let suspended = self.scheduler.suspend_session(session_id).await?;
        Ok(json!({ "suspended": suspended }))
    }

    pub async fn resume_session(&mut self, session_id: &SessionId) -> Result<Value, CoreError> {
        self.scheduler.resume_session(session_id).await?;
        Ok(json!({ "status": "resumed" }))
    }

    pub async fn delete_session(&mut self, session_id: &SessionId) -> Result<Value, CoreError> {
        self.scheduler.delete_session(session_id).await?;
        Ok(json!({ "status": "deleted" }))
    }

    /// The tool surface a provider's own tool-calling loop invokes into
    /// mid-turn — the MCP bridge itself is an external collaborator (spec
    /// §1); this is "the callable that invokes the tool functions defined
    /// here" that bridge is expected to reach.
    pub fn dispatch_tool(&mut self, caller: &AgentId, tool: &str, params: Value) -> Result<Value, CoreError> {
        match tool {
            "send_message" => {
                let recipient_name = require_str(&params, "recipient_name")?;
                let text = params.get("text").and_then(Value::as_str).unwrap_or_default();
                let sync = params.get("sync").and_then(Value::as_bool).unwrap_or(true);
                let result = self.tools.send_message(&self.tree, &mut self.inboxes, caller, recipient_name, text, sync)?;
                if sync {
                    if let Some(recipient_id) = self.tree.resolve_one_hop_name(caller, recipient_name) {
                        let message_id = MessageId::new(result["message_id"].as_str().unwrap_or_default());
                        self.pending_replies
                            .entry(recipient_id)
                            .or_default()
                            .push_back(PendingReply { requester: caller.clone(), message_id });
                    }
                }
                Ok(result)
            }
            "broadcast" => {
                let text = params.get("text").and_then(Value::as_str).unwrap_or_default();
                self.tools.broadcast(&self.tree, &mut self.inboxes, caller, text)
            }
            "check_inbox" => self.tools.check_inbox(&self.tree, &mut self.inboxes, caller),
            "spawn_agent" => {
                let name = require_str(&params, "name")?;
                let instructions = params.get("instructions").and_then(Value::as_str).unwrap_or_default();
                let provider_name = params.get("provider_name").and_then(Value::as_str).unwrap_or("mock");
                let model = params.get("model").and_then(Value::as_str).unwrap_or("default");
                let caller_session = self
                    .tree
                    .get(caller)
                    .ok_or_else(|| CoreError::not_found(format!("agent {caller}")))?
                    .session_id
                    .clone();
                self.tools.spawn_agent(
                    &mut self.tree,
                    &mut self.scheduler,
                    caller,
                    &caller_session,
                    name,
                    instructions,
                    provider_name,
                    model,
                )
            }
            "inspect_agent" => {
                let name = require_str(&params, "name")?;
                self.tools.inspect_agent(&self.tree, caller, name)
            }
            other => Err(CoreError::InvalidOperation(format!("unknown tool '{other}'"))),
        }
    }

    /// Routes one parsed wire [`Request`] to the matching orchestrator
    /// operation — the `{id, method, params}` methods named in spec §6.
    pub async fn handle_request(&mut self, request: &Request) -> Result<Value, CoreError> {
        let params = &request.params;
        match request.method.as_str() {
            "agent.create" => {
                let name = require_str(params, "name")?;
                let instructions = params.get("instructions").and_then(Value::as_str).unwrap_or_default();
                let provider_name = params.get("provider_name").and_then(Value::as_str).unwrap_or("mock");
                let model = params.get("model").and_then(Value::as_str).unwrap_or("default");
                self.create_root_agent(name, instructions, provider_name, model).await
            }
            "agent.spawn" => {
                let parent = AgentId::new(require_str(params, "parent_agent_id")?);
                let name = require_str(params, "name")?;
                let instructions = params.get("instructions").and_then(Value::as_str).unwrap_or_default();
                let provider_name = params.get("provider_name").and_then(Value::as_str).unwrap_or("mock");
                let model = params.get("model").and_then(Value::as_str).unwrap_or("default");
                self.spawn_child(&parent, name, instructions, provider_name, model).await
            }
            "agent.terminate" => {
                let agent_id = AgentId::new(require_str(params, "agent_id")?);
                self.terminate_agent(&agent_id).await
            }
            "agent.send" => {
                let agent_id = AgentId::new(require_str(params, "agent_id")?);
                let text = params.get("text").and_then(Value::as_str).unwrap_or_default();
                self.run_turn(&agent_id, text).await
            }
            "session.list" => Ok(self.list_sessions()),
            "session.suspend" => {
                let session_id = SessionId::new(require_str(params, "session_id")?);
                self.suspend_session(&session_id).await
            }
            "session.resume" => {
                let session_id = SessionId::new(require_str(params, "session_id")?);
                self.resume_session(&session_id).await
            }
            "session.delete" => {
                let session_id = SessionId::new(require_str(params, "session_id")?);
                self.delete_session(&session_id).await
            }
            other => Err(CoreError::InvalidOperation(format!("unknown method '{other}'"))),
        }
    }
}

fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, CoreError> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::InvalidOperation(format!("missing required field '{field}'")))
}

fn session_summary(session: &Session) -> Value {
    json!({
        "id": session.id,
        "state": session.state.as_str(),
        "provider_name": session.provider_name,
        "model": session.model,
        "created_at": session.created_at_str(),
    })
}

fn open_log(agents_dir: &Path, session_id: &SessionId) -> Result<EventLog, CoreError> {
    let mut context = serde_json::Map::new();
    context.insert("session_id".to_string(), serde_json::Value::String(session_id.to_string()));
    EventLog::open(agents_dir.join(session_id.as_str()), context).map_err(log_err)
}

fn log_err(e: EventLogError) -> CoreError {
    CoreError::IoFailure(e.to_string())
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
