// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The non-blocking tool surface an agent's provider calls into. Every
//! method returns immediately with JSON; none may block on another agent's
//! reply — synchronous request/reply is a two-turn pattern handled by the
//! orchestrator's reply injection, not by waiting here.

use crate::scheduler::{DeferredSpawn, DeferredWork, TurnScheduler};
use crate::tree::{AgentTree, Router};
use crate::inbox::InboxTable;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use substrat_core::{
    AgentId, AgentNode, AgentState, Clock, CoreError, Event, IdGen, MessageEnvelope, MessageId,
    MessageKind, SessionId,
};

use crate::util::{log_err, open_log};

pub struct ToolHandler<C: Clock, G: IdGen> {
    agents_root: PathBuf,
    clock: C,
    id_gen: G,
}

impl<C: Clock, G: IdGen> ToolHandler<C, G> {
    pub fn new(agents_root: PathBuf, clock: C, id_gen: G) -> Self {
        Self {
            agents_root,
            clock,
            id_gen,
        }
    }

    fn session_of(tree: &AgentTree, id: &AgentId) -> Result<SessionId, CoreError> {
        Ok(tree
            .get(id)
            .ok_or_else(|| CoreError::not_found(format!("agent {id}")))?
            .session_id
            .clone())
    }

    fn log_enqueued(&self, recipient_session: &SessionId, envelope: &MessageEnvelope) -> Result<(), CoreError> {
        let log = open_log(&self.agents_root, recipient_session)?;
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
        log.log(self.clock.now(), ev.name(), ev.data()).map_err(log_err)?;
        Ok(())
    }

    fn build_envelope(
        &self,
        message_id: MessageId,
        sender: AgentId,
        recipient: Option<AgentId>,
        kind: MessageKind,
        text: &str,
        sync: bool,
    ) -> MessageEnvelope {
        let mut metadata = HashMap::new();
        if sync {
            metadata.insert("sync".to_string(), "true".to_string());
        }
        MessageEnvelope {
            id: message_id,
            timestamp: self.clock.now(),
            sender,
            recipient,
            reply_to: None,
            kind,
            payload: text.to_string(),
            metadata,
        }
    }

    /// Resolves `recipient_name` within `sender`'s one-hop neighborhood,
    /// validates the route, and delivers a `REQUEST` envelope.
    pub fn send_message(
        &self,
        tree: &AgentTree,
        inboxes: &mut InboxTable,
        sender: &AgentId,
        recipient_name: &str,
        text: &str,
        sync: bool,
    ) -> Result<Value, CoreError> {
        let recipient = tree
            .resolve_one_hop_name(sender, recipient_name)
            .ok_or_else(|| CoreError::not_found(format!("agent named '{recipient_name}'")))?;
        Router::validate_route(tree, sender, &recipient)?;

        let message_id = MessageId::new(self.id_gen.next());
        let envelope = self.build_envelope(
            message_id.clone(),
            sender.clone(),
            Some(recipient.clone()),
            MessageKind::Request,
            text,
            sync,
        );

        let recipient_session = Self::session_of(tree, &recipient)?;
        self.log_enqueued(&recipient_session, &envelope)?;
        inboxes.deliver(recipient, envelope);

        Ok(json!({
            "status": "sent",
            "message_id": message_id,
            "waiting_for_reply": sync,
        }))
    }

    /// Expands to `sender`'s team; each delivery is validated and logged
    /// independently, but all share one `message_id`.
    pub fn broadcast(
        &self,
        tree: &AgentTree,
        inboxes: &mut InboxTable,
        sender: &AgentId,
        text: &str,
    ) -> Result<Value, CoreError> {
        let team = Router::resolve_multicast(tree, sender);
        let message_id = MessageId::new(self.id_gen.next());

        for recipient in &team {
            Router::validate_route(tree, sender, recipient)?;
            let envelope = self.build_envelope(
                message_id.clone(),
                sender.clone(),
                Some(recipient.clone()),
                MessageKind::Multicast,
                text,
                false,
            );
            let recipient_session = Self::session_of(tree, recipient)?;
            self.log_enqueued(&recipient_session, &envelope)?;
            inboxes.deliver(recipient.clone(), envelope);
        }

        Ok(json!({
            "status": "sent",
            "message_id": message_id,
            "recipient_count": team.len(),
        }))
    }

    /// Drains the caller's inbox, logging `message.delivered` to the
    /// caller's own log for each envelope handed back.
    pub fn check_inbox(
        &self,
        tree: &AgentTree,
        inboxes: &mut InboxTable,
        caller: &AgentId,
    ) -> Result<Value, CoreError> {
        let caller_session = Self::session_of(tree, caller)?;
        let log = open_log(&self.agents_root, &caller_session)?;

        let drained = inboxes.collect(caller);
        let mut messages = Vec::with_capacity(drained.len());
        for envelope in drained {
            let ev = Event::MessageDelivered {
                message_id: envelope.id.clone(),
            };
            log.log(self.clock.now(), ev.name(), ev.data()).map_err(log_err)?;
            messages.push(json!({
                "from": envelope.sender,
                "text": envelope.payload,
                "message_id": envelope.id,
            }));
        }

        Ok(json!({ "messages": messages }))
    }

    /// Inserts the child into the tree synchronously (IDLE, no session
    /// state yet) and defers provider creation and `agent.created` logging
    /// to the scheduler's queue, so the child's slot isn't acquired while
    /// the parent's is still held.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn_agent(
        &self,
        tree: &mut AgentTree,
        scheduler: &mut TurnScheduler<C, G>,
        caller: &AgentId,
        caller_session: &SessionId,
        name: &str,
        instructions: &str,
        provider_name: &str,
        model: &str,
    ) -> Result<Value, CoreError> {
        if tree.by_name(caller, name).is_some() {
            return Err(CoreError::NameConflict {
                parent: caller.clone(),
                name: name.to_string(),
            });
        }

        let agent_id = AgentId::new(self.id_gen.next());
        let session_id = SessionId::new(self.id_gen.next());
        let now = self.clock.now();

        let node = AgentNode {
            session_id: session_id.clone(),
            id: agent_id.clone(),
            name: name.to_string(),
            parent_id: Some(caller.clone()),
            children: Vec::new(),
            instructions: instructions.to_string(),
            workspace_id: None,
            state: AgentState::Idle,
            created_at: now,
        };
        tree.add(node);

        scheduler.defer(DeferredWork::Spawn(DeferredSpawn {
            agent_id: agent_id.clone(),
            session_id,
            parent_session_id: Some(caller_session.clone()),
            name: name.to_string(),
            provider_name: provider_name.to_string(),
            model: model.to_string(),
            instructions: instructions.to_string(),
        }));

        Ok(json!({
            "status": "created",
            "agent_id": agent_id,
            "name": name,
        }))
    }

    /// `{state, recent_messages}` for a child of `caller` resolved by name.
    /// `recent_messages` is read back from the child's own event log — the
    /// last few `message.enqueued`/`message.delivered` entries.
    pub fn inspect_agent(&self, tree: &AgentTree, caller: &AgentId, name: &str) -> Result<Value, CoreError> {
        let child_id = tree
            .by_name(caller, name)
            .ok_or_else(|| CoreError::not_found(format!("agent named '{name}'")))?;
        let child = tree.get(&child_id).expect("resolved by_name above");

        let log = open_log(&self.agents_root, &child.session_id)?;
        let entries = log.read_all().map_err(log_err)?;
        const RECENT: usize = 10;
        let recent_messages: Vec<Value> = entries
            .iter()
            .filter(|e| e.event == "message.enqueued" || e.event == "message.delivered")
            .rev()
            .take(RECENT)
            .map(|e| json!({ "event": e.event, "ts": e.ts, "data": e.data }))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        Ok(json!({
            "state": child.state.as_str(),
            "recent_messages": recent_messages,
        }))
    }
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
