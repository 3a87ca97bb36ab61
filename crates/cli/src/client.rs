// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client: dials the Unix socket and round-trips one request at a
//! time. Grounded in the teacher's `DaemonClient` shape (connect, a single
//! `send`, per-method wrappers), scaled down to Substrat's eight methods
//! and no auto-start/version-check machinery — the daemon is expected to
//! already be running.

use std::path::PathBuf;

use serde_json::Value;
use substrat_daemon::protocol::{self, ProtocolError};
use substrat_daemon::{Config, Request, Response};
use thiserror::Error;
use tokio::net::UnixStream;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("substratd is not running (no socket at {0})")]
    DaemonNotRunning(PathBuf),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("config error: {0}")]
    Config(#[from] substrat_daemon::ConfigError),

    #[error("daemon rejected the request: {0}")]
    Rejected(String),
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn connect() -> Result<Self, ClientError> {
        let config = Config::load()?;
        if !config.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(config.socket_path));
        }
        Ok(Self { socket_path: config.socket_path })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(ProtocolError::Io)?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = tokio::io::BufReader::new(read_half);

        let request = Request { id: 1, method: method.to_string(), params };
        protocol::write_message(&mut write_half, &request).await?;

        let response: Response = protocol::read_message(&mut reader).await?;
        match response {
            Response { result: Some(value), .. } => Ok(value),
            Response { error: Some(err), .. } => Err(ClientError::Rejected(err.message)),
            _ => Err(ClientError::Rejected("empty response".to_string())),
        }
    }

    pub async fn agent_create(
        &self,
        name: &str,
        instructions: &str,
        provider_name: &str,
        model: &str,
    ) -> Result<Value, ClientError> {
        self.call(
            "agent.create",
            serde_json::json!({ "name": name, "instructions": instructions, "provider_name": provider_name, "model": model }),
        )
        .await
    }

    pub async fn agent_spawn(
        &self,
        parent_agent_id: &str,
        name: &str,
        instructions: &str,
        provider_name: &str,
        model: &str,
    ) -> Result<Value, ClientError> {
        self.call(
            "agent.spawn",
            serde_json::json!({
                "parent_agent_id": parent_agent_id,
                "name": name,
                "instructions": instructions,
                "provider_name": provider_name,
                "model": model,
            }),
        )
        .await
    }

    pub async fn agent_terminate(&self, agent_id: &str) -> Result<Value, ClientError> {
        self.call("agent.terminate", serde_json::json!({ "agent_id": agent_id })).await
    }

    pub async fn agent_send(&self, agent_id: &str, text: &str) -> Result<Value, ClientError> {
        self.call("agent.send", serde_json::json!({ "agent_id": agent_id, "text": text })).await
    }

    pub async fn session_list(&self) -> Result<Value, ClientError> {
        self.call("session.list", Value::Null).await
    }

    pub async fn session_suspend(&self, session_id: &str) -> Result<Value, ClientError> {
        self.call("session.suspend", serde_json::json!({ "session_id": session_id })).await
    }

    pub async fn session_resume(&self, session_id: &str) -> Result<Value, ClientError> {
        self.call("session.resume", serde_json::json!({ "session_id": session_id })).await
    }

    pub async fn session_delete(&self, session_id: &str) -> Result<Value, ClientError> {
        self.call("session.delete", serde_json::json!({ "session_id": session_id })).await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
