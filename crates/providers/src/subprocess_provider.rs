// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI-subprocess agentic provider: one child process per conversation,
//! communicating one line-delimited JSON request/response pair per turn.
//!
//! Grounded in the spawn/send/kill shape of a CLI-subprocess agent adapter,
//! adapted from an interactive-terminal driver to a plain piped child
//! process — the session is addressed as an object, not looked up by id in
//! a shared table, per the provider/session split this crate implements.

use crate::error::ProviderError;
use crate::provider::{AgentProvider, ChunkStream, ProviderSession};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// How to launch the subprocess backing each session.
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Clone)]
pub struct SubprocessProvider {
    config: SubprocessConfig,
}

impl SubprocessProvider {
    pub fn new(config: SubprocessConfig) -> Self {
        Self { config }
    }

    fn spawn(&self) -> Result<Child, ProviderError> {
        Command::new(&self.config.program)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ProviderError::SpawnFailed(e.to_string()))
    }
}

#[async_trait]
impl AgentProvider for SubprocessProvider {
    fn name(&self) -> &str {
        "subprocess"
    }

    async fn create(
        &self,
        model: &str,
        system_prompt: &str,
    ) -> Result<Box<dyn ProviderSession>, ProviderError> {
        let mut child = self.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::SpawnFailed("no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::SpawnFailed("no stdout".into()))?;

        let mut session = SubprocessSession {
            config: self.config.clone(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
            transcript: Vec::new(),
        };
        session.write_request(&Request::Init {
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
        }).await?;
        Ok(Box::new(session))
    }

    async fn restore(&self, state: &[u8]) -> Result<Box<dyn ProviderSession>, ProviderError> {
        let transcript: Vec<Turn> =
            serde_json::from_slice(state).map_err(|e| ProviderError::RestoreFailed(e.to_string()))?;

        let mut child = self.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::SpawnFailed("no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::SpawnFailed("no stdout".into()))?;

        let mut session = SubprocessSession {
            config: self.config.clone(),
            child,
            stdin,
            stdout: BufReader::new(stdout),
            transcript: transcript.clone(),
        };
        session
            .write_request(&Request::Replay { turns: transcript })
            .await?;
        Ok(Box::new(session))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Turn {
    prompt: String,
    response: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum Request {
    #[serde(rename = "init")]
    Init { model: String, system_prompt: String },
    #[serde(rename = "replay")]
    Replay { turns: Vec<Turn> },
    #[serde(rename = "prompt")]
    Prompt { prompt: String },
}

#[derive(Debug, Deserialize)]
struct ResponseLine {
    chunk: String,
    #[serde(default)]
    done: bool,
}

struct SubprocessSession {
    #[allow(dead_code)]
    config: SubprocessConfig,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    transcript: Vec<Turn>,
}

impl SubprocessSession {
    async fn write_request(&mut self, request: &Request) -> Result<(), ProviderError> {
        let mut line = serde_json::to_vec(request).map_err(|e| ProviderError::SendFailed(e.to_string()))?;
        line.push(b'\n');
        self.stdin
            .write_all(&line)
            .await
            .map_err(|e| ProviderError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl ProviderSession for SubprocessSession {
    async fn send(&mut self, prompt: &str) -> Result<ChunkStream, ProviderError> {
        self.write_request(&Request::Prompt {
            prompt: prompt.to_string(),
        })
        .await?;

        let mut chunks = Vec::new();
        loop {
            let mut line = String::new();
            let n = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|e| ProviderError::SendFailed(e.to_string()))?;
            if n == 0 {
                return Err(ProviderError::SendFailed("subprocess closed stdout".into()));
            }
            let parsed: ResponseLine =
                serde_json::from_str(line.trim_end()).map_err(|e| ProviderError::SendFailed(e.to_string()))?;
            let done = parsed.done;
            chunks.push(parsed.chunk);
            if done {
                break;
            }
        }

        self.transcript.push(Turn {
            prompt: prompt.to_string(),
            response: chunks.concat(),
        });

        Ok(Box::pin(tokio_stream::iter(chunks.into_iter().map(Ok))))
    }

    async fn suspend(&mut self) -> Result<Vec<u8>, ProviderError> {
        serde_json::to_vec(&self.transcript).map_err(|e| ProviderError::SendFailed(e.to_string()))
    }

    async fn stop(&mut self) -> Result<(), ProviderError> {
        self.child
            .kill()
            .await
            .map_err(|e| ProviderError::StopFailed(e.to_string()))
    }
}
