// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic in-memory provider for tests: records calls, lets the test
//! program responses and inject errors.

use crate::error::ProviderError;
use crate::provider::{AgentProvider, ChunkStream, ProviderSession};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Create { model: String },
    Restore,
    Send { prompt: String },
    Suspend,
    Stop,
}

#[derive(Default)]
struct Shared {
    calls: Vec<ProviderCall>,
    responses: VecDeque<Vec<String>>,
    send_error: Option<String>,
    restore_error: Option<String>,
}

/// Reference/mock [`AgentProvider`]. Every session it creates shares the
/// same call log and response queue so a test can assert on the whole
/// conversation regardless of which session object handled a turn.
#[derive(Clone)]
pub struct MockProvider {
    shared: Arc<Mutex<Shared>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
        }
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.shared.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.shared.lock().calls.clear();
    }

    /// Queue chunks to be returned by the next `send()` call, in order.
    pub fn push_response(&self, chunks: Vec<String>) {
        self.shared.lock().responses.push_back(chunks);
    }

    pub fn set_send_error(&self, message: Option<String>) {
        self.shared.lock().send_error = message;
    }

    pub fn set_restore_error(&self, message: Option<String>) {
        self.shared.lock().restore_error = message;
    }
}

#[async_trait]
impl AgentProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create(
        &self,
        model: &str,
        _system_prompt: &str,
    ) -> Result<Box<dyn ProviderSession>, ProviderError> {
        self.shared.lock().calls.push(ProviderCall::Create {
            model: model.to_string(),
        });
        Ok(Box::new(MockSession {
            shared: self.shared.clone(),
            transcript: Vec::new(),
        }))
    }

    async fn restore(&self, state: &[u8]) -> Result<Box<dyn ProviderSession>, ProviderError> {
        self.shared.lock().calls.push(ProviderCall::Restore);
        if let Some(message) = self.shared.lock().restore_error.clone() {
            return Err(ProviderError::RestoreFailed(message));
        }
        let transcript: Vec<String> = serde_json::from_slice(state).unwrap_or_default();
        Ok(Box::new(MockSession {
            shared: self.shared.clone(),
            transcript,
        }))
    }
}

struct MockSession {
    shared: Arc<Mutex<Shared>>,
    transcript: Vec<String>,
}

#[async_trait]
impl ProviderSession for MockSession {
    async fn send(&mut self, prompt: &str) -> Result<ChunkStream, ProviderError> {
        self.shared.lock().calls.push(ProviderCall::Send {
            prompt: prompt.to_string(),
        });
        if let Some(message) = self.shared.lock().send_error.clone() {
            return Err(ProviderError::SendFailed(message));
        }
        self.transcript.push(prompt.to_string());
        let chunks = self
            .shared
            .lock()
            .responses
            .pop_front()
            .unwrap_or_else(|| vec!["ok".to_string()]);
        Ok(Box::pin(tokio_stream::iter(chunks.into_iter().map(Ok))))
    }

    async fn suspend(&mut self) -> Result<Vec<u8>, ProviderError> {
        self.shared.lock().calls.push(ProviderCall::Suspend);
        Ok(serde_json::to_vec(&self.transcript).unwrap_or_default())
    }

    async fn stop(&mut self) -> Result<(), ProviderError> {
        self.shared.lock().calls.push(ProviderCall::Stop);
        Ok(())
    }
}
