// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bare LLM HTTP client provider. Unlike the subprocess provider, it has no
//! external conversational process to restore from, so `suspend()` just
//! serializes the full turn history and `restore()` replays it — this
//! provider's "state" is the transcript itself.

use crate::error::ProviderError;
use crate::provider::{AgentProvider, ChunkStream, ProviderSession};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Transcript {
    model: String,
    system_prompt: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: &'a [Message],
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    content: String,
}

#[derive(Clone)]
pub struct HttpProvider {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AgentProvider for HttpProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn create(
        &self,
        model: &str,
        system_prompt: &str,
    ) -> Result<Box<dyn ProviderSession>, ProviderError> {
        Ok(Box::new(HttpSession {
            endpoint: self.endpoint.clone(),
            client: self.client.clone(),
            transcript: Transcript {
                model: model.to_string(),
                system_prompt: system_prompt.to_string(),
                messages: Vec::new(),
            },
        }))
    }

    async fn restore(&self, state: &[u8]) -> Result<Box<dyn ProviderSession>, ProviderError> {
        let transcript: Transcript =
            serde_json::from_slice(state).map_err(|e| ProviderError::RestoreFailed(e.to_string()))?;
        Ok(Box::new(HttpSession {
            endpoint: self.endpoint.clone(),
            client: self.client.clone(),
            transcript,
        }))
    }
}

struct HttpSession {
    endpoint: String,
    client: reqwest::Client,
    transcript: Transcript,
}

#[async_trait]
impl ProviderSession for HttpSession {
    async fn send(&mut self, prompt: &str) -> Result<ChunkStream, ProviderError> {
        self.transcript.messages.push(Message {
            role: "user".into(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: &self.transcript.model,
            system: &self.transcript.system_prompt,
            messages: &self.transcript.messages,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::SendFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| ProviderError::SendFailed(e.to_string()))?
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::SendFailed(e.to_string()))?;

        self.transcript.messages.push(Message {
            role: "assistant".into(),
            content: response.content.clone(),
        });

        Ok(Box::pin(tokio_stream::once(Ok(response.content))))
    }

    async fn suspend(&mut self) -> Result<Vec<u8>, ProviderError> {
        serde_json::to_vec(&self.transcript).map_err(|e| ProviderError::SendFailed(e.to_string()))
    }

    async fn stop(&mut self) -> Result<(), ProviderError> {
        Ok(())
    }
}
