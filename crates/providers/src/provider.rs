// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The polymorphic provider contract. Providers know nothing about
//! sessions, trees, logs, or messaging — they only produce conversations.

use crate::error::ProviderError;
use async_trait::async_trait;
use std::pin::Pin;
use tokio_stream::Stream;

/// A finite, single-consumer sequence of response chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// An instantiated conversation with a provider.
#[async_trait]
pub trait ProviderSession: Send {
    /// Emits response chunks for `prompt`. The stream is finite — it ends
    /// when the provider has finished responding to this one prompt.
    async fn send(&mut self, prompt: &str) -> Result<ChunkStream, ProviderError>;

    /// Opaque state sufficient to restore this conversation later via
    /// [`AgentProvider::restore`].
    async fn suspend(&mut self) -> Result<Vec<u8>, ProviderError>;

    /// Releases any resources (subprocess, connection) held by this session.
    async fn stop(&mut self) -> Result<(), ProviderError>;
}

/// A factory for [`ProviderSession`]s: a CLI-subprocess agentic backend, a
/// bare HTTP LLM client, or a mock.
#[async_trait]
pub trait AgentProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn create(
        &self,
        model: &str,
        system_prompt: &str,
    ) -> Result<Box<dyn ProviderSession>, ProviderError>;

    async fn restore(&self, state: &[u8]) -> Result<Box<dyn ProviderSession>, ProviderError>;
}
