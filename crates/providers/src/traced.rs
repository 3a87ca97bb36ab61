// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transparent `tracing` instrumentation for any [`AgentProvider`].

use crate::error::ProviderError;
use crate::provider::{AgentProvider, ChunkStream, ProviderSession};
use async_trait::async_trait;
use std::time::Instant;
use tokio_stream::StreamExt;

pub struct TracedProvider<P> {
    inner: P,
}

impl<P> TracedProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: AgentProvider> AgentProvider for TracedProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn create(
        &self,
        model: &str,
        system_prompt: &str,
    ) -> Result<Box<dyn ProviderSession>, ProviderError> {
        let span = tracing::info_span!("provider.create", provider = self.inner.name(), model);
        let _guard = span.enter();
        let started = Instant::now();
        let result = self.inner.create(model, system_prompt).await;
        match &result {
            Ok(_) => tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "session created"),
            Err(e) => tracing::warn!(error = %e, "session creation failed"),
        }
        result.map(|s| Box::new(TracedSession { inner: s }) as Box<dyn ProviderSession>)
    }

    async fn restore(&self, state: &[u8]) -> Result<Box<dyn ProviderSession>, ProviderError> {
        let span = tracing::info_span!("provider.restore", provider = self.inner.name(), state_size = state.len());
        let _guard = span.enter();
        let started = Instant::now();
        let result = self.inner.restore(state).await;
        match &result {
            Ok(_) => tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "session restored"),
            Err(e) => tracing::warn!(error = %e, "session restore failed"),
        }
        result.map(|s| Box::new(TracedSession { inner: s }) as Box<dyn ProviderSession>)
    }
}

struct TracedSession {
    inner: Box<dyn ProviderSession>,
}

#[async_trait]
impl ProviderSession for TracedSession {
    async fn send(&mut self, prompt: &str) -> Result<ChunkStream, ProviderError> {
        let span = tracing::debug_span!("session.send", prompt_len = prompt.len());
        let _guard = span.enter();
        let started = Instant::now();
        let stream = self.inner.send(prompt).await?;
        let collected: Vec<_> = stream.collect().await;
        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, chunks = collected.len(), "send complete");
        Ok(Box::pin(tokio_stream::iter(collected)))
    }

    async fn suspend(&mut self) -> Result<Vec<u8>, ProviderError> {
        let started = Instant::now();
        let result = self.inner.suspend().await;
        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "suspend complete");
        result
    }

    async fn stop(&mut self) -> Result<(), ProviderError> {
        let started = Instant::now();
        let result = self.inner.stop().await;
        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "stop complete");
        result
    }
}
