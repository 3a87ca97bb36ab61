// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider implementations: the polymorphic conversational backend behind
//! every agent's session.

mod error;
mod http_provider;
mod provider;
mod subprocess_provider;
mod traced;

#[cfg(any(test, feature = "test-support"))]
pub mod mock_provider;
#[cfg(not(any(test, feature = "test-support")))]
mod mock_provider;

pub use error::ProviderError;
pub use http_provider::HttpProvider;
pub use provider::{AgentProvider, ChunkStream, ProviderSession};
pub use subprocess_provider::{SubprocessConfig, SubprocessProvider};
pub use traced::TracedProvider;

#[cfg(any(test, feature = "test-support"))]
pub use mock_provider::{MockProvider, ProviderCall};
