// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider spawn failed: {0}")]
    SpawnFailed(String),
    #[error("provider send failed: {0}")]
    SendFailed(String),
    #[error("provider restore failed: {0}")]
    RestoreFailed(String),
    #[error("provider stop failed: {0}")]
    StopFailed(String),
    #[error("session already stopped")]
    AlreadyStopped,
}
