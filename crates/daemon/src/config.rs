// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves the daemon's state root and the fixed set of paths under it.
//!
//! State root resolution: `SUBSTRAT_STATE_DIR` env override, else
//! `$XDG_STATE_HOME/substrat`, else `~/.local/state/substrat`.

use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a home directory to place state under")]
    NoHomeDir,
    #[error("io error creating state directories: {0}")]
    Io(#[from] std::io::Error),
}

/// All filesystem locations the daemon touches, derived once at startup
/// from the state root.
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    pub agents_dir: PathBuf,
    pub workspaces_dir: PathBuf,
}

const SOCKET_FILE: &str = "daemon.sock";
const LOCK_FILE: &str = "daemon.pid";
const VERSION_FILE: &str = "daemon.version";
const LOG_FILE: &str = "daemon.log";
const AGENTS_DIR: &str = "agents";
const WORKSPACES_DIR: &str = "workspaces";

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = state_dir()?;
        Ok(Self {
            socket_path: state_dir.join(SOCKET_FILE),
            lock_path: state_dir.join(LOCK_FILE),
            version_path: state_dir.join(VERSION_FILE),
            log_path: state_dir.join(LOG_FILE),
            agents_dir: state_dir.join(AGENTS_DIR),
            workspaces_dir: state_dir.join(WORKSPACES_DIR),
            state_dir,
        })
    }

    /// Creates `state_dir`, `agents_dir`, and `workspaces_dir` if missing.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.state_dir)?;
        std::fs::create_dir_all(&self.agents_dir)?;
        std::fs::create_dir_all(&self.workspaces_dir)?;
        Ok(())
    }
}

fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = env::var("SUBSTRAT_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("substrat"));
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".local/state/substrat"))
}
