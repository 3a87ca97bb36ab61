// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `substratd` — the Substrat daemon.
//!
//! Owns a hierarchy of LLM agent sessions, replaying each session's event
//! log to rebuild state on startup, and serves the CLI over a Unix socket.
//!
//! Architecture: one accept-loop task per client connection; all of them
//! serialize through a single `tokio::sync::Mutex<Orchestrator>`, matching
//! the teacher's listener-task/event-loop split scaled down to a single
//! shared mutex instead of a WAL-backed event bus.

use std::collections::HashMap;
use std::sync::Arc;

use substrat_providers::{AgentProvider, HttpProvider, SubprocessConfig, SubprocessProvider, TracedProvider};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use substrat_daemon::{lifecycle, Config, Listener};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_MAX_SLOTS: usize = 8;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("substratd {VERSION}");
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("usage: substratd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    setup_logging();

    let config = Config::load()?;
    let providers = build_providers();
    if providers.is_empty() {
        tracing::warn!(
            "no providers configured (set SUBSTRAT_AGENT_CMD and/or SUBSTRAT_PROVIDER_ENDPOINT); \
             agent.create/agent.spawn will fail until one is available"
        );
    }
    let max_slots = std::env::var("SUBSTRAT_MAX_SLOTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_SLOTS);

    info!("starting substratd {}", VERSION);

    let state = match lifecycle::startup(&config, providers, max_slots, VERSION).await {
        Ok(state) => state,
        Err(lifecycle::LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.lock_path).unwrap_or_default();
            eprintln!("substratd is already running");
            if !pid.trim().is_empty() {
                eprintln!("  pid: {}", pid.trim());
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start daemon: {}", e);
            return Err(e.into());
        }
    };

    info!(
        agents = state.recovery.agent_count,
        sessions = state.recovery.session_count,
        "recovery complete, listening on {}",
        config.socket_path.display()
    );

    let orchestrator = Arc::clone(&state.orchestrator);
    let listener_handle = tokio::spawn(Listener::new(state.listener, orchestrator).run());

    println!("READY");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    listener_handle.abort();
    lifecycle::shutdown(&config)?;
    info!("substratd stopped");
    Ok(())
}

fn build_providers() -> HashMap<String, Arc<dyn AgentProvider>> {
    let mut providers: HashMap<String, Arc<dyn AgentProvider>> = HashMap::new();

    if let Ok(cmd) = std::env::var("SUBSTRAT_AGENT_CMD") {
        let mut parts = cmd.split_whitespace();
        if let Some(program) = parts.next() {
            let args = parts.map(str::to_string).collect();
            let config = SubprocessConfig { program: program.to_string(), args };
            providers.insert(
                "subprocess".to_string(),
                Arc::new(TracedProvider::new(SubprocessProvider::new(config))),
            );
        }
    }

    if let Ok(endpoint) = std::env::var("SUBSTRAT_PROVIDER_ENDPOINT") {
        providers.insert("http".to_string(), Arc::new(TracedProvider::new(HttpProvider::new(endpoint))));
    }

    providers
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}

fn print_help() {
    println!("substratd {VERSION}");
    println!("The Substrat daemon — orchestrates a hierarchy of LLM agent sessions.");
    println!();
    println!("USAGE:");
    println!("    substratd");
    println!();
    println!("The daemon is typically started by the `substrat` CLI and should not");
    println!("be invoked directly. It listens on a Unix socket for commands.");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Print help information");
    println!("    -V, --version    Print version information");
    println!();
    println!("ENVIRONMENT:");
    println!("    SUBSTRAT_STATE_DIR        Override the state directory");
    println!("    SUBSTRAT_AGENT_CMD        Subprocess agent command, e.g. \"claude --print\"");
    println!("    SUBSTRAT_PROVIDER_ENDPOINT  HTTP provider endpoint");
    println!("    SUBSTRAT_MAX_SLOTS        Max concurrently-held provider sessions (default 8)");
}
