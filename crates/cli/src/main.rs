// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `substrat` — the CLI front end for the Substrat daemon.
//!
//! A thin wrapper: each subcommand is one RPC call through `DaemonClient`,
//! with the result pretty-printed as JSON. Grounded in the teacher's
//! `Cli`/`Commands` + per-domain `Args`/`Subcommand` shape, scaled down
//! from a dozen command groups to the two Substrat exposes (agent,
//! session).

mod client;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use client::DaemonClient;

#[derive(Parser)]
#[command(name = "substrat", version, about = "Control the Substrat agent daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Agent lifecycle: create, spawn children, terminate, send turns
    Agent(AgentArgs),
    /// Session lifecycle: list, suspend, resume, delete
    Session(SessionArgs),
}

#[derive(Args)]
struct AgentArgs {
    #[command(subcommand)]
    command: AgentCommand,
}

#[derive(Subcommand)]
enum AgentCommand {
    /// Create a root agent with no parent
    Create {
        /// Display name for the agent
        name: String,
        /// System instructions / prompt for the agent
        instructions: String,
        /// Provider to route this agent's turns through
        #[arg(long, default_value = "subprocess")]
        provider: String,
        /// Model identifier passed through to the provider
        #[arg(long, default_value = "")]
        model: String,
    },
    /// Spawn a child agent under an existing one
    Spawn {
        /// Parent agent ID
        parent_id: String,
        /// Display name for the new agent
        name: String,
        /// System instructions / prompt for the agent
        instructions: String,
        #[arg(long, default_value = "subprocess")]
        provider: String,
        #[arg(long, default_value = "")]
        model: String,
    },
    /// Terminate an agent and its subtree
    Terminate {
        /// Agent ID
        id: String,
    },
    /// Send a turn of text to an agent
    Send {
        /// Agent ID
        id: String,
        /// Text to send
        text: String,
    },
}

#[derive(Args)]
struct SessionArgs {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Subcommand)]
enum SessionCommand {
    /// List all sessions known to the daemon
    List,
    /// Suspend a session, releasing its provider slot
    Suspend {
        /// Session ID
        id: String,
    },
    /// Resume a suspended session
    Resume {
        /// Session ID
        id: String,
    },
    /// Delete a session and its event log
    Delete {
        /// Session ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = DaemonClient::connect().context("connecting to substratd")?;

    let result = match cli.command {
        Commands::Agent(args) => handle_agent(args.command, &client).await,
        Commands::Session(args) => handle_session(args.command, &client).await,
    }?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn handle_agent(command: AgentCommand, client: &DaemonClient) -> Result<serde_json::Value> {
    let value = match command {
        AgentCommand::Create { name, instructions, provider, model } => {
            client.agent_create(&name, &instructions, &provider, &model).await?
        }
        AgentCommand::Spawn { parent_id, name, instructions, provider, model } => {
            client.agent_spawn(&parent_id, &name, &instructions, &provider, &model).await?
        }
        AgentCommand::Terminate { id } => client.agent_terminate(&id).await?,
        AgentCommand::Send { id, text } => client.agent_send(&id, &text).await?,
    };
    Ok(value)
}

async fn handle_session(command: SessionCommand, client: &DaemonClient) -> Result<serde_json::Value> {
    let value = match command {
        SessionCommand::List => client.session_list().await?,
        SessionCommand::Suspend { id } => client.session_suspend(&id).await?,
        SessionCommand::Resume { id } => client.session_resume(&id).await?,
        SessionCommand::Delete { id } => client.session_delete(&id).await?,
    };
    Ok(value)
}
