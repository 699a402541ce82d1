//! CLI module for Conclave
//!
//! Provides commands:
//! - `ask`: Put a decision request to one or more agents
//! - `history`: Show a conversation, rebuilt from the log if needed
//! - `stop`: Stop a conversation
//! - `approvals`: Work the human approval queue
//! - `cost`: Inspect and record agent spend

use clap::{Parser, Subcommand};
use serde::Serialize;

pub mod approvals;
pub mod ask;
pub mod cost;
pub mod history;

/// Conclave multi-agent decision engine
#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(about = "Multi-agent decision orchestration")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask one or more agents for a decision
    Ask(ask::AskArgs),
    /// Show a conversation
    History(history::HistoryArgs),
    /// Stop a conversation
    Stop(history::StopArgs),
    /// Human approval requests
    #[command(subcommand)]
    Approvals(approvals::ApprovalCommands),
    /// Agent spend
    #[command(subcommand)]
    Cost(cost::CostCommands),
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let config = crate::app::load_config()?;
    let service = crate::app::open_service(&config).await?;

    let result = match command {
        Commands::Ask(args) => ask::run(&service, args).await,
        Commands::History(args) => history::run(&service, args).await,
        Commands::Stop(args) => history::stop(&service, args).await,
        Commands::Approvals(command) => approvals::run(&service, command).await,
        Commands::Cost(command) => cost::run(&service, command).await,
    };

    service.shutdown().await;
    result
}

/// Print a value as pretty JSON on stdout
pub(crate) fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse a JSON argument
pub(crate) fn parse_json(s: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {e}"))
}
