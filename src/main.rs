//! Conclave - Multi-agent decision orchestration
//!
//! CLI entry point for the Conclave decision engine.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod app;
mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    // stdout carries command output; logs go to stderr
    let (plain, json) = if cli.log_json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conclave=info".into()),
        )
        .with(plain)
        .with(json)
        .init();

    debug!("Starting Conclave v{}", env!("CARGO_PKG_VERSION"));

    cli::run(cli).await
}
