//! Sage CLI - retrieval-augmented question answering over a local corpus
#![cfg_attr(
    test,
    allow(
        dead_code,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::print_stdout,
        clippy::print_stderr,
        reason = "Allow for tests"
    )
)]

use anyhow::Result;
use clap::Parser as _;
use cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt as _, util::SubscriberInitExt as _};

mod cli;
mod handlers;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sage=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            corpus_dir,
            keep_existing,
        } => {
            handlers::handle_ingest(&cli.config, &corpus_dir, keep_existing).await?;
        }
        Commands::Ask { question } => {
            handlers::handle_ask(&cli.config, &question).await?;
        }
        Commands::Stats => {
            handlers::handle_stats(&cli.config).await?;
        }
    }

    Ok(())
}
