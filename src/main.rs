//! bancho-keys - Main Application Entry Point
//!
//! # Subcommands
//!
//! - `serve`: REST API for issuing, listing, updating and revoking API keys
//! - `migrate`: apply the database schema
//! - `issue-key`: issue a key from the command line
//! - `restart`: scheduled restart of the containerized server

use bancho_keys::cli::Cli;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Reads RUST_LOG environment variable (defaults to "info" level).
    // Logs go to stderr; stdout carries only command output such as issued keys.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    Cli::parse().run().await
}
