//! Scheduled restart of the containerized server.
//!
//! Invoked once a day by an external scheduler (`bancho-keys restart` from cron).
//! The task appends a timestamped line to an audit log, restarts every service
//! declared in the compose directory, and appends a second line on success.
//!
//! There is no locking, retry, timeout or rollback. Overlapping invocations
//! run concurrently. The audit log grows without rotation.

use crate::config::RestartConfig;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::{fs::OpenOptions, io::AsyncWriteExt, process::Command};

pub const START_MESSAGE: &str = "Starting scheduled server restart";
pub const COMPLETE_MESSAGE: &str = "Scheduled server restart complete";

/// Prefix of every audit line, in local time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum RestartError {
    #[error("restart command is empty")]
    EmptyCommand,

    #[error("failed to append to restart log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to run `{program}` in {dir}: {source}")]
    Spawn {
        program: String,
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("restart command exited with {0}")]
    Failed(ExitStatus),
}

/// Format one audit line: timestamp, a space, the message, newline.
pub fn format_log_line(at: DateTime<Local>, message: &str) -> String {
    format!("{} {}\n", at.format(TIMESTAMP_FORMAT), message)
}

/// Split the configured command into program and arguments.
fn split_command(command: &str) -> Result<(&str, Vec<&str>), RestartError> {
    let mut parts = command.split_whitespace();
    let program = parts.next().ok_or(RestartError::EmptyCommand)?;

    Ok((program, parts.collect()))
}

async fn append_line(path: &Path, message: &str) -> Result<(), RestartError> {
    let line = format_log_line(Local::now(), message);
    let log_err = |source| RestartError::Log {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(log_err)?;
    file.write_all(line.as_bytes()).await.map_err(log_err)?;
    file.flush().await.map_err(log_err)?;

    Ok(())
}

/// Append an audit line; a log that cannot be written never blocks the restart.
async fn record(path: &Path, message: &str) {
    if let Err(e) = append_line(path, message).await {
        tracing::warn!(error = %e, "continuing without audit line");
    }
}

/// Run the restart task once.
///
/// # Process
///
/// 1. Append the start line to `log_path`
/// 2. Run `command` with `compose_dir` as its working directory
/// 3. Wait for it, with no timeout
/// 4. Append the completion line if it exited successfully
///
/// The command's own stdout/stderr are inherited, not captured. Audit log
/// write failures are reported through tracing and do not stop the restart.
///
/// # Errors
///
/// Any failure after the start line leaves the log with that single line:
/// - `EmptyCommand`: nothing configured to run
/// - `Spawn`: missing directory or program not on `PATH`
/// - `Failed`: non-zero exit
pub async fn run(config: &RestartConfig) -> Result<(), RestartError> {
    record(&config.log_path, START_MESSAGE).await;

    let (program, args) = split_command(&config.command).inspect_err(|e| {
        tracing::error!(error = %e, "no restart command configured");
    })?;
    tracing::info!(dir = %config.compose_dir.display(), command = %config.command, "restarting services");

    let status = Command::new(program)
        .args(&args)
        .current_dir(&config.compose_dir)
        .status()
        .await
        .map_err(|source| RestartError::Spawn {
            program: program.to_string(),
            dir: config.compose_dir.clone(),
            source,
        })?;

    if !status.success() {
        tracing::error!(%status, "restart command failed");
        return Err(RestartError::Failed(status));
    }

    record(&config.log_path, COMPLETE_MESSAGE).await;
    tracing::info!("restart complete");

    Ok(())
}
