//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to deserialize environment variables into type-safe structs,
//! one for the HTTP service and one for the scheduled restart task.

use serde::Deserialize;
use std::path::PathBuf;

/// HTTP service configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required): PostgreSQL connection string
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `ALLOWED_ORIGINS` (optional): comma separated origins admitted by the origin guard.
///   Leaving it empty disables the guard.
/// - `TRUSTED_BOT_USER_ID` (optional): value of `X-Discord-User-ID` that bypasses the origin check
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default)]
    pub allowed_origins: Vec<String>,

    #[serde(default)]
    pub trusted_bot_user_id: Option<String>,
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing (e.g., DATABASE_URL)
    /// - Environment variable values cannot be parsed into expected types
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        // Field names are converted automatically: database_url -> DATABASE_URL
        envy::from_env::<Config>()
    }
}

/// Settings for the scheduled restart task.
///
/// Read from `RESTART_`-prefixed variables so the task can run from cron
/// without a database configured:
///
/// - `RESTART_LOG_PATH`: audit log the task appends to
/// - `RESTART_COMPOSE_DIR`: directory holding the composition file
/// - `RESTART_COMMAND`: whitespace separated program and arguments
#[derive(Debug, Clone, Deserialize)]
pub struct RestartConfig {
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,

    #[serde(default = "default_compose_dir")]
    pub compose_dir: PathBuf,

    #[serde(default = "default_restart_command")]
    pub command: String,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("/var/log/bancho-restart.log")
}

fn default_compose_dir() -> PathBuf {
    PathBuf::from("/opt/bancho")
}

fn default_restart_command() -> String {
    "docker compose restart".to_string()
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            compose_dir: default_compose_dir(),
            command: default_restart_command(),
        }
    }
}

impl RestartConfig {
    /// Load restart settings from `RESTART_*` environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        envy::prefixed("RESTART_").from_env::<RestartConfig>()
    }
}
