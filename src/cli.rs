//! Command line interface for the `bancho-keys` binary.

use crate::{
    config::{Config, RestartConfig},
    db,
    middleware::origin::OriginPolicy,
    models::api_key::CreateApiKeyRequest,
    routes,
    services::{api_key_service, restart},
};
use anyhow::Context;

#[derive(clap::Parser, Debug, Clone)]
#[clap(name = "bancho-keys", about = "API key service and maintenance tasks")]
pub struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API
    Serve,

    /// Bring the database schema up to date
    Migrate(MigrateArgs),

    /// Issue an API key for an existing user and print it once
    IssueKey(IssueKeyArgs),

    /// Restart every service in the compose directory (run from cron)
    Restart,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MigrateArgs {
    #[clap(
        long,
        help = "apply only the api_keys table, for databases that manage users themselves."
    )]
    pub schema_only: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct IssueKeyArgs {
    #[clap(long)]
    pub user_id: i64,

    #[clap(long)]
    pub description: Option<String>,

    #[clap(long = "scope", help = "scope granted to the key; may be repeated.")]
    pub scopes: Vec<String>,

    #[clap(long, help = "days until the key expires; omitted or 0 never expires.")]
    pub expires_in_days: Option<i64>,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Serve => serve().await,
            Command::Migrate(args) => migrate(args).await,
            Command::IssueKey(args) => issue_key(args).await,
            Command::Restart => {
                let config = RestartConfig::from_env().context("invalid restart configuration")?;
                restart::run(&config).await?;
                Ok(())
            }
        }
    }
}

async fn connect() -> anyhow::Result<(Config, db::DbPool)> {
    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    Ok((config, pool))
}

async fn serve() -> anyhow::Result<()> {
    let (config, pool) = connect().await?;

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations complete");

    let origin_policy = OriginPolicy::new(&config.allowed_origins, config.trusted_bot_user_id.clone())
        .context("invalid ALLOWED_ORIGINS")?;
    if origin_policy.is_none() {
        tracing::warn!("ALLOWED_ORIGINS is empty; /api/v2 accepts requests from any origin");
    }

    let app = routes::router(pool, origin_policy);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn migrate(args: MigrateArgs) -> anyhow::Result<()> {
    let (_, pool) = connect().await?;

    if args.schema_only {
        db::apply_api_keys_schema(&pool).await?;
        tracing::info!("api_keys schema applied");
    } else {
        db::run_migrations(&pool).await?;
        tracing::info!("Database migrations complete");
    }

    Ok(())
}

async fn issue_key(args: IssueKeyArgs) -> anyhow::Result<()> {
    let (_, pool) = connect().await?;

    api_key_service::fetch_owner(&pool, args.user_id)
        .await?
        .with_context(|| format!("user {} does not exist", args.user_id))?;

    let issued = api_key_service::issue(
        &pool,
        args.user_id,
        CreateApiKeyRequest {
            description: args.description,
            scopes: Some(args.scopes),
            expires_in_days: args.expires_in_days,
        },
    )
    .await?;

    println!("{}", issued.api_key);

    Ok(())
}
