//! Service entry point: configuration, telemetry, database, HTTP server.

use std::sync::Arc;
use std::time::Duration;

use migration::MigratorTrait;
use tokio_util::sync::CancellationToken;

use repopin::config::ConfigLoader;
use repopin::hosting::github::GithubFactory;
use repopin::rate_limit::{RateLimiter, spawn_sweeper};
use repopin::server::run_server;
use repopin::{db, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new().load()?;

    telemetry::init_tracing(&config)?;
    tracing::info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!("Configuration: {}", redacted);
    }

    let db = db::init_pool(&config).await?;
    migration::Migrator::up(&db, None).await?;

    let rate_limiter = Arc::new(RateLimiter::new());
    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        Arc::clone(&rate_limiter),
        Duration::from_secs(config.sync.sweep_interval_seconds),
        shutdown.clone(),
    );

    let hosting = Arc::new(GithubFactory::new(config.github_api_base.clone())?);
    let result = run_server(Arc::new(config), db, rate_limiter, hosting).await;

    shutdown.cancel();
    let _ = sweeper.await;
    result
}
