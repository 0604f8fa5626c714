use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use lectern_auth::pg::PgStore;
use lectern_auth::sweep::{self, DEFAULT_SWEEP_INTERVAL};
use lectern_core::clock::SystemClock;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lectern_worker=debug,lectern_auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let interval = sweep_interval()?;

    // --- Database ---
    let pool = lectern_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    lectern_db::health_check(&pool)
        .await
        .context("Database health check failed")?;

    lectern_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Token expiry sweep ---
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(sweep::run(
        PgStore::new(pool.clone()),
        Arc::new(SystemClock),
        interval,
        cancel.clone(),
    ));

    shutdown_signal().await?;

    cancel.cancel();
    if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
        tracing::warn!("Token sweep did not stop within 5s");
    }

    pool.close().await;
    tracing::info!("Worker stopped");
    Ok(())
}

/// `TOKEN_SWEEP_INTERVAL_SECS`, falling back to the default interval.
fn sweep_interval() -> anyhow::Result<Duration> {
    match std::env::var("TOKEN_SWEEP_INTERVAL_SECS") {
        Err(_) => Ok(DEFAULT_SWEEP_INTERVAL),
        Ok(raw) => {
            let secs: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("TOKEN_SWEEP_INTERVAL_SECS has an invalid value '{raw}'"))?;
            anyhow::ensure!(secs > 0, "TOKEN_SWEEP_INTERVAL_SECS must be positive");
            Ok(Duration::from_secs(secs))
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Received SIGINT (Ctrl-C), shutting down");
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        tracing::info!("Received SIGINT (Ctrl-C), shutting down");
    }

    Ok(())
}
