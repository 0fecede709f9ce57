//! # Campus Hub Worker
//!
//! Background sweeper for the campus resource hub:
//! - Expires pending reservations whose hold ran out, returning their stock
//! - Purges expired and revoked refresh tokens
//!
//! Several workers may run against the same database.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p campushub-worker
//! ```

use anyhow::Context;
use campushub_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use campushub_worker::{config::WorkerConfig, sweeper::Sweeper};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "campushub_worker=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Resolves on ctrl-c or SIGTERM
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            tracing::error!(error = %e, "Failed to listen for ctrl-c");
                            terminate.recv().await;
                        }
                    }
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Campus Hub Worker v{} starting", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env().context("Invalid configuration")?;

    let pool = create_pool(DatabaseConfig {
        url: config.database_url.clone(),
        max_connections: config.database_max_connections,
        ..Default::default()
    })
    .await
    .context("Failed to connect to the database")?;

    let sweeper = Sweeper::with_default_jobs(pool.clone(), &config);
    let shutdown = sweeper.shutdown_token();

    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.cancel();
    });

    sweeper.run().await;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}
