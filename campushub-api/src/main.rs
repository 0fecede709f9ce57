//! # Campus Hub API Server
//!
//! Serves the `/v1` JSON API for the campus resource hub.
//!
//! ## Start-up
//!
//! 1. Load configuration from the environment (and `.env`)
//! 2. Connect to PostgreSQL and apply pending migrations
//! 3. Connect to Redis if `REDIS_URL` is set (rate limiting)
//! 4. Create the bootstrap admin if configured
//! 5. Serve until ctrl-c / SIGTERM
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p campushub-api
//! ```

use anyhow::Context;
use campushub_api::{
    app::{build_router, AppState},
    bootstrap,
    config::Config,
};
use campushub_shared::{
    db::{
        migrations::run_migrations,
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    redis::{RedisClient, RedisConfig},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campushub_api=debug,tower_http=debug".into());

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

async fn connect_redis(url: Option<&str>) -> Option<RedisClient> {
    let url = url?;

    match RedisClient::new(RedisConfig::new(url)).await {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, rate limiting disabled");
            None
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Campus Hub API v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Invalid configuration")?;

    let pool = create_pool(DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await
    .context("Failed to connect to the database")?;

    run_migrations(&pool)
        .await
        .context("Failed to apply database migrations")?;

    let redis = connect_redis(config.rate_limit.redis_url.as_deref()).await;

    if let Some(admin) = &config.admin {
        bootstrap::ensure_admin(&pool, admin).await?;
    }

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(pool.clone(), redis, config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!("Listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
