/// Health check endpoint
///
/// Reports database connectivity and, when rate limiting is configured, Redis
/// connectivity.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "redis": "disabled"
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use campushub_shared::db::pool;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` when every configured dependency answers, `degraded` otherwise
    pub status: String,

    /// Application version
    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,

    /// `connected`, `disconnected` or `disabled`
    pub redis: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database_ok = pool::health_check(&state.db).await.is_ok();

    let redis = match &state.redis {
        None => "disabled",
        Some(client) => match client.ping().await {
            Ok(true) => "connected",
            Ok(false) | Err(_) => "disconnected",
        },
    };

    let healthy = database_ok && redis != "disconnected";

    Ok(Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "connected" } else { "disconnected" }.to_string(),
        redis: redis.to_string(),
    }))
}
