/// Redis client wrapper
///
/// Wraps `redis::aio::ConnectionManager`, which reconnects on its own, and adds a
/// PING health check with a command timeout.

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Redis client errors
#[derive(Error, Debug)]
pub enum RedisClientError {
    /// Connection error
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    /// Command execution error
    #[error("Redis command error: {0}")]
    CommandError(String),

    /// Configuration error
    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    /// Health check failed
    #[error("Redis health check failed: {0}")]
    HealthCheckFailed(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => {
                RedisClientError::ConnectionError(format!("IO error: {}", err))
            }
            _ => RedisClientError::CommandError(err.to_string()),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Connection URL, `redis://[user:password@]host:port[/db]`
    pub url: String,

    /// Timeout applied to individual commands (seconds)
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Configuration with the default 2 second command timeout
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            command_timeout_secs: 2,
        }
    }

    /// Command timeout as a `Duration`
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Cloneable Redis handle
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the initial connection fails.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis client connected");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// Sends PING and reports whether PONG came back
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.manager.clone();

        let result: Result<String, RedisError> = tokio::time::timeout(
            self.config.command_timeout(),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::HealthCheckFailed("PING command timed out".to_string()))?;

        match result {
            Ok(pong) => Ok(pong == "PONG"),
            Err(e) => Err(RedisClientError::HealthCheckFailed(e.to_string())),
        }
    }

    /// Connection handle for issuing commands
    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Client configuration
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// Replaces `user:password` in a Redis URL with `***:***` for logging
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let host = &url[at_pos + 1..];
            return format!("{}***:***@{}", scheme, host);
        }
    }
    url.to_string()
}
