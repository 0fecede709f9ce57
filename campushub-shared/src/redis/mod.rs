/// Redis integration
///
/// Redis is optional for Campus Hub. When configured it backs the API's
/// token-bucket rate limiter; nothing else depends on it.
///
/// # Example
///
/// ```no_run
/// use campushub_shared::redis::{RedisClient, RedisConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RedisClient::new(RedisConfig::new("redis://localhost:6379")).await?;
/// assert!(client.ping().await?);
/// # Ok(())
/// # }
/// ```

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
