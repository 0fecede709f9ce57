/// Rate limiting middleware
///
/// Token bucket rate limiting with Redis-backed state, so every API instance
/// shares the same buckets. Two kinds of bucket exist:
///
/// - `ratelimit:user:{user_id}`: every authenticated request,
///   `RATE_LIMIT_PER_MINUTE` tokens
/// - `ratelimit:login:{email}`: login attempts, `LOGIN_ATTEMPTS_PER_MINUTE`
///   tokens
///
/// Rate limiting is only active when `REDIS_URL` is configured. Redis errors
/// let the request through (fail open) and are logged.
///
/// # Algorithm
///
/// - Buckets refill continuously at `limit / 60` tokens per second
/// - Each request consumes 1 token
/// - An empty bucket yields 429 with `Retry-After`
///
/// The refill and consume run in one Lua script, so concurrent requests cannot
/// both take the last token.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: requests allowed per minute
/// - `X-RateLimit-Remaining`: tokens left
/// - `Retry-After`: seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use campushub_shared::auth::middleware::AuthContext;
use campushub_shared::redis::{RedisClient, RedisClientError};
use axum::{
    extract::{Extension, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use chrono::Utc;

/// Bucket parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,

    /// Maximum tokens in bucket (burst capacity)
    pub bucket_capacity: u32,
}

impl RateLimit {
    /// Bucket allowing `requests_per_minute`, with a burst of the same size
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let requests_per_minute = requests_per_minute.max(1);
        RateLimit {
            requests_per_minute,
            refill_rate: f64::from(requests_per_minute) / 60.0,
            bucket_capacity: requests_per_minute,
        }
    }
}

/// Result of rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether request is allowed
    pub ok: bool,

    /// Tokens remaining
    pub remaining: u32,

    /// Seconds until a token is available (0 when allowed)
    pub retry_after: u64,
}

impl RateLimitResult {
    fn from_script(values: &[i64]) -> Option<Self> {
        match values {
            [ok, remaining, retry_after] => Some(Self {
                ok: *ok == 1,
                remaining: u32::try_from(*remaining).unwrap_or(0),
                retry_after: u64::try_from(*retry_after).unwrap_or(1).max(u64::from(*ok != 1)),
            }),
            _ => None,
        }
    }

    fn into_error(self) -> ApiError {
        ApiError::RateLimitExceeded {
            retry_after: self.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                self.retry_after
            ),
        }
    }
}

const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now_ms = tonumber(ARGV[3])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now_ms
end

local elapsed = math.max(0, now_ms - last_refill) / 1000
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', key, 'tokens', tostring(tokens), 'last_refill', now_ms)
redis.call('EXPIRE', key, math.ceil(capacity / refill_rate) + 60)

if allowed == 1 then
    return {1, math.floor(tokens), 0}
else
    return {0, 0, math.ceil((1 - tokens) / refill_rate)}
end
"#;

/// Takes one token from the bucket at `key`
///
/// # Errors
///
/// Returns an error if Redis is unreachable or the script fails.
pub async fn check_rate_limit(
    redis: &RedisClient,
    key: &str,
    limit: RateLimit,
) -> Result<RateLimitResult, RedisClientError> {
    let mut conn = redis.get_connection();
    let script = redis::Script::new(TOKEN_BUCKET_SCRIPT);

    let mut invocation = script.prepare_invoke();
    invocation
        .key(key)
        .arg(limit.bucket_capacity)
        .arg(limit.refill_rate)
        .arg(Utc::now().timestamp_millis());

    let values = tokio::time::timeout(
        redis.config().command_timeout(),
        invocation.invoke_async::<_, Vec<i64>>(&mut conn),
    )
    .await
    .map_err(|_| RedisClientError::CommandError("Rate limit script timed out".to_string()))??;

    RateLimitResult::from_script(&values).ok_or_else(|| {
        RedisClientError::CommandError(format!("Unexpected rate limit reply: {:?}", values))
    })
}

/// Checks a bucket, letting the request through if Redis is off or failing
async fn enforce(
    redis: Option<&RedisClient>,
    key: &str,
    limit: RateLimit,
) -> Result<Option<RateLimitResult>, ApiError> {
    let Some(redis) = redis else {
        return Ok(None);
    };

    match check_rate_limit(redis, key, limit).await {
        Ok(result) if result.ok => Ok(Some(result)),
        Ok(result) => {
            tracing::warn!(key = %key, retry_after = result.retry_after, "Rate limit exceeded");
            Err(result.into_error())
        }
        Err(e) => {
            tracing::error!(error = %e, key = %key, "Rate limit check failed, allowing request");
            Ok(None)
        }
    }
}

/// Per-user rate limiting for authenticated routes
///
/// Must run after JWT authentication (it reads [`AuthContext`]).
///
/// # Errors
///
/// - 429 Too Many Requests: Rate limit exceeded
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let limit = RateLimit::per_minute(state.config.rate_limit.requests_per_minute);
    let key = format!("ratelimit:user:{}", auth.user_id);

    let result = enforce(state.redis.as_ref(), &key, limit).await?;

    let mut response = next.run(request).await;

    if let Some(result) = result {
        let headers = response.headers_mut();
        headers.insert("X-RateLimit-Limit", HeaderValue::from(limit.requests_per_minute));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));
    }

    Ok(response)
}

/// Login attempt limiting, keyed by the (lowercased) email being tried
pub async fn check_login_attempt(state: &AppState, email: &str) -> Result<(), ApiError> {
    let limit = RateLimit::per_minute(state.config.rate_limit.login_attempts_per_minute);
    let key = format!("ratelimit:login:{}", email.trim().to_lowercase());

    enforce(state.redis.as_ref(), &key, limit).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};

    #[test]
    fn test_per_minute() {
        let limit = RateLimit::per_minute(120);
        assert_eq!(limit.requests_per_minute, 120);
        assert_eq!(limit.bucket_capacity, 120);
        assert_eq!(limit.refill_rate, 2.0);

        let limit = RateLimit::per_minute(10);
        assert!((limit.refill_rate - 0.1667).abs() < 0.001);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        assert_eq!(RateLimit::per_minute(0).requests_per_minute, 1);
    }

    #[test]
    fn test_script_reply_parsing() {
        assert_eq!(
            RateLimitResult::from_script(&[1, 41, 0]),
            Some(RateLimitResult {
                ok: true,
                remaining: 41,
                retry_after: 0
            })
        );

        let denied = RateLimitResult::from_script(&[0, 0, 6]).unwrap();
        assert!(!denied.ok);
        assert_eq!(denied.retry_after, 6);

        // A denied reply never tells the client to retry immediately.
        assert_eq!(RateLimitResult::from_script(&[0, 0, 0]).unwrap().retry_after, 1);

        assert!(RateLimitResult::from_script(&[1, 2]).is_none());
    }

    #[test]
    fn test_denied_result_becomes_429() {
        let response = RateLimitResult {
            ok: false,
            remaining: 0,
            retry_after: 3,
        }
        .into_error()
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "3");
    }

    #[tokio::test]
    async fn test_enforce_without_redis_allows() {
        let result = enforce(None, "ratelimit:user:test", RateLimit::per_minute(1)).await;
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    #[ignore] // Requires running Redis instance
    async fn test_bucket_empties_and_denies() {
        use campushub_shared::redis::RedisConfig;

        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let redis = RedisClient::new(RedisConfig::new(url)).await.unwrap();
        let key = format!("ratelimit:test:{}", uuid::Uuid::new_v4());
        let limit = RateLimit::per_minute(2);

        assert!(check_rate_limit(&redis, &key, limit).await.unwrap().ok);
        assert!(check_rate_limit(&redis, &key, limit).await.unwrap().ok);

        let denied = check_rate_limit(&redis, &key, limit).await.unwrap();
        assert!(!denied.ok);
        assert!(denied.retry_after >= 1);
    }
}
