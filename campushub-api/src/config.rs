/// Configuration management for the API server
///
/// Loaded from environment variables (and a `.env` file in development).
///
/// # Environment Variables
///
/// | variable                    | default   |                                  |
/// |-----------------------------|-----------|----------------------------------|
/// | `API_HOST`                  | `0.0.0.0` |                                  |
/// | `API_PORT`                  | `8080`    |                                  |
/// | `CORS_ORIGINS`              | `*`       | comma separated                  |
/// | `PRODUCTION`                | `false`   | enables HSTS                     |
/// | `DATABASE_URL`              | required  |                                  |
/// | `DATABASE_MAX_CONNECTIONS`  | `10`      |                                  |
/// | `JWT_SECRET`                | required  | at least 32 characters           |
/// | `JWT_ACCESS_TTL_MINUTES`    | `60`      |                                  |
/// | `REFRESH_TOKEN_TTL_DAYS`    | `30`      |                                  |
/// | `RESERVATION_HOLD_HOURS`    | `48`      | until an uncollected hold expires|
/// | `MAX_RESERVATION_QUANTITY`  | `10`      | per reservation                  |
/// | `REDIS_URL`                 | unset     | enables rate limiting            |
/// | `RATE_LIMIT_PER_MINUTE`     | `120`     | per user                         |
/// | `LOGIN_ATTEMPTS_PER_MINUTE` | `10`      | per email                        |
/// | `ADMIN_EMAIL`, `ADMIN_PASSWORD`, `ADMIN_NAME` | unset | bootstrap admin |
///
/// # Example
///
/// ```no_run
/// use campushub_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub reservations: ReservationConfig,
    pub rate_limit: RateLimitConfig,

    /// Admin account created at start-up if missing
    pub admin: Option<AdminBootstrap>,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS header)
    pub production: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

impl JwtConfig {
    pub fn access_ttl(&self) -> Duration {
        Duration::minutes(self.access_ttl_minutes)
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::days(self.refresh_ttl_days)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfig {
    pub hold_hours: i64,
    pub max_quantity: i32,
}

impl ReservationConfig {
    pub fn hold(&self) -> Duration {
        Duration::hours(self.hold_hours)
    }
}

/// Rate limiting; disabled when `redis_url` is None
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub redis_url: Option<String>,
    pub requests_per_minute: u32,
    pub login_attempts_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminBootstrap {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub name: String,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or `JWT_SECRET` is missing
    /// - `JWT_SECRET` is shorter than 32 characters
    /// - A numeric variable doesn't parse, or a TTL is not positive
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url =
            get("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let jwt_secret = get("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let admin = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password,
                name: get("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
            }),
            _ => None,
        };

        let config = Self {
            api: ApiConfig {
                host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(&get, "API_PORT", 8080)?,
                cors_origins,
                production: parse_or(&get, "PRODUCTION", false)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_ttl_minutes: parse_or(&get, "JWT_ACCESS_TTL_MINUTES", 60)?,
                refresh_ttl_days: parse_or(&get, "REFRESH_TOKEN_TTL_DAYS", 30)?,
            },
            reservations: ReservationConfig {
                hold_hours: parse_or(&get, "RESERVATION_HOLD_HOURS", 48)?,
                max_quantity: parse_or(&get, "MAX_RESERVATION_QUANTITY", 10)?,
            },
            rate_limit: RateLimitConfig {
                redis_url: get("REDIS_URL"),
                requests_per_minute: parse_or(&get, "RATE_LIMIT_PER_MINUTE", 120)?,
                login_attempts_per_minute: parse_or(&get, "LOGIN_ATTEMPTS_PER_MINUTE", 10)?,
            },
            admin,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.access_ttl_minutes <= 0 || self.jwt.refresh_ttl_days <= 0 {
            anyhow::bail!("Token TTLs must be positive");
        }
        if self.reservations.hold_hours <= 0 {
            anyhow::bail!("RESERVATION_HOLD_HOURS must be positive");
        }
        if self.reservations.max_quantity <= 0 {
            anyhow::bail!("MAX_RESERVATION_QUANTITY must be positive");
        }
        if self.rate_limit.requests_per_minute == 0 || self.rate_limit.login_attempts_per_minute == 0 {
            anyhow::bail!("Rate limits must be positive");
        }
        Ok(())
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgresql://localhost/campushub"),
            ("JWT_SECRET", SECRET),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = load(&required()).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
        assert!(!config.api.production);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.jwt.access_ttl(), Duration::minutes(60));
        assert_eq!(config.jwt.refresh_ttl(), Duration::days(30));
        assert_eq!(config.reservations.hold(), Duration::hours(48));
        assert_eq!(config.reservations.max_quantity, 10);
        assert!(config.rate_limit.redis_url.is_none());
        assert_eq!(config.rate_limit.requests_per_minute, 120);
        assert_eq!(config.rate_limit.login_attempts_per_minute, 10);
        assert!(config.admin.is_none());
    }

    #[test]
    fn test_overrides() {
        let mut vars = required();
        vars.extend([
            ("API_PORT", "9000"),
            ("CORS_ORIGINS", "https://hub.campus.edu, https://admin.campus.edu"),
            ("PRODUCTION", "true"),
            ("RESERVATION_HOLD_HOURS", "24"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("ADMIN_EMAIL", "root@campus.edu"),
            ("ADMIN_PASSWORD", "Sup3r!secret"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.cors_origins.len(), 2);
        assert!(config.api.production);
        assert_eq!(config.reservations.hold_hours, 24);
        assert_eq!(config.rate_limit.redis_url.as_deref(), Some("redis://localhost:6379"));

        let admin = config.admin.unwrap();
        assert_eq!(admin.email, "root@campus.edu");
        assert_eq!(admin.name, "Administrator");
    }

    #[test]
    fn test_missing_required_vars() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://localhost/x")]).is_err());
    }

    #[test]
    fn test_short_jwt_secret_rejected() {
        let err = load(&[("DATABASE_URL", "postgresql://x"), ("JWT_SECRET", "short")]).unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        let mut vars = required();
        vars.push(("API_PORT", "eighty"));
        assert!(load(&vars).is_err());

        let mut vars = required();
        vars.push(("RESERVATION_HOLD_HOURS", "0"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_secret_is_not_serialized() {
        let config = load(&required()).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains(SECRET));
    }
}
