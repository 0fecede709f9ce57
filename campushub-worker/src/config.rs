/// Worker configuration
///
/// # Environment Variables
///
/// | variable                   | default  |
/// |----------------------------|----------|
/// | `DATABASE_URL`             | required |
/// | `DATABASE_MAX_CONNECTIONS` | `5`      |
/// | `SWEEP_INTERVAL_SECS`      | `30`     |
/// | `SWEEP_BATCH_SIZE`         | `100`    |

use anyhow::Context;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,

    /// Time between sweeps (seconds)
    pub sweep_interval_secs: u64,

    /// Reservations expired per transaction
    pub batch_size: i64,
}

impl WorkerConfig {
    /// Loads configuration from environment variables (and `.env`)
    ///
    /// # Errors
    ///
    /// Fails if `DATABASE_URL` is missing or a numeric variable is invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config = Self {
            database_url: get("DATABASE_URL")
                .context("DATABASE_URL environment variable is required")?,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            sweep_interval_secs: parse_or(&get, "SWEEP_INTERVAL_SECS", 30)?,
            batch_size: parse_or(&get, "SWEEP_BATCH_SIZE", 100)?,
        };

        if config.sweep_interval_secs == 0 {
            anyhow::bail!("SWEEP_INTERVAL_SECS must be positive");
        }
        if config.batch_size <= 0 {
            anyhow::bail!("SWEEP_BATCH_SIZE must be positive");
        }

        Ok(config)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}={:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<WorkerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[("DATABASE_URL", "postgresql://localhost/campushub")]).unwrap();

        assert_eq!(config.sweep_interval(), Duration::from_secs(30));
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.database_max_connections, 5);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgresql://localhost/campushub"),
            ("SWEEP_INTERVAL_SECS", "5"),
            ("SWEEP_BATCH_SIZE", "25"),
        ])
        .unwrap();

        assert_eq!(config.sweep_interval_secs, 5);
        assert_eq!(config.batch_size, 25);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&[]).is_err());
        assert!(config_from(&[
            ("DATABASE_URL", "postgresql://localhost/campushub"),
            ("SWEEP_INTERVAL_SECS", "0"),
        ])
        .is_err());
        assert!(config_from(&[
            ("DATABASE_URL", "postgresql://localhost/campushub"),
            ("SWEEP_BATCH_SIZE", "lots"),
        ])
        .is_err());
    }
}
