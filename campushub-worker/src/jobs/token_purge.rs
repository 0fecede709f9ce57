/// Deletes dead refresh tokens
///
/// Tokens that expired or were revoked more than the grace period ago are
/// removed. The grace period keeps recently revoked rows around for audit.

use super::{JobError, SweepJob};
use async_trait::async_trait;
use campushub_shared::models::refresh_token::RefreshToken;
use chrono::Duration;
use sqlx::PgPool;

#[derive(Debug, Clone, Copy)]
pub struct RefreshTokenPurgeJob {
    grace: Duration,
}

impl RefreshTokenPurgeJob {
    pub fn new(grace: Duration) -> Self {
        Self { grace }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }
}

impl Default for RefreshTokenPurgeJob {
    fn default() -> Self {
        Self::new(Duration::days(1))
    }
}

#[async_trait]
impl SweepJob for RefreshTokenPurgeJob {
    fn name(&self) -> &'static str {
        "refresh_token_purge"
    }

    async fn run_once(&self, pool: &PgPool) -> Result<u64, JobError> {
        Ok(RefreshToken::purge_expired(pool, self.grace).await?)
    }
}
