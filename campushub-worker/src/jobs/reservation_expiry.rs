/// Expires pending reservations whose hold has run out
///
/// Each batch is one transaction in [`inventory::expire_due`], which moves the
/// reservations to `expired` and puts their units back on the shelf. Batches
/// repeat until one comes back short, so a backlog clears in a single sweep
/// without one huge transaction.

use super::{JobError, SweepJob};
use async_trait::async_trait;
use campushub_shared::inventory;
use sqlx::PgPool;

/// Default reservations per batch
pub const DEFAULT_BATCH_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct ReservationExpiryJob {
    batch_size: i64,
}

impl ReservationExpiryJob {
    pub fn new(batch_size: i64) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> i64 {
        self.batch_size
    }
}

impl Default for ReservationExpiryJob {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

#[async_trait]
impl SweepJob for ReservationExpiryJob {
    fn name(&self) -> &'static str {
        "reservation_expiry"
    }

    async fn run_once(&self, pool: &PgPool) -> Result<u64, JobError> {
        let mut total = 0;

        loop {
            let expired = inventory::expire_due(pool, self.batch_size).await?;
            total += expired;

            if expired < self.batch_size as u64 {
                break;
            }
        }

        Ok(total)
    }
}
