/// Sweep jobs
///
/// Each job does one kind of periodic clean-up. The [`Sweeper`] calls
/// [`SweepJob::run_once`] on every job each interval; a job returns how many
/// rows it changed.
///
/// Jobs must be safe to run from several workers at once.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use campushub_worker::jobs::{JobError, SweepJob};
/// use sqlx::PgPool;
///
/// struct VacuumAnalyze;
///
/// #[async_trait]
/// impl SweepJob for VacuumAnalyze {
///     fn name(&self) -> &'static str {
///         "vacuum_analyze"
///     }
///
///     async fn run_once(&self, pool: &PgPool) -> Result<u64, JobError> {
///         sqlx::query("ANALYZE reservations").execute(pool).await?;
///         Ok(0)
///     }
/// }
/// ```
///
/// [`Sweeper`]: crate::sweeper::Sweeper

pub mod reservation_expiry;
pub mod token_purge;

pub use reservation_expiry::ReservationExpiryJob;
pub use token_purge::RefreshTokenPurgeJob;

use async_trait::async_trait;
use campushub_shared::inventory::InventoryError;
use sqlx::PgPool;

/// Job error types
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One periodic clean-up task
#[async_trait]
pub trait SweepJob: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Runs the job once. Returns the number of rows affected.
    async fn run_once(&self, pool: &PgPool) -> Result<u64, JobError>;
}
