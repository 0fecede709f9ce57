/// Sweeper loop
///
/// Runs every registered [`SweepJob`] once per interval until shut down.
///
/// ```text
/// Sweeper
///   ├─> tick (first tick fires immediately)
///   ├─> ReservationExpiryJob: expire overdue holds, return stock
///   ├─> RefreshTokenPurgeJob: delete dead refresh tokens
///   └─> wait for next tick or cancellation
/// ```
///
/// A failing job is logged and retried on the next tick; it never stops the
/// loop or the other jobs.
///
/// # Example
///
/// ```no_run
/// use campushub_worker::sweeper::Sweeper;
/// use sqlx::PgPool;
/// use std::time::Duration;
///
/// # async fn example(pool: PgPool) {
/// let sweeper = Sweeper::new(pool, Duration::from_secs(30));
/// let shutdown = sweeper.shutdown_token();
///
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     shutdown.cancel();
/// });
///
/// sweeper.run().await;
/// # }
/// ```

use crate::config::WorkerConfig;
use crate::jobs::{RefreshTokenPurgeJob, ReservationExpiryJob, SweepJob};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Outcome of one job in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job: &'static str,

    /// Rows affected, or the error message
    pub result: Result<u64, String>,
}

pub struct Sweeper {
    pool: PgPool,
    jobs: Vec<Arc<dyn SweepJob>>,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl Sweeper {
    /// Sweeper with no jobs registered
    pub fn new(pool: PgPool, interval: Duration) -> Self {
        Self {
            pool,
            jobs: Vec::new(),
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Sweeper running reservation expiry and refresh token purge
    pub fn with_default_jobs(pool: PgPool, config: &WorkerConfig) -> Self {
        let mut sweeper = Self::new(pool, config.sweep_interval());
        sweeper.register_job(Arc::new(ReservationExpiryJob::new(config.batch_size)));
        sweeper.register_job(Arc::new(RefreshTokenPurgeJob::default()));
        sweeper
    }

    pub fn register_job(&mut self, job: Arc<dyn SweepJob>) {
        tracing::info!(job = job.name(), "Registering sweep job");
        self.jobs.push(job);
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|job| job.name()).collect()
    }

    /// Token that stops [`Sweeper::run`] when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs every job once, in registration order
    pub async fn run_pass(&self) -> Vec<JobReport> {
        let mut reports = Vec::with_capacity(self.jobs.len());

        for job in &self.jobs {
            let started = Instant::now();
            let result = job.run_once(&self.pool).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match &result {
                Ok(0) => tracing::debug!(job = job.name(), elapsed_ms, "Nothing to sweep"),
                Ok(count) => tracing::info!(job = job.name(), count, elapsed_ms, "Sweep job finished"),
                Err(e) => tracing::error!(job = job.name(), error = %e, "Sweep job failed"),
            }

            reports.push(JobReport {
                job: job.name(),
                result: result.map_err(|e| e.to_string()),
            });
        }

        reports
    }

    /// Sweeps every interval until the shutdown token is cancelled
    pub async fn run(&self) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            jobs = ?self.job_names(),
            "Sweeper starting"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Shutdown requested, sweeper stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_pass().await;
                }
            }
        }
    }
}
