//! # Campus Hub Worker Library
//!
//! Periodic maintenance for the campus resource hub.
//!
//! ## Modules
//!
//! - `config`: Worker configuration from the environment
//! - `jobs`: Sweep jobs (reservation expiry, refresh token purge)
//! - `sweeper`: The loop that runs every job on an interval
//!
//! ## Example
//!
//! ```no_run
//! use campushub_worker::{config::WorkerConfig, sweeper::Sweeper};
//! use sqlx::PgPool;
//!
//! # async fn example(pool: PgPool) -> anyhow::Result<()> {
//! let config = WorkerConfig::from_env()?;
//! let sweeper = Sweeper::with_default_jobs(pool, &config);
//! sweeper.run().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod jobs;
pub mod sweeper;
