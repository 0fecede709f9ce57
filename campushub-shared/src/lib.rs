//! # Campus Hub Shared Library
//!
//! Types and business logic shared by the Campus Hub API server and the
//! background sweeper.
//!
//! ## Module Organization
//!
//! - `models`: database models and queries
//! - `inventory`: transactional reservation flow (reserve, collect, cancel, expire)
//! - `auth`: passwords, access/refresh tokens, Axum authentication, role checks
//! - `db`: connection pool and migrations
//! - `redis`: optional Redis client used for rate limiting

pub mod auth;
pub mod db;
pub mod inventory;
pub mod models;
pub mod redis;

/// Current version of the Campus Hub shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
