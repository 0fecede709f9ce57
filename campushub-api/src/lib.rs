//! # Campus Hub API Server Library
//!
//! HTTP API for the campus resource hub: accounts, stock and reservations, and
//! the lost & found feed.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `bootstrap`: Start-up admin account
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Rate limiting and security headers
//! - `routes`: API route handlers

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
