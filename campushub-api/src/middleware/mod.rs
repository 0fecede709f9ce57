/// Middleware modules for the API server
///
/// - Security headers
/// - Redis token-bucket rate limiting

pub mod rate_limit;
pub mod security;
