/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login, token refresh and logout
/// - `users`: The caller's own profile
/// - `admin`: User management for staff and admins
/// - `products`: Stock catalogue and stock adjustments
/// - `reservations`: Reserving, collecting and cancelling
/// - `posts`: Lost & found feed
/// - `dashboard`: Aggregate counts for staff

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod posts;
pub mod products;
pub mod reservations;
pub mod users;

use serde::{Deserialize, Serialize};

/// Default page size for list endpoints
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Largest page size a client may ask for
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?limit=&offset=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    /// Limit clamped to `1..=MAX_PAGE_SIZE`
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Paged list response
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: Pagination) -> Self {
        Self {
            items,
            total,
            limit: page.limit(),
            offset: page.offset(),
        }
    }
}

/// Trims an optional string, mapping blank input to None
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let page = Pagination::default();
        assert_eq!(page.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_pagination_clamps() {
        let page = Pagination {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Pagination {
            limit: Some(0),
            offset: Some(40),
        };
        assert_eq!(page.limit(), 1);
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  Library ".to_string())), Some("Library".to_string()));
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }
}
