/// Staff dashboard
///
/// # Endpoint
///
/// ```text
/// GET /v1/dashboard
/// ```
///
/// # Response
///
/// ```json
/// {
///   "users": { "total": 412, "unverified": 9, "by_role": { "student": 380, "teacher": 25, "staff": 6, "admin": 1 } },
///   "products": { "total": 58, "available": 41, "low": 12, "out": 5 },
///   "reservations": { "pending": 17, "collected": 240, "cancelled": 31, "expired": 8, "overdue": 2 },
///   "posts": { "open": 14, "resolved": 66, "pending_claims": 3 }
/// }
/// ```

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use campushub_shared::{
    auth::{authorization::require_staff, middleware::AuthContext},
    models::{
        post::{Post, PostStatusCounts},
        product::{Product, StockStatusCounts},
        reservation::{Reservation, ReservationStatusCounts},
        user::{RoleCount, User, UserFilter, UserRole},
    },
};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct UserStats {
    pub total: i64,
    pub unverified: i64,
    /// Every role is present, zero when no account has it
    pub by_role: BTreeMap<&'static str, i64>,
}

impl UserStats {
    fn from_counts(counts: &[RoleCount], unverified: i64) -> Self {
        let mut by_role: BTreeMap<&'static str, i64> = UserRole::ALL
            .iter()
            .map(|role| (role.as_str(), 0))
            .collect();

        for count in counts {
            by_role.insert(count.role.as_str(), count.count);
        }

        Self {
            total: by_role.values().sum(),
            unverified,
            by_role,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductStats {
    pub total: i64,
    #[serde(flatten)]
    pub by_status: StockStatusCounts,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub users: UserStats,
    pub products: ProductStats,
    pub reservations: ReservationStatusCounts,
    pub posts: PostStatusCounts,
}

/// Aggregate counts for staff and admins
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DashboardResponse>> {
    require_staff(&auth)?;

    let role_counts = User::count_by_role(&state.db).await?;
    let unverified = User::count(
        &state.db,
        &UserFilter {
            verified: Some(false),
            ..Default::default()
        },
    )
    .await?;

    let stock = Product::status_counts(&state.db).await?;
    let reservations = Reservation::status_counts(&state.db).await?;
    let posts = Post::status_counts(&state.db).await?;

    Ok(Json(DashboardResponse {
        users: UserStats::from_counts(&role_counts, unverified),
        products: ProductStats {
            total: stock.available + stock.low + stock.out,
            by_status: stock,
        },
        reservations,
        posts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_stats_fill_missing_roles() {
        let counts = vec![
            RoleCount {
                role: UserRole::Student,
                count: 30,
            },
            RoleCount {
                role: UserRole::Admin,
                count: 1,
            },
        ];

        let stats = UserStats::from_counts(&counts, 4);

        assert_eq!(stats.total, 31);
        assert_eq!(stats.unverified, 4);
        assert_eq!(stats.by_role["student"], 30);
        assert_eq!(stats.by_role["teacher"], 0);
        assert_eq!(stats.by_role["staff"], 0);
        assert_eq!(stats.by_role["admin"], 1);
    }
}
