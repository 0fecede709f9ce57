/// Reservation model and read queries
///
/// A reservation holds `quantity` units of a product for a user until staff hand
/// them out, the user cancels, or the hold expires. The reservations table is the
/// only place this relationship is stored: "who reserved this product" and "what
/// did this user reserve" are both queries here.
///
/// State changes (and the stock movements that go with them) live in
/// [`crate::inventory`] so they always run inside a transaction.
///
/// # State machine
///
/// ```text
/// pending -> collected
///         -> cancelled
///         -> expired
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Reservation lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Units are held, waiting for collection
    Pending,

    /// Staff handed the units out
    Collected,

    /// Cancelled by the user or staff; units returned to stock
    Cancelled,

    /// Hold ran out; units returned to stock by the sweeper
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Collected => "collected",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reservation row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,

    /// Units held (> 0)
    pub quantity: i32,

    pub status: ReservationStatus,
    pub reserved_at: DateTime<Utc>,

    /// When the sweeper may expire the hold
    pub expires_at: DateTime<Utc>,

    pub collected_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,

    /// Staff member who handed the units out
    pub handled_by: Option<Uuid>,

    pub updated_at: DateTime<Utc>,
}

/// Reservation joined with product and user names, for lists
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReservationDetail {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub reservation: Reservation,

    pub product_name: String,
    pub user_name: String,
    pub user_email: String,
}

/// Filter for the staff desk list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub product_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

/// Count of reservations per status
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReservationStatusCounts {
    pub pending: i64,
    pub collected: i64,
    pub cancelled: i64,
    pub expired: i64,
    /// Pending reservations already past their hold
    pub overdue: i64,
}

pub(crate) const RESERVATION_COLUMNS: &str = "id, user_id, product_id, quantity, status, reserved_at, \
                                              expires_at, collected_at, cancelled_at, handled_by, updated_at";

const DETAIL_SELECT: &str = r#"
    SELECT r.id, r.user_id, r.product_id, r.quantity, r.status, r.reserved_at,
           r.expires_at, r.collected_at, r.cancelled_at, r.handled_by, r.updated_at,
           p.name AS product_name, u.name AS user_name, u.email AS user_email
    FROM reservations r
    JOIN products p ON p.id = r.product_id
    JOIN users u ON u.id = r.user_id
"#;

impl Reservation {
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let reservation = sqlx::query_as::<_, Reservation>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(reservation)
    }

    /// A user's reservations, newest first
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use campushub_shared::models::reservation::{Reservation, ReservationStatus};
    /// # use sqlx::PgPool;
    /// # use uuid::Uuid;
    /// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    /// let pending = Reservation::list_by_user(&pool, user_id, Some(ReservationStatus::Pending)).await?;
    /// for r in pending {
    ///     println!("{} x{} until {}", r.product_name, r.reservation.quantity, r.reservation.expires_at);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<ReservationDetail>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ReservationDetail>(&format!(
            r#"
            {DETAIL_SELECT}
            WHERE r.user_id = $1
              AND ($2::reservation_status IS NULL OR r.status = $2)
            ORDER BY r.reserved_at DESC
            "#
        ))
        .bind(user_id)
        .bind(status)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Everyone who reserved a product, newest first
    pub async fn list_by_product(
        pool: &PgPool,
        product_id: Uuid,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<ReservationDetail>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ReservationDetail>(&format!(
            r#"
            {DETAIL_SELECT}
            WHERE r.product_id = $1
              AND ($2::reservation_status IS NULL OR r.status = $2)
            ORDER BY r.reserved_at DESC
            "#
        ))
        .bind(product_id)
        .bind(status)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Staff desk list. Pending reservations due soonest come first.
    pub async fn list(
        pool: &PgPool,
        filter: &ReservationFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReservationDetail>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ReservationDetail>(&format!(
            r#"
            {DETAIL_SELECT}
            WHERE ($1::reservation_status IS NULL OR r.status = $1)
              AND ($2::uuid IS NULL OR r.product_id = $2)
              AND ($3::uuid IS NULL OR r.user_id = $3)
            ORDER BY (r.status = 'pending') DESC, r.expires_at ASC, r.id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.status)
        .bind(filter.product_id)
        .bind(filter.user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    pub async fn count(pool: &PgPool, filter: &ReservationFilter) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM reservations
            WHERE ($1::reservation_status IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::uuid IS NULL OR user_id = $3)
            "#,
        )
        .bind(filter.status)
        .bind(filter.product_id)
        .bind(filter.user_id)
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    pub async fn status_counts(pool: &PgPool) -> Result<ReservationStatusCounts, sqlx::Error> {
        let counts = sqlx::query_as::<_, ReservationStatusCounts>(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'collected') AS collected,
                COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled,
                COUNT(*) FILTER (WHERE status = 'expired') AS expired,
                COUNT(*) FILTER (WHERE status = 'pending' AND expires_at <= NOW()) AS overdue
            FROM reservations
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(counts)
    }

    /// Units of a product currently held by pending reservations
    pub async fn pending_quantity_for_product(
        pool: &PgPool,
        product_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (quantity,): (i64,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(quantity), 0)::BIGINT
            FROM reservations
            WHERE product_id = $1 AND status = 'pending'
            "#,
        )
        .bind(product_id)
        .fetch_one(pool)
        .await?;

        Ok(quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_serializes_flat() {
        let now = Utc::now();
        let detail = ReservationDetail {
            reservation: Reservation {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                quantity: 2,
                status: ReservationStatus::Pending,
                reserved_at: now,
                expires_at: now,
                collected_at: None,
                cancelled_at: None,
                handled_by: None,
                updated_at: now,
            },
            product_name: "Oscilloscope".to_string(),
            user_name: "Ada".to_string(),
            user_email: "ada@campus.edu".to_string(),
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["quantity"], 2);
        assert_eq!(json["status"], "pending");
        assert_eq!(json["product_name"], "Oscilloscope");
    }
}
