/// Stock reservation flow
///
/// Every operation here runs in one database transaction and changes stock only
/// with conditional `UPDATE`s, never read-modify-write. Concurrent reservations
/// therefore cannot take `current_stock` below zero, and a failure at any step
/// rolls back the stock change together with the reservation change.
///
/// # Flow
///
/// ```text
/// reserve  : current_stock -= q, insert pending reservation
/// collect  : pending -> collected (stock unchanged, units leave with the user)
/// cancel   : pending -> cancelled, current_stock += q
/// expire   : pending -> expired,   current_stock += q   (sweeper)
/// ```
///
/// Deleting a user goes through [`delete_user`] so their holds are returned
/// before the cascade removes the rows.
///
/// # Example
///
/// ```no_run
/// use campushub_shared::inventory::{self, InventoryError};
/// use chrono::Duration;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid, product_id: Uuid) -> Result<(), InventoryError> {
/// let reservation = inventory::reserve(&pool, user_id, product_id, 2, Duration::hours(48)).await?;
///
/// match inventory::cancel(&pool, reservation.id).await {
///     Ok(cancelled) => println!("returned {} units", cancelled.quantity),
///     Err(InventoryError::NotPending(status)) => println!("already {}", status),
///     Err(e) => return Err(e),
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::reservation::{Reservation, ReservationStatus, RESERVATION_COLUMNS};

/// Unique index allowing one pending reservation per (user, product)
const ONE_PENDING_INDEX: &str = "reservations_one_pending_per_user_product";

/// Error type for inventory operations
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Product not found")]
    ProductNotFound,

    #[error("Reservation not found")]
    ReservationNotFound,

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i32, available: i32 },

    #[error("A pending reservation for this product already exists")]
    DuplicateReservation,

    #[error("Reservation is {0}, not pending")]
    NotPending(ReservationStatus),

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Holds `quantity` units of a product for a user until `now + hold`
///
/// # Errors
///
/// - `InvalidQuantity` if `quantity <= 0`
/// - `ProductNotFound` if the product doesn't exist
/// - `InsufficientStock` if fewer than `quantity` units are left
/// - `DuplicateReservation` if the user already has a pending reservation for it
pub async fn reserve(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    hold: Duration,
) -> Result<Reservation, InventoryError> {
    if quantity <= 0 {
        return Err(InventoryError::InvalidQuantity(quantity));
    }

    let mut tx = pool.begin().await?;

    let decremented = sqlx::query(
        r#"
        UPDATE products
        SET current_stock = current_stock - $2, updated_at = NOW()
        WHERE id = $1 AND current_stock >= $2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if decremented == 0 {
        let available: Option<(i32,)> =
            sqlx::query_as("SELECT current_stock FROM products WHERE id = $1")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;

        return Err(match available {
            None => InventoryError::ProductNotFound,
            Some((available,)) => InventoryError::InsufficientStock {
                requested: quantity,
                available,
            },
        });
    }

    let inserted = sqlx::query_as::<_, Reservation>(&format!(
        r#"
        INSERT INTO reservations (user_id, product_id, quantity, status, expires_at)
        VALUES ($1, $2, $3, 'pending', $4)
        RETURNING {RESERVATION_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now() + hold)
    .fetch_one(&mut *tx)
    .await;

    // Dropping `tx` on error rolls back the decrement.
    let reservation = match inserted {
        Ok(reservation) => reservation,
        Err(e) if is_unique_violation(&e, ONE_PENDING_INDEX) => {
            return Err(InventoryError::DuplicateReservation)
        }
        Err(e) => return Err(e.into()),
    };

    tx.commit().await?;

    info!(
        reservation_id = %reservation.id,
        user_id = %user_id,
        product_id = %product_id,
        quantity,
        "Reservation created"
    );

    Ok(reservation)
}

/// Marks a pending reservation collected by `staff_id`
///
/// Stock is not touched: it was taken off the shelf at reservation time.
pub async fn collect(
    pool: &PgPool,
    reservation_id: Uuid,
    staff_id: Uuid,
) -> Result<Reservation, InventoryError> {
    let mut tx = pool.begin().await?;

    let collected = sqlx::query_as::<_, Reservation>(&format!(
        r#"
        UPDATE reservations
        SET status = 'collected', collected_at = NOW(), handled_by = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING {RESERVATION_COLUMNS}
        "#
    ))
    .bind(reservation_id)
    .bind(staff_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(reservation) = collected else {
        return Err(not_pending_or_missing(&mut tx, reservation_id).await?);
    };

    tx.commit().await?;

    info!(
        reservation_id = %reservation.id,
        staff_id = %staff_id,
        "Reservation collected"
    );

    Ok(reservation)
}

/// Cancels a pending reservation and returns its units to stock
///
/// Cancelling a reservation that is no longer pending fails with `NotPending`
/// and changes nothing, so retries never return stock twice.
pub async fn cancel(pool: &PgPool, reservation_id: Uuid) -> Result<Reservation, InventoryError> {
    let mut tx = pool.begin().await?;

    let cancelled = sqlx::query_as::<_, Reservation>(&format!(
        r#"
        UPDATE reservations
        SET status = 'cancelled', cancelled_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        RETURNING {RESERVATION_COLUMNS}
        "#
    ))
    .bind(reservation_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(reservation) = cancelled else {
        return Err(not_pending_or_missing(&mut tx, reservation_id).await?);
    };

    release_stock(&mut tx, reservation.product_id, reservation.quantity).await?;
    tx.commit().await?;

    info!(
        reservation_id = %reservation.id,
        product_id = %reservation.product_id,
        quantity = reservation.quantity,
        "Reservation cancelled"
    );

    Ok(reservation)
}

/// Expires up to `batch_size` pending reservations past their hold
///
/// Due rows are claimed with `FOR UPDATE SKIP LOCKED`, so several sweepers can
/// run at once without expiring the same reservation twice. Returns the number
/// of reservations expired.
pub async fn expire_due(pool: &PgPool, batch_size: i64) -> Result<u64, InventoryError> {
    let mut tx = pool.begin().await?;

    let expired: Vec<(Uuid, Uuid, i32)> = sqlx::query_as(
        r#"
        WITH due AS (
            SELECT id
            FROM reservations
            WHERE status = 'pending' AND expires_at <= NOW()
            ORDER BY expires_at
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        UPDATE reservations r
        SET status = 'expired', updated_at = NOW()
        FROM due
        WHERE r.id = due.id
        RETURNING r.id, r.product_id, r.quantity
        "#,
    )
    .bind(batch_size)
    .fetch_all(&mut *tx)
    .await?;

    for (reservation_id, product_id, quantity) in &expired {
        release_stock(&mut tx, *product_id, *quantity).await?;
        debug!(
            reservation_id = %reservation_id,
            product_id = %product_id,
            quantity,
            "Reservation expired"
        );
    }

    tx.commit().await?;

    Ok(expired.len() as u64)
}

/// Deletes a user, returning the stock of their pending reservations first
///
/// Runs in one transaction. The user row is locked up front, which blocks the
/// foreign key check of any reservation being inserted for them, so no hold can
/// appear between the stock release and the cascading delete.
///
/// Returns `None` if the user doesn't exist, otherwise the number of
/// reservations cancelled.
pub async fn delete_user(pool: &PgPool, user_id: Uuid) -> Result<Option<u64>, InventoryError> {
    let mut tx = pool.begin().await?;

    let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

    if locked.is_none() {
        return Ok(None);
    }

    let cancelled: Vec<(Uuid, Uuid, i32)> = sqlx::query_as(
        r#"
        UPDATE reservations
        SET status = 'cancelled', cancelled_at = NOW(), updated_at = NOW()
        WHERE user_id = $1 AND status = 'pending'
        RETURNING id, product_id, quantity
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    for (reservation_id, product_id, quantity) in &cancelled {
        release_stock(&mut tx, *product_id, *quantity).await?;
        debug!(
            reservation_id = %reservation_id,
            product_id = %product_id,
            quantity,
            "Reservation cancelled with its user"
        );
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        user_id = %user_id,
        cancelled = cancelled.len(),
        "User deleted"
    );

    Ok(Some(cancelled.len() as u64))
}

/// Puts `quantity` held units of a product back on the shelf
///
/// Restock and write-off keep `current_stock + held <= total_stock`, so this
/// never needs clamping; a violation fails the `products` CHECK constraint and
/// rolls the transaction back.
async fn release_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), sqlx::Error> {
    let updated = sqlx::query(
        r#"
        UPDATE products
        SET current_stock = current_stock + $2, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if updated == 0 {
        warn!(product_id = %product_id, quantity, "Released stock for a missing product");
    }

    Ok(())
}

async fn not_pending_or_missing(
    tx: &mut Transaction<'_, Postgres>,
    reservation_id: Uuid,
) -> Result<InventoryError, sqlx::Error> {
    let status: Option<(ReservationStatus,)> =
        sqlx::query_as("SELECT status FROM reservations WHERE id = $1")
            .bind(reservation_id)
            .fetch_optional(&mut **tx)
            .await?;

    Ok(match status {
        Some((status,)) => InventoryError::NotPending(status),
        None => InventoryError::ReservationNotFound,
    })
}

/// True if `err` is a unique violation on `constraint`
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
