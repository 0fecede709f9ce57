/// Reservation endpoints
///
/// Reserving takes units off the shelf immediately. A pending reservation is
/// then collected at the desk, cancelled (units go back), or expired by the
/// worker once its hold runs out (units go back).
///
/// # Endpoints
///
/// - `POST /v1/reservations` - Reserve (verified users)
/// - `GET /v1/reservations/mine` - Caller's reservations
/// - `GET /v1/reservations` - Desk list (staff+)
/// - `POST /v1/reservations/:id/collect` - Hand out (staff+)
/// - `POST /v1/reservations/:id/cancel` - Cancel (owner or staff+)

use super::{Page, Pagination};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use campushub_shared::{
    auth::{
        authorization::{require_owner_or_staff, require_staff, require_verified},
        middleware::AuthContext,
    },
    inventory,
    models::{
        reservation::{Reservation, ReservationDetail, ReservationFilter, ReservationStatus},
        user::User,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReservationRequest {
    pub product_id: Uuid,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct MyReservationsQuery {
    pub status: Option<ReservationStatus>,
}

/// Desk list query
#[derive(Debug, Default, Deserialize)]
pub struct ListReservationsQuery {
    pub status: Option<ReservationStatus>,
    pub product_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListReservationsQuery {
    fn split(self) -> (ReservationFilter, Pagination) {
        (
            ReservationFilter {
                status: self.status,
                product_id: self.product_id,
                user_id: self.user_id,
            },
            Pagination {
                limit: self.limit,
                offset: self.offset,
            },
        )
    }
}

/// Reserves units of a product
///
/// # Endpoint
///
/// ```text
/// POST /v1/reservations
/// Content-Type: application/json
///
/// { "product_id": "uuid", "quantity": 2 }
/// ```
///
/// # Response
///
/// `201 Created` with the pending reservation. `expires_at` is when the hold
/// lapses.
///
/// # Errors
///
/// - `403 Forbidden`: Account not verified yet
/// - `404 Not Found`: No such product
/// - `409 Conflict`: Not enough stock, or a pending reservation of this product
///   already exists
/// - `422 Unprocessable Entity`: Quantity out of range
pub async fn create_reservation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateReservationRequest>,
) -> ApiResult<(StatusCode, Json<Reservation>)> {
    req.validate()?;

    let max_quantity = state.config.reservations.max_quantity;
    if req.quantity > max_quantity {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "quantity".to_string(),
            message: format!("Quantity must be at most {}", max_quantity),
        }]));
    }

    // Verification is not in the token; read it fresh.
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;
    require_verified(&auth, user.verified)?;

    let reservation = inventory::reserve(
        &state.db,
        auth.user_id,
        req.product_id,
        req.quantity,
        state.config.reservations.hold(),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

/// Caller's reservations, newest first
pub async fn my_reservations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<MyReservationsQuery>,
) -> ApiResult<Json<Vec<ReservationDetail>>> {
    let reservations = Reservation::list_by_user(&state.db, auth.user_id, query.status).await?;

    Ok(Json(reservations))
}

/// Desk list
///
/// # Endpoint
///
/// ```text
/// GET /v1/reservations?status=pending&product_id=uuid&user_id=uuid&limit=20&offset=0
/// ```
pub async fn list_reservations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListReservationsQuery>,
) -> ApiResult<Json<Page<ReservationDetail>>> {
    require_staff(&auth)?;

    let (filter, page) = query.split();
    let reservations = Reservation::list(&state.db, &filter, page.limit(), page.offset()).await?;
    let total = Reservation::count(&state.db, &filter).await?;

    Ok(Json(Page::new(reservations, total, page)))
}

/// Marks a pending reservation collected
///
/// # Errors
///
/// - `404 Not Found`: No such reservation
/// - `409 Conflict`: Reservation is no longer pending
pub async fn collect(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(reservation_id): Path<Uuid>,
) -> ApiResult<Json<Reservation>> {
    require_staff(&auth)?;

    let reservation = inventory::collect(&state.db, reservation_id, auth.user_id).await?;

    Ok(Json(reservation))
}

/// Cancels a pending reservation and puts its units back
///
/// # Errors
///
/// - `403 Forbidden`: Not the owner and not staff
/// - `404 Not Found`: No such reservation
/// - `409 Conflict`: Reservation is no longer pending
pub async fn cancel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(reservation_id): Path<Uuid>,
) -> ApiResult<Json<Reservation>> {
    let existing = Reservation::find_by_id(&state.db, reservation_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Reservation not found".to_string()))?;

    require_owner_or_staff(&auth, existing.user_id)?;

    let reservation = inventory::cancel(&state.db, reservation_id).await?;

    tracing::info!(
        reservation_id = %reservation.id,
        cancelled_by = %auth.user_id,
        "Reservation cancelled"
    );

    Ok(Json(reservation))
}
