/// User management endpoints
///
/// # Endpoints
///
/// - `GET /v1/admin/users` - List users (staff+)
/// - `POST /v1/admin/users/:id/verify` - Verify an account (staff+)
/// - `PUT /v1/admin/users/:id/role` - Change a role (admin)
/// - `DELETE /v1/admin/users/:id` - Delete an account (admin)

use super::{Page, Pagination};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use campushub_shared::{
    auth::{
        authorization::{require_role, require_staff},
        middleware::AuthContext,
    },
    inventory,
    models::user::{User, UserFilter, UserRole},
};
use serde::Deserialize;
use uuid::Uuid;

/// `GET /v1/admin/users` query
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub role: Option<UserRole>,
    pub verified: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListUsersQuery {
    fn split(self) -> (UserFilter, Pagination) {
        (
            UserFilter {
                role: self.role,
                verified: self.verified,
                search: self.search,
            },
            Pagination {
                limit: self.limit,
                offset: self.offset,
            },
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

fn user_not_found() -> ApiError {
    ApiError::NotFound("User not found".to_string())
}

/// Lists accounts, newest first
///
/// # Endpoint
///
/// ```text
/// GET /v1/admin/users?role=student&verified=false&search=ada&limit=20&offset=0
/// ```
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListUsersQuery>,
) -> ApiResult<Json<Page<User>>> {
    require_staff(&auth)?;

    let (filter, page) = query.split();
    let users = User::list(&state.db, &filter, page.limit(), page.offset()).await?;
    let total = User::count(&state.db, &filter).await?;

    Ok(Json(Page::new(users, total, page)))
}

/// Marks an account verified so it can reserve items
pub async fn verify_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    require_staff(&auth)?;

    let user = User::set_verified(&state.db, user_id, true)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = %user.id, verified_by = %auth.user_id, "User verified");

    Ok(Json(user))
}

/// Changes an account's role
///
/// The new role is carried by the user's access tokens from their next refresh.
///
/// # Errors
///
/// - `400 Bad Request`: Admin tried to change their own role
/// - `403 Forbidden`: Caller is not an admin
pub async fn set_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<SetRoleRequest>,
) -> ApiResult<Json<User>> {
    require_role(&auth, UserRole::Admin)?;

    if user_id == auth.user_id {
        return Err(ApiError::BadRequest(
            "Admins cannot change their own role".to_string(),
        ));
    }

    let user = User::set_role(&state.db, user_id, req.role)
        .await?
        .ok_or_else(user_not_found)?;

    tracing::info!(user_id = %user.id, role = %user.role, changed_by = %auth.user_id, "Role changed");

    Ok(Json(user))
}

/// Deletes an account
///
/// Pending reservations are cancelled in the same transaction so their stock
/// goes back on the shelf; the rest of the user's data is removed by cascade.
///
/// # Errors
///
/// - `400 Bad Request`: Admin tried to delete their own account
/// - `404 Not Found`: No such user
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    require_role(&auth, UserRole::Admin)?;

    if user_id == auth.user_id {
        return Err(ApiError::BadRequest(
            "Admins cannot delete their own account".to_string(),
        ));
    }

    let Some(cancelled) = inventory::delete_user(&state.db, user_id).await? else {
        return Err(user_not_found());
    };

    tracing::info!(
        user_id = %user_id,
        deleted_by = %auth.user_id,
        cancelled_reservations = cancelled,
        "User deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
