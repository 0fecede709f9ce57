/// Own-account endpoints
///
/// # Endpoints
///
/// - `GET /v1/users/me` - Current profile
/// - `PATCH /v1/users/me` - Update name / department
/// - `POST /v1/users/me/password` - Change password

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use campushub_shared::{
    auth::{middleware::AuthContext, password},
    models::{
        refresh_token::RefreshToken,
        user::{UpdateProfile, User},
    },
};
use serde::Deserialize;
use validator::Validate;

/// Profile update. An empty `department` clears it.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 100, message = "Department must be at most 100 characters"))]
    pub department: Option<String>,
}

impl UpdateProfileRequest {
    fn into_update(self) -> UpdateProfile {
        UpdateProfile {
            name: self.name.map(|n| n.trim().to_string()),
            department: self.department.map(|d| super::non_blank(Some(d))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Current user's profile
///
/// # Errors
///
/// - `404 Not Found`: Account was deleted after the token was issued
pub async fn get_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Updates the caller's name and/or department
pub async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let user = User::update_profile(&state.db, auth.user_id, req.into_update())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Changes the caller's password
///
/// Every refresh token of the account is revoked, so other sessions end when
/// their access token runs out.
///
/// # Errors
///
/// - `401 Unauthorized`: Current password is wrong
/// - `422 Unprocessable Entity`: New password too weak
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    if !password::verify_password(&req.current_password, &user.password_hash)? {
        return Err(ApiError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    password::validate_password_strength(&req.new_password).map_err(|message| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "new_password".to_string(),
            message,
        }])
    })?;

    let password_hash = password::hash_password(&req.new_password)?;
    User::update_password(&state.db, user.id, &password_hash).await?;

    let revoked = RefreshToken::revoke_all_for_user(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, revoked_tokens = revoked, "Password changed");

    Ok(StatusCode::NO_CONTENT)
}
