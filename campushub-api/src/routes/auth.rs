/// Authentication endpoints
///
/// Access tokens are short-lived HS256 JWTs carrying the user's role. Refresh
/// tokens are opaque, stored hashed, and rotated on every use.
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register a student or teacher account
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Exchange a refresh token for a new pair
/// - `POST /v1/auth/logout` - Revoke a refresh token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    middleware::rate_limit::check_login_attempt,
};
use axum::{extract::State, http::StatusCode, Json};
use campushub_shared::{
    auth::{jwt, password},
    models::{
        refresh_token::RefreshToken,
        user::{CreateUser, User, UserRole},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password (will be validated for strength)
    #[validate(length(max = 128, message = "Password must be at most 128 characters"))]
    pub password: String,

    /// Display name
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// `student` (default) or `teacher`
    pub role: Option<UserRole>,

    /// Faculty or department
    #[validate(length(max = 100, message = "Department must be at most 100 characters"))]
    pub department: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Password
    pub password: String,
}

/// Refresh / logout request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// Refresh token
    pub refresh_token: String,
}

/// Token pair returned by register, login and refresh
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// The authenticated account
    pub user: User,

    /// Access token
    pub access_token: String,

    /// Refresh token (shown once)
    pub refresh_token: String,

    /// Always `Bearer`
    pub token_type: &'static str,

    /// Access token lifetime in seconds
    pub expires_in: i64,
}

fn token_response(
    state: &AppState,
    user: User,
    refresh_token: String,
) -> ApiResult<TokenResponse> {
    let ttl = state.config.jwt.access_ttl();
    let claims = jwt::Claims::new(user.id, user.role, ttl);
    let access_token = jwt::create_token(&claims, state.jwt_secret())?;

    Ok(TokenResponse {
        user,
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: ttl.num_seconds(),
    })
}

/// Register a new account
///
/// Students and teachers may self-register. New accounts are unverified until
/// staff verify them, so they can browse but not reserve.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "ada@campus.edu",
///   "password": "SecureP@ss123",
///   "name": "Ada",
///   "role": "student",
///   "department": "Physics"
/// }
/// ```
///
/// # Response
///
/// `201 Created` with a [`TokenResponse`].
///
/// # Errors
///
/// - `403 Forbidden`: Requested a staff or admin role
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    req.validate()?;

    password::validate_password_strength(&req.password).map_err(|message| {
        ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "password".to_string(),
            message,
        }])
    })?;

    let role = req.role.unwrap_or(UserRole::Student);
    if !role.can_self_register() {
        return Err(ApiError::Forbidden(format!(
            "The {} role cannot be self-assigned",
            role
        )));
    }

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email.trim().to_string(),
            password_hash,
            name: req.name.trim().to_string(),
            role,
            department: super::non_blank(req.department),
            verified: false,
        },
    )
    .await?;

    let (_, refresh_token) =
        RefreshToken::issue(&state.db, user.id, state.config.jwt.refresh_ttl()).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    Ok((StatusCode::CREATED, Json(token_response(&state, user, refresh_token)?)))
}

/// Login endpoint
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "ada@campus.edu",
///   "password": "SecureP@ss123"
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password
/// - `429 Too Many Requests`: Too many attempts for this email
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    req.validate()?;

    check_login_attempt(&state, &req.email).await?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, req.email.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::warn!(user_id = %user.id, "Failed login attempt");
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;

    let (_, refresh_token) =
        RefreshToken::issue(&state.db, user.id, state.config.jwt.refresh_ttl()).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    Ok(Json(token_response(&state, user, refresh_token)?))
}

/// Refresh token endpoint
///
/// The presented token is revoked and a new one is returned with a fresh
/// access token. The user row is re-read, so role changes apply from here on.
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown, expired, revoked or already-used token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let invalid = || ApiError::Unauthorized("Invalid or expired refresh token".to_string());

    let (token, refresh_token) =
        RefreshToken::rotate(&state.db, req.refresh_token.trim(), state.config.jwt.refresh_ttl())
            .await?
            .ok_or_else(invalid)?;

    let user = User::find_by_id(&state.db, token.user_id)
        .await?
        .ok_or_else(invalid)?;

    tracing::debug!(user_id = %user.id, "Refresh token rotated");

    Ok(Json(token_response(&state, user, refresh_token)?))
}

/// Logout endpoint
///
/// Revokes the refresh token. Always answers `204 No Content`, whether or not
/// the token was live.
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<StatusCode> {
    if RefreshToken::revoke(&state.db, req.refresh_token.trim()).await? {
        tracing::debug!("Refresh token revoked");
    }

    Ok(StatusCode::NO_CONTENT)
}
