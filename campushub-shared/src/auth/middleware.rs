/// Bearer-token authentication for Axum
///
/// Validates `Authorization: Bearer <jwt>` headers and puts an [`AuthContext`]
/// into the request extensions. Handlers read it with
/// `Extension(auth): Extension<AuthContext>`.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use campushub_shared::auth::middleware::{jwt_auth_middleware, AuthContext};
///
/// async fn me(Extension(auth): Extension<AuthContext>) -> String {
///     format!("{} ({})", auth.user_id, auth.role)
/// }
///
/// let secret = "a-secret-that-is-at-least-32-bytes".to_string();
/// let app: Router = Router::new()
///     .route("/me", get(me))
///     .layer(middleware::from_fn(move |req, next| {
///         jwt_auth_middleware(secret.clone(), req, next)
///     }));
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_token, Claims, JwtError};
use crate::models::user::UserRole;

/// Authenticated caller, added to request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user ID
    pub user_id: Uuid,

    /// Role carried by the access token
    pub role: UserRole,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: UserRole) -> Self {
        Self { user_id, role }
    }

    pub fn from_claims(claims: &Claims) -> Self {
        Self::new(claims.sub, claims.role)
    }

    /// Staff desk access
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

/// Error type for authentication middleware
#[derive(Debug)]
pub enum AuthError {
    /// Missing authorization header
    MissingCredentials,

    /// Header present but not `Bearer <token>`
    InvalidFormat(String),

    /// Token validation failed
    InvalidToken(String),
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidIssuer => AuthError::InvalidToken("Invalid issuer".to_string()),
            other => AuthError::InvalidToken(format!("Invalid token: {}", other)),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingCredentials => {
                (StatusCode::UNAUTHORIZED, "Missing authorization header".to_string())
            }
            AuthError::InvalidFormat(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, msg),
        };

        let code = if status == StatusCode::BAD_REQUEST {
            "bad_request"
        } else {
            "unauthorized"
        };

        (
            status,
            Json(serde_json::json!({ "error": code, "message": message })),
        )
            .into_response()
    }
}

/// Extracts the token from an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}

/// Validates the bearer token in `headers`
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let token = bearer_token(headers)?;
    let claims = validate_token(token, secret)?;
    Ok(AuthContext::from_claims(&claims))
}

/// JWT authentication middleware
///
/// # Errors
///
/// - 401 if the header is missing, or the token is invalid or expired
/// - 400 if the header is not a Bearer token
pub async fn jwt_auth_middleware(
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_context = authenticate(req.headers(), &secret)?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
