/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers should return `Result<T, ApiError>` which automatically
/// converts to appropriate HTTP status codes.
///
/// # Example
///
/// ```no_run
/// use axum::{extract::State, Json};
/// use campushub_api::{app::AppState, error::{ApiError, ApiResult}};
/// use campushub_shared::models::product::Product;
/// use uuid::Uuid;
///
/// async fn handler(State(state): State<AppState>) -> ApiResult<Json<Product>> {
///     let product = Product::find_by_id(&state.db, Uuid::nil())
///         .await?
///         .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
///     Ok(Json(product))
/// }
/// ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use campushub_shared::auth::{
    authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError,
};
use campushub_shared::inventory::InventoryError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email
    Conflict(String),

    /// Unprocessable entity (422) - validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded {
        retry_after: u64,
        message: String,
    },

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => write!(f, "Rate limit exceeded: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Handle rate limit separately to add Retry-After header
        if let ApiError::RateLimitExceeded { retry_after, message } = &self {
            let body = Json(ErrorResponse {
                error: "rate_limit_exceeded".to_string(),
                message: message.clone(),
                details: None,
            });

            let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after));
            return response;
        }

        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                msg,
                None,
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                msg,
                None,
            ),
            ApiError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                "forbidden",
                msg,
                None,
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "not_found",
                msg,
                None,
            ),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "conflict",
                msg,
                None,
            ),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::RateLimitExceeded { message, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
                message,
                None,
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                msg,
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    return match db_err.constraint() {
                        Some("users_email_key") => {
                            ApiError::Conflict("Email already registered".to_string())
                        }
                        Some("post_claims_one_per_claimant") => {
                            ApiError::Conflict("You already claimed this post".to_string())
                        }
                        Some(constraint) => {
                            ApiError::Conflict(format!("Constraint violation: {}", constraint))
                        }
                        None => ApiError::Conflict("Duplicate resource".to_string()),
                    };
                }

                if db_err.is_foreign_key_violation() {
                    return ApiError::NotFound("Referenced resource not found".to_string());
                }

                if db_err.is_check_violation() {
                    return ApiError::Conflict(format!(
                        "Constraint violation: {}",
                        db_err.constraint().unwrap_or("check")
                    ));
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

/// Convert request validation failures to a 422 with per-field details
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| ValidationErrorDetail {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("Invalid value ({})", e.code)),
                })
            })
            .collect();

        details.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(details)
    }
}

/// Convert authentication errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => {
                ApiError::Unauthorized("Missing authorization header".to_string())
            }
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InsufficientRole { .. } => {
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            AuthzError::NotAuthorized => {
                ApiError::Forbidden("Not authorized to access this resource".to_string())
            }
            AuthzError::NotVerified => {
                ApiError::Forbidden("Account must be verified by staff first".to_string())
            }
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert JWT errors to API errors
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer => ApiError::Unauthorized("Invalid token issuer".to_string()),
            JwtError::CreateError(msg) => ApiError::InternalError(msg),
            JwtError::ValidationError(_) => ApiError::Unauthorized("Invalid token".to_string()),
        }
    }
}

/// Convert reservation flow errors to API errors
impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::ProductNotFound => ApiError::NotFound("Product not found".to_string()),
            InventoryError::ReservationNotFound => {
                ApiError::NotFound("Reservation not found".to_string())
            }
            InventoryError::InvalidQuantity(_) => ApiError::BadRequest(err.to_string()),
            InventoryError::InsufficientStock { .. }
            | InventoryError::DuplicateReservation
            | InventoryError::NotPending(_) => ApiError::Conflict(err.to_string()),
            InventoryError::Database(db_err) => db_err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campushub_shared::models::reservation::ReservationStatus;
    use campushub_shared::models::user::UserRole;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[test]
    fn test_validation_error() {
        let errors = vec![
            ValidationErrorDetail {
                field: "email".to_string(),
                message: "Invalid email format".to_string(),
            },
            ValidationErrorDetail {
                field: "password".to_string(),
                message: "Password too short".to_string(),
            },
        ];

        let err = ApiError::ValidationError(errors);
        assert_eq!(err.to_string(), "Validation failed: 2 errors");
    }

    #[test]
    fn test_inventory_error_status_codes() {
        let status = |err: InventoryError| ApiError::from(err).into_response().status();

        assert_eq!(status(InventoryError::ProductNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(InventoryError::ReservationNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(InventoryError::InsufficientStock {
                requested: 3,
                available: 1
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(status(InventoryError::DuplicateReservation), StatusCode::CONFLICT);
        assert_eq!(
            status(InventoryError::NotPending(ReservationStatus::Expired)),
            StatusCode::CONFLICT
        );
        assert_eq!(status(InventoryError::InvalidQuantity(0)), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_authz_errors_are_forbidden() {
        let err: ApiError = AuthzError::InsufficientRole {
            required: UserRole::Admin,
            actual: UserRole::Staff,
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

        let err: ApiError = AuthzError::NotVerified.into();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ApiError::RateLimitExceeded {
            retry_after: 7,
            message: "slow down".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "7");
    }

    #[test]
    fn test_validation_errors_convert_to_details() {
        use validator::Validate;

        #[derive(Validate)]
        struct Input {
            #[validate(email(message = "Invalid email format"))]
            email: String,
            #[validate(length(min = 1, message = "Name is required"))]
            name: String,
        }

        let input = Input {
            email: "not-an-email".to_string(),
            name: String::new(),
        };
        let err: ApiError = input.validate().unwrap_err().into();

        match err {
            ApiError::ValidationError(details) => {
                assert_eq!(details.len(), 2);
                assert_eq!(details[0].field, "email");
                assert_eq!(details[0].message, "Invalid email format");
                assert_eq!(details[1].field, "name");
            }
            other => panic!("Expected validation error, got {other:?}"),
        }
    }
}
