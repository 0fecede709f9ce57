/// Authentication and authorization primitives
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength checks
/// - [`jwt`]: short-lived HS256 access tokens carrying user id and role
/// - [`refresh_token`]: opaque refresh token generation and SHA-256 hashing
/// - [`middleware`]: Bearer authentication for Axum and [`middleware::AuthContext`]
/// - [`authorization`]: role and ownership checks
///
/// # Example
///
/// ```no_run
/// use campushub_shared::auth::jwt::{create_token, Claims};
/// use campushub_shared::auth::password::{hash_password, verify_password};
/// use campushub_shared::models::user::UserRole;
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct-horse-battery-1")?;
/// assert!(verify_password("correct-horse-battery-1", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), UserRole::Student, Duration::minutes(60));
/// let token = create_token(&claims, "a-secret-that-is-at-least-32-bytes")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod refresh_token;
