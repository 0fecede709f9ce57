/// Authorization checks
///
/// Pure functions over an [`AuthContext`]. Role checks use the role carried in
/// the access token; ownership checks compare the caller with the resource's
/// owner and let staff through.
///
/// # Example
///
/// ```
/// use campushub_shared::auth::authorization::{require_owner_or_staff, require_role};
/// use campushub_shared::auth::middleware::AuthContext;
/// use campushub_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let student = AuthContext::new(Uuid::new_v4(), UserRole::Student);
/// assert!(require_role(&student, UserRole::Staff).is_err());
/// assert!(require_owner_or_staff(&student, student.user_id).is_ok());
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::UserRole;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// User doesn't have required role
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole { required: UserRole, actual: UserRole },

    /// User neither owns the resource nor is staff
    #[error("Not authorized to access this resource")]
    NotAuthorized,

    /// Account must be verified by staff first
    #[error("Account is not verified yet")]
    NotVerified,
}

/// Requires at least `required` in the role hierarchy
pub fn require_role(auth: &AuthContext, required: UserRole) -> Result<(), AuthzError> {
    if auth.role.has_permission(&required) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole {
            required,
            actual: auth.role,
        })
    }
}

/// Staff or admin
pub fn require_staff(auth: &AuthContext) -> Result<(), AuthzError> {
    require_role(auth, UserRole::Staff)
}

/// Requires the caller to be `owner_id`
pub fn require_ownership(auth: &AuthContext, owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == owner_id {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

/// Requires the caller to be `owner_id` or staff
pub fn require_owner_or_staff(auth: &AuthContext, owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == owner_id || auth.is_staff() {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

/// Requires a verified account; staff accounts always pass
pub fn require_verified(auth: &AuthContext, verified: bool) -> Result<(), AuthzError> {
    if verified || auth.is_staff() {
        Ok(())
    } else {
        Err(AuthzError::NotVerified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: UserRole) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), role)
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(&ctx(UserRole::Admin), UserRole::Staff).is_ok());
        assert!(require_role(&ctx(UserRole::Staff), UserRole::Staff).is_ok());

        let err = require_role(&ctx(UserRole::Teacher), UserRole::Admin).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient permissions: requires admin, has teacher"
        );
    }

    #[test]
    fn test_require_staff() {
        assert!(require_staff(&ctx(UserRole::Staff)).is_ok());
        assert!(require_staff(&ctx(UserRole::Student)).is_err());
        assert!(require_staff(&ctx(UserRole::Teacher)).is_err());
    }

    #[test]
    fn test_require_ownership() {
        let auth = ctx(UserRole::Admin);
        assert!(require_ownership(&auth, auth.user_id).is_ok());
        // Admins are not owners of other people's resources.
        assert!(require_ownership(&auth, Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_require_owner_or_staff() {
        let student = ctx(UserRole::Student);
        assert!(require_owner_or_staff(&student, student.user_id).is_ok());
        assert!(matches!(
            require_owner_or_staff(&student, Uuid::new_v4()),
            Err(AuthzError::NotAuthorized)
        ));
        assert!(require_owner_or_staff(&ctx(UserRole::Staff), Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_require_verified() {
        assert!(require_verified(&ctx(UserRole::Student), true).is_ok());
        assert!(matches!(
            require_verified(&ctx(UserRole::Student), false),
            Err(AuthzError::NotVerified)
        ));
        assert!(require_verified(&ctx(UserRole::Staff), false).is_ok());
    }
}
