/// User model and database operations
///
/// Accounts for everyone on campus. The role decides which panel a user sees:
/// students and teachers browse stock and reserve, staff run the stock desk,
/// admins manage accounts.
///
/// A user's reservations are not stored on the user row; they are read through
/// [`crate::models::reservation::Reservation::list_by_user`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email VARCHAR(255) NOT NULL,            -- unique on LOWER(email)
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255) NOT NULL,
///     role user_role NOT NULL DEFAULT 'student',
///     department VARCHAR(255),
///     verified BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use campushub_shared::models::user::{CreateUser, User, UserRole};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     email: "ada@campus.edu".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: "Ada".to_string(),
///     role: UserRole::Student,
///     department: Some("Physics".to_string()),
///     verified: false,
/// })
/// .await?;
///
/// let found = User::find_by_email(&pool, "ADA@campus.edu").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Campus roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Browses stock, reserves items, posts to the feed
    Student,

    /// Same rights as a student
    Teacher,

    /// Manages stock, verifies accounts, hands out reservations
    Staff,

    /// Everything staff can do plus role changes and account deletion
    Admin,
}

impl UserRole {
    /// All roles, lowest first
    pub const ALL: [UserRole; 4] = [
        UserRole::Student,
        UserRole::Teacher,
        UserRole::Staff,
        UserRole::Admin,
    ];

    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Staff => "staff",
            UserRole::Admin => "admin",
        }
    }

    /// Roles that may sign up on their own
    pub fn can_self_register(&self) -> bool {
        matches!(self, UserRole::Student | UserRole::Teacher)
    }

    /// Staff desk access (stock, reservations, verification)
    pub fn is_staff(&self) -> bool {
        self.has_permission(&UserRole::Staff)
    }

    /// Checks if this role has the permission level of the required role
    ///
    /// Hierarchy: Admin > Staff > Teacher > Student
    pub fn has_permission(&self, required: &UserRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            UserRole::Admin => 4,
            UserRole::Staff => 3,
            UserRole::Teacher => 2,
            UserRole::Student => 1,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID (UUID v4)
    pub id: Uuid,

    /// Email address, stored lowercase
    pub email: String,

    /// Argon2id password hash (PHC string). Never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,

    /// Display name
    pub name: String,

    /// Campus role
    pub role: UserRole,

    /// Faculty or department
    pub department: Option<String>,

    /// Set by staff once the account is checked. Only verified users can reserve.
    pub verified: bool,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,

    /// When the user last logged in
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address (lowercased on insert)
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    /// Display name
    pub name: String,

    /// Role to assign
    pub role: UserRole,

    /// Faculty or department
    pub department: Option<String>,

    /// Whether the account starts out verified
    pub verified: bool,
}

/// Profile fields a user may change on their own account
///
/// `None` leaves a field untouched. `department: Some(None)` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfile {
    /// New display name
    pub name: Option<String>,

    /// New department
    pub department: Option<Option<String>>,
}

/// Filter for the admin user list
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserFilter {
    /// Only this role
    pub role: Option<UserRole>,

    /// Only verified / unverified accounts
    pub verified: Option<bool>,

    /// Case-insensitive substring of name or email
    pub search: Option<String>,
}

impl UserFilter {
    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)))
    }
}

/// Escapes `%`, `_` and `\` for use inside an ILIKE pattern
pub(crate) fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Per-role account count for the dashboard
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RoleCount {
    pub role: UserRole,
    pub count: i64,
}

const USER_COLUMNS: &str = "id, email, password_hash, name, role, department, verified, \
                            created_at, updated_at, last_login_at";

impl User {
    /// Creates a new user in the database
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Email already exists (unique violation on `users_email_key`)
    /// - Database connection fails
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, name, role, department, verified)
            VALUES (LOWER($1), $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.email.trim())
        .bind(data.password_hash)
        .bind(data.name)
        .bind(data.role)
        .bind(data.department)
        .bind(data.verified)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address (case-insensitive)
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use campushub_shared::models::user::User;
    /// # use sqlx::PgPool;
    /// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
    /// if let Some(user) = User::find_by_email(&pool, "ada@campus.edu").await? {
    ///     println!("Found user: {}", user.name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email.trim())
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Lists users matching a filter, newest first
    pub async fn list(
        pool: &PgPool,
        filter: &UserFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::boolean IS NULL OR verified = $2)
              AND ($3::text IS NULL OR name ILIKE $3 OR email ILIKE $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(filter.role)
        .bind(filter.verified)
        .bind(filter.search_pattern())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// Counts users matching a filter
    pub async fn count(pool: &PgPool, filter: &UserFilter) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::boolean IS NULL OR verified = $2)
              AND ($3::text IS NULL OR name ILIKE $3 OR email ILIKE $3)
            "#,
        )
        .bind(filter.role)
        .bind(filter.verified)
        .bind(filter.search_pattern())
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Updates name and/or department
    ///
    /// Returns the updated user, or None if the user doesn't exist.
    pub async fn update_profile(
        pool: &PgPool,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error> {
        let clear_department = matches!(data.department, Some(None));
        let department = data.department.flatten();

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                department = CASE WHEN $4 THEN NULL ELSE COALESCE($3, department) END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(data.name)
        .bind(department)
        .bind(clear_department)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Replaces the password hash
    pub async fn update_password(
        pool: &PgPool,
        id: Uuid,
        password_hash: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Changes a user's role
    ///
    /// Promoting to staff or admin also marks the account verified.
    pub async fn set_role(
        pool: &PgPool,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET role = $2,
                verified = verified OR $3,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(role)
        .bind(role.is_staff())
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Sets the verification flag
    pub async fn set_verified(
        pool: &PgPool,
        id: Uuid,
        verified: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET verified = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(verified)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Stamps the last login time
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Number of accounts per role (roles with no accounts are omitted)
    pub async fn count_by_role(pool: &PgPool) -> Result<Vec<RoleCount>, sqlx::Error> {
        let counts = sqlx::query_as::<_, RoleCount>(
            "SELECT role, COUNT(*) AS count FROM users GROUP BY role ORDER BY role",
        )
        .fetch_all(pool)
        .await?;

        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_as_str() {
        assert_eq!(UserRole::Student.as_str(), "student");
        assert_eq!(UserRole::Teacher.as_str(), "teacher");
        assert_eq!(UserRole::Staff.as_str(), "staff");
        assert_eq!(UserRole::Admin.as_str(), "admin");
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(UserRole::Admin.has_permission(&UserRole::Staff));
        assert!(UserRole::Staff.has_permission(&UserRole::Teacher));
        assert!(UserRole::Teacher.has_permission(&UserRole::Student));
        assert!(UserRole::Staff.has_permission(&UserRole::Staff));

        assert!(!UserRole::Student.has_permission(&UserRole::Teacher));
        assert!(!UserRole::Teacher.has_permission(&UserRole::Staff));
        assert!(!UserRole::Staff.has_permission(&UserRole::Admin));
    }

    #[test]
    fn test_staff_and_self_registration() {
        assert!(UserRole::Staff.is_staff());
        assert!(UserRole::Admin.is_staff());
        assert!(!UserRole::Teacher.is_staff());

        assert!(UserRole::Student.can_self_register());
        assert!(UserRole::Teacher.can_self_register());
        assert!(!UserRole::Staff.can_self_register());
        assert!(!UserRole::Admin.can_self_register());
    }

    #[test]
    fn test_role_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&UserRole::Staff).unwrap(), "\"staff\"");
        let role: UserRole = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, UserRole::Admin);
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ada@campus.edu".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            name: "Ada".to_string(),
            role: UserRole::Student,
            department: None,
            verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            last_login_at: None,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("\"role\":\"student\""));
    }

    #[test]
    fn test_filter_search_pattern() {
        let filter = UserFilter {
            search: Some("  50%_off ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search_pattern().as_deref(), Some("%50\\%\\_off%"));

        let blank = UserFilter {
            search: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(blank.search_pattern().is_none());
    }
}
