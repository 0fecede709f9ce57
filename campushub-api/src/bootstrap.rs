/// Start-up admin account
///
/// A fresh deployment has no one who can verify accounts or create staff.
/// When `ADMIN_EMAIL` and `ADMIN_PASSWORD` are set, the API creates that admin
/// on start-up unless an account with the email already exists.

use crate::config::AdminBootstrap;
use anyhow::Context;
use campushub_shared::{
    auth::password,
    models::user::{CreateUser, User, UserRole},
};
use sqlx::PgPool;

/// Creates the bootstrap admin if missing. Returns true if an account was created.
///
/// # Errors
///
/// Fails if the configured password is too weak or the database is unreachable.
pub async fn ensure_admin(pool: &PgPool, admin: &AdminBootstrap) -> anyhow::Result<bool> {
    if let Some(existing) = User::find_by_email(pool, &admin.email).await? {
        if existing.role != UserRole::Admin {
            tracing::warn!(
                user_id = %existing.id,
                role = %existing.role,
                "ADMIN_EMAIL belongs to a non-admin account; leaving it unchanged"
            );
        }
        return Ok(false);
    }

    password::validate_password_strength(&admin.password)
        .map_err(|reason| anyhow::anyhow!("ADMIN_PASSWORD rejected: {}", reason))?;

    let password_hash =
        password::hash_password(&admin.password).context("Failed to hash ADMIN_PASSWORD")?;

    let user = User::create(
        pool,
        CreateUser {
            email: admin.email.clone(),
            password_hash,
            name: admin.name.clone(),
            role: UserRole::Admin,
            department: None,
            verified: true,
        },
    )
    .await
    .context("Failed to create bootstrap admin")?;

    tracing::info!(user_id = %user.id, "Bootstrap admin created");

    Ok(true)
}
