/// Refresh token store
///
/// Each row is one refresh token, stored as the SHA-256 hex digest of the
/// plaintext (see [`crate::auth::refresh_token`]). Tokens are single use:
/// [`RefreshToken::rotate`] revokes the presented token and issues a new one in
/// the same transaction.
///
/// # Example
///
/// ```no_run
/// use campushub_shared::models::refresh_token::RefreshToken;
/// use chrono::Duration;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let (token, plaintext) = RefreshToken::issue(&pool, user_id, Duration::days(30)).await?;
///
/// // Later, when the client presents `plaintext`:
/// if let Some((_new, next_plaintext)) =
///     RefreshToken::rotate(&pool, &plaintext, Duration::days(30)).await?
/// {
///     println!("hand {} back to the client", next_plaintext);
/// }
/// # let _ = token;
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::auth::refresh_token::{generate_refresh_token, hash_refresh_token};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,

    /// SHA-256 hex of the plaintext token
    #[serde(skip_serializing)]
    pub token_hash: String,

    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Usable right now
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

const TOKEN_COLUMNS: &str = "id, user_id, token_hash, expires_at, revoked_at, created_at";

impl RefreshToken {
    /// Issues a token for `user_id` valid for `ttl`
    ///
    /// Returns the row and the plaintext token. The plaintext is not stored.
    pub async fn issue(
        pool: &PgPool,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(Self, String), sqlx::Error> {
        let mut tx = pool.begin().await?;
        let issued = Self::insert(&mut tx, user_id, ttl).await?;
        tx.commit().await?;

        Ok(issued)
    }

    async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        ttl: Duration,
    ) -> Result<(Self, String), sqlx::Error> {
        let (plaintext, hash) = generate_refresh_token();

        let token = sqlx::query_as::<_, RefreshToken>(&format!(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(hash)
        .bind(Utc::now() + ttl)
        .fetch_one(&mut **tx)
        .await?;

        Ok((token, plaintext))
    }

    /// Looks up an unrevoked, unexpired token by its plaintext
    pub async fn find_active(pool: &PgPool, plaintext: &str) -> Result<Option<Self>, sqlx::Error> {
        let token = sqlx::query_as::<_, RefreshToken>(&format!(
            r#"
            SELECT {TOKEN_COLUMNS}
            FROM refresh_tokens
            WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()
            "#
        ))
        .bind(hash_refresh_token(plaintext))
        .fetch_optional(pool)
        .await?;

        Ok(token)
    }

    /// Revokes the presented token and issues its replacement
    ///
    /// Returns None if the token is unknown, expired or already used. The
    /// revoke is conditional, so two concurrent rotations of the same token
    /// yield at most one replacement.
    pub async fn rotate(
        pool: &PgPool,
        plaintext: &str,
        ttl: Duration,
    ) -> Result<Option<(Self, String)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let revoked: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE refresh_tokens
            SET revoked_at = NOW()
            WHERE token_hash = $1 AND revoked_at IS NULL AND expires_at > NOW()
            RETURNING user_id
            "#,
        )
        .bind(hash_refresh_token(plaintext))
        .fetch_optional(&mut *tx)
        .await?;

        let Some((user_id,)) = revoked else {
            return Ok(None);
        };

        let issued = Self::insert(&mut tx, user_id, ttl).await?;
        tx.commit().await?;

        Ok(Some(issued))
    }

    /// Revokes a token. Returns false if it was unknown or already revoked.
    pub async fn revoke(pool: &PgPool, plaintext: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE token_hash = $1 AND revoked_at IS NULL",
        )
        .bind(hash_refresh_token(plaintext))
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revokes every live token of a user, used on password change
    ///
    /// Role changes keep the tokens: the next refresh re-reads the user and picks
    /// up the new role. Deleting a user removes their tokens by cascade.
    pub async fn revoke_all_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes tokens that expired, or were revoked, before `now - grace`
    pub async fn purge_expired(pool: &PgPool, grace: Duration) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE expires_at < $1 OR revoked_at < $1
            "#,
        )
        .bind(Utc::now() - grace)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
