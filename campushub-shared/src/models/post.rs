/// Lost & found feed: posts, likes, comments and claims
///
/// Anyone can post a lost or found item. Other users like and comment on posts,
/// and can file a claim ("that's mine" / "I found it"). The post author or staff
/// decide claims; approving one resolves the post and rejects the rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::escape_like;

/// Whether the item was lost or found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    Lost,
    Found,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "post_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Open,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "claim_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Approved,
    Rejected,
}

/// Post row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub kind: PostKind,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub image_url: Option<String>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn is_open(&self) -> bool {
        self.status == PostStatus::Open
    }
}

/// Feed row: a post with its counters as seen by one viewer
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub post: Post,

    pub author_name: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author_id: Uuid,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Claim {
    pub id: Uuid,
    pub post_id: Uuid,
    pub claimant_id: Uuid,
    pub claimant_name: String,
    pub message: String,
    pub status: ClaimStatus,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePost {
    pub author_id: Uuid,
    pub kind: PostKind,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub image_url: Option<String>,
}

/// Feed filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostFilter {
    pub kind: Option<PostKind>,
    pub status: Option<PostStatus>,
    pub author_id: Option<Uuid>,
    /// Case-insensitive substring of title, description or location
    pub search: Option<String>,
}

impl PostFilter {
    fn search_pattern(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)))
    }
}

/// Result of a like toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub like_count: i64,
}

/// Claim decision made by the post author or staff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimDecision {
    Approve,
    Reject,
}

/// Outcome of [`Post::decide_claim`]
#[derive(Debug, Clone)]
pub enum DecisionOutcome {
    /// Decision applied; carries the decided claim
    Decided(Claim),
    /// No such claim on this post
    NotFound,
    /// Claim was already decided
    AlreadyDecided(ClaimStatus),
    /// Post was resolved before the decision
    PostClosed,
}

/// Open / resolved post counts
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostStatusCounts {
    pub open: i64,
    pub resolved: i64,
    pub pending_claims: i64,
}

const POST_COLUMNS: &str = "id, author_id, kind, title, description, location, image_url, \
                            status, created_at, updated_at, resolved_at";

const CLAIM_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.claimant_id, u.name AS claimant_name, c.message,
           c.status, c.created_at, c.decided_at
    FROM post_claims c
    JOIN users u ON u.id = c.claimant_id
"#;

impl Post {
    pub async fn create(pool: &PgPool, data: CreatePost) -> Result<Self, sqlx::Error> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (author_id, kind, title, description, location, image_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(data.author_id)
        .bind(data.kind)
        .bind(data.title)
        .bind(data.description)
        .bind(data.location)
        .bind(data.image_url)
        .fetch_one(pool)
        .await?;

        Ok(post)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(post)
    }

    /// One post with counters for `viewer_id`
    pub async fn find_summary(
        pool: &PgPool,
        id: Uuid,
        viewer_id: Uuid,
    ) -> Result<Option<PostSummary>, sqlx::Error> {
        let summary = sqlx::query_as::<_, PostSummary>(
            r#"
            SELECT p.id, p.author_id, p.kind, p.title, p.description, p.location, p.image_url,
                   p.status, p.created_at, p.updated_at, p.resolved_at,
                   u.name AS author_name,
                   (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS like_count,
                   (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = p.id) AS comment_count,
                   EXISTS (SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = $2) AS liked_by_me
            FROM posts p
            JOIN users u ON u.id = p.author_id
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .bind(viewer_id)
        .fetch_optional(pool)
        .await?;

        Ok(summary)
    }

    /// Newest-first feed as seen by `viewer_id`
    pub async fn feed(
        pool: &PgPool,
        filter: &PostFilter,
        viewer_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostSummary>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PostSummary>(
            r#"
            SELECT p.id, p.author_id, p.kind, p.title, p.description, p.location, p.image_url,
                   p.status, p.created_at, p.updated_at, p.resolved_at,
                   u.name AS author_name,
                   (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS like_count,
                   (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = p.id) AS comment_count,
                   EXISTS (SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = $1) AS liked_by_me
            FROM posts p
            JOIN users u ON u.id = p.author_id
            WHERE ($2::post_kind IS NULL OR p.kind = $2)
              AND ($3::post_status IS NULL OR p.status = $3)
              AND ($4::uuid IS NULL OR p.author_id = $4)
              AND ($5::text IS NULL OR p.title ILIKE $5 OR p.description ILIKE $5 OR p.location ILIKE $5)
            ORDER BY p.created_at DESC, p.id
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(viewer_id)
        .bind(filter.kind)
        .bind(filter.status)
        .bind(filter.author_id)
        .bind(filter.search_pattern())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Number of posts matching `filter`
    pub async fn count(pool: &PgPool, filter: &PostFilter) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM posts p
            WHERE ($1::post_kind IS NULL OR p.kind = $1)
              AND ($2::post_status IS NULL OR p.status = $2)
              AND ($3::uuid IS NULL OR p.author_id = $3)
              AND ($4::text IS NULL OR p.title ILIKE $4 OR p.description ILIKE $4 OR p.location ILIKE $4)
            "#,
        )
        .bind(filter.kind)
        .bind(filter.status)
        .bind(filter.author_id)
        .bind(filter.search_pattern())
        .fetch_one(pool)
        .await?;

        Ok(count)
    }

    /// Deletes a post with its likes, comments and claims
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Marks an open post resolved. Returns None if missing or already resolved.
    pub async fn resolve(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET status = 'resolved', resolved_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'open'
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(post)
    }

    /// Likes the post, or removes the like if `user_id` already liked it
    ///
    /// Toggles on the same post are serialized on the post row, so two quick
    /// taps always end in opposite states. Returns `None` if the post is gone.
    pub async fn toggle_like(
        pool: &PgPool,
        post_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<LikeState>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM posts WHERE id = $1 FOR NO KEY UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query(
                "INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2)",
            )
            .bind(post_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        let (like_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM post_likes WHERE post_id = $1")
                .bind(post_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(Some(LikeState {
            liked: !removed,
            like_count,
        }))
    }

    pub async fn add_comment(
        pool: &PgPool,
        post_id: Uuid,
        author_id: Uuid,
        body: &str,
    ) -> Result<Comment, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            WITH inserted AS (
                INSERT INTO post_comments (post_id, author_id, body)
                VALUES ($1, $2, $3)
                RETURNING id, post_id, author_id, body, created_at
            )
            SELECT i.id, i.post_id, i.author_id, u.name AS author_name, i.body, i.created_at
            FROM inserted i
            JOIN users u ON u.id = i.author_id
            "#,
        )
        .bind(post_id)
        .bind(author_id)
        .bind(body)
        .fetch_one(pool)
        .await?;

        Ok(comment)
    }

    /// Comments on a post, oldest first
    pub async fn list_comments(pool: &PgPool, post_id: Uuid) -> Result<Vec<Comment>, sqlx::Error> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.post_id, c.author_id, u.name AS author_name, c.body, c.created_at
            FROM post_comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1
            ORDER BY c.created_at ASC, c.id
            "#,
        )
        .bind(post_id)
        .fetch_all(pool)
        .await?;

        Ok(comments)
    }

    pub async fn find_comment(
        pool: &PgPool,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<Option<Comment>, sqlx::Error> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"
            SELECT c.id, c.post_id, c.author_id, u.name AS author_name, c.body, c.created_at
            FROM post_comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.post_id = $1 AND c.id = $2
            "#,
        )
        .bind(post_id)
        .bind(comment_id)
        .fetch_optional(pool)
        .await?;

        Ok(comment)
    }

    pub async fn delete_comment(
        pool: &PgPool,
        post_id: Uuid,
        comment_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM post_comments WHERE post_id = $1 AND id = $2")
            .bind(post_id)
            .bind(comment_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Files a claim
    ///
    /// # Errors
    ///
    /// Unique violation on `post_claims_one_per_claimant` if the user already
    /// claimed this post.
    pub async fn create_claim(
        pool: &PgPool,
        post_id: Uuid,
        claimant_id: Uuid,
        message: &str,
    ) -> Result<Claim, sqlx::Error> {
        let claim = sqlx::query_as::<_, Claim>(
            r#"
            WITH inserted AS (
                INSERT INTO post_claims (post_id, claimant_id, message)
                VALUES ($1, $2, $3)
                RETURNING id, post_id, claimant_id, message, status, created_at, decided_at
            )
            SELECT i.id, i.post_id, i.claimant_id, u.name AS claimant_name, i.message,
                   i.status, i.created_at, i.decided_at
            FROM inserted i
            JOIN users u ON u.id = i.claimant_id
            "#,
        )
        .bind(post_id)
        .bind(claimant_id)
        .bind(message)
        .fetch_one(pool)
        .await?;

        Ok(claim)
    }

    pub async fn list_claims(pool: &PgPool, post_id: Uuid) -> Result<Vec<Claim>, sqlx::Error> {
        let claims = sqlx::query_as::<_, Claim>(&format!(
            "{CLAIM_SELECT} WHERE c.post_id = $1 ORDER BY c.created_at ASC, c.id"
        ))
        .bind(post_id)
        .fetch_all(pool)
        .await?;

        Ok(claims)
    }

    /// Approves or rejects a pending claim
    ///
    /// Approving resolves the post and rejects every other pending claim on it.
    /// Everything happens in one transaction with the post row locked, so two
    /// concurrent approvals cannot both win.
    pub async fn decide_claim(
        pool: &PgPool,
        post_id: Uuid,
        claim_id: Uuid,
        decision: ClaimDecision,
    ) -> Result<DecisionOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let post_status: Option<(PostStatus,)> =
            sqlx::query_as("SELECT status FROM posts WHERE id = $1 FOR UPDATE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((post_status,)) = post_status else {
            return Ok(DecisionOutcome::NotFound);
        };

        let current: Option<(ClaimStatus,)> = sqlx::query_as(
            "SELECT status FROM post_claims WHERE id = $1 AND post_id = $2 FOR UPDATE",
        )
        .bind(claim_id)
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((claim_status,)) = current else {
            return Ok(DecisionOutcome::NotFound);
        };

        if claim_status != ClaimStatus::Pending {
            return Ok(DecisionOutcome::AlreadyDecided(claim_status));
        }

        if post_status != PostStatus::Open {
            return Ok(DecisionOutcome::PostClosed);
        }

        let new_status = match decision {
            ClaimDecision::Approve => ClaimStatus::Approved,
            ClaimDecision::Reject => ClaimStatus::Rejected,
        };

        sqlx::query("UPDATE post_claims SET status = $2, decided_at = NOW() WHERE id = $1")
            .bind(claim_id)
            .bind(new_status)
            .execute(&mut *tx)
            .await?;

        if decision == ClaimDecision::Approve {
            sqlx::query(
                r#"
                UPDATE post_claims
                SET status = 'rejected', decided_at = NOW()
                WHERE post_id = $1 AND id <> $2 AND status = 'pending'
                "#,
            )
            .bind(post_id)
            .bind(claim_id)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                UPDATE posts
                SET status = 'resolved', resolved_at = NOW(), updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        }

        let claim = sqlx::query_as::<_, Claim>(&format!("{CLAIM_SELECT} WHERE c.id = $1"))
            .bind(claim_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(DecisionOutcome::Decided(claim))
    }

    pub async fn status_counts(pool: &PgPool) -> Result<PostStatusCounts, sqlx::Error> {
        let counts = sqlx::query_as::<_, PostStatusCounts>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM posts WHERE status = 'open') AS open,
                (SELECT COUNT(*) FROM posts WHERE status = 'resolved') AS resolved,
                (SELECT COUNT(*) FROM post_claims WHERE status = 'pending') AS pending_claims
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(counts)
    }
}
