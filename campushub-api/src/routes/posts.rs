/// Lost & found feed endpoints
///
/// # Endpoints
///
/// - `GET /v1/posts` - Feed
/// - `POST /v1/posts` - Create a post
/// - `GET /v1/posts/:id` - Post with comments
/// - `DELETE /v1/posts/:id` - Delete (author or staff+)
/// - `POST /v1/posts/:id/resolve` - Close (author or staff+)
/// - `POST /v1/posts/:id/like` - Toggle like
/// - `POST /v1/posts/:id/comments` - Comment
/// - `DELETE /v1/posts/:id/comments/:comment_id` - Delete comment (comment author or staff+)
/// - `GET /v1/posts/:id/claims` - Claims (post author or staff+)
/// - `POST /v1/posts/:id/claims` - Claim an open post (anyone but the author)
/// - `POST /v1/posts/:id/claims/:claim_id/decision` - Approve or reject (post author or staff+)

use super::{non_blank, Page, Pagination};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use campushub_shared::{
    auth::{authorization::require_owner_or_staff, middleware::AuthContext},
    models::post::{
        Claim, ClaimDecision, ClaimStatus, Comment, CreatePost, DecisionOutcome, LikeState, Post,
        PostFilter, PostKind, PostStatus, PostSummary,
    },
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Feed query
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub kind: Option<PostKind>,
    pub status: Option<PostStatus>,
    pub author_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl FeedQuery {
    fn split(self) -> (PostFilter, Pagination) {
        (
            PostFilter {
                kind: self.kind,
                status: self.status,
                author_id: self.author_id,
                search: self.search,
            },
            Pagination {
                limit: self.limit,
                offset: self.offset,
            },
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    pub kind: PostKind,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 5000, message = "Description must be 1-5000 characters"))]
    pub description: String,

    #[validate(length(max = 200, message = "Location must be at most 200 characters"))]
    pub location: Option<String>,

    #[validate(length(max = 2048, message = "Image URL must be at most 2048 characters"))]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000, message = "Comment must be 1-2000 characters"))]
    pub body: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ClaimRequest {
    #[validate(length(min = 1, max = 1000, message = "Message must be 1-1000 characters"))]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub decision: ClaimDecision,
}

/// Post with its comments, oldest comment first
#[derive(Debug, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: PostSummary,
    pub comments: Vec<Comment>,
}

fn post_not_found() -> ApiError {
    ApiError::NotFound("Post not found".to_string())
}

async fn load_post(pool: &PgPool, post_id: Uuid) -> ApiResult<Post> {
    Post::find_by_id(pool, post_id)
        .await?
        .ok_or_else(post_not_found)
}

/// Newest-first feed
///
/// # Endpoint
///
/// ```text
/// GET /v1/posts?kind=lost&status=open&search=umbrella&limit=20&offset=0
/// ```
pub async fn feed(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Page<PostSummary>>> {
    let (filter, page) = query.split();

    let posts = Post::feed(&state.db, &filter, auth.user_id, page.limit(), page.offset()).await?;
    let total = Post::count(&state.db, &filter).await?;

    Ok(Json(Page::new(posts, total, page)))
}

/// Creates a lost or found post
///
/// # Endpoint
///
/// ```text
/// POST /v1/posts
/// Content-Type: application/json
///
/// {
///   "kind": "found",
///   "title": "Blue umbrella",
///   "description": "Left in lecture hall B after the 10am class",
///   "location": "Hall B"
/// }
/// ```
pub async fn create_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<Post>)> {
    req.validate()?;

    let post = Post::create(
        &state.db,
        CreatePost {
            author_id: auth.user_id,
            kind: req.kind,
            title: req.title.trim().to_string(),
            description: req.description.trim().to_string(),
            location: non_blank(req.location),
            image_url: non_blank(req.image_url),
        },
    )
    .await?;

    tracing::debug!(post_id = %post.id, author_id = %auth.user_id, "Post created");

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<PostDetail>> {
    let post = Post::find_summary(&state.db, post_id, auth.user_id)
        .await?
        .ok_or_else(post_not_found)?;
    let comments = Post::list_comments(&state.db, post_id).await?;

    Ok(Json(PostDetail { post, comments }))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let post = load_post(&state.db, post_id).await?;
    require_owner_or_staff(&auth, post.author_id)?;

    if !Post::delete(&state.db, post_id).await? {
        return Err(post_not_found());
    }

    tracing::info!(post_id = %post_id, deleted_by = %auth.user_id, "Post deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Closes an open post
///
/// # Errors
///
/// - `409 Conflict`: Already resolved
pub async fn resolve_post(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Post>> {
    let post = load_post(&state.db, post_id).await?;
    require_owner_or_staff(&auth, post.author_id)?;

    let resolved = Post::resolve(&state.db, post_id)
        .await?
        .ok_or_else(|| ApiError::Conflict("Post is already resolved".to_string()))?;

    Ok(Json(resolved))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<LikeState>> {
    let like = Post::toggle_like(&state.db, post_id, auth.user_id)
        .await?
        .ok_or_else(post_not_found)?;

    Ok(Json(like))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    req.validate()?;
    load_post(&state.db, post_id).await?;

    let comment = Post::add_comment(&state.db, post_id, auth.user_id, req.body.trim()).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((post_id, comment_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let not_found = || ApiError::NotFound("Comment not found".to_string());

    let comment = Post::find_comment(&state.db, post_id, comment_id)
        .await?
        .ok_or_else(not_found)?;
    require_owner_or_staff(&auth, comment.author_id)?;

    if !Post::delete_comment(&state.db, post_id, comment_id).await? {
        return Err(not_found());
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Claims on a post, oldest first
pub async fn list_claims(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(post_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Claim>>> {
    let post = load_post(&state.db, post_id).await?;
    require_owner_or_staff(&auth, post.author_id)?;

    let claims = Post::list_claims(&state.db, post_id).await?;

    Ok(Json(claims))
}

/// Claims an open post ("that's mine" / "I found it")
///
/// # Errors
///
/// - `403 Forbidden`: Caller wrote the post
/// - `409 Conflict`: Post is resolved, or the caller already claimed it
pub async fn create_claim(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<ClaimRequest>,
) -> ApiResult<(StatusCode, Json<Claim>)> {
    req.validate()?;

    let post = load_post(&state.db, post_id).await?;

    if post.author_id == auth.user_id {
        return Err(ApiError::Forbidden(
            "You cannot claim your own post".to_string(),
        ));
    }

    if !post.is_open() {
        return Err(ApiError::Conflict("Post is already resolved".to_string()));
    }

    let claim = Post::create_claim(&state.db, post_id, auth.user_id, req.message.trim()).await?;

    tracing::info!(post_id = %post_id, claim_id = %claim.id, claimant_id = %auth.user_id, "Claim submitted");

    Ok((StatusCode::CREATED, Json(claim)))
}

/// Approves or rejects a pending claim
///
/// Approving resolves the post and rejects the other pending claims.
///
/// # Errors
///
/// - `404 Not Found`: No such claim on this post
/// - `409 Conflict`: Claim already decided, or post already resolved
pub async fn decide_claim(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((post_id, claim_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<DecisionRequest>,
) -> ApiResult<Json<Claim>> {
    let post = load_post(&state.db, post_id).await?;
    require_owner_or_staff(&auth, post.author_id)?;

    match Post::decide_claim(&state.db, post_id, claim_id, req.decision).await? {
        DecisionOutcome::Decided(claim) => {
            tracing::info!(
                post_id = %post_id,
                claim_id = %claim.id,
                decision = ?req.decision,
                decided_by = %auth.user_id,
                "Claim decided"
            );
            Ok(Json(claim))
        }
        DecisionOutcome::NotFound => Err(ApiError::NotFound("Claim not found".to_string())),
        DecisionOutcome::AlreadyDecided(status) => {
            let label = match status {
                ClaimStatus::Pending => "pending",
                ClaimStatus::Approved => "approved",
                ClaimStatus::Rejected => "rejected",
            };
            Err(ApiError::Conflict(format!("Claim was already {}", label)))
        }
        DecisionOutcome::PostClosed => {
            Err(ApiError::Conflict("Post is already resolved".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_post_request_validation() {
        let req: CreatePostRequest = serde_json::from_value(serde_json::json!({
            "kind": "lost",
            "title": "",
            "description": "Black wallet"
        }))
        .unwrap();
        assert!(req.validate().is_err());

        let req: CreatePostRequest = serde_json::from_value(serde_json::json!({
            "kind": "found",
            "title": "Keys",
            "description": "Three keys on a red lanyard"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.kind, PostKind::Found);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = serde_json::from_value::<CreatePostRequest>(serde_json::json!({
            "kind": "stolen",
            "title": "Bike",
            "description": "Red bike"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_decision_parsing() {
        let req: DecisionRequest =
            serde_json::from_value(serde_json::json!({ "decision": "approve" })).unwrap();
        assert_eq!(req.decision, ClaimDecision::Approve);
    }
}
