/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use campushub_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, None, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post},
    Router,
};
use campushub_shared::{auth::middleware::authenticate, redis::RedisClient};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Redis client; None disables rate limiting
    pub redis: Option<RedisClient>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, redis: Option<RedisClient>, config: Config) -> Self {
        Self {
            db,
            redis,
            config: Arc::new(config),
        }
    }

    /// Gets JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                         public
/// └── /v1/
///     ├── /auth/                      public (login limited per email)
///     │   register, login, refresh, logout
///     └── (JWT + per-user rate limit)
///         ├── /users/me               profile, password
///         ├── /admin/users            staff+: list, verify; admin: role, delete
///         ├── /products               list/detail; staff+: CRUD, restock, write-off
///         ├── /reservations           reserve, mine; staff+: desk, collect; cancel
///         ├── /posts                  lost & found feed, likes, comments, claims
///         └── /dashboard              staff+
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, request tracing, then per-group
/// authentication and rate limiting.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/logout", post(routes::auth::logout));

    let user_routes = Router::new()
        .route(
            "/me",
            get(routes::users::get_me).patch(routes::users::update_me),
        )
        .route("/me/password", post(routes::users::change_password));

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route("/users/:id", delete(routes::admin::delete_user))
        .route("/users/:id/verify", post(routes::admin::verify_user))
        .route("/users/:id/role", axum::routing::put(routes::admin::set_role));

    let product_routes = Router::new()
        .route(
            "/",
            get(routes::products::list_products).post(routes::products::create_product),
        )
        .route(
            "/:id",
            get(routes::products::get_product)
                .patch(routes::products::update_product)
                .delete(routes::products::delete_product),
        )
        .route("/:id/restock", post(routes::products::restock))
        .route("/:id/write-off", post(routes::products::write_off))
        .route("/:id/reservations", get(routes::products::product_reservations));

    let reservation_routes = Router::new()
        .route(
            "/",
            get(routes::reservations::list_reservations)
                .post(routes::reservations::create_reservation),
        )
        .route("/mine", get(routes::reservations::my_reservations))
        .route("/:id/collect", post(routes::reservations::collect))
        .route("/:id/cancel", post(routes::reservations::cancel));

    let post_routes = Router::new()
        .route(
            "/",
            get(routes::posts::feed).post(routes::posts::create_post),
        )
        .route(
            "/:id",
            get(routes::posts::get_post).delete(routes::posts::delete_post),
        )
        .route("/:id/resolve", post(routes::posts::resolve_post))
        .route("/:id/like", post(routes::posts::toggle_like))
        .route("/:id/comments", post(routes::posts::add_comment))
        .route(
            "/:id/comments/:comment_id",
            delete(routes::posts::delete_comment),
        )
        .route(
            "/:id/claims",
            get(routes::posts::list_claims).post(routes::posts::create_claim),
        )
        .route(
            "/:id/claims/:claim_id/decision",
            post(routes::posts::decide_claim),
        );

    // Layers run bottom-up: authentication first, then the per-user limit.
    let protected_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/admin", admin_routes)
        .nest("/products", product_routes)
        .nest("/reservations", reservation_routes)
        .nest("/posts", post_routes)
        .route("/dashboard", get(routes::dashboard::dashboard))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::rate_limit_layer,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// JWT authentication middleware layer
///
/// Validates the Bearer token and injects `AuthContext` into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_context = authenticate(req.headers(), state.jwt_secret())?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}
