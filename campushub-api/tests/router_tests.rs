//! Routing, authentication and authorization tests
//!
//! Every request here is answered before a handler touches the database.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use campushub_shared::models::user::UserRole;
use common::{lazy_app, send, token_for};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = lazy_app();

    let (status, body) = send(&app, Method::GET, "/v1/products", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_malformed_authorization_header() {
    let app = lazy_app();

    let request = Request::builder()
        .uri("/v1/users/me")
        .header(header::AUTHORIZATION, "Token abc")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_and_foreign_tokens_are_rejected() {
    let app = lazy_app();

    let (status, _) = send(&app, Method::GET, "/v1/users/me", Some("not.a.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let claims = campushub_shared::auth::jwt::Claims::new(
        Uuid::new_v4(),
        UserRole::Admin,
        chrono::Duration::minutes(5),
    );
    let forged = campushub_shared::auth::jwt::create_token(
        &claims,
        "some-other-secret-that-is-32-chars-long!",
    )
    .unwrap();

    let (status, _) = send(&app, Method::GET, "/v1/dashboard", Some(&forged), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_students_cannot_reach_staff_routes() {
    let app = lazy_app();
    let token = token_for(Uuid::new_v4(), UserRole::Student);

    let (status, body) = send(&app, Method::GET, "/v1/admin/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = send(&app, Method::GET, "/v1/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, Method::GET, "/v1/reservations", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/products",
        Some(&token),
        Some(json!({ "name": "Tripod", "category": "av", "total_stock": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/v1/reservations/{}/collect", Uuid::new_v4());
    let (status, _) = send(&app, Method::POST, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_changes_are_admin_only() {
    let app = lazy_app();
    let staff = token_for(Uuid::new_v4(), UserRole::Staff);
    let uri = format!("/v1/admin/users/{}/role", Uuid::new_v4());

    let (status, _) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&staff),
        Some(json!({ "role": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let uri = format!("/v1/admin/users/{}", Uuid::new_v4());
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&staff), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_cannot_delete_or_demote_self() {
    let app = lazy_app();
    let admin_id = Uuid::new_v4();
    let admin = token_for(admin_id, UserRole::Admin);

    let uri = format!("/v1/admin/users/{}", admin_id);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let uri = format!("/v1/admin/users/{}/role", admin_id);
    let (status, _) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&admin),
        Some(json!({ "role": "student" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reservation_quantity_is_validated_first() {
    let app = lazy_app();
    let token = token_for(Uuid::new_v4(), UserRole::Student);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/reservations",
        Some(&token),
        Some(json!({ "product_id": Uuid::new_v4(), "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "quantity");

    // MAX_RESERVATION_QUANTITY is 5 in the test config.
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/reservations",
        Some(&token),
        Some(json!({ "product_id": Uuid::new_v4(), "quantity": 6 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["message"], "Quantity must be at most 5");
}

#[tokio::test]
async fn test_register_rejects_weak_password_and_staff_role() {
    let app = lazy_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({ "email": "ada@campus.edu", "password": "password", "name": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "password");

    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({
            "email": "ada@campus.edu",
            "password": "Campus!Pass9",
            "name": "Ada",
            "role": "staff"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/auth/register",
        None,
        Some(json!({ "email": "not-an-email", "password": "Campus!Pass9", "name": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "email");
}

#[tokio::test]
async fn test_security_headers_on_error_responses() {
    let app = lazy_app();

    let request = Request::builder()
        .uri("/v1/products")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let headers = response.headers();
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(headers.get(header::STRICT_TRANSPORT_SECURITY).is_none());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = lazy_app();
    let token = token_for(Uuid::new_v4(), UserRole::Student);

    let (status, _) = send(&app, Method::GET, "/v1/nothing-here", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let app = lazy_app();

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["database"], "disconnected");
    assert_eq!(body["redis"], "disabled");
}
