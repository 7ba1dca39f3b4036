//! Request handling that is decided before storage is reached.

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use chorus_api::server::{self, ServerState};
use chorus_common::{
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};
use chorus_db::DbClient;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn app(shutdown: CancellationToken) -> Router {
    // Never connects unless a query actually runs.
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://chorus@localhost/chorus")
        .unwrap();
    let db_client = DbClient::new(
        pool,
        WorkerId::default(),
        ProcessId::default(),
        PositiveDuration::from_millis(1_000).unwrap(),
    );

    server::routes().with_state(ServerState {
        db_client: Arc::new(db_client),
        shutdown,
    })
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    send_to(app(CancellationToken::new()), request).await
}

async fn send_to(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn json_request(method: &str, uri: &str, user: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::from(body.to_owned())).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let request = Request::builder().uri("/nowhere").body(Body::empty()).unwrap();
    let (status, body) = send(request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert!(body["error"].as_str().unwrap().contains("/nowhere"));
}

#[tokio::test]
async fn writes_need_an_identity() {
    let request = json_request("POST", "/posts", None, r#"{"title":"A","body":"b"}"#);
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);

    let request = json_request("POST", "/posts", Some("alice"), r#"{"title":"A","body":"b"}"#);
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let request = json_request("POST", "/posts", Some("1"), r#"{"title":"A""#);
    let (status, _) = send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_posts_are_rejected_before_storage() {
    let request = json_request("POST", "/posts", Some("1"), r#"{"title":"  ","body":"b"}"#);
    let (status, body) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Title"));

    let long_body = "x".repeat(1001);
    let request = json_request(
        "PATCH",
        "/posts/5",
        Some("1"),
        &format!(r#"{{"version":1,"body":"{long_body}"}}"#),
    );
    let (status, _) = send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_feed_parameters_are_rejected() {
    for query in [
        "limit=0",
        "limit=101",
        "offset=-1",
        "sort=sideways",
        "sort=ASC",
        "sort=Desc",
        "since=yesterday",
        "since=2025-02-01T00:00:00Z&until=2025-01-01T00:00:00Z",
        "limit=ten",
    ] {
        let request = Request::builder()
            .uri(format!("/feed?{query}"))
            .header("x-user-id", "1")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{query}");
    }
}

#[tokio::test]
async fn non_numeric_ids_do_not_match() {
    let request = Request::builder()
        .uri("/posts/first")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn requests_during_shutdown_are_unavailable() {
    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let request = Request::builder().uri("/posts/5").body(Body::empty()).unwrap();
    let (status, body) = send_to(app(shutdown), request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
}
