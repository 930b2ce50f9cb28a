//! Basic authentication tests.
//!
//! Routes are built from command-line style definitions so that the choice
//! between route and global credentials is exercised end to end.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use clap::Parser;
use tower::ServiceExt;

use dirserve::{create_router, Config, Credentials, ServerConfig};

use super::test_utils::*;

fn authed_get(uri: &str, authorization: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, authorization)
        .body(Body::empty())
        .unwrap()
}

/// `/private/` with its own credentials and `/public/` under the global pair.
fn configured_router(private: &std::path::Path, public: &std::path::Path) -> axum::Router {
    let config = Config::try_parse_from([
        "dirserve".to_string(),
        "-r".to_string(),
        format!("alice:secret@private={}", private.display()),
        "-r".to_string(),
        format!("public={}", public.display()),
        "--user".to_string(),
        "admin".to_string(),
        "--passwd".to_string(),
        "hunter2".to_string(),
    ])
    .unwrap();
    let table = config.route_table().unwrap();
    create_router(ServerConfig::new(table).with_tracing(false))
}

#[tokio::test]
async fn test_missing_credentials_challenged() {
    let tree = sample_tree();
    let router = protected_router(tree.path(), Credentials::new("alice", "secret"));

    let response = get(router, "/files/a.txt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        "Basic realm=\"/files/\""
    );
}

#[tokio::test]
async fn test_valid_credentials_pass_through() {
    let tree = sample_tree();
    let router = protected_router(tree.path(), Credentials::new("alice", "secret"));

    let request = authed_get("/files/a.txt", &basic_auth("alice", "secret"));
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "hello");
}

#[tokio::test]
async fn test_wrong_password_rejected() {
    let tree = sample_tree();
    let router = protected_router(tree.path(), Credentials::new("alice", "secret"));

    let request = authed_get("/files/a.txt", &basic_auth("alice", "guess"));
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn test_auth_checked_before_dispatch() {
    let tree = sample_tree();
    let router = protected_router(tree.path(), Credentials::new("alice", "secret"));

    // A missing path still answers 401, so unauthenticated clients learn nothing
    let response = get(router, "/files/ghost.txt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_route_credentials_override_global() {
    let private = sample_tree();
    let public = sample_tree();
    let router = configured_router(private.path(), public.path());

    let request = authed_get("/private/a.txt", &basic_auth("alice", "secret"));
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = authed_get("/private/a.txt", &basic_auth("admin", "hunter2"));
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_global_credentials_apply_to_plain_routes() {
    let private = sample_tree();
    let public = sample_tree();
    let router = configured_router(private.path(), public.path());

    let response = get(router.clone(), "/public/a.txt").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = authed_get("/public/a.txt", &basic_auth("admin", "hunter2"));
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = authed_get("/public/a.txt", &basic_auth("alice", "secret"));
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unprotected_route_open() {
    let tree = sample_tree();
    let router = files_router(tree.path(), dirserve::Capabilities::read_only());

    let response = get(router, "/files/a.txt").await;

    assert_eq!(response.status(), StatusCode::OK);
}
