//! Dispatch rule tests over HTTP.
//!
//! Each test builds a router over a fresh temporary tree and checks which
//! action a request ends up in, along with its effect on disk.

use std::fs;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tower::ServiceExt;

use dirserve::Capabilities;

use super::test_utils::*;

// =============================================================================
// Read Requests
// =============================================================================

#[tokio::test]
async fn test_get_file_returns_contents() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::read_only());

    let response = get(router, "/files/a.txt").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "hello");
}

#[tokio::test]
async fn test_get_nested_file() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::read_only());

    let response = get(router, "/files/sub/b.txt").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "world");
}

#[tokio::test]
async fn test_range_request_partial_content() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::read_only());

    let request = Request::builder()
        .uri("/files/a.txt")
        .header(header::RANGE, "bytes=1-3")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_text(response).await, "ell");
}

#[tokio::test]
async fn test_missing_path_not_found() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::read_only());

    let response = get(router, "/files/nope.txt").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_percent_encoded_name() {
    let tree = sample_tree();
    fs::write(tree.path().join("with space.txt"), b"spaced").unwrap();
    let router = files_router(tree.path(), Capabilities::read_only());

    let response = get(router, "/files/with%20space.txt").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "spaced");
}

#[tokio::test]
async fn test_traversal_stays_inside_root() {
    let outer = sample_tree();
    let root = outer.path().join("sub");
    let router = files_router(&root, Capabilities::read_only());

    // a.txt exists one level above the route root and must stay out of reach
    for uri in [
        "/files/../a.txt",
        "/files/%2e%2e/a.txt",
        "/files/sub/../../a.txt",
        "/files/..%2fa.txt",
    ] {
        let response = get(router.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_directory_returns_listing() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::read_only());

    let response = get(router, "/files/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let html = body_text(response).await;
    assert!(html.contains("href=\"/files/a.txt\""));
    assert!(html.contains("href=\"/files/sub/\""));
}

// =============================================================================
// Rule Priority
// =============================================================================

#[tokio::test]
async fn test_delete_missing_is_not_found_even_when_disabled() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::read_only());

    let response = send(router, Method::DELETE, "/files/ghost.txt").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_disabled_forbidden() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::read_only());

    let response = send(router, Method::DELETE, "/files/a.txt").await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(tree.path().join("a.txt").exists());
}

#[tokio::test]
async fn test_upload_disabled_forbidden() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::read_only());

    let request = multipart_request("/files/", &[("new.txt", "data")]);
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!tree.path().join("new.txt").exists());
}

#[tokio::test]
async fn test_upload_disabled_wins_over_export_marker() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::read_only());

    let response = send(router, Method::POST, "/files/?zip=true").await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_disabled_forbidden() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::read_only());

    let request = form_request(Method::POST, "/files/?new", "name=photos");
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!tree.path().join("photos").exists());
}

#[tokio::test]
async fn test_delete_directory_falls_through_to_listing() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    let response = send(router, Method::DELETE, "/files/sub/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(tree.path().join("sub").is_dir());
}

// =============================================================================
// Write Actions
// =============================================================================

#[tokio::test]
async fn test_delete_removes_file() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    let response = send(router, Method::DELETE, "/files/a.txt").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/files/a.txt");
    assert!(!tree.path().join("a.txt").exists());
}

#[tokio::test]
async fn test_upload_stores_base_names() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    let request = multipart_request(
        "/files/sub/",
        &[("notes.txt", "first"), ("../../escape.txt", "second")],
    );
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/files/sub/");
    let sub = tree.path().join("sub");
    assert_eq!(fs::read(sub.join("notes.txt")).unwrap(), b"first");
    assert_eq!(fs::read(sub.join("escape.txt")).unwrap(), b"second");
    assert!(!tree.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_upload_overwrites_existing_file() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    let request = multipart_request("/files/", &[("a.txt", "hi")]);
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(fs::read(tree.path().join("a.txt")).unwrap(), b"hi");
}

#[tokio::test]
async fn test_upload_malformed_body_bad_request() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/files/")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("not multipart"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_folder_from_form() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    let request = form_request(Method::POST, "/files/?new", "name=photos");
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/files/?new");
    assert!(tree.path().join("photos").is_dir());
}

#[tokio::test]
async fn test_create_folder_with_put() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    let request = form_request(Method::PUT, "/files/sub/", "name=deeper");
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(tree.path().join("sub").join("deeper").is_dir());
}

#[tokio::test]
async fn test_create_existing_folder_succeeds() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    let request = form_request(Method::POST, "/files/?new", "name=sub");
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(fs::read(tree.path().join("sub").join("b.txt")).unwrap(), b"world");
}

#[tokio::test]
async fn test_create_folder_bad_names() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    for body in ["name=", "", "name=a%2Fb", "name=..", "name=a.txt"] {
        let request = form_request(Method::POST, "/files/?new", body);
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{:?}", body);
    }
}

#[tokio::test]
async fn test_create_folder_name_from_query() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    let response = send(router, Method::POST, "/files/?new&name=fromquery").await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(tree.path().join("fromquery").is_dir());
}

#[tokio::test]
async fn test_truncated_upload_leaves_no_file() {
    let tree = sample_tree();
    let router = files_router(tree.path(), Capabilities::all());

    // The part's data never reaches its closing boundary
    let body = format!(
        "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"cut.txt\"\r\n\
         Content-Type: application/octet-stream\r\n\r\npartial data",
        BOUNDARY
    );
    let request = Request::builder()
        .method(Method::POST)
        .uri("/files/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!tree.path().join("cut.txt").exists());
}
