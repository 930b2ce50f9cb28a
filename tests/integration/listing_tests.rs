//! Listing page and template tests.

use std::fs;

use axum::http::StatusCode;
use tempfile::TempDir;

use dirserve::{create_router, dotfile_hidden, Capabilities, RouteBinding, RouteTable, ServerConfig};

use super::test_utils::*;

fn hidden_tree() -> TempDir {
    let tree = sample_tree();
    fs::write(tree.path().join(".secret"), b"x").unwrap();
    fs::create_dir(tree.path().join(".git")).unwrap();
    fs::write(tree.path().join("sub").join(".keep"), b"").unwrap();
    tree
}

fn router_with(root: &std::path::Path, capabilities: Capabilities) -> axum::Router {
    let binding = RouteBinding::new("/files/", root).with_capabilities(capabilities);
    let table = RouteTable::new(vec![binding]).unwrap();
    create_router(
        ServerConfig::new(table)
            .with_tracing(false)
            .with_hidden_predicate(dotfile_hidden()),
    )
}

#[tokio::test]
async fn test_hidden_entries_shown_by_default() {
    let tree = hidden_tree();
    let router = router_with(tree.path(), Capabilities::read_only());

    let html = body_text(get(router, "/files/").await).await;

    assert!(html.contains(".secret"));
    assert!(html.contains(".git"));
    assert!(html.contains("[files in: 2]"));
}

#[tokio::test]
async fn test_hidden_entries_filtered() {
    let tree = hidden_tree();
    let capabilities = Capabilities {
        hide_hidden: true,
        ..Capabilities::read_only()
    };
    let router = router_with(tree.path(), capabilities);

    let html = body_text(get(router, "/files/").await).await;

    assert!(!html.contains(".secret"));
    assert!(!html.contains(".git"));
    assert!(html.contains("a.txt"));
    assert!(html.contains("[files in: 1]"));
}

#[tokio::test]
async fn test_hidden_files_still_downloadable() {
    let tree = hidden_tree();
    let capabilities = Capabilities {
        hide_hidden: true,
        ..Capabilities::read_only()
    };
    let router = router_with(tree.path(), capabilities);

    let response = get(router, "/files/.secret").await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_directories_listed_first() {
    let tree = sample_tree();
    fs::write(tree.path().join("Zeta.txt"), b"z").unwrap();
    fs::create_dir(tree.path().join("alpha")).unwrap();
    let router = router_with(tree.path(), Capabilities::read_only());

    let html = body_text(get(router, "/files/").await).await;

    let position = |needle: &str| html.find(needle).unwrap();
    assert!(position("/files/alpha/") < position("/files/sub/"));
    assert!(position("/files/sub/") < position("/files/a.txt"));
    assert!(position("/files/a.txt") < position("/files/Zeta.txt"));
}

#[tokio::test]
async fn test_listing_title_and_export_links() {
    let tree = sample_tree();
    let router = router_with(tree.path(), Capabilities::read_only());

    let html = body_text(get(router, "/files/sub/").await).await;

    let base = tree.path().file_name().unwrap().to_string_lossy().into_owned();
    assert!(html.contains(&format!("<title>{}/sub</title>", base)));
    assert!(html.contains("href=\"/files/sub/?zip=true\""));
    assert!(html.contains("href=\"/files/sub/?tar.gz=true\""));
}

#[tokio::test]
async fn test_write_controls_follow_capabilities() {
    let tree = sample_tree();

    let router = router_with(tree.path(), Capabilities::read_only());
    let read_only = body_text(get(router, "/files/").await).await;
    assert!(!read_only.contains("multipart/form-data"));
    assert!(!read_only.contains("newfolder"));
    assert!(!read_only.contains("removeFile"));

    let router = router_with(tree.path(), Capabilities::all());
    let all = body_text(get(router, "/files/").await).await;
    assert!(all.contains("multipart/form-data"));
    assert!(all.contains("newfolder"));
    assert!(all.contains("data-url=\"/files/a.txt\""));
}

#[tokio::test]
async fn test_custom_templates() {
    let tree = sample_tree();
    let templates = TempDir::new().unwrap();
    fs::create_dir(templates.path().join("errors")).unwrap();
    fs::write(templates.path().join("errors").join("404.html"), "custom not found").unwrap();
    fs::write(
        templates.path().join("base.html"),
        "<main data-title=\"{{title}}\">{{listing}}</main>",
    )
    .unwrap();

    let table = RouteTable::new(vec![RouteBinding::new("/files/", tree.path())]).unwrap();
    let router = create_router(
        ServerConfig::new(table)
            .with_tracing(false)
            .with_template_dir(Some(templates.path())),
    );

    let response = get(router.clone(), "/files/ghost.txt").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "custom not found");

    let response = get(router.clone(), "/nowhere").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "custom not found");

    let html = body_text(get(router, "/files/").await).await;
    assert!(html.starts_with("<main data-title="));
    assert!(html.contains("href=\"/files/a.txt\""));
}

#[tokio::test]
async fn test_missing_template_dir_falls_back() {
    let tree = sample_tree();
    let table = RouteTable::new(vec![RouteBinding::new("/files/", tree.path())]).unwrap();
    let missing = tree.path().join("no-templates");
    let router = create_router(
        ServerConfig::new(table)
            .with_tracing(false)
            .with_template_dir(Some(&missing)),
    );

    let response = get(router, "/files/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("<!DOCTYPE html>"));
}

#[tokio::test]
async fn test_root_redirect_and_trailing_slash() {
    let tree = sample_tree();
    let router = router_with(tree.path(), Capabilities::read_only());

    let response = get(router.clone(), "/").await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(response.headers()["location"], "/files/");

    let response = get(router, "/files").await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(response.headers()["location"], "/files/");
}

#[tokio::test]
async fn test_links_built_from_cleaned_path() {
    let tree = sample_tree();
    let router = router_with(tree.path(), Capabilities::all());

    let response = get(router, "/files/x');alert(document.cookie);('/../").await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(!html.contains("document.cookie"));
    assert!(!html.contains("removeFile('"));
    assert!(html.contains("data-url=\"/files/a.txt\""));
    assert!(html.contains("href=\"/files/?zip=true\""));
}

#[tokio::test]
async fn test_quote_in_directory_name_is_encoded() {
    let tree = sample_tree();
    fs::create_dir(tree.path().join("it's")).unwrap();
    fs::write(tree.path().join("it's").join("c.txt"), b"c").unwrap();
    let router = router_with(tree.path(), Capabilities::all());

    let html = body_text(get(router, "/files/it's/").await).await;

    assert!(html.contains("data-url=\"/files/it%27s/c.txt\""));
    assert!(html.contains("href=\"/files/it%27s/?tar.gz=true\""));
}
