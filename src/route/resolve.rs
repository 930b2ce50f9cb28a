//! Mapping of request paths onto filesystem paths.
//!
//! Canonicalization is purely lexical and happens before the path is joined
//! onto the route root, so `..` segments cannot climb above the root. Symbolic
//! links inside a served tree are still followed by the filesystem and can
//! point anywhere; this is not a sandbox.

use std::path::{PathBuf, MAIN_SEPARATOR};

use super::RouteBinding;

/// Resolve a decoded URL path against a route binding.
///
/// The route prefix is stripped (a doubled leading slash variant is tolerated),
/// segments are split on `/` and the platform separator, `.`/`..` are collapsed
/// lexically, and the remainder is joined onto the route root.
pub fn resolve(url_path: &str, binding: &RouteBinding) -> PathBuf {
    let mut path = if url_path.starts_with('/') {
        url_path.to_string()
    } else {
        format!("/{}", url_path)
    };

    let prefix = binding.prefix();
    if let Some(rest) = path.strip_prefix(prefix) {
        path = rest.to_string();
    }
    let slashed = format!("/{}", prefix);
    if let Some(rest) = path.strip_prefix(&slashed) {
        path = rest.to_string();
    }

    let mut resolved = binding.root().to_path_buf();
    for segment in clean_segments(&path) {
        resolved.push(segment);
    }
    resolved
}

/// Split a path into segments with `.` and `..` collapsed.
///
/// The path is treated as rooted: a `..` at the top is dropped rather than
/// kept, so the result never refers to a parent of the starting point.
pub fn clean_segments(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(|c: char| c == '/' || c == MAIN_SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments
}
