//! Request dispatcher.
//!
//! Every request against a route is reduced to a [`RequestFacts`] value and
//! classified by walking [`RULES`] in order; the first rule whose predicate
//! holds decides the [`Action`]. Classification is a pure function, so the
//! ordering can be tested without touching the network or the filesystem.
//!
//! ```text
//!  #  rule                                   action
//!  1  path missing                           404
//!  2  permission denied on stat              403
//!  3  other stat failure                     500
//!  4  DELETE, deletes disabled               403
//!  5  upload, uploads disabled               403
//!  6  create, creates disabled               403
//!  7  ?zip                                   zip export
//!  8  ?tar.gz                                tar.gz export
//!  9  upload into a directory                multipart upload
//! 10  create inside a directory              mkdir
//! 11  DELETE of a file                       remove
//! 12  directory                              listing
//! 13  anything else                          raw file
//! ```

use std::io;
use std::path::PathBuf;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::response::Response;
use tracing::debug;
use url::form_urlencoded;

use super::handlers::{self, RouteState};
use crate::archive::ArchiveFormat;
use crate::error::ServeError;
use crate::route::{resolve, Capabilities};

// =============================================================================
// Facts
// =============================================================================

/// How the request method is treated by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// GET, HEAD and any method without a write meaning
    Read,

    /// POST without the `new` marker
    Upload,

    /// POST with the `new` marker, or PUT
    Create,

    /// DELETE
    Delete,
}

impl MethodKind {
    pub fn of(method: &Method, new_marker: bool) -> Self {
        match *method {
            Method::POST if new_marker => MethodKind::Create,
            Method::POST => MethodKind::Upload,
            Method::PUT => MethodKind::Create,
            Method::DELETE => MethodKind::Delete,
            _ => MethodKind::Read,
        }
    }
}

/// Result of `stat` on the resolved path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatOutcome {
    Directory,
    File,
    NotFound,
    PermissionDenied,
    Failed,
}

impl StatOutcome {
    pub fn of(stat: &io::Result<std::fs::Metadata>) -> Self {
        match stat {
            Ok(metadata) if metadata.is_dir() => StatOutcome::Directory,
            Ok(_) => StatOutcome::File,
            Err(e) => match e.kind() {
                io::ErrorKind::NotFound => StatOutcome::NotFound,
                io::ErrorKind::PermissionDenied => StatOutcome::PermissionDenied,
                _ => StatOutcome::Failed,
            },
        }
    }

    fn exists(&self) -> bool {
        matches!(self, StatOutcome::Directory | StatOutcome::File)
    }
}

/// Everything the rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFacts {
    pub method: MethodKind,
    pub zip: bool,
    pub tar_gz: bool,
    pub stat: StatOutcome,
    pub capabilities: Capabilities,
}

impl RequestFacts {
    fn is_dir(&self) -> bool {
        self.stat == StatOutcome::Directory
    }

    fn is_file(&self) -> bool {
        self.stat == StatOutcome::File
    }
}

// =============================================================================
// Rules
// =============================================================================

/// Terminal action chosen for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    NotFound,
    Forbidden,
    InternalError,
    Export(ArchiveFormat),
    Upload,
    CreateFolder,
    Delete,
    Listing,
    ServeFile,
}

/// One entry of the ordered rule table.
pub struct Rule {
    pub name: &'static str,
    pub matches: fn(&RequestFacts) -> bool,
    pub action: Action,
}

/// Dispatch rules in priority order. The first match wins.
pub static RULES: [Rule; 13] = [
    Rule {
        name: "missing",
        matches: |f| f.stat == StatOutcome::NotFound,
        action: Action::NotFound,
    },
    Rule {
        name: "unreadable",
        matches: |f| f.stat == StatOutcome::PermissionDenied,
        action: Action::Forbidden,
    },
    Rule {
        name: "stat-failed",
        matches: |f| !f.stat.exists(),
        action: Action::InternalError,
    },
    Rule {
        name: "deletes-disabled",
        matches: |f| f.method == MethodKind::Delete && !f.capabilities.deletes,
        action: Action::Forbidden,
    },
    Rule {
        name: "uploads-disabled",
        matches: |f| f.method == MethodKind::Upload && !f.capabilities.uploads,
        action: Action::Forbidden,
    },
    Rule {
        name: "creates-disabled",
        matches: |f| f.method == MethodKind::Create && !f.capabilities.creates,
        action: Action::Forbidden,
    },
    Rule {
        name: "export-zip",
        matches: |f| f.zip,
        action: Action::Export(ArchiveFormat::Zip),
    },
    Rule {
        name: "export-tar-gz",
        matches: |f| f.tar_gz,
        action: Action::Export(ArchiveFormat::TarGz),
    },
    Rule {
        name: "upload",
        matches: |f| f.capabilities.uploads && f.is_dir() && f.method == MethodKind::Upload,
        action: Action::Upload,
    },
    Rule {
        name: "create-folder",
        matches: |f| f.capabilities.creates && f.is_dir() && f.method == MethodKind::Create,
        action: Action::CreateFolder,
    },
    Rule {
        name: "delete",
        matches: |f| f.capabilities.deletes && f.is_file() && f.method == MethodKind::Delete,
        action: Action::Delete,
    },
    Rule {
        name: "listing",
        matches: |f| f.is_dir(),
        action: Action::Listing,
    },
    Rule {
        name: "serve-file",
        matches: |_| true,
        action: Action::ServeFile,
    },
];

/// Pick the action for a request.
pub fn classify(facts: &RequestFacts) -> Action {
    matching_rule(facts)
        .map(|rule| rule.action)
        .unwrap_or(Action::ServeFile)
}

/// First rule that matches `facts`.
pub fn matching_rule(facts: &RequestFacts) -> Option<&'static Rule> {
    RULES.iter().find(|rule| (rule.matches)(facts))
}

// =============================================================================
// Query
// =============================================================================

/// Markers and parameters read from the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuery {
    pub zip: bool,
    pub tar_gz: bool,
    pub new_folder: bool,
    pub files: Option<String>,
    pub name: Option<String>,
}

impl RequestQuery {
    /// Parse a raw query string. Export markers need a non-empty value;
    /// `new` only needs to be present.
    pub fn parse(query: Option<&str>) -> Self {
        let mut parsed = Self::default();
        let query = match query {
            Some(q) => q,
            None => return parsed,
        };
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "zip" => parsed.zip |= !value.is_empty(),
                "tar.gz" => parsed.tar_gz |= !value.is_empty(),
                "new" => parsed.new_folder = true,
                "files" => parsed.files = Some(value.into_owned()),
                "name" => parsed.name = Some(value.into_owned()),
                _ => {}
            }
        }
        parsed
    }
}

// =============================================================================
// Dispatch
// =============================================================================

/// Handler behind every route: resolve, classify, act.
pub async fn dispatch(State(state): State<RouteState>, request: Request) -> Response {
    match run(&state, request).await {
        Ok(response) => response,
        Err(e) => e.respond(&state.render),
    }
}

async fn run(state: &RouteState, request: Request) -> Result<Response, ServeError> {
    let raw_path = request.uri().path().to_string();
    let location = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| raw_path.clone());
    let url_path = urlencoding::decode(&raw_path)
        .map_err(|_| ServeError::BadRequest(format!("Path is not valid UTF-8: {}", raw_path)))?
        .into_owned();
    let query = RequestQuery::parse(request.uri().query());

    let path: PathBuf = resolve(&url_path, &state.binding);
    let stat = tokio::fs::metadata(&path).await;

    let facts = RequestFacts {
        method: MethodKind::of(request.method(), query.new_folder),
        zip: query.zip,
        tar_gz: query.tar_gz,
        stat: StatOutcome::of(&stat),
        capabilities: state.binding.capabilities(),
    };
    let rule = matching_rule(&facts);
    let action = rule.map(|r| r.action).unwrap_or(Action::ServeFile);

    debug!(
        route = state.binding.prefix(),
        method = %request.method(),
        path = %url_path,
        rule = rule.map(|r| r.name).unwrap_or("serve-file"),
        "Dispatching request"
    );

    match action {
        Action::NotFound => Err(ServeError::NotFound(url_path)),
        Action::Forbidden => Err(ServeError::Forbidden(format!(
            "{} {}",
            request.method(),
            url_path
        ))),
        Action::InternalError => Err(ServeError::Io(
            stat.err()
                .unwrap_or_else(|| io::Error::other("stat failed")),
        )),
        Action::Export(format) => {
            handlers::export(format, path, query.files.as_deref()).await
        }
        Action::Upload => {
            handlers::upload(&path, request).await?;
            Ok(handlers::see_other(&location))
        }
        Action::CreateFolder => {
            handlers::create_folder(&path, query.name, request).await?;
            Ok(handlers::see_other(&location))
        }
        Action::Delete => {
            handlers::delete_file(&path, &url_path).await?;
            Ok(handlers::see_other(&location))
        }
        Action::Listing => {
            let query = request.uri().query();
            handlers::listing(state, path, &url_path, query).await
        }
        Action::ServeFile => Ok(handlers::serve_file(&path, request).await),
    }
}

// =============================================================================
// Tests
// =============================================================================
