//! Action handlers invoked by the dispatcher.
//!
//! Each handler performs one terminal action on an already resolved and
//! classified path. Errors are returned as [`ServeError`] and rendered by
//! [`ServeError::respond`] with the route's rendering context.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::multipart::Field;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::io::AsyncWriteExt;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, error, info, warn};
use url::form_urlencoded;

use super::render::RenderContext;
use crate::archive::{stream_archive, ArchiveFormat, ArchiveRequest};
use crate::error::{ArchiveError, ServeError};
use crate::listing::{assemble, HiddenPredicate, ListingPage};
use crate::route::{clean_segments, RouteBinding};

/// Upper bound on a create-folder form body.
pub const MAX_FORM_BYTES: usize = 64 * 1024;

/// Multipart field carrying uploaded files.
pub const UPLOAD_FIELD: &str = "file";

// =============================================================================
// Route State
// =============================================================================

/// Per-route state handed to the dispatcher.
///
/// Everything here is immutable and shared, so cloning is cheap.
#[derive(Clone)]
pub struct RouteState {
    /// Route this dispatcher serves
    pub binding: Arc<RouteBinding>,

    /// Rendering context shared by every route
    pub render: Arc<RenderContext>,

    /// Hidden-entry predicate used for listings
    pub is_hidden: HiddenPredicate,
}

impl RouteState {
    pub fn new(
        binding: Arc<RouteBinding>,
        render: Arc<RenderContext>,
        is_hidden: HiddenPredicate,
    ) -> Self {
        Self {
            binding,
            render,
            is_hidden,
        }
    }
}

// =============================================================================
// Error Responses
// =============================================================================

impl ServeError {
    /// HTTP status this error is reported with.
    pub fn status(&self) -> StatusCode {
        match self {
            ServeError::NotFound(_) => StatusCode::NOT_FOUND,
            ServeError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServeError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServeError::Io(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                StatusCode::FORBIDDEN
            }
            ServeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServeError::Archive(ArchiveError::InvalidName(_)) => StatusCode::BAD_REQUEST,
            ServeError::Archive(ArchiveError::MissingEntry(_)) => StatusCode::NOT_FOUND,
            ServeError::Archive(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ServeError::NotFound(_) => "not_found",
            ServeError::Forbidden(_) => "forbidden",
            ServeError::BadRequest(_) => "bad_request",
            ServeError::Io(_) => "io_error",
            ServeError::Archive(_) => "archive_error",
        }
    }

    /// Log the error by severity and render its page.
    ///
    /// 5xx errors are logged at ERROR, 404 at DEBUG, other client errors at
    /// WARN.
    pub fn respond(self, render: &RenderContext) -> Response {
        let status = self.status();
        let error_type = self.error_type();

        if status.is_server_error() {
            error!(error_type = error_type, status = status.as_u16(), "Server error: {}", self);
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                self
            );
        } else {
            warn!(error_type = error_type, status = status.as_u16(), "Client error: {}", self);
        }

        render.error_page(status)
    }
}

/// Render with the built-in pages when no context is at hand.
impl IntoResponse for ServeError {
    fn into_response(self) -> Response {
        self.respond(&RenderContext::builtin())
    }
}

/// `303 See Other` back to `location`.
pub fn see_other(location: &str) -> Response {
    let mut response = StatusCode::SEE_OTHER.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

// =============================================================================
// Read Actions
// =============================================================================

/// Render the listing of `dir`.
///
/// # Arguments
///
/// * `state` - Route state (capabilities, predicate, render context)
/// * `dir` - Resolved directory
/// * `url_path` - Decoded request path
/// * `query` - Raw query string, kept in the export links
///
/// Links are built from the cleaned path, never from the path as received.
pub async fn listing(
    state: &RouteState,
    dir: PathBuf,
    url_path: &str,
    query: Option<&str>,
) -> Result<Response, ServeError> {
    let capabilities = state.binding.capabilities();
    let is_hidden = state.is_hidden.clone();
    let base_url = listing_url(&state.binding, url_path);
    let entries_base = base_url.clone();

    let entries = tokio::task::spawn_blocking(move || {
        assemble(&dir, &entries_base, capabilities.hide_hidden, is_hidden.as_ref())
    })
    .await
    .map_err(io::Error::other)??;

    let page = ListingPage {
        title: listing_title(&state.binding, url_path),
        entries,
        zip_url: export_url(&base_url, query, ArchiveFormat::Zip),
        tar_gz_url: export_url(&base_url, query, ArchiveFormat::TarGz),
        capabilities,
    };
    Ok(state.render.listing_page(&page))
}

/// `<root basename>/<path below the route>`.
pub fn listing_title(binding: &RouteBinding, url_path: &str) -> String {
    let base = binding
        .root()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let below = url_path
        .strip_prefix(binding.prefix())
        .unwrap_or(url_path);
    format!("{}/{}", base, clean_segments(below).join("/"))
}

/// Canonical URL of a listed directory.
///
/// The route prefix followed by the cleaned path below it, each segment
/// percent-encoded, ending in `/`.
pub fn listing_url(binding: &RouteBinding, url_path: &str) -> String {
    let below = url_path
        .strip_prefix(binding.prefix())
        .unwrap_or(url_path);
    let mut url = binding.prefix().to_string();
    for segment in clean_segments(below) {
        url.push_str(&urlencoding::encode(segment));
        url.push('/');
    }
    url
}

/// Listing URL with the export marker for `format` set.
///
/// Other query parameters are kept; any previous export marker is dropped.
pub fn export_url(base_url: &str, query: Option<&str>, format: ArchiveFormat) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if let Some(query) = query {
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if key == ArchiveFormat::Zip.marker() || key == ArchiveFormat::TarGz.marker() {
                continue;
            }
            serializer.append_pair(&key, &value);
        }
    }
    serializer.append_pair(format.marker(), "true");
    format!("{}?{}", base_url, serializer.finish())
}

/// Stream an archive of `path`.
///
/// Named entries are checked on the blocking pool before the first byte is
/// sent, so a missing name still yields a clean 404.
pub async fn export(
    format: ArchiveFormat,
    path: PathBuf,
    files: Option<&str>,
) -> Result<Response, ServeError> {
    let request = ArchiveRequest::from_query(path, files)?;
    let request = tokio::task::spawn_blocking(move || request.validate().map(|()| request))
        .await
        .map_err(io::Error::other)??;

    let disposition = format.content_disposition(request.root());
    info!(
        root = %request.root().display(),
        format = format.extension(),
        names = request.names().len(),
        "Starting archive export"
    );

    let mut response = Response::new(stream_archive(format, request));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// Serve a regular file with range and conditional request support.
pub async fn serve_file(path: &Path, request: Request) -> Response {
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}

// =============================================================================
// Write Actions
// =============================================================================

/// Store every `file` part of a multipart body in `dir`.
///
/// Only the base name of each submitted filename is used. Existing files are
/// truncated. Parts without a usable name are skipped.
///
/// A malformed multipart envelope is a 400. A part whose data cannot be read
/// to the end or written to disk is an internal error, and the partially
/// written file is removed.
pub async fn upload(dir: &Path, request: Request) -> Result<(), ServeError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| ServeError::BadRequest(e.body_text()))?;

    let mut stored = 0usize;
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ServeError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let name = match field.file_name().and_then(upload_base_name) {
            Some(name) => name.to_string(),
            None => {
                debug!(
                    file_name = ?field.file_name(),
                    "Skipping upload part without a usable name"
                );
                continue;
            }
        };

        let target = dir.join(&name);
        match store_field(&mut field, &target).await {
            Ok(written) => {
                info!(path = %target.display(), bytes = written, "Stored upload");
                stored += 1;
            }
            Err(e) => {
                match tokio::fs::remove_file(&target).await {
                    Err(remove_err) if remove_err.kind() != io::ErrorKind::NotFound => warn!(
                        path = %target.display(),
                        "Cannot remove partial upload: {}",
                        remove_err
                    ),
                    _ => {}
                }
                return Err(e.into());
            }
        }
    }

    debug!(dir = %dir.display(), files = stored, "Upload complete");
    Ok(())
}

/// Copy one multipart field into `target`, returning the byte count.
async fn store_field(field: &mut Field<'_>, target: &Path) -> io::Result<u64> {
    let mut file = tokio::fs::File::create(target).await?;
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(io::Error::other)? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// Base name of a submitted upload filename.
///
/// Both `/` and `\` are treated as separators so client-side paths from any
/// platform are stripped. Returns `None` for names that cannot be stored.
pub fn upload_base_name(submitted: &str) -> Option<&str> {
    let base = submitted
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(submitted)
        .trim();
    match base {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// Create the folder named by the `name` form field (or query parameter).
///
/// An existing folder with that name counts as success.
pub async fn create_folder(
    dir: &Path,
    query_name: Option<String>,
    request: Request,
) -> Result<(), ServeError> {
    let body = axum::body::to_bytes(request.into_body(), MAX_FORM_BYTES)
        .await
        .map_err(|e| ServeError::BadRequest(format!("Cannot read form body: {}", e)))?;

    let name = form_urlencoded::parse(&body)
        .find(|(key, _)| key == "name")
        .map(|(_, value)| value.into_owned())
        .or(query_name)
        .unwrap_or_default();
    let name = validate_folder_name(&name)?;

    let target = dir.join(name);
    match tokio::fs::create_dir(&target).await {
        Ok(()) => {
            info!(path = %target.display(), "Created folder");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            if tokio::fs::metadata(&target).await?.is_dir() {
                debug!(path = %target.display(), "Folder already exists");
                Ok(())
            } else {
                Err(ServeError::BadRequest(format!("{} exists and is not a folder", name)))
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Check a requested folder name: non-empty and a single path component.
pub fn validate_folder_name(name: &str) -> Result<&str, ServeError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ServeError::BadRequest("Folder name is empty".to_string()));
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(ServeError::BadRequest(format!("Invalid folder name: {}", name)));
    }
    Ok(name)
}

/// Remove a single regular file.
pub async fn delete_file(path: &Path, url_path: &str) -> Result<(), ServeError> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|e| ServeError::from_stat(e, url_path))?;
    info!(path = %path.display(), "Deleted file");
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
