use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while turning command-line options into a route table.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Route definition could not be parsed
    #[error("Invalid route definition {definition:?}: {reason}")]
    InvalidRoute { definition: String, reason: String },

    /// Route root does not exist or is not a directory
    #[error("Route root is not a directory: {}", path.display())]
    RootNotDirectory { path: PathBuf },

    /// Two routes were bound to the same prefix
    #[error("Duplicate route prefix: {0}")]
    DuplicateRoute(String),

    /// The route table is empty
    #[error("No routes configured")]
    NoRoutes,

    /// I/O error while resolving a route root
    #[error("Cannot resolve {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors that can occur while producing an archive stream.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// A requested top-level name is not a plain child name
    #[error("Invalid archive entry name: {0:?}")]
    InvalidName(String),

    /// A requested top-level name does not exist under the archive root
    #[error("Archive entry not found: {0}")]
    MissingEntry(String),

    /// I/O error while reading sources or writing the stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Directory traversal failed
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Zip encoder failure
    #[error("Zip error: {0}")]
    Zip(#[from] async_zip::error::ZipError),
}

/// Errors surfaced by the request dispatcher.
///
/// Every variant maps onto exactly one HTTP status; see
/// [`ServeError::status`].
#[derive(Debug, Error)]
pub enum ServeError {
    /// Resolved path does not exist (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Permission denied or capability disabled (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed request input (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Filesystem failure (500)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Archive could not be started (status depends on the cause)
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

impl ServeError {
    /// Classify a failed `stat` of a resolved path.
    pub fn from_stat(err: io::Error, path: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ServeError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => ServeError::Forbidden(path.to_string()),
            _ => ServeError::Io(err),
        }
    }
}
