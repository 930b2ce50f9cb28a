//! Streaming archive export.
//!
//! A directory subtree (or a chosen set of its top-level children) is packed
//! into a `zip` or `tar+gzip` stream that is written straight into the HTTP
//! response body while the tree is walked. Only one file is open at a time
//! and nothing is staged on disk.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐   duplex pipe   ┌─────────────────────┐
//! │ blocking worker          │ ──────────────▶ │ ReaderStream        │
//! │  ArchiveWalk → encoder   │  (bounded)      │  → axum Body        │
//! └────────────┬─────────────┘                 └──────────┬──────────┘
//!              │ Result                                    │
//!              └──────────── JoinHandle ──────────────────▶ tail item
//!                                                (Err truncates the body)
//! ```
//!
//! The encoder runs on the blocking pool because the walk and the file reads
//! are synchronous. When the client disconnects the read half is dropped,
//! the next write fails, and the worker stops.

mod tar_gz;
mod zip_stream;

use std::collections::VecDeque;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use axum::body::Body;
use futures::StreamExt;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::io::{ReaderStream, SyncIoBridge};
use tracing::{debug, error};
use walkdir::WalkDir;

use crate::error::ArchiveError;

pub use tar_gz::write_tar_gz;
pub use zip_stream::write_zip;

/// Capacity of the in-memory pipe between the encoder and the response body.
pub const PIPE_CAPACITY: usize = 64 * 1024;

/// Read buffer size used when copying file contents into an archive.
pub const CHUNK_SIZE: usize = 32 * 1024;

// =============================================================================
// Format
// =============================================================================

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "application/zip",
            ArchiveFormat::TarGz => "application/x-tar+gzip",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    /// Query parameter that requests this format.
    pub fn marker(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarGz => "tar.gz",
        }
    }

    /// `Content-Disposition` value for an export of `root`.
    pub fn content_disposition(&self, root: &Path) -> String {
        let base = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        let base = base.replace(['"', '\\'], "_");
        format!("attachment; filename=\"{}.{}\"", base, self.extension())
    }
}

// =============================================================================
// Request
// =============================================================================

/// What to put in an archive: a root path and an optional set of its
/// top-level children.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    root: PathBuf,
    names: Vec<String>,
}

impl ArchiveRequest {
    /// Archive everything below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            names: Vec::new(),
        }
    }

    /// Restrict the archive to the given top-level children.
    ///
    /// Blank names are skipped. A name that is not a plain child name (it
    /// contains a separator, or is `.` or `..`) is rejected.
    pub fn with_names<I, S>(mut self, names: I) -> Result<Self, ArchiveError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if name.contains(['/', '\\']) || name == ".." || name == "." {
                return Err(ArchiveError::InvalidName(name.to_string()));
            }
            self.names.push(name.to_string());
        }
        Ok(self)
    }

    /// Build a request from the comma-separated `files` query value.
    pub fn from_query(root: impl Into<PathBuf>, files: Option<&str>) -> Result<Self, ArchiveError> {
        let request = Self::new(root);
        match files {
            Some(list) => request.with_names(list.split(',')),
            None => Ok(request),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Check that every named child exists.
    pub fn validate(&self) -> Result<(), ArchiveError> {
        for name in &self.names {
            if fs::symlink_metadata(self.root.join(name)).is_err() {
                return Err(ArchiveError::MissingEntry(name.clone()));
            }
        }
        Ok(())
    }

    /// Lazily enumerate the regular files to archive.
    ///
    /// When the root is itself a regular file, it is the only entry and is
    /// named by its base name.
    pub fn walk(&self) -> Result<ArchiveWalk, ArchiveError> {
        let metadata = fs::metadata(&self.root)?;
        let (base, tops) = if metadata.is_dir() {
            let tops = if self.names.is_empty() {
                vec![self.root.clone()]
            } else {
                self.names.iter().map(|n| self.root.join(n)).collect()
            };
            (self.root.clone(), tops)
        } else {
            let parent = self.root.parent().map(Path::to_path_buf).unwrap_or_default();
            (parent, vec![self.root.clone()])
        };
        Ok(ArchiveWalk {
            base,
            pending: tops.into(),
            current: None,
        })
    }
}

// =============================================================================
// Walk
// =============================================================================

/// One regular file headed for the archive.
#[derive(Debug)]
pub struct ArchiveEntry {
    /// Absolute source path
    pub path: PathBuf,

    /// Entry name relative to the archive root, `/` separated
    pub name: String,

    /// Metadata of the file (symlinks followed)
    pub metadata: Metadata,
}

impl ArchiveEntry {
    /// Permission bits to record in the archive.
    #[cfg(unix)]
    pub fn mode(&self) -> u32 {
        use std::os::unix::fs::PermissionsExt;
        self.metadata.permissions().mode() & 0o7777
    }

    /// Permission bits to record in the archive.
    #[cfg(not(unix))]
    pub fn mode(&self) -> u32 {
        if self.metadata.permissions().readonly() {
            0o444
        } else {
            0o644
        }
    }

    /// Modification time in seconds since the Unix epoch.
    pub fn mtime(&self) -> u64 {
        self.metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Depth-first, name-sorted iterator over the files of an [`ArchiveRequest`].
///
/// Directories are traversed but never yielded. Entries that are neither
/// files nor directories (sockets, dangling links) are skipped.
pub struct ArchiveWalk {
    base: PathBuf,
    pending: VecDeque<PathBuf>,
    current: Option<walkdir::IntoIter>,
}

impl Iterator for ArchiveWalk {
    type Item = Result<ArchiveEntry, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let top = self.pending.pop_front()?;
                self.current = Some(WalkDir::new(top).sort_by_file_name().into_iter());
            }

            let entry = match self.current.as_mut().and_then(|iter| iter.next()) {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => return Some(Err(e.into())),
                None => {
                    self.current = None;
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            let metadata = match fs::metadata(entry.path()) {
                Ok(m) if m.is_file() => m,
                Ok(_) | Err(_) => {
                    debug!(path = %entry.path().display(), "Skipping non-regular file");
                    continue;
                }
            };

            let name = match relative_name(&self.base, entry.path()) {
                Some(name) => name,
                None => continue,
            };
            return Some(Ok(ArchiveEntry {
                path: entry.into_path(),
                name,
                metadata,
            }));
        }
    }
}

/// `/`-separated name of `path` relative to `base`.
fn relative_name(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

// =============================================================================
// Streaming
// =============================================================================

/// Start encoding `request` in the background and return the response body.
///
/// Must be called from within a Tokio runtime. Errors raised after the first
/// bytes were produced are logged and end the body with an error.
pub fn stream_archive(format: ArchiveFormat, request: ArchiveRequest) -> Body {
    let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
    let root = request.root().display().to_string();
    let handle = spawn_encoder(format, request, writer);

    let tail = futures::stream::once(async move {
        match handle.await {
            Ok(Ok(())) => {
                debug!(root = %root, format = ?format, "Archive export complete");
                None
            }
            Ok(Err(e)) => {
                error!(root = %root, format = ?format, error = %e, "Archive export failed");
                Some(Err(io::Error::other(e.to_string())))
            }
            Err(e) => {
                error!(root = %root, format = ?format, error = %e, "Archive worker panicked");
                Some(Err(io::Error::other(e.to_string())))
            }
        }
    })
    .filter_map(futures::future::ready);

    Body::from_stream(ReaderStream::new(reader).chain(tail))
}

/// Run the encoder for `format` on the blocking pool, writing into `writer`.
///
/// The task ends with an error as soon as a write fails, which is what
/// happens once the read half of the pipe has been dropped.
fn spawn_encoder(
    format: ArchiveFormat,
    request: ArchiveRequest,
    writer: DuplexStream,
) -> JoinHandle<Result<(), ArchiveError>> {
    match format {
        ArchiveFormat::TarGz => tokio::task::spawn_blocking(move || {
            let mut out = write_tar_gz(SyncIoBridge::new(writer), &request)?;
            out.shutdown()?;
            Ok::<_, ArchiveError>(())
        }),
        ArchiveFormat::Zip => tokio::task::spawn_blocking(move || {
            Handle::current().block_on(async move {
                let mut out = write_zip(writer, &request).await?;
                out.shutdown().await?;
                Ok::<_, ArchiveError>(())
            })
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================
