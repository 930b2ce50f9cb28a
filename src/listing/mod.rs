//! Directory listing assembly.
//!
//! Turns a directory read into an ordered list of [`ListingEntry`] values:
//! directories first, then files, each group sorted case-insensitively by
//! name. The HTML page is rendered elsewhere from this data.

mod hidden;
mod size;

use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::warn;

use crate::route::Capabilities;

pub use hidden::{dotfile_hidden, platform_hidden, HiddenPredicate};
pub use size::format_size;

/// Format used for the modification time column.
pub const MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Kind label used for directories.
pub const DIR_KIND: &str = "DIR";

/// Kind label used for files without an extension.
pub const FILE_KIND: &str = "File";

// =============================================================================
// Types
// =============================================================================

/// One row of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// File name as stored on disk
    pub name: String,

    /// Exact size in bytes
    pub size: u64,

    /// Whether the entry is a directory
    pub is_dir: bool,

    /// `DIR`, the lowercase extension, or `File`
    pub kind: String,

    /// Number of visible immediate children (directories only)
    pub child_count: usize,

    /// Last modification time, when the filesystem reports one
    pub modified: Option<SystemTime>,

    /// Link to the entry, relative to the server root
    pub url: String,

    /// Whether the hidden predicate flagged this entry
    pub hidden: bool,
}

impl ListingEntry {
    /// Human-readable size (`999b`, `2kb`, ...).
    pub fn size_label(&self) -> String {
        format_size(self.size)
    }

    /// Modification time as `YYYY-MM-DD HH:MM:SS` in local time.
    pub fn modified_label(&self) -> String {
        self.modified
            .map(|time| DateTime::<Local>::from(time).format(MODIFIED_FORMAT).to_string())
            .unwrap_or_default()
    }
}

/// Everything the listing page needs to render one directory.
#[derive(Debug, Clone)]
pub struct ListingPage {
    /// Page heading: root basename plus the path below the root
    pub title: String,

    /// Ordered entries
    pub entries: Vec<ListingEntry>,

    /// Current URL with the zip export marker added
    pub zip_url: String,

    /// Current URL with the tar.gz export marker added
    pub tar_gz_url: String,

    /// Capabilities of the route, for upload and create-folder controls
    pub capabilities: Capabilities,
}

// =============================================================================
// Assembly
// =============================================================================

/// Read `dir` and build its ordered listing.
///
/// # Arguments
///
/// * `dir` - Directory to list
/// * `base_url` - Request path of `dir`, used to build per-entry links
/// * `hide_hidden` - Drop entries the predicate flags as hidden
/// * `is_hidden` - Platform hidden-file predicate
///
/// Child counts of subdirectories are best effort: an unreadable
/// subdirectory reports zero and is logged.
pub fn assemble(
    dir: &Path,
    base_url: &str,
    hide_hidden: bool,
    is_hidden: &(dyn Fn(&Path) -> bool + Send + Sync),
) -> io::Result<Vec<ListingEntry>> {
    let mut entries = Vec::new();

    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = dir_entry?;
        let path = dir_entry.path();
        let hidden = is_hidden(&path);
        if hide_hidden && hidden {
            continue;
        }

        // Follow symlinks; fall back to the link itself when the target is gone
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(_) => dir_entry.metadata()?,
        };

        let name = dir_entry.file_name().to_string_lossy().into_owned();
        let is_dir = metadata.is_dir();
        let child_count = if is_dir {
            count_children(&path, hide_hidden, is_hidden)
        } else {
            0
        };

        entries.push(ListingEntry {
            kind: kind_label(&name, is_dir),
            url: entry_url(base_url, &name, is_dir),
            size: metadata.len(),
            modified: metadata.modified().ok(),
            name,
            is_dir,
            child_count,
            hidden,
        });
    }

    sort_entries(&mut entries);
    Ok(entries)
}

/// Order entries: directories first, then files, each by lowercase name.
pub fn sort_entries(entries: &mut [ListingEntry]) {
    entries.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// Kind column value for an entry.
pub fn kind_label(name: &str, is_dir: bool) -> String {
    if is_dir {
        return DIR_KIND.to_string();
    }
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => FILE_KIND.to_string(),
    }
}

/// Link for an entry below `base_url`, with a trailing slash for directories.
pub fn entry_url(base_url: &str, name: &str, is_dir: bool) -> String {
    let mut url = String::with_capacity(base_url.len() + name.len() + 2);
    url.push_str(base_url.trim_end_matches('/'));
    url.push('/');
    url.push_str(&urlencoding::encode(name));
    if is_dir {
        url.push('/');
    }
    url
}

fn count_children(
    dir: &Path,
    hide_hidden: bool,
    is_hidden: &(dyn Fn(&Path) -> bool + Send + Sync),
) -> usize {
    match fs::read_dir(dir) {
        Ok(children) => children
            .filter_map(Result::ok)
            .filter(|child| !(hide_hidden && is_hidden(&child.path())))
            .count(),
        Err(e) => {
            warn!(path = %dir.display(), "Cannot count directory entries: {}", e);
            0
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
