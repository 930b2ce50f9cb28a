//! Route table: URL prefixes bound to local directory roots.
//!
//! The table is built once at startup and never mutated afterwards, so it is
//! shared between request tasks behind an `Arc` without any locking.
//!
//! # Architecture
//!
//! ```text
//! GET /docs/guide/intro.md
//!      │
//!      ▼
//! ┌──────────────┐  longest prefix   ┌──────────────────────────────┐
//! │  RouteTable  │ ────────────────▶ │ RouteBinding "/docs/"        │
//! └──────────────┘                   │   root = /srv/docs           │
//!                                    │   credentials, capabilities  │
//!                                    └──────────────┬───────────────┘
//!                                                   │ resolve()
//!                                                   ▼
//!                                     /srv/docs/guide/intro.md
//! ```

mod resolve;

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub use resolve::{clean_segments, resolve};

// =============================================================================
// Route Binding
// =============================================================================

/// Username/password pair for HTTP Basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Pick the credentials that guard a route.
    ///
    /// A route's own pair wins; otherwise the global pair applies whenever
    /// any part of it is set. `None` means the route is served unauthenticated.
    pub fn effective(route: Option<&Credentials>, global: Option<&Credentials>) -> Option<Self> {
        if let Some(own) = route {
            if !own.user.is_empty() && !own.password.is_empty() {
                return Some(own.clone());
            }
        }
        match global {
            Some(g) if !g.user.is_empty() || !g.password.is_empty() => Some(g.clone()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Per-route capability flags gating the write-capable actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Accept multipart uploads into directories
    pub uploads: bool,

    /// Allow deleting regular files
    pub deletes: bool,

    /// Allow creating subfolders
    pub creates: bool,

    /// Exclude hidden entries from directory listings
    pub hide_hidden: bool,
}

impl Capabilities {
    /// Read-only route: no uploads, deletes or folder creation.
    pub fn read_only() -> Self {
        Self::default()
    }

    /// Everything enabled, hidden entries shown.
    pub fn all() -> Self {
        Self {
            uploads: true,
            deletes: true,
            creates: true,
            hide_hidden: false,
        }
    }
}

/// A URL prefix bound to one directory root.
#[derive(Debug, Clone)]
pub struct RouteBinding {
    prefix: String,
    root: PathBuf,
    credentials: Option<Credentials>,
    capabilities: Capabilities,
}

impl RouteBinding {
    /// Bind `prefix` to `root`. The prefix is normalized to start and end with `/`.
    pub fn new(prefix: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            root: root.into(),
            credentials: None,
            capabilities: Capabilities::default(),
        }
    }

    /// Require HTTP Basic credentials for this route.
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the capability flags for this route.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Whether `path` falls under this route's prefix.
    pub fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Normalize a route prefix so it starts and ends with `/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let mut normalized = String::with_capacity(prefix.len() + 2);
    if !prefix.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(prefix);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

// =============================================================================
// Route Table
// =============================================================================

/// Ordered, immutable collection of route bindings.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<RouteBinding>,
}

impl RouteTable {
    /// Build a table, rejecting empty input and duplicate prefixes.
    pub fn new(routes: Vec<RouteBinding>) -> Result<Self, ConfigError> {
        if routes.is_empty() {
            return Err(ConfigError::NoRoutes);
        }
        for (i, route) in routes.iter().enumerate() {
            if routes[..i].iter().any(|r| r.prefix == route.prefix) {
                return Err(ConfigError::DuplicateRoute(route.prefix.clone()));
            }
        }
        Ok(Self { routes })
    }

    /// Index of the binding with the longest prefix matching `path`.
    pub fn lookup_index(&self, path: &str) -> Option<usize> {
        self.routes
            .iter()
            .enumerate()
            .filter(|(_, route)| route.matches(path))
            .max_by_key(|(i, route)| (route.prefix.len(), std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
    }

    /// Binding with the longest prefix matching `path`.
    pub fn lookup(&self, path: &str) -> Option<&RouteBinding> {
        self.lookup_index(path).map(|i| &self.routes[i])
    }

    /// Binding whose prefix is `path` plus a trailing slash (`/docs` for `/docs/`).
    pub fn lookup_without_slash(&self, path: &str) -> Option<&RouteBinding> {
        if path.ends_with('/') {
            return None;
        }
        self.routes
            .iter()
            .find(|route| route.prefix.len() == path.len() + 1 && route.prefix.starts_with(path))
    }

    /// First configured binding, used as the redirect target for `/`.
    pub fn first(&self) -> &RouteBinding {
        &self.routes[0]
    }

    /// Whether some route is bound to the root prefix `/`.
    pub fn binds_root(&self) -> bool {
        self.routes.iter().any(|r| r.prefix == "/")
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteBinding> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
