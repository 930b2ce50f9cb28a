//! # dirserve
//!
//! Serve one or more local directory trees over HTTP.
//!
//! Each configured route binds a URL prefix to a directory. Requests are
//! resolved onto that directory and dispatched to exactly one action:
//! directory listing, raw file download (with range requests), streamed
//! `zip` or `tar.gz` export, and, when enabled per route, multipart upload,
//! folder creation and file deletion. Routes can be protected with HTTP
//! Basic authentication.
//!
//! ## Architecture
//!
//! - [`route`] - Route table and request path resolution
//! - [`listing`] - Directory listing assembly
//! - [`archive`] - Streaming zip and tar.gz export
//! - [`server`] - Axum router, dispatcher, auth and rendering
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use dirserve::{create_router, RouteBinding, RouteTable, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = RouteTable::new(vec![RouteBinding::new("/files/", "/srv/files")])?;
//!     let router = create_router(ServerConfig::new(table));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod listing;
pub mod route;
pub mod server;

// Re-export commonly used types
pub use archive::{stream_archive, ArchiveFormat, ArchiveRequest};
pub use config::{Config, RouteSpec};
pub use error::{ArchiveError, ConfigError, ServeError};
pub use listing::{
    assemble, dotfile_hidden, format_size, platform_hidden, HiddenPredicate, ListingEntry,
    ListingPage,
};
pub use route::{resolve, Capabilities, Credentials, RouteBinding, RouteTable};
pub use server::{create_router, RenderContext, ServerConfig};
