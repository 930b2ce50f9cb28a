//! Configuration management for dirserve.
//!
//! Options come from the command line via clap, with an environment
//! variable fallback for each of them:
//!
//! - `DIRSERVE_ADDR` - Listen address (default: 0.0.0.0:8080)
//! - `DIRSERVE_PORT` - Port, overriding the one in the address
//! - `DIRSERVE_ROUTES` - Comma separated route definitions (default: `.`)
//! - `DIRSERVE_UPLOADS` / `DIRSERVE_DELETES` / `DIRSERVE_CREATES` - Enable write actions
//! - `DIRSERVE_NO_HIDDEN` - Hide dotfiles (and hidden-attribute files) in listings
//! - `DIRSERVE_TEMPLATES` - Custom template directory
//! - `DIRSERVE_USER` / `DIRSERVE_PASSWD` - Global Basic auth credentials
//!
//! # Route definitions
//!
//! ```text
//! [user:password@][ROUTE=]PATH
//!
//! ./public                    → /public/    serving ./public
//! /=/srv/www                  → /           serving /srv/www
//! alice:s3cret@docs=~/docs    → /docs/      serving ~/docs, Basic auth
//! ```

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::warn;

use crate::error::ConfigError;
use crate::route::{Capabilities, Credentials, RouteBinding, RouteTable};

// =============================================================================
// Default Values
// =============================================================================

/// Default listen address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Directory served when no route is configured.
pub const DEFAULT_ROUTE: &str = ".";

/// Separator between route prefix and path in a route definition.
pub const ROUTE_SEPARATOR: char = '=';

// =============================================================================
// CLI Arguments
// =============================================================================

/// dirserve - serve local directories over HTTP.
///
/// Browse directory listings, download files, and export whole trees as
/// zip or tar.gz. Uploads, deletes and folder creation can be enabled.
#[derive(Parser, Debug, Clone)]
#[command(name = "dirserve")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Address to listen on.
    #[arg(short, long, default_value = DEFAULT_ADDR, env = "DIRSERVE_ADDR")]
    pub addr: String,

    /// Port to listen on (overrides the port of --addr).
    #[arg(short, long, env = "DIRSERVE_PORT")]
    pub port: Option<u16>,

    // =========================================================================
    // Routes
    // =========================================================================
    /// Route definition [user:password@][ROUTE=]PATH (repeatable).
    ///
    /// ROUTE defaults to the base name of PATH.
    #[arg(short = 'r', long = "route", env = "DIRSERVE_ROUTES", value_delimiter = ',')]
    pub routes: Vec<String>,

    /// Additional route definitions.
    #[arg(value_name = "ROUTE")]
    pub extra_routes: Vec<String>,

    // =========================================================================
    // Capabilities
    // =========================================================================
    /// Allow uploads into served directories.
    #[arg(short, long, default_value_t = false, env = "DIRSERVE_UPLOADS")]
    pub uploads: bool,

    /// Allow deleting files.
    #[arg(short, long, default_value_t = false, env = "DIRSERVE_DELETES")]
    pub deletes: bool,

    /// Allow creating folders.
    #[arg(short, long, default_value_t = false, env = "DIRSERVE_CREATES")]
    pub creates: bool,

    /// Exclude hidden files and folders from listings.
    #[arg(long, default_value_t = false, env = "DIRSERVE_NO_HIDDEN")]
    pub no_hidden: bool,

    // =========================================================================
    // Templates and Authentication
    // =========================================================================
    /// Folder with custom templates (base.html, errors/<status>.html).
    #[arg(short, long, env = "DIRSERVE_TEMPLATES")]
    pub templates: Option<PathBuf>,

    /// Global user name for routes without their own credentials.
    #[arg(long, env = "DIRSERVE_USER")]
    pub user: Option<String>,

    /// Global password for routes without their own credentials.
    #[arg(long, env = "DIRSERVE_PASSWD")]
    pub passwd: Option<String>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Disable all log output.
    #[arg(short, long, default_value_t = false)]
    pub quiet: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    ///
    /// Only checks what can be checked without touching the filesystem;
    /// route roots are resolved by [`Config::route_table`].
    pub fn validate(&self) -> Result<(), String> {
        self.bind_address()?;

        for definition in self.route_definitions() {
            RouteSpec::parse(definition).map_err(|e| e.to_string())?;
        }

        if self.quiet && self.verbose {
            return Err("--quiet and --verbose cannot be used together".to_string());
        }

        Ok(())
    }

    /// Resolve the listen address, applying the --port override.
    ///
    /// An address of the form `:8080` listens on all interfaces.
    pub fn bind_address(&self) -> Result<SocketAddr, String> {
        let addr = if self.addr.starts_with(':') {
            format!("0.0.0.0{}", self.addr)
        } else {
            self.addr.clone()
        };

        let mut resolved = addr
            .to_socket_addrs()
            .map_err(|e| format!("Invalid address {:?}: {}", self.addr, e))?
            .next()
            .ok_or_else(|| format!("Address {:?} did not resolve", self.addr))?;

        if let Some(port) = self.port {
            resolved.set_port(port);
        }
        Ok(resolved)
    }

    /// Route definitions from --route and positional arguments, or `.`.
    pub fn route_definitions(&self) -> Vec<&str> {
        let definitions: Vec<&str> = self
            .routes
            .iter()
            .chain(self.extra_routes.iter())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
        if definitions.is_empty() {
            vec![DEFAULT_ROUTE]
        } else {
            definitions
        }
    }

    /// Capability flags applied to every route.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            uploads: self.uploads,
            deletes: self.deletes,
            creates: self.creates,
            hide_hidden: self.no_hidden,
        }
    }

    /// Global credentials, when any part of them is set.
    pub fn global_credentials(&self) -> Option<Credentials> {
        if self.user.is_none() && self.passwd.is_none() {
            return None;
        }
        Some(Credentials::new(
            self.user.clone().unwrap_or_default(),
            self.passwd.clone().unwrap_or_default(),
        ))
    }

    /// Custom template directory, if configured.
    pub fn template_dir(&self) -> Option<&Path> {
        self.templates.as_deref()
    }

    /// Parse every route definition and resolve it into the route table.
    pub fn route_table(&self) -> Result<RouteTable, ConfigError> {
        let global = self.global_credentials();
        let capabilities = self.capabilities();

        let bindings = self
            .route_definitions()
            .into_iter()
            .map(|definition| {
                RouteSpec::parse(definition)?.into_binding(global.as_ref(), capabilities)
            })
            .collect::<Result<Vec<_>, _>>()?;

        RouteTable::new(bindings)
    }
}

// =============================================================================
// Route Definitions
// =============================================================================

/// A parsed, not yet resolved, route definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSpec {
    /// Explicit route prefix, if the definition had `ROUTE=`
    pub prefix: Option<String>,

    /// Local path as written
    pub path: String,

    /// Route-specific credentials
    pub credentials: Option<Credentials>,
}

impl RouteSpec {
    /// Parse `[user:password@][ROUTE=]PATH`.
    pub fn parse(definition: &str) -> Result<Self, ConfigError> {
        let (rest, credentials) = split_credentials(definition);

        let (prefix, path) = match rest.find(ROUTE_SEPARATOR) {
            Some(i) if i > 0 => (Some(rest[..i].to_string()), &rest[i + 1..]),
            _ => (None, rest.strip_prefix(ROUTE_SEPARATOR).unwrap_or(rest)),
        };

        if path.is_empty() {
            return Err(ConfigError::InvalidRoute {
                definition: definition.to_string(),
                reason: "path is empty".to_string(),
            });
        }

        Ok(Self {
            prefix,
            path: path.to_string(),
            credentials,
        })
    }

    /// Resolve the local path and build the binding.
    ///
    /// The path must name an existing directory. Without an explicit prefix
    /// the route is `/<base name of the directory>/`.
    pub fn into_binding(
        self,
        global: Option<&Credentials>,
        capabilities: Capabilities,
    ) -> Result<RouteBinding, ConfigError> {
        let root = std::fs::canonicalize(&self.path).map_err(|source| ConfigError::Io {
            path: PathBuf::from(&self.path),
            source,
        })?;
        if !root.is_dir() {
            return Err(ConfigError::RootNotDirectory { path: root });
        }

        let prefix = match self.prefix {
            Some(prefix) => prefix,
            None => root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        Ok(RouteBinding::new(&prefix, root)
            .with_credentials(Credentials::effective(self.credentials.as_ref(), global))
            .with_capabilities(capabilities))
    }
}

/// Strip a leading `user:password@` from a route definition.
///
/// Credentials with an empty user or password are dropped with a warning.
/// A leading `:` left over after stripping is removed.
fn split_credentials(definition: &str) -> (&str, Option<Credentials>) {
    if let Some(at) = definition.find('@').filter(|&at| at > 0) {
        let (userinfo, rest) = (&definition[..at], &definition[at + 1..]);
        if let Some((user, password)) = userinfo.split_once(':') {
            if !user.is_empty() && !password.is_empty() {
                return (rest, Some(Credentials::new(user, password)));
            }
            warn!(
                definition = definition,
                "User or password is empty, serving route without credentials (expected user:passwd@route)"
            );
            return (rest.strip_prefix(':').unwrap_or(rest), None);
        }
    }
    (definition.strip_prefix(':').unwrap_or(definition), None)
}

// =============================================================================
// Tests
// =============================================================================
