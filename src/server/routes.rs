//! Router assembly.
//!
//! Every configured route becomes its own small axum `Router` whose only
//! handler is the dispatcher fallback, wrapped in the Basic auth layer when
//! the route has credentials. A top-level fallback picks the route by
//! longest prefix and forwards the request to it, so every HTTP method
//! reaches the dispatcher.
//!
//! # Route Structure
//!
//! ```text
//! /                   307 to the first route (unless a route binds "/")
//! /docs               301 to /docs/
//! /docs/...           route "/docs/"  → [auth] → dispatch
//! /media/...          route "/media/" → [auth] → dispatch
//! anything else       404
//! ```
//!
//! # Example
//!
//! ```ignore
//! use dirserve::server::routes::{create_router, ServerConfig};
//!
//! let table = RouteTable::new(vec![RouteBinding::new("/docs/", "/srv/docs")])?;
//! let router = create_router(ServerConfig::new(table).with_tracing(false));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{middleware, Router};
use tower::ServiceExt;
use tower_http::trace::TraceLayer;
use tracing::debug;

use super::auth::{basic_auth_middleware, AuthState, BasicAuth};
use super::dispatch::dispatch;
use super::handlers::RouteState;
use super::render::RenderContext;
use crate::listing::{platform_hidden, HiddenPredicate};
use crate::route::{RouteBinding, RouteTable};

// =============================================================================
// Server Configuration
// =============================================================================

/// Everything needed to build the HTTP router.
#[derive(Clone)]
pub struct ServerConfig {
    /// Route bindings, with effective credentials and capabilities
    pub table: RouteTable,

    /// Rendering context for listings and error pages
    pub render: RenderContext,

    /// Hidden-entry predicate for listings
    pub is_hidden: HiddenPredicate,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl ServerConfig {
    /// Create a configuration with built-in templates, the platform hidden
    /// rule and tracing enabled.
    pub fn new(table: RouteTable) -> Self {
        Self {
            table,
            render: RenderContext::builtin(),
            is_hidden: platform_hidden(),
            enable_tracing: true,
        }
    }

    /// Load custom templates from `dir` (see [`RenderContext::from_template_dir`]).
    pub fn with_template_dir(mut self, dir: Option<&Path>) -> Self {
        self.render = RenderContext::from_template_dir(dir);
        self
    }

    /// Use an already built rendering context.
    pub fn with_render(mut self, render: RenderContext) -> Self {
        self.render = render;
        self
    }

    /// Replace the hidden-entry predicate.
    pub fn with_hidden_predicate(mut self, is_hidden: HiddenPredicate) -> Self {
        self.is_hidden = is_hidden;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// State of the top-level fallback.
#[derive(Clone)]
struct AppState {
    table: Arc<RouteTable>,
    routes: Arc<Vec<Router>>,
    render: Arc<RenderContext>,
}

/// Create the application router.
///
/// # Arguments
///
/// * `config` - Route table, templates, hidden rule and tracing switch
///
/// # Returns
///
/// A router ready to be passed to `axum::serve`.
pub fn create_router(config: ServerConfig) -> Router {
    let render = Arc::new(config.render);

    let routes: Vec<Router> = config
        .table
        .iter()
        .map(|binding| {
            build_route(binding.clone(), render.clone(), config.is_hidden.clone())
        })
        .collect();

    let state = AppState {
        table: Arc::new(config.table),
        routes: Arc::new(routes),
        render,
    };

    let router = Router::new().fallback(route_request).with_state(state);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Router serving a single binding.
fn build_route(
    binding: RouteBinding,
    render: Arc<RenderContext>,
    is_hidden: HiddenPredicate,
) -> Router {
    let auth = binding
        .credentials()
        .map(|c| BasicAuth::new(c).with_realm(binding.prefix()));
    let state = RouteState::new(Arc::new(binding), render.clone(), is_hidden);

    let router = Router::new()
        .fallback(dispatch)
        .with_state(state)
        .layer(DefaultBodyLimit::disable());

    match auth {
        Some(auth) => router.layer(middleware::from_fn_with_state(
            AuthState::new(auth, render),
            basic_auth_middleware,
        )),
        None => router,
    }
}

/// Forward a request to its route, or answer the redirects and the 404.
async fn route_request(State(state): State<AppState>, request: Request) -> Response {
    let raw_path = request.uri().path();
    let path = urlencoding::decode(raw_path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| raw_path.to_string());

    if let Some(index) = state.table.lookup_index(&path) {
        let route = state.routes[index].clone();
        return match route.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        };
    }

    if path == "/" {
        let target = state.table.first().prefix();
        debug!(target = target, "Redirecting root to first route");
        return redirect(StatusCode::TEMPORARY_REDIRECT, target);
    }

    if let Some(binding) = state.table.lookup_without_slash(&path) {
        let target = match request.uri().query() {
            Some(query) => format!("{}?{}", binding.prefix(), query),
            None => binding.prefix().to_string(),
        };
        return redirect(StatusCode::MOVED_PERMANENTLY, &target);
    }

    debug!(path = %path, status = 404, "No route matches request");
    state.render.error_page(StatusCode::NOT_FOUND)
}

fn redirect(status: StatusCode, location: &str) -> Response {
    let mut response = status.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

// =============================================================================
// Tests
// =============================================================================
