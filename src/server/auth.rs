//! HTTP Basic authentication for protected routes.
//!
//! Routes with effective credentials (their own, or the global pair) are
//! wrapped in [`basic_auth_middleware`]. A request that fails the check gets
//! `401 Unauthorized` with a `WWW-Authenticate` challenge and never reaches
//! the dispatcher.
//!
//! # Security Properties
//!
//! - **Constant-time comparison**: user and password are compared with
//!   `subtle`, and both comparisons always run
//! - **No credential logging**: failures log the reason and the route, never
//!   the submitted values

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::render::RenderContext;
use crate::route::Credentials;

/// Realm announced in the challenge when none is configured.
pub const DEFAULT_REALM: &str = "dirserve";

// =============================================================================
// Types
// =============================================================================

/// Authentication error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header
    MissingCredentials,

    /// Header present but not a decodable Basic credential
    MalformedHeader,

    /// Credentials decoded but do not match
    InvalidCredentials,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "Missing credentials"),
            AuthError::MalformedHeader => write!(f, "Malformed Authorization header"),
            AuthError::InvalidCredentials => write!(f, "Invalid credentials"),
        }
    }
}

impl std::error::Error for AuthError {}

// =============================================================================
// Basic Authentication
// =============================================================================

/// Static username/password check.
#[derive(Clone)]
pub struct BasicAuth {
    user: Vec<u8>,
    password: Vec<u8>,
    realm: String,
}

impl BasicAuth {
    /// Create a checker for the given credentials.
    pub fn new(credentials: &Credentials) -> Self {
        Self {
            user: credentials.user.as_bytes().to_vec(),
            password: credentials.password.as_bytes().to_vec(),
            realm: DEFAULT_REALM.to_string(),
        }
    }

    /// Set the realm announced in the challenge.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = realm.into();
        self
    }

    /// `WWW-Authenticate` header value.
    pub fn challenge(&self) -> String {
        format!("Basic realm=\"{}\"", self.realm.replace('"', "'"))
    }

    /// Compare a user/password pair in constant time.
    pub fn verify(&self, user: &[u8], password: &[u8]) -> bool {
        let user_ok = self.user.as_slice().ct_eq(user);
        let password_ok = self.password.as_slice().ct_eq(password);
        (user_ok & password_ok).into()
    }

    /// Check the `Authorization` header of a request.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?;
        let (user, password) = decode_basic(value).ok_or(AuthError::MalformedHeader)?;
        if self.verify(&user, &password) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("user", &String::from_utf8_lossy(&self.user))
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

/// Split a `Basic <base64(user:password)>` header into its parts.
fn decode_basic(value: &HeaderValue) -> Option<(Vec<u8>, Vec<u8>)> {
    let value = value.to_str().ok()?.trim();
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let colon = decoded.iter().position(|&b| b == b':')?;
    Some((decoded[..colon].to_vec(), decoded[colon + 1..].to_vec()))
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// State of the authentication layer of one route.
#[derive(Clone)]
pub struct AuthState {
    pub auth: BasicAuth,
    pub render: Arc<RenderContext>,
}

impl AuthState {
    pub fn new(auth: BasicAuth, render: Arc<RenderContext>) -> Self {
        Self { auth, render }
    }

    /// 401 response with the challenge header and the rendered error page.
    pub fn reject(&self, err: &AuthError, path: &str) -> Response {
        // Browsers first ask without credentials, so that case is routine
        match err {
            AuthError::MissingCredentials => {
                debug!(path = path, status = 401, "Authentication required: {}", err)
            }
            _ => warn!(path = path, status = 401, "Authentication failed: {}", err),
        }

        let mut response = self.render.error_page(StatusCode::UNAUTHORIZED);
        if let Ok(value) = HeaderValue::from_str(&self.auth.challenge()) {
            response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

/// Axum middleware enforcing HTTP Basic authentication.
///
/// # Example
///
/// ```ignore
/// use axum::{middleware, Router};
///
/// let state = AuthState::new(BasicAuth::new(&credentials), render);
/// let app = Router::new()
///     .fallback(dispatch)
///     .layer(middleware::from_fn_with_state(state, basic_auth_middleware));
/// ```
pub async fn basic_auth_middleware(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    match state.auth.check(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(e) => state.reject(&e, request.uri().path()),
    }
}

// =============================================================================
// Tests
// =============================================================================
