//! HTTP server layer for dirserve.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                  ANY /<route>/<path>?<markers>                  │
//! │                                                                 │
//! │  ┌───────────┐  ┌──────────┐  ┌────────────┐  ┌─────────────┐   │
//! │  │  routes   │─▶│   auth   │─▶│  dispatch  │─▶│  handlers   │   │
//! │  │ (lookup)  │  │ (Basic)  │  │  (rules)   │  │  (actions)  │   │
//! │  └───────────┘  └──────────┘  └────────────┘  └──────┬──────┘   │
//! │                                                      │          │
//! │                                    ┌─────────────────┴───────┐  │
//! │                                    │ render (listing, errors)│  │
//! │                                    └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod dispatch;
pub mod handlers;
pub mod render;
pub mod routes;

pub use auth::{basic_auth_middleware, AuthError, AuthState, BasicAuth};
pub use dispatch::{
    classify, dispatch, Action, MethodKind, RequestFacts, RequestQuery, StatOutcome, RULES,
};
pub use handlers::RouteState;
pub use render::{html_escape, RenderContext};
pub use routes::{create_router, ServerConfig};
