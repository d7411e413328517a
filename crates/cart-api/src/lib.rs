//! Sundry cart API - authoritative cart and catalog service.
//!
//! The remote half of the cart consistency contract: the catalog is public,
//! the cart record is keyed by the bearer-authenticated identity and
//! replaced wholesale on every write. The storage engine behind the records
//! is deliberately an in-memory map; the wire contract, not the store, is
//! the product.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use auth::{Identity, StaticTokenVerifier, TokenVerifier};
pub use config::{ApiConfig, ConfigError};
pub use error::ApiError;
pub use state::ApiState;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the application router over the given state.
#[must_use]
pub fn app(state: ApiState) -> Router {
    routes::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
