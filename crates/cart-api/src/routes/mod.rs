//! HTTP route handlers for the cart API.
//!
//! ```text
//! GET /health              - Liveness check
//!
//! # Catalog (public)
//! GET /api/products        - All catalog records
//! GET /api/products/{id}   - One catalog record
//!
//! # Cart (bearer auth)
//! GET /api/cart            - The caller's cart record (empty if none)
//! PUT /api/cart            - Full-snapshot replace of the caller's record
//! ```

pub mod cart;
pub mod products;

use axum::Router;
use axum::routing::get;

use crate::state::ApiState;

/// Assemble all routes.
pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/products", get(products::list_products))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/cart", get(cart::get_cart).put(cart::put_cart))
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
