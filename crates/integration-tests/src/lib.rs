//! Integration test harness for Sundry.
//!
//! [`TestContext`] boots the real cart API router in-process on an
//! ephemeral port, so tests exercise the actual wire contract and the cart
//! engine's HTTP adapters, not fakes. The server task is aborted when the
//! context drops.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use rust_decimal::dec;
use tokio::task::JoinHandle;

use sundry_cart_api::{ApiState, StaticTokenVerifier, app};
use sundry_core::{CatalogRecord, CurrencyCode, ItemId, Price};

/// Bearer token the harness registers for the identity `alice`.
pub const TOKEN_ALICE: &str = "integration-token-alice";

/// Bearer token the harness registers for the identity `bob`.
pub const TOKEN_BOB: &str = "integration-token-bob";

/// An in-process cart API server plus everything needed to call it.
pub struct TestContext {
    /// Base URL of the running server (e.g. `http://127.0.0.1:49152`).
    pub base_url: String,
    /// Handle on the server's state, for seeding records directly.
    pub state: ApiState,
    /// Plain HTTP client for wire-level assertions.
    pub client: reqwest::Client,
    server: JoinHandle<()>,
}

impl TestContext {
    /// Start a server with the default two-item catalog.
    pub async fn start() -> Self {
        Self::start_with_catalog(default_catalog()).await
    }

    /// Start a server with the given catalog.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot bind; tests cannot proceed without it.
    pub async fn start_with_catalog(catalog: Vec<CatalogRecord>) -> Self {
        let verifier = StaticTokenVerifier::new([
            (TOKEN_ALICE.to_string(), "alice".to_string()),
            (TOKEN_BOB.to_string(), "bob".to_string()),
        ]);
        let state = ApiState::new(Arc::new(verifier), catalog);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().expect("listener has no local addr");

        let router = app(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("cart-api server error");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            client: reqwest::Client::new(),
            server,
        }
    }

    /// Absolute URL for a path on the running server.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// A catalog record with a fixed price, for seeding.
#[must_use]
pub fn catalog_record(id: &str, name: &str) -> CatalogRecord {
    CatalogRecord {
        id: ItemId::new(id),
        name: name.to_string(),
        price: Price::new(dec!(7.25), CurrencyCode::USD),
        image_url: None,
    }
}

fn default_catalog() -> Vec<CatalogRecord> {
    vec![
        catalog_record("X1", "Olive oil"),
        catalog_record("X2", "Sea salt"),
    ]
}
