//! Sundry cart consistency engine.
//!
//! Keeps a shopper's cart correct and durable across two storage backends -
//! an ephemeral local store for guests and the authoritative remote cart
//! record for signed-in shoppers - while identity resolves asynchronously
//! and independently of cart edits.
//!
//! # Architecture
//!
//! - [`codec`] - compact (durable) form ↔ hydrated line items
//! - [`merge`] - one-shot reconciliation of guest and remote replicas at login
//! - [`scheduler`] - debounced, per-backend serialized durable writes
//! - [`store`] - the reactive cart state machine orchestrating the above
//! - [`storage`] - local and remote persistence adapters
//! - [`catalog`] / [`identity`] - external collaborator seams
//!
//! # Example
//!
//! ```rust,ignore
//! use sundry_cart::{CartConfig, CartStore, CartStoreDeps};
//!
//! let store = CartStore::new(CartStoreDeps {
//!     identity, catalog, resolver, local, remote,
//!     config: CartConfig::default(),
//! });
//! store.init();
//!
//! store.add_to_cart(&"X1".into(), 1).await;
//! let mut updates = store.subscribe();
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod identity;
pub mod merge;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use catalog::{
    CatalogHandle, CatalogIndex, CatalogResolver, CatalogWatch, HttpCatalogResolver,
    StaticCatalogResolver,
};
pub use config::CartConfig;
pub use error::{CartError, CatalogError, CredentialError, RemoteCartError, StorageError};
pub use identity::{
    AuthenticatedIdentity, CredentialProvider, IdentityHandle, IdentityObserver, IdentityState,
    StaticCredentials,
};
pub use scheduler::{SnapshotWriter, SyncScheduler, SyncTarget};
pub use storage::{
    FileLocalStorage, HttpRemoteCart, LocalCartStorage, MemoryLocalStorage, RemoteCartBackend,
};
pub use store::{CartContext, CartPhase, CartSnapshot, CartStore, CartStoreDeps};
