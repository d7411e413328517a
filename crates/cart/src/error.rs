//! Error types for the cart engine.
//!
//! Every I/O failure is caught at its adapter boundary and converted to one
//! of these types; nothing in this crate panics into the caller. The worst
//! case anywhere is a temporarily unsynced cart.

use thiserror::Error;

/// Errors from the local durable store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying store unavailable.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors minting an identity credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The identity provider could not produce a token.
    #[error("credential unavailable: {0}")]
    Unavailable(String),

    /// A credential was requested for a non-authenticated identity.
    #[error("identity is not authenticated")]
    NotAuthenticated,
}

/// Errors from the remote cart backend.
#[derive(Debug, Error)]
pub enum RemoteCartError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend rejected the request.
    #[error("backend rejected request: {status} - {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// Credential minting failed before the call was issued.
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

/// Errors from catalog resolution.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalog service returned an error response.
    #[error("catalog service error: {status} - {message}")]
    Service {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },
}

/// Top-level cart engine error.
///
/// Surfaced for logging; never fatal to the in-memory cart.
#[derive(Debug, Error)]
pub enum CartError {
    /// Local store failure.
    #[error("local storage: {0}")]
    Storage(#[from] StorageError),

    /// Remote backend failure.
    #[error("remote cart: {0}")]
    Remote(#[from] RemoteCartError),

    /// Credential minting failure.
    #[error("credential: {0}")]
    Credential(#[from] CredentialError),
}
