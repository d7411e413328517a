//! Persistence adapters for the two cart backends.
//!
//! The local store is synchronous and unauthenticated; the remote backend
//! is authenticated HTTP. The two records are owned by mutually exclusive
//! identity contexts - only the login-time merge ever reads both.

mod local;
mod remote;

pub use local::{FileLocalStorage, LocalCartStorage, MemoryLocalStorage};
pub use remote::{HttpRemoteCart, RemoteCartBackend};
