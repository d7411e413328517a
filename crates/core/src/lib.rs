//! Sundry Core - Shared types library.
//!
//! This crate provides common types used across all Sundry components:
//! - `cart` - Cart consistency engine (local/remote replicas, merge, sync)
//! - `cart-api` - Authoritative remote cart record service
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! In particular it owns the durable wire shape shared by the cart engine
//! and the cart API, so both sides agree on it by construction.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, catalog records, and cart wire types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
