//! Core types and trait definitions for the Precedent legal knowledge store.
//!
//! This crate is deliberately free of HTTP and database dependencies. It holds
//! the bi-temporal record model, the citation graph vocabulary, the validity
//! rules, and the provenance-anchor hashing. Every other crate depends on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod anchor;
pub mod citation;
pub mod document;
pub mod error;
pub mod store;
pub mod temporal;
pub mod validity;

pub use error::{AsDomainError, Error, Result};
