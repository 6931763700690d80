//! Query-side services for Precedent.
//!
//! Everything here is generic over the storage traits in
//! [`precedent_core::store`]:
//!
//! - [`graph::CitationGraph`] resolves validity by walking the citation graph
//!   and caches the result against the revision of the visited set.
//! - [`anchor::AnchorService`] produces and re-verifies provenance anchors.
//! - [`ranker::RetrievalRanker`] fuses relevance, validity and citation
//!   signals into one total order.
//! - [`coordinator::QueryCoordinator`] drives a `find` call through its
//!   stages and is the single entry point for callers.

pub mod anchor;
pub mod candidates;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod graph;
pub mod ranker;
pub mod relevance;

pub use config::QueryConfig;
pub use coordinator::{FindOptions, FindResponse, QueryCoordinator};
pub use error::{QueryError, Result};
