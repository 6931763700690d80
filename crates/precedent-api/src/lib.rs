//! JSON REST API for Precedent.
//!
//! Exposes an axum [`Router`] over a [`QueryCoordinator`], backed by any
//! [`LegalStore`] and [`RelevanceScorer`]. Auth and TLS are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", precedent_api::router(coordinator.clone()))
//! ```

pub mod anchors;
pub mod candidates;
pub mod documents;
pub mod edges;
pub mod error;
pub mod find;
pub mod records;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use precedent_core::store::LegalStore;
use precedent_query::{
  QueryConfig, QueryCoordinator, relevance::RelevanceScorer,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `precedent.toml` and
/// `PRECEDENT_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub query:      QueryConfig,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_string(),
      port:       8080,
      store_path: PathBuf::from("~/.local/share/precedent/precedent.db"),
      query:      QueryConfig::default(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub type AppState<S, R> = Arc<QueryCoordinator<S, R>>;

/// Build a fully-materialised API router for `coordinator`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn router<S, R>(coordinator: AppState<S, R>) -> Router<()>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  Router::new()
    // Records
    .route("/records", post(records::ingest::<S, R>))
    .route("/records/ingest-unit", post(records::ingest_unit::<S, R>))
    .route("/records/{id}", get(records::get_one::<S, R>))
    .route("/records/{id}/supersede", post(records::supersede::<S, R>))
    // Documents
    .route("/documents/{id}/as-of", get(documents::as_of::<S, R>))
    .route("/documents/{id}/history", get(documents::history::<S, R>))
    .route("/documents/{id}/validity", get(documents::validity::<S, R>))
    .route("/documents/{id}/edges", get(documents::edges::<S, R>))
    // Edges
    .route("/edges", post(edges::create::<S, R>))
    .route("/edges/batch", post(edges::create_batch::<S, R>))
    // Anchors
    .route("/anchors", post(anchors::create::<S, R>))
    .route("/anchors/verify", post(anchors::verify::<S, R>))
    // Retrieval
    .route("/find", post(find::handler::<S, R>))
    .route("/candidates", get(candidates::handler::<S, R>))
    .with_state(coordinator)
    .layer(TraceLayer::new_for_http())
}
