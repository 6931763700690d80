//! Handlers for `/edges` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/edges` | Body: [`NewEdge`]; returns 201 + the edge (the existing one if identical) |
//! | `POST` | `/edges/batch` | Body: `[NewEdge]`; all or nothing; returns 201 + the edges |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use precedent_core::{citation::NewEdge, store::LegalStore};
use precedent_query::relevance::RelevanceScorer;

use crate::{AppState, error::ApiError};

/// `POST /edges`
pub async fn create<S, R>(
  State(app): State<AppState<S, R>>,
  body: Result<Json<NewEdge>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Json(edge) = body?;
  let edge = app.graph().add_edge(edge).await?;
  Ok((StatusCode::CREATED, Json(edge)))
}

/// `POST /edges/batch`
pub async fn create_batch<S, R>(
  State(app): State<AppState<S, R>>,
  body: Result<Json<Vec<NewEdge>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Json(edges) = body?;
  if edges.is_empty() {
    return Err(ApiError::BadRequest("edge batch is empty".into()));
  }
  let edges = app.graph().add_edges(edges).await?;
  Ok((StatusCode::CREATED, Json(edges)))
}
