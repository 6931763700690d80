//! Handlers for `/documents/:id/...` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/documents/:id/as-of` | `?valid_time` required; optional `transaction_time` (defaults to now) |
//! | `GET`  | `/documents/:id/history` | Every record with its status, in transaction order |
//! | `GET`  | `/documents/:id/validity` | `?as_of` required; status plus the documents the walk visited |
//! | `GET`  | `/documents/:id/edges` | Every edge touching the document, in append order |
//!
//! An unknown document id is a 404 on every route.

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{PathRejection, QueryRejection},
  },
};
use chrono::{DateTime, NaiveDate, Utc};
use precedent_core::{
  citation::CitationEdge,
  document::DocumentId,
  store::{LegalStore, TemporalStore},
  temporal::{ResolvedRecord, TemporalRecord},
  validity::ValidityStatus,
};
use precedent_query::relevance::RelevanceScorer;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

async fn require_document<S, R>(
  app: &AppState<S, R>,
  id: Result<Path<DocumentId>, PathRejection>,
) -> Result<DocumentId, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Path(id) = id?;
  let exists = app
    .store()
    .document_exists(&id)
    .await
    .map_err(ApiError::store)?;
  if !exists {
    return Err(precedent_core::Error::UnknownDocument(id).into());
  }
  Ok(id)
}

// ─── As-of ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AsOfParams {
  pub valid_time:       NaiveDate,
  pub transaction_time: Option<DateTime<Utc>>,
}

/// `GET /documents/:id/as-of?valid_time=<date>[&transaction_time=<rfc3339>]`
pub async fn as_of<S, R>(
  State(app): State<AppState<S, R>>,
  id: Result<Path<DocumentId>, PathRejection>,
  params: Result<Query<AsOfParams>, QueryRejection>,
) -> Result<Json<TemporalRecord>, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Query(params) = params?;
  let id = require_document(&app, id).await?;
  let transaction_time = params.transaction_time.unwrap_or_else(Utc::now);
  let record = app
    .store()
    .query_as_of(&id, params.valid_time, transaction_time)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!(
        "no record of {id} in force on {}",
        params.valid_time
      ))
    })?;
  Ok(Json(record))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /documents/:id/history`
pub async fn history<S, R>(
  State(app): State<AppState<S, R>>,
  id: Result<Path<DocumentId>, PathRejection>,
) -> Result<Json<Vec<ResolvedRecord>>, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let id = require_document(&app, id).await?;
  let records = app.store().history(&id).await.map_err(ApiError::store)?;
  Ok(Json(records))
}

// ─── Validity ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ValidityParams {
  pub as_of: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct ValidityReport {
  pub document_id: DocumentId,
  pub as_of:       NaiveDate,
  pub status:      ValidityStatus,
  pub visited:     Vec<DocumentId>,
}

/// `GET /documents/:id/validity?as_of=<date>`
pub async fn validity<S, R>(
  State(app): State<AppState<S, R>>,
  id: Result<Path<DocumentId>, PathRejection>,
  params: Result<Query<ValidityParams>, QueryRejection>,
) -> Result<Json<ValidityReport>, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Query(params) = params?;
  let id = require_document(&app, id).await?;
  let resolution = app.graph().resolve(&id, params.as_of).await?;
  Ok(Json(ValidityReport {
    document_id: id,
    as_of:       params.as_of,
    status:      resolution.status,
    visited:     resolution.visited,
  }))
}

// ─── Edges ────────────────────────────────────────────────────────────────────

/// `GET /documents/:id/edges`
pub async fn edges<S, R>(
  State(app): State<AppState<S, R>>,
  id: Result<Path<DocumentId>, PathRejection>,
) -> Result<Json<Vec<CitationEdge>>, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let id = require_document(&app, id).await?;
  let edges = app.graph().edges_for(&id).await?;
  Ok(Json(edges))
}
