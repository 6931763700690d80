//! Handlers for `/records` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/records` | Body: [`NewRecord`]; returns 201 + stored record |
//! | `POST` | `/records/ingest-unit` | Body: [`IngestionUnit`]; returns 201 + record and edges |
//! | `GET`  | `/records/:id` | Record with its supersession status |
//! | `POST` | `/records/:id/supersede` | Body: [`NewRecord`]; returns 201 + supersession and replacement |

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use precedent_core::{
  citation::CitationEdge,
  store::{LegalStore, TemporalStore},
  temporal::{IngestionUnit, NewRecord, ResolvedRecord, Supersession, TemporalRecord},
};
use precedent_query::relevance::RelevanceScorer;
use serde::Serialize;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize)]
pub struct IngestedUnit {
  pub record: TemporalRecord,
  pub edges:  Vec<CitationEdge>,
}

#[derive(Debug, Serialize)]
pub struct Superseded {
  pub supersession: Supersession,
  pub record:       TemporalRecord,
}

/// `POST /records`
pub async fn ingest<S, R>(
  State(app): State<AppState<S, R>>,
  body: Result<Json<NewRecord>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Json(input) = body?;
  let record = app.store().ingest(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(record)))
}

/// `POST /records/ingest-unit`
pub async fn ingest_unit<S, R>(
  State(app): State<AppState<S, R>>,
  body: Result<Json<IngestionUnit>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Json(unit) = body?;
  let (record, edges) = app
    .store()
    .ingest_unit(unit)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(IngestedUnit { record, edges })))
}

/// `GET /records/:id`
pub async fn get_one<S, R>(
  State(app): State<AppState<S, R>>,
  id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ResolvedRecord>, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Path(id) = id?;
  let record = app
    .store()
    .get_record(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("record {id}")))?;
  Ok(Json(record))
}

/// `POST /records/:id/supersede`
pub async fn supersede<S, R>(
  State(app): State<AppState<S, R>>,
  id: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<NewRecord>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Path(id) = id?;
  let Json(replacement) = body?;
  let (supersession, record) = app
    .store()
    .supersede(id, replacement)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(Superseded { supersession, record })))
}
