//! Handlers for `/anchors` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/anchors` | Body: [`AnchorBody`]; returns 201 + [`ProvenanceAnchor`] |
//! | `POST` | `/anchors/verify` | Body: [`ProvenanceAnchor`]; returns `{"verified": bool}` |

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use precedent_core::{
  anchor::{Locator, ProvenanceAnchor},
  document::DocumentId,
  store::LegalStore,
};
use precedent_query::relevance::RelevanceScorer;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct AnchorBody {
  pub document_id:      DocumentId,
  pub locator:          Locator,
  /// Defaults to now.
  pub transaction_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct Verification {
  pub verified: bool,
}

/// `POST /anchors`
pub async fn create<S, R>(
  State(app): State<AppState<S, R>>,
  body: Result<Json<AnchorBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Json(body) = body?;
  let transaction_time = body.transaction_time.unwrap_or_else(Utc::now);
  let anchor = app
    .anchors()
    .anchor(&body.document_id, body.locator, transaction_time)
    .await?;
  Ok((StatusCode::CREATED, Json(anchor)))
}

/// `POST /anchors/verify`
pub async fn verify<S, R>(
  State(app): State<AppState<S, R>>,
  body: Result<Json<ProvenanceAnchor>, JsonRejection>,
) -> Result<Json<Verification>, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Json(anchor) = body?;
  let verified = app.anchors().verify(&anchor).await;
  Ok(Json(Verification { verified }))
}
