//! Handler for `POST /find`.
//!
//! Body: [`FindBody`], the query text, jurisdiction and as-of date plus any
//! [`FindOptions`] fields inline:
//!
//! ```json
//! {
//!   "query": "breach of contract damages",
//!   "jurisdiction": "NY",
//!   "as_of": "2015-01-01",
//!   "min_validity": "questioned",
//!   "limit": 10
//! }
//! ```

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use chrono::NaiveDate;
use precedent_core::store::LegalStore;
use precedent_query::{FindOptions, FindResponse, relevance::RelevanceScorer};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct FindBody {
  pub query:        String,
  pub jurisdiction: String,
  pub as_of:        NaiveDate,
  #[serde(flatten)]
  pub options:      FindOptions,
}

/// `POST /find`
pub async fn handler<S, R>(
  State(app): State<AppState<S, R>>,
  body: Result<Json<FindBody>, JsonRejection>,
) -> Result<Json<FindResponse>, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Json(body) = body?;
  let response = app
    .find(&body.query, &body.jurisdiction, body.as_of, body.options)
    .await?;
  Ok(Json(response))
}
