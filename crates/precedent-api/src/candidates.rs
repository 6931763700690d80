//! Handler for `GET /candidates`: one keyset page of candidate records.
//!
//! `?jurisdiction&valid_time` are required. Optional: `also` (comma-separated
//! extra jurisdictions), `document_type`, `text`, `citation`,
//! `transaction_time` (defaults to now), `after` (the `next_after` of the
//! previous page) and `limit` (capped at the configured page size).

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use chrono::{DateTime, NaiveDate, Utc};
use precedent_core::{
  document::{DocumentId, DocumentType},
  store::{CandidateQuery, LegalStore, TemporalStore},
  temporal::TemporalRecord,
};
use precedent_query::relevance::RelevanceScorer;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CandidateParams {
  pub jurisdiction:     String,
  pub valid_time:       NaiveDate,
  pub also:             Option<String>,
  pub document_type:    Option<DocumentType>,
  pub text:             Option<String>,
  pub citation:         Option<String>,
  pub transaction_time: Option<DateTime<Utc>>,
  pub after:            Option<DocumentId>,
  pub limit:            Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CandidatePage {
  pub records:    Vec<TemporalRecord>,
  /// Pass as `after` to fetch the next page; absent on the last page.
  pub next_after: Option<DocumentId>,
}

/// `GET /candidates?jurisdiction=<j>&valid_time=<date>[&...]`
pub async fn handler<S, R>(
  State(app): State<AppState<S, R>>,
  params: Result<Query<CandidateParams>, QueryRejection>,
) -> Result<Json<CandidatePage>, ApiError>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  let Query(params) = params?;
  let jurisdiction = params.jurisdiction.trim();
  if jurisdiction.is_empty() {
    return Err(ApiError::BadRequest("jurisdiction is blank".into()));
  }

  let page_size = app.config().page_size.max(1);
  let transaction_time = params.transaction_time.unwrap_or_else(Utc::now);
  let mut query = CandidateQuery::new(jurisdiction, params.valid_time, transaction_time);
  query.also_jurisdictions = params
    .also
    .as_deref()
    .map(|also| {
      also
        .split(',')
        .map(str::trim)
        .filter(|j| !j.is_empty())
        .map(String::from)
        .collect()
    })
    .unwrap_or_default();
  query.document_type = params.document_type;
  query.text = params.text.filter(|t| !t.trim().is_empty());
  query.citation = params.citation.filter(|c| !c.trim().is_empty());
  query.after = params.after;
  query.limit = params.limit.unwrap_or(page_size).clamp(1, page_size);

  let records = app
    .store()
    .search_candidates(&query)
    .await
    .map_err(ApiError::store)?;
  let next_after = (records.len() == query.limit)
    .then(|| records.last().map(|r| r.document_id().clone()))
    .flatten();
  Ok(Json(CandidatePage { records, next_after }))
}
