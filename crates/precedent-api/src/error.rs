//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use precedent_core::Error as DomainError;
use precedent_query::QueryError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Query(#[from] QueryError),
}

impl ApiError {
  /// Wrap a storage backend error.
  pub fn store<E: precedent_query::error::StoreError>(e: E) -> Self {
    Self::Query(QueryError::store(e))
  }

  pub fn status(&self) -> StatusCode {
    match self {
      Self::NotFound(_) => StatusCode::NOT_FOUND,
      Self::BadRequest(_) => StatusCode::BAD_REQUEST,
      Self::Query(QueryError::InvalidQuery(_)) => StatusCode::BAD_REQUEST,
      Self::Query(e) => match e.as_domain() {
        Some(DomainError::OverlapConflict { .. })
        | Some(DomainError::AlreadySuperseded(_)) => StatusCode::CONFLICT,
        Some(DomainError::InvalidInterval { .. })
        | Some(DomainError::InvalidDocument(_))
        | Some(DomainError::ContentHashMismatch { .. })
        | Some(DomainError::DocumentMismatch { .. })
        | Some(DomainError::LocatorOutOfRange { .. }) => {
          StatusCode::UNPROCESSABLE_ENTITY
        }
        Some(DomainError::UnknownDocument(_))
        | Some(DomainError::UnknownRecord(_)) => StatusCode::NOT_FOUND,
        Some(DomainError::Serialization(_)) | None => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
      },
    }
  }
}

impl From<DomainError> for ApiError {
  fn from(e: DomainError) -> Self { Self::Query(QueryError::Domain(e)) }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self {
    Self::BadRequest(rejection.body_text())
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use uuid::Uuid;

  use super::*;

  #[test]
  fn domain_errors_map_to_client_statuses() {
    let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let cases = [
      (
        DomainError::OverlapConflict {
          document_id: "a".into(),
          existing:    Uuid::new_v4(),
        },
        StatusCode::CONFLICT,
      ),
      (DomainError::AlreadySuperseded(Uuid::new_v4()), StatusCode::CONFLICT),
      (
        DomainError::InvalidInterval {
          valid_from: date,
          valid_to:   date,
        },
        StatusCode::UNPROCESSABLE_ENTITY,
      ),
      (
        DomainError::InvalidDocument("blank".into()),
        StatusCode::UNPROCESSABLE_ENTITY,
      ),
      (DomainError::UnknownDocument("a".into()), StatusCode::NOT_FOUND),
      (DomainError::UnknownRecord(Uuid::new_v4()), StatusCode::NOT_FOUND),
    ];
    for (error, expected) in cases {
      assert_eq!(ApiError::from(error).status(), expected);
    }
  }

  #[test]
  fn invalid_query_is_a_bad_request() {
    let e = ApiError::from(QueryError::InvalidQuery("blank".into()));
    assert_eq!(e.status(), StatusCode::BAD_REQUEST);
  }
}
