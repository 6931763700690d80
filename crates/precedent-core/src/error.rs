//! Error types for `precedent-core`.
//!
//! These are the caller-input failures shared by every backend. Storage
//! crates wrap them alongside their own I/O errors and expose them again
//! through [`AsDomainError`] so higher layers can classify a failure without
//! knowing the backend.

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::document::DocumentId;

#[derive(Debug, Error)]
pub enum Error {
  #[error(
    "valid-time interval overlaps record {existing} of document {document_id}"
  )]
  OverlapConflict {
    document_id: DocumentId,
    existing:    Uuid,
  },

  #[error("invalid interval: valid_from {valid_from} is after valid_to {valid_to}")]
  InvalidInterval {
    valid_from: NaiveDate,
    valid_to:   NaiveDate,
  },

  #[error("unknown document: {0}")]
  UnknownDocument(DocumentId),

  #[error("record not found: {0}")]
  UnknownRecord(Uuid),

  #[error("locator does not resolve inside record {record_id}: {reason}")]
  LocatorOutOfRange { record_id: Uuid, reason: String },

  #[error("record {0} is already superseded")]
  AlreadySuperseded(Uuid),

  #[error("replacement names document {found}, expected {expected}")]
  DocumentMismatch {
    expected: DocumentId,
    found:    DocumentId,
  },

  #[error(
    "content hash mismatch for {document_id}: declared {declared}, computed \
     {computed}"
  )]
  ContentHashMismatch {
    document_id: DocumentId,
    declared:    String,
    computed:    String,
  },

  #[error("invalid document: {0}")]
  InvalidDocument(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// True for failures caused by the caller's input rather than the system.
  /// These are reported synchronously and never retried.
  pub fn is_input_error(&self) -> bool { !matches!(self, Self::Serialization(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Exposes the domain error wrapped inside a backend-specific error, if any.
pub trait AsDomainError {
  fn as_domain(&self) -> Option<&Error>;
}

impl AsDomainError for Error {
  fn as_domain(&self) -> Option<&Error> { Some(self) }
}
