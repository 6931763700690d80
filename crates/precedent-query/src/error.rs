//! Error type for `precedent-query`.

use precedent_core::AsDomainError;
use thiserror::Error;

use crate::coordinator::QueryState;

/// A storage backend error, erased so query services need no extra type
/// parameter for it.
pub trait StoreError:
  std::error::Error + AsDomainError + Send + Sync + 'static
{
}

impl<E> StoreError for E where
  E: std::error::Error + AsDomainError + Send + Sync + 'static
{
}

#[derive(Debug, Error)]
pub enum QueryError {
  #[error(transparent)]
  Domain(#[from] precedent_core::Error),

  #[error("store error: {0}")]
  Store(Box<dyn StoreError>),

  #[error("invalid query: {0}")]
  InvalidQuery(String),

  #[error("query cannot move from {from:?} to {to:?}")]
  InvalidTransition { from: QueryState, to: QueryState },

  #[error("query task failed: {0}")]
  Task(#[from] tokio::task::JoinError),
}

impl QueryError {
  pub fn store<E: StoreError>(e: E) -> Self { Self::Store(Box::new(e)) }

  /// The domain error behind this failure, wherever it was raised.
  pub fn as_domain(&self) -> Option<&precedent_core::Error> {
    match self {
      Self::Domain(e) => Some(e),
      Self::Store(e) => e.as_domain(),
      _ => None,
    }
  }
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
