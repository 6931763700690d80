//! Storage traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g.
//! `precedent-store-sqlite`). Higher layers (`precedent-query`,
//! `precedent-api`) depend on these abstractions, not on any concrete backend.

use std::{collections::HashMap, future::Future};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  AsDomainError,
  citation::{CitationEdge, NewEdge},
  document::{DocumentId, DocumentType},
  temporal::{
    IngestionUnit, NewRecord, ResolvedRecord, Supersession, TemporalRecord,
  },
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// One page of [`TemporalStore::search_candidates`].
///
/// Pages are keyset-paginated on `document_id`: pass the last id of the
/// previous page as `after` to continue. At most one record per document is
/// returned, the one in force at `valid_time` as known at `transaction_time`.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
  pub jurisdiction:       String,
  /// Further jurisdictions whose law applies, e.g. federal law in a state.
  pub also_jurisdictions: Vec<String>,
  pub document_type:      Option<DocumentType>,
  pub valid_time:         NaiveDate,
  pub transaction_time:   DateTime<Utc>,
  /// Case-insensitive substring filter over title, citation and text.
  pub text:               Option<String>,
  /// Exact canonical-citation filter.
  pub citation:           Option<String>,
  pub after:              Option<DocumentId>,
  pub limit:              usize,
}

impl CandidateQuery {
  pub fn new(
    jurisdiction: impl Into<String>,
    valid_time: NaiveDate,
    transaction_time: DateTime<Utc>,
  ) -> Self {
    Self {
      jurisdiction: jurisdiction.into(),
      also_jurisdictions: Vec::new(),
      document_type: None,
      valid_time,
      transaction_time,
      text: None,
      citation: None,
      after: None,
      limit: 200,
    }
  }

  /// Every jurisdiction this query accepts, primary first.
  pub fn jurisdictions(&self) -> Vec<String> {
    std::iter::once(self.jurisdiction.clone())
      .chain(self.also_jurisdictions.iter().cloned())
      .collect()
  }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Versioned storage of legal documents along valid and transaction time.
///
/// All writes are append-only. Corrections are expressed as supersession
/// events, which are themselves append-only.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait TemporalStore: Send + Sync {
  type Error: std::error::Error + AsDomainError + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new record. The record id and transaction time are assigned
  /// by the store.
  fn ingest(
    &self,
    input: NewRecord,
  ) -> impl Future<Output = Result<TemporalRecord, Self::Error>> + Send + '_;

  /// Atomically mark `old_id` superseded and insert its replacement.
  ///
  /// Fails if `old_id` is unknown or already superseded, if the replacement
  /// names another document, or if it overlaps any other live record.
  fn supersede(
    &self,
    old_id: Uuid,
    replacement: NewRecord,
  ) -> impl Future<Output = Result<(Supersession, TemporalRecord), Self::Error>>
  + Send
  + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The record of `document_id` in force at `valid_time`, as the store knew
  /// it at `transaction_time`.
  fn query_as_of<'a>(
    &'a self,
    document_id: &'a DocumentId,
    valid_time: NaiveDate,
    transaction_time: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<TemporalRecord>, Self::Error>> + Send + 'a;

  /// A record by id, regardless of supersession, with its current status.
  fn get_record(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<Option<ResolvedRecord>, Self::Error>> + Send + '_;

  /// Every record ever written for a document, in transaction order.
  fn history<'a>(
    &'a self,
    document_id: &'a DocumentId,
  ) -> impl Future<Output = Result<Vec<ResolvedRecord>, Self::Error>> + Send + 'a;

  fn document_exists<'a>(
    &'a self,
    document_id: &'a DocumentId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// One page of candidate records, ordered by `document_id`.
  fn search_candidates<'a>(
    &'a self,
    query: &'a CandidateQuery,
  ) -> impl Future<Output = Result<Vec<TemporalRecord>, Self::Error>> + Send + 'a;
}

/// Append-only storage of citation edges.
///
/// Every appended edge receives the next sequence number; the highest
/// sequence is the graph revision.
pub trait CitationStore: Send + Sync {
  type Error: std::error::Error + AsDomainError + Send + Sync + 'static;

  /// Append an edge. Appending an edge identical in
  /// `(source, target, relation, effective_date)` returns the existing one.
  fn add_edge(
    &self,
    edge: NewEdge,
  ) -> impl Future<Output = Result<CitationEdge, Self::Error>> + Send + '_;

  /// Append a batch atomically: either every edge is committed or none is.
  fn add_edges(
    &self,
    edges: Vec<NewEdge>,
  ) -> impl Future<Output = Result<Vec<CitationEdge>, Self::Error>> + Send + '_;

  /// Every edge touching `document_id`, in append order. With `upto`, only
  /// edges whose sequence is at most that revision.
  fn edges_for<'a>(
    &'a self,
    document_id: &'a DocumentId,
    upto: Option<u64>,
  ) -> impl Future<Output = Result<Vec<CitationEdge>, Self::Error>> + Send + 'a;

  /// Highest edge sequence in the store; `0` when there are no edges.
  fn graph_revision(
    &self,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Highest sequence among edges recorded at or before `transaction_time`;
  /// the graph revision as the store knew it then.
  fn revision_at(
    &self,
    transaction_time: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Highest sequence among edges touching any of `document_ids`. With
  /// `upto`, only edges whose sequence is at most that revision.
  fn revision<'a>(
    &'a self,
    document_ids: &'a [DocumentId],
    upto: Option<u64>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Inbound citation counts (every relation but `superseded_by`) effective
  /// by `as_of`, among edges up to revision `upto` when given. Documents
  /// without citations are absent from the map.
  fn citation_counts<'a>(
    &'a self,
    document_ids: &'a [DocumentId],
    as_of: NaiveDate,
    upto: Option<u64>,
  ) -> impl Future<Output = Result<HashMap<DocumentId, u64>, Self::Error>>
  + Send
  + 'a;
}

/// A backend that owns both records and edges and can write them together.
pub trait LegalStore:
  TemporalStore + CitationStore<Error = <Self as TemporalStore>::Error>
{
  /// Ingest a record and the edges it introduces in one transaction.
  fn ingest_unit(
    &self,
    unit: IngestionUnit,
  ) -> impl Future<
    Output = Result<
      (TemporalRecord, Vec<CitationEdge>),
      <Self as TemporalStore>::Error,
    >,
  > + Send
  + '_;
}
