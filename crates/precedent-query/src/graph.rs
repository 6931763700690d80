//! Citation graph service: edge writes, validity resolution, and the
//! validity cache.
//!
//! A cached status is keyed by `(document_id, as_of)` and remembers the set of
//! documents the walk visited plus the highest edge sequence seen among them.
//! It is reused only while the store reports the same revision for that set
//! under the requested snapshot, so any edge touching a visited document
//! invalidates it and a past snapshot never sees a later edge.

use std::{
  collections::HashMap,
  sync::{Arc, RwLock},
};

use chrono::{DateTime, NaiveDate, Utc};
use precedent_core::{
  citation::{CitationEdge, NewEdge},
  document::DocumentId,
  store::CitationStore,
  validity::{Resolution, ValidityStatus, ValidityWalk},
};
use tracing::debug;

use crate::{QueryError, Result};

#[derive(Debug, Clone)]
struct CacheEntry {
  status:   ValidityStatus,
  visited:  Vec<DocumentId>,
  revision: u64,
}

type CacheKey = (DocumentId, NaiveDate);

pub struct CitationGraph<S> {
  store:    Arc<S>,
  cache:    RwLock<HashMap<CacheKey, CacheEntry>>,
  capacity: usize,
}

impl<S: CitationStore> CitationGraph<S> {
  pub fn new(store: Arc<S>, capacity: usize) -> Self {
    Self {
      store,
      cache: RwLock::new(HashMap::new()),
      capacity,
    }
  }

  // ── Writes ────────────────────────────────────────────────────────────

  pub async fn add_edge(&self, edge: NewEdge) -> Result<CitationEdge> {
    self.store.add_edge(edge).await.map_err(QueryError::store)
  }

  pub async fn add_edges(&self, edges: Vec<NewEdge>) -> Result<Vec<CitationEdge>> {
    self.store.add_edges(edges).await.map_err(QueryError::store)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub async fn edges_for(&self, document_id: &DocumentId) -> Result<Vec<CitationEdge>> {
    self
      .store
      .edges_for(document_id, None)
      .await
      .map_err(QueryError::store)
  }

  /// Inbound citation counts among edges up to revision `upto`.
  pub async fn citation_counts(
    &self,
    document_ids: &[DocumentId],
    as_of: NaiveDate,
    upto: Option<u64>,
  ) -> Result<HashMap<DocumentId, u64>> {
    self
      .store
      .citation_counts(document_ids, as_of, upto)
      .await
      .map_err(QueryError::store)
  }

  /// The edge revision to read at: the latest one, or the one the store knew
  /// at `transaction_time`.
  pub async fn snapshot(
    &self,
    transaction_time: Option<DateTime<Utc>>,
  ) -> Result<u64> {
    let revision = match transaction_time {
      Some(tx) => self.store.revision_at(tx).await,
      None => self.store.graph_revision().await,
    };
    revision.map_err(QueryError::store)
  }

  pub async fn resolve_validity(
    &self,
    document_id: &DocumentId,
    as_of: NaiveDate,
  ) -> Result<ValidityStatus> {
    Ok(self.resolve(document_id, as_of).await?.status)
  }

  /// Resolve against the latest graph revision.
  pub async fn resolve(
    &self,
    document_id: &DocumentId,
    as_of: NaiveDate,
  ) -> Result<Resolution> {
    let snapshot = self.snapshot(None).await?;
    self.resolve_upto(document_id, as_of, snapshot).await
  }

  /// Resolve with the visited set, reading only edges whose sequence is at
  /// most `snapshot`. A concurrently committing batch is seen either whole or
  /// not at all, and a past snapshot gives the same answer however many edges
  /// are appended later.
  pub async fn resolve_upto(
    &self,
    document_id: &DocumentId,
    as_of: NaiveDate,
    snapshot: u64,
  ) -> Result<Resolution> {
    let key = (document_id.clone(), as_of);

    // The walk only reads edges of visited documents, so an entry holds for
    // any snapshot under which those documents show the same edges.
    if let Some(entry) = self.lookup(&key) {
      let current = self
        .store
        .revision(&entry.visited, Some(snapshot))
        .await
        .map_err(QueryError::store)?;
      if current == entry.revision {
        debug!(%document_id, %as_of, snapshot, "validity cache hit");
        return Ok(Resolution {
          status:  entry.status,
          visited: entry.visited,
        });
      }
    }

    let mut walk = ValidityWalk::new(document_id.clone(), as_of);
    let mut revision = 0;
    let resolution = loop {
      let edges = self
        .store
        .edges_for(walk.current(), Some(snapshot))
        .await
        .map_err(QueryError::store)?;
      revision = edges.iter().map(|e| e.sequence).fold(revision, u64::max);
      if let Some(resolution) = walk.step(&edges) {
        break resolution;
      }
    };

    debug!(
      %document_id,
      %as_of,
      snapshot,
      status = %resolution.status,
      visited = resolution.visited.len(),
      "validity resolved"
    );
    self.remember(key, &resolution, revision);
    Ok(resolution)
  }

  fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
    self.cache.read().ok()?.get(key).cloned()
  }

  fn remember(&self, key: CacheKey, resolution: &Resolution, revision: u64) {
    let Ok(mut cache) = self.cache.write() else {
      return;
    };
    if cache.len() >= self.capacity {
      cache.clear();
    }
    cache.insert(key, CacheEntry {
      status: resolution.status,
      visited: resolution.visited.clone(),
      revision,
    });
  }

  #[cfg(test)]
  pub(crate) fn cached(&self, document_id: &DocumentId, as_of: NaiveDate) -> bool {
    self.lookup(&(document_id.clone(), as_of)).is_some()
  }
}
