//! Lazy, finite, restartable candidate sequence.

use precedent_core::{
  store::{CandidateQuery, TemporalStore},
  temporal::TemporalRecord,
};
use tracing::debug;

use crate::{QueryError, Result};

/// Pages through [`TemporalStore::search_candidates`] by keyset on
/// `document_id`, stopping after `max` records or at the last page.
pub struct Candidates<'s, S> {
  store:     &'s S,
  query:     CandidateQuery,
  page_size: usize,
  max:       usize,
  fetched:   usize,
  exhausted: bool,
}

impl<'s, S: TemporalStore> Candidates<'s, S> {
  /// `query.limit` is taken as the page size.
  pub fn new(store: &'s S, query: CandidateQuery, max: usize) -> Self {
    let page_size = query.limit.max(1);
    Self {
      store,
      query,
      page_size,
      max,
      fetched: 0,
      exhausted: false,
    }
  }

  /// The next page, or `None` once the sequence is finished.
  pub async fn next_page(&mut self) -> Result<Option<Vec<TemporalRecord>>> {
    if self.exhausted || self.fetched >= self.max {
      return Ok(None);
    }

    self.query.limit = self.page_size.min(self.max - self.fetched);
    let page = self
      .store
      .search_candidates(&self.query)
      .await
      .map_err(QueryError::store)?;

    if page.len() < self.query.limit {
      self.exhausted = true;
    }
    let Some(last) = page.last() else {
      self.exhausted = true;
      return Ok(None);
    };
    self.query.after = Some(last.document_id().clone());
    self.fetched += page.len();
    debug!(page = page.len(), fetched = self.fetched, "candidate page");
    Ok(Some(page))
  }

  /// True once the store has no further records; false while more may
  /// remain, including when the sequence stopped at `max`.
  pub fn is_exhausted(&self) -> bool { self.exhausted }

  /// Start again from the first page.
  pub fn restart(&mut self) {
    self.query.after = None;
    self.fetched = 0;
    self.exhausted = false;
  }

  pub async fn collect_all(&mut self) -> Result<Vec<TemporalRecord>> {
    let mut all = Vec::new();
    while let Some(page) = self.next_page().await? {
      all.extend(page);
    }
    Ok(all)
  }
}
