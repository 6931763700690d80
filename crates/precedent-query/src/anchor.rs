//! Anchor production and verification against the historical record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use precedent_core::{
  anchor::{Locator, ProvenanceAnchor, excerpt, excerpt_hash},
  document::DocumentId,
  store::TemporalStore,
  temporal::TemporalRecord,
};
use tracing::warn;

use crate::{
  QueryError, Result,
  relevance::{overlap, terms},
};

pub struct AnchorService<S> {
  store: Arc<S>,
}

impl<S: TemporalStore> AnchorService<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// Pin `locator` inside the record it names and hash the excerpt.
  ///
  /// Fails with `LocatorOutOfRange` when the record is unknown, belongs to a
  /// different document, was not yet recorded at `transaction_time`, or the
  /// locator does not resolve inside its content.
  pub async fn anchor(
    &self,
    document_id: &DocumentId,
    locator: Locator,
    transaction_time: DateTime<Utc>,
  ) -> Result<ProvenanceAnchor> {
    let record_id = locator.record_id;
    let out_of_range = move |reason: String| {
      QueryError::Domain(precedent_core::Error::LocatorOutOfRange {
        record_id,
        reason,
      })
    };

    let Some(resolved) = self
      .store
      .get_record(record_id)
      .await
      .map_err(QueryError::store)?
    else {
      return Err(out_of_range("no such record".into()));
    };
    let record = resolved.record;

    if record.document_id() != document_id {
      return Err(out_of_range(format!(
        "record belongs to document {}",
        record.document_id()
      )));
    }
    if record.transaction_time > transaction_time {
      return Err(out_of_range(format!(
        "record was not recorded until {}",
        record.transaction_time
      )));
    }
    let Some(text) = excerpt(&record.document.content, &locator) else {
      return Err(out_of_range(format!(
        "paragraph {} or its character range is out of bounds",
        locator.paragraph
      )));
    };

    Ok(ProvenanceAnchor {
      document_id: document_id.clone(),
      excerpt_hash: excerpt_hash(text),
      locator,
      transaction_time,
    })
  }

  /// Recompute the excerpt hash from the exact record the anchor names.
  /// Any lookup failure or mismatch is `false`, never an error.
  pub async fn verify(&self, anchor: &ProvenanceAnchor) -> bool {
    let record = match self.store.get_record(anchor.locator.record_id).await {
      Ok(Some(resolved)) => resolved.record,
      Ok(None) => {
        warn!(record_id = %anchor.locator.record_id, "anchor names an unknown record");
        return false;
      }
      Err(e) => {
        warn!(record_id = %anchor.locator.record_id, error = %e, "anchor lookup failed");
        return false;
      }
    };

    let verified = record.document_id() == &anchor.document_id
      && record.transaction_time <= anchor.transaction_time
      && excerpt(&record.document.content, &anchor.locator)
        .is_some_and(|text| excerpt_hash(text) == anchor.excerpt_hash);
    if !verified {
      warn!(record_id = %anchor.locator.record_id, "anchor verification failed");
    }
    verified
  }
}

/// The whole paragraph that shares the most terms with `query`; the earliest
/// wins ties, and the first paragraph is used when nothing matches.
pub fn best_locator(record: &TemporalRecord, query: &str) -> Locator {
  let query = terms(query);
  let mut best = (0, 0.0_f32);
  for (index, paragraph) in record.document.content.paragraphs.iter().enumerate() {
    let score = overlap(&query, &terms(&paragraph.text));
    if score > best.1 {
      best = (index, score);
    }
  }
  Locator::paragraph(record.record_id, best.0)
}
