//! Bi-temporal records.
//!
//! Every record carries two independent time axes:
//!
//! - **Valid time** (`valid_from` / `valid_to`): the calendar interval during
//!   which the law was in force in the real world. Both ends are inclusive; an
//!   absent `valid_to` means "still in force as of the last check".
//! - **Transaction time** (`transaction_time`): when the store learned the
//!   fact. Assigned by the store, strictly increasing, never rewritten.
//!
//! Records are never updated. A correction is a new record plus an
//! append-only [`Supersession`] event pointing from the old record to the new.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  citation::NewEdge,
  document::{DocumentId, LegalDocument},
};

// ─── Valid-time interval ─────────────────────────────────────────────────────

/// A closed valid-time interval; `to == None` is open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidInterval {
  pub from: NaiveDate,
  pub to:   Option<NaiveDate>,
}

impl ValidInterval {
  /// Fails with [`Error::InvalidInterval`] if `from > to`.
  pub fn new(from: NaiveDate, to: Option<NaiveDate>) -> Result<Self> {
    if let Some(to) = to
      && from > to
    {
      return Err(Error::InvalidInterval {
        valid_from: from,
        valid_to:   to,
      });
    }
    Ok(Self { from, to })
  }

  pub fn contains(&self, instant: NaiveDate) -> bool {
    self.from <= instant && self.to.is_none_or(|to| instant <= to)
  }

  pub fn overlaps(&self, other: &Self) -> bool {
    let self_starts_in_time = other.to.is_none_or(|to| self.from <= to);
    let other_starts_in_time = self.to.is_none_or(|to| other.from <= to);
    self_starts_in_time && other_starts_in_time
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// One versioned fact about a document. Once written, no field ever changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalRecord {
  pub record_id:        Uuid,
  pub document:         LegalDocument,
  pub valid_from:       NaiveDate,
  pub valid_to:         Option<NaiveDate>,
  /// Server-assigned; strictly increasing in insertion order.
  pub transaction_time: DateTime<Utc>,
  /// The record this one replaced, if it was written by a supersession.
  pub supersedes:       Option<Uuid>,
}

impl TemporalRecord {
  pub fn document_id(&self) -> &DocumentId { &self.document.document_id }

  pub fn interval(&self) -> ValidInterval {
    ValidInterval {
      from: self.valid_from,
      to:   self.valid_to,
    }
  }

  pub fn is_valid_at(&self, valid_time: NaiveDate) -> bool {
    self.interval().contains(valid_time)
  }
}

/// Input to [`crate::store::TemporalStore::ingest`] and
/// [`crate::store::TemporalStore::supersede`]. The record id and transaction
/// time are always assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
  pub document:   LegalDocument,
  pub valid_from: NaiveDate,
  #[serde(default)]
  pub valid_to:   Option<NaiveDate>,
}

impl NewRecord {
  pub fn new(document: LegalDocument, valid_from: NaiveDate) -> Self {
    Self {
      document,
      valid_from,
      valid_to: None,
    }
  }

  pub fn until(mut self, valid_to: NaiveDate) -> Self {
    self.valid_to = Some(valid_to);
    self
  }

  /// Validate interval and document before anything touches the store.
  pub fn validate(&self) -> Result<ValidInterval> {
    let interval = ValidInterval::new(self.valid_from, self.valid_to)?;
    self.document.validate()?;
    Ok(interval)
  }
}

/// A document plus the citation edges it introduces, written as one atomic
/// ingestion unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionUnit {
  pub record:       NewRecord,
  #[serde(default)]
  pub source_edges: Vec<NewEdge>,
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// Records that an old record was replaced by a newer one.
/// A record can be superseded at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supersession {
  pub supersession_id:  Uuid,
  pub old_record_id:    Uuid,
  pub new_record_id:    Uuid,
  pub transaction_time: DateTime<Utc>,
}

/// Lifecycle status of a record, computed at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecordStatus {
  Current,
  Superseded { by: Uuid, at: DateTime<Utc> },
}

impl RecordStatus {
  pub fn is_current(&self) -> bool { matches!(self, Self::Current) }
}

/// A record bundled with its lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRecord {
  pub record: TemporalRecord,
  pub status: RecordStatus,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(s: &str) -> NaiveDate { s.parse().unwrap() }

  #[test]
  fn inverted_interval_is_rejected() {
    let err = ValidInterval::new(d("2020-01-02"), Some(d("2020-01-01")));
    assert!(matches!(err, Err(Error::InvalidInterval { .. })));
    assert!(ValidInterval::new(d("2020-01-01"), Some(d("2020-01-01"))).is_ok());
  }

  #[test]
  fn containment_is_inclusive() {
    let i = ValidInterval::new(d("2010-01-01"), Some(d("2014-12-31"))).unwrap();
    assert!(i.contains(d("2010-01-01")));
    assert!(i.contains(d("2014-12-31")));
    assert!(!i.contains(d("2015-01-01")));
    assert!(!i.contains(d("2009-12-31")));

    let open = ValidInterval::new(d("2010-01-01"), None).unwrap();
    assert!(open.contains(d("2999-01-01")));
  }

  #[test]
  fn overlap_cases() {
    let a = ValidInterval::new(d("2010-01-01"), Some(d("2014-12-31"))).unwrap();
    let touching = ValidInterval::new(d("2014-12-31"), None).unwrap();
    let after = ValidInterval::new(d("2015-01-01"), None).unwrap();
    let open = ValidInterval::new(d("2000-01-01"), None).unwrap();

    assert!(a.overlaps(&touching));
    assert!(!a.overlaps(&after));
    assert!(!after.overlaps(&a));
    assert!(open.overlaps(&after));
    assert!(open.overlaps(&a));
  }
}
