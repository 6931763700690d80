//! Citation edges: directed, immutable relations between documents.
//!
//! An edge reads "source <relation> target": `B overrules A` has source `B`
//! and target `A`; `A superseded_by C` has source `A` and target `C`. Edges
//! are never rewritten; corrections append new edges with a later date.

use std::{cmp::Ordering, sync::LazyLock};

use chrono::{DateTime, NaiveDate, Utc};
use regex::RegexSet;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::document::DocumentId;

// ─── Relation kinds ──────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RelationKind {
  Cites,
  Affirms,
  Distinguishes,
  Questions,
  Overrules,
  SupersededBy,
}

impl RelationKind {
  /// Treatments that can neutralise an earlier `overrules` or `questions`
  /// edge against the same target.
  pub fn is_rehabilitating(self) -> bool {
    matches!(self, Self::Affirms | Self::Distinguishes)
  }

  /// Whether an inbound edge of this kind counts as a citation of the target.
  pub fn counts_as_citation(self) -> bool { !matches!(self, Self::SupersededBy) }
}

/// How much of the target an edge reaches. Only meaningful for `overrules`.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EdgeScope {
  #[default]
  Full,
  Partial,
}

// ─── Edges ───────────────────────────────────────────────────────────────────

/// Input to [`crate::store::CitationStore::add_edge`]. Identity for
/// idempotency is `(source, target, relation, effective_date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEdge {
  pub source:         DocumentId,
  pub target:         DocumentId,
  pub relation:       RelationKind,
  pub effective_date: NaiveDate,
  #[serde(default)]
  pub scope:          EdgeScope,
  /// Precedential weight of the source (court level); higher is stronger.
  #[serde(default)]
  pub authority:      u8,
}

impl NewEdge {
  pub fn new(
    source: impl Into<DocumentId>,
    relation: RelationKind,
    target: impl Into<DocumentId>,
    effective_date: NaiveDate,
  ) -> Self {
    Self {
      source: source.into(),
      target: target.into(),
      relation,
      effective_date,
      scope: EdgeScope::Full,
      authority: 0,
    }
  }

  pub fn partial(mut self) -> Self {
    self.scope = EdgeScope::Partial;
    self
  }

  pub fn with_authority(mut self, authority: u8) -> Self {
    self.authority = authority;
    self
  }
}

/// A persisted citation edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEdge {
  /// Store-assigned append order; also the graph revision number.
  pub sequence:       u64,
  pub source:         DocumentId,
  pub target:         DocumentId,
  pub relation:       RelationKind,
  pub effective_date: NaiveDate,
  pub scope:          EdgeScope,
  pub authority:      u8,
  pub recorded_at:    DateTime<Utc>,
}

impl CitationEdge {
  pub fn touches(&self, document_id: &DocumentId) -> bool {
    &self.source == document_id || &self.target == document_id
  }

  /// Chronological order: effective date first, append order on ties.
  pub fn chronological_cmp(&self, other: &Self) -> Ordering {
    self
      .effective_date
      .cmp(&other.effective_date)
      .then(self.sequence.cmp(&other.sequence))
  }

  pub fn is_later_than(&self, other: &Self) -> bool {
    self.chronological_cmp(other) == Ordering::Greater
  }
}

// ─── Citation-shaped queries ─────────────────────────────────────────────────

static REPORTER_CITATION: LazyLock<RegexSet> = LazyLock::new(|| {
  RegexSet::new([
    // Federal and regional reporters: 123 F.3d 456, 10 N.Y.3d 100. The
    // reporter carries a period or a series number, so "3 Damages 100" is prose.
    r"^\d+\s+[A-Z][A-Za-z]*\.[A-Za-z.]*\s*\d*d?\s+\d+$",
    r"^\d+\s+[A-Z][A-Za-z]*\s?\d+d\s+\d+$",
    // Supreme Court: 410 U.S. 113
    r"^\d+\s+U\.\s?S\.?\s+\d+$",
    r"^\d+\s+S\.\s?Ct\.?\s+\d+$",
    // State appellate: 45 Cal. App. 123
    r"^\d+\s+[A-Z][a-z]*\.?\s*App\.?\s+\d+$",
  ])
  .expect("static regex set")
});

/// True if `text` is shaped like a reporter citation rather than prose.
pub fn looks_like_citation(text: &str) -> bool {
  REPORTER_CITATION.is_match(text.trim())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn citation_detection() {
    assert!(looks_like_citation("410 U.S. 113"));
    assert!(looks_like_citation("123 F.3d 456"));
    assert!(looks_like_citation(" 10 N.Y.3d 100 "));
    assert!(looks_like_citation("120 S. Ct. 2000"));
    assert!(!looks_like_citation("breach of contract damages"));
    assert!(!looks_like_citation("damages 2015"));
  }

  #[test]
  fn capitalised_word_between_numbers_is_not_a_reporter() {
    assert!(!looks_like_citation("3 Damages 100"));
    assert!(!looks_like_citation("12 Angry 300"));
    assert!(looks_like_citation("123 F2d 456"));
    assert!(looks_like_citation("55 A.2d 12"));
  }

  #[test]
  fn relation_kind_strings_round_trip() {
    assert_eq!(RelationKind::SupersededBy.as_ref(), "superseded_by");
    assert_eq!(
      "overrules".parse::<RelationKind>().unwrap(),
      RelationKind::Overrules
    );
    let json = serde_json::to_string(&RelationKind::SupersededBy).unwrap();
    assert_eq!(json, "\"superseded_by\"");
  }

  #[test]
  fn chronological_order_uses_sequence_on_ties() {
    let date: NaiveDate = "2020-01-01".parse().unwrap();
    let mk = |sequence| CitationEdge {
      sequence,
      source: "b".into(),
      target: "a".into(),
      relation: RelationKind::Cites,
      effective_date: date,
      scope: EdgeScope::Full,
      authority: 0,
      recorded_at: Utc::now(),
    };
    assert!(mk(2).is_later_than(&mk(1)));
    assert!(!mk(1).is_later_than(&mk(2)));
  }
}
