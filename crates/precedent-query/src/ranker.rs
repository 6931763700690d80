//! Score fusion and the total order over hits.
//!
//! `fused = w_r·relevance + w_v·validity_weight + w_c·citations_normalized`,
//! optionally multiplied by a boost for the query's primary jurisdiction.
//! Ties fall back to citation count, then the more recent `valid_from`, then
//! `document_id`, so the order is total and deterministic.

use std::{cmp::Ordering, collections::HashMap};

use chrono::NaiveDate;
use precedent_core::{
  document::DocumentId, temporal::TemporalRecord, validity::ValidityStatus,
};
use serde::{Deserialize, Serialize};

// ─── Weights ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
  pub relevance: f64,
  pub validity:  f64,
  pub citations: f64,
}

impl Default for Weights {
  fn default() -> Self {
    Self {
      relevance: 0.5,
      validity:  0.35,
      citations: 0.15,
    }
  }
}

/// Per-query weight overrides; absent terms keep the configured weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightOverrides {
  #[serde(default)]
  pub relevance: Option<f64>,
  #[serde(default)]
  pub validity:  Option<f64>,
  #[serde(default)]
  pub citations: Option<f64>,
}

impl WeightOverrides {
  pub fn apply(&self, base: Weights) -> Weights {
    Weights {
      relevance: self.relevance.unwrap_or(base.relevance),
      validity:  self.validity.unwrap_or(base.validity),
      citations: self.citations.unwrap_or(base.citations),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankOptions {
  #[serde(default)]
  pub weights:            WeightOverrides,
  /// Drop candidates whose validity weight is below this status's weight.
  #[serde(default)]
  pub min_validity:       Option<ValidityStatus>,
  /// Multiplier for candidates in the primary jurisdiction.
  #[serde(default)]
  pub jurisdiction_boost: Option<f64>,
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

/// A candidate annotated with the graph-derived signals.
#[derive(Debug, Clone)]
pub struct Candidate {
  pub record:         TemporalRecord,
  pub validity:       ValidityStatus,
  pub citation_count: u64,
}

#[derive(Debug, Clone)]
pub struct Ranked {
  pub record:         TemporalRecord,
  pub validity:       ValidityStatus,
  pub citation_count: u64,
  pub relevance:      f32,
  pub score:          f64,
}

impl Ranked {
  fn order(&self, other: &Self) -> Ordering {
    other
      .score
      .total_cmp(&self.score)
      .then(other.citation_count.cmp(&self.citation_count))
      .then(other.record.valid_from.cmp(&self.record.valid_from))
      .then(self.record.document_id().cmp(other.record.document_id()))
  }
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalRanker {
  weights: Weights,
}

impl RetrievalRanker {
  pub fn new(weights: Weights) -> Self { Self { weights } }

  /// Fuse and sort. Records not in force on `as_of` are dropped, as are
  /// candidates below `min_validity`. Missing relevance scores count as zero.
  pub fn rank(
    &self,
    candidates: Vec<Candidate>,
    relevance: &HashMap<DocumentId, f32>,
    as_of: NaiveDate,
    jurisdiction: &str,
    options: &RankOptions,
  ) -> Vec<Ranked> {
    let weights = options.weights.apply(self.weights);
    let floor = options.min_validity.map(ValidityStatus::weight);
    let max_citations = candidates
      .iter()
      .map(|c| c.citation_count)
      .max()
      .unwrap_or(0);

    let mut ranked: Vec<Ranked> = candidates
      .into_iter()
      .filter(|c| c.record.is_valid_at(as_of))
      .filter(|c| floor.is_none_or(|floor| c.validity.weight() >= floor))
      .map(|c| {
        let rel = relevance
          .get(c.record.document_id())
          .copied()
          .filter(|r| r.is_finite())
          .unwrap_or(0.0)
          .clamp(0.0, 1.0);
        let citations = if max_citations == 0 {
          0.0
        } else {
          c.citation_count as f64 / max_citations as f64
        };

        let mut score = weights.relevance * f64::from(rel)
          + weights.validity * c.validity.weight()
          + weights.citations * citations;
        if let Some(boost) = options.jurisdiction_boost
          && c.record.document.jurisdiction == jurisdiction
        {
          score *= boost;
        }

        Ranked {
          record: c.record,
          validity: c.validity,
          citation_count: c.citation_count,
          relevance: rel,
          score,
        }
      })
      .collect();

    ranked.sort_by(Ranked::order);
    ranked
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use precedent_core::document::{DocumentContent, DocumentType, LegalDocument};
  use uuid::Uuid;

  use super::*;

  fn d(s: &str) -> NaiveDate { s.parse().unwrap() }

  fn candidate(
    id: &str,
    jurisdiction: &str,
    from: &str,
    validity: ValidityStatus,
    citation_count: u64,
  ) -> Candidate {
    let document = LegalDocument::new(
      id,
      jurisdiction,
      DocumentType::Case,
      "1 Rep. 1",
      "",
      DocumentContent::from_text("text"),
    )
    .unwrap();
    Candidate {
      record: TemporalRecord {
        record_id: Uuid::new_v4(),
        document,
        valid_from: d(from),
        valid_to: None,
        transaction_time: Utc::now(),
        supersedes: None,
      },
      validity,
      citation_count,
    }
  }

  fn ids(ranked: &[Ranked]) -> Vec<&str> {
    ranked.iter().map(|r| r.record.document_id().as_str()).collect()
  }

  #[test]
  fn validity_outweighs_equal_relevance() {
    let ranker = RetrievalRanker::default();
    let relevance =
      HashMap::from([("a".into(), 0.8), ("b".into(), 0.8), ("c".into(), 0.8)]);
    let ranked = ranker.rank(
      vec![
        candidate("a", "NY", "2000-01-01", ValidityStatus::Overruled, 0),
        candidate("b", "NY", "2000-01-01", ValidityStatus::GoodLaw, 0),
        candidate("c", "NY", "2000-01-01", ValidityStatus::Questioned, 0),
      ],
      &relevance,
      d("2020-01-01"),
      "NY",
      &RankOptions::default(),
    );
    assert_eq!(ids(&ranked), vec!["b", "c", "a"]);
    assert!((ranked[0].score - (0.5 * 0.8 + 0.35)).abs() < 1e-6);
  }

  #[test]
  fn ties_break_on_citations_date_then_id() {
    let ranker = RetrievalRanker::new(Weights {
      relevance: 1.0,
      validity:  0.0,
      citations: 0.0,
    });
    let ranked = ranker.rank(
      vec![
        candidate("d", "NY", "2001-01-01", ValidityStatus::GoodLaw, 1),
        candidate("c", "NY", "2001-01-01", ValidityStatus::GoodLaw, 1),
        candidate("b", "NY", "2005-01-01", ValidityStatus::GoodLaw, 1),
        candidate("a", "NY", "2001-01-01", ValidityStatus::GoodLaw, 3),
      ],
      &HashMap::new(),
      d("2020-01-01"),
      "NY",
      &RankOptions::default(),
    );
    assert_eq!(ids(&ranked), vec!["a", "b", "c", "d"]);
  }

  #[test]
  fn records_out_of_force_are_dropped() {
    let mut late = candidate("late", "NY", "2016-01-01", ValidityStatus::GoodLaw, 0);
    late.record.valid_to = None;
    let mut ended =
      candidate("ended", "NY", "2000-01-01", ValidityStatus::GoodLaw, 0);
    ended.record.valid_to = Some(d("2014-12-31"));
    let ranked = RetrievalRanker::default().rank(
      vec![late, ended, candidate("ok", "NY", "2000-01-01", ValidityStatus::GoodLaw, 0)],
      &HashMap::new(),
      d("2015-01-01"),
      "NY",
      &RankOptions::default(),
    );
    assert_eq!(ids(&ranked), vec!["ok"]);
  }

  #[test]
  fn min_validity_and_jurisdiction_boost() {
    let options = RankOptions {
      min_validity: Some(ValidityStatus::Unknown),
      jurisdiction_boost: Some(2.0),
      ..Default::default()
    };
    let ranked = RetrievalRanker::default().rank(
      vec![
        candidate("fed", "US", "2000-01-01", ValidityStatus::GoodLaw, 0),
        candidate("ny", "NY", "2000-01-01", ValidityStatus::Unknown, 0),
        candidate("gone", "NY", "2000-01-01", ValidityStatus::Superseded, 0),
      ],
      &HashMap::new(),
      d("2020-01-01"),
      "NY",
      &options,
    );
    // 0.35 * 0.4 * 2.0 = 0.28 < 0.35
    assert_eq!(ids(&ranked), vec!["fed", "ny"]);
  }

  #[test]
  fn citation_counts_are_normalised_by_the_maximum() {
    let ranker = RetrievalRanker::new(Weights {
      relevance: 0.0,
      validity:  0.0,
      citations: 1.0,
    });
    let ranked = ranker.rank(
      vec![
        candidate("a", "NY", "2000-01-01", ValidityStatus::GoodLaw, 4),
        candidate("b", "NY", "2000-01-01", ValidityStatus::GoodLaw, 1),
      ],
      &HashMap::new(),
      d("2020-01-01"),
      "NY",
      &RankOptions::default(),
    );
    assert_eq!(ranked[0].score, 1.0);
    assert_eq!(ranked[1].score, 0.25);
  }

  #[test]
  fn overrides_replace_single_terms() {
    let w = WeightOverrides {
      validity: Some(0.9),
      ..Default::default()
    }
    .apply(Weights::default());
    assert_eq!(w.validity, 0.9);
    assert_eq!(w.relevance, 0.5);
  }
}
