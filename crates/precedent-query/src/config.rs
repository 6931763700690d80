//! Tunables for the query pipeline.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ranker::Weights;

/// Query pipeline settings. Every field has a default, so a partial config
/// section deserialises.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
  /// Upper bound for one relevance-scoring call.
  pub scoring_timeout_ms:      u64,
  /// Relevance assigned when scoring times out, fails, or is not finite.
  pub relevance_floor:         f32,
  /// Rows per candidate page.
  pub page_size:               usize,
  /// In-force records paged in and scored per query, across all pages.
  pub max_scanned:             usize,
  /// Most relevant records kept for validity annotation and ranking.
  pub max_candidates:          usize,
  /// Hits returned when the caller gives no limit.
  pub default_limit:           usize,
  /// Validity cache entries kept before the cache is cleared.
  pub validity_cache_capacity: usize,
  pub weights:                 Weights,
}

impl Default for QueryConfig {
  fn default() -> Self {
    Self {
      scoring_timeout_ms:      2000,
      relevance_floor:         0.0,
      page_size:               200,
      max_scanned:             20_000,
      max_candidates:          1000,
      default_limit:           20,
      validity_cache_capacity: 4096,
      weights:                 Weights::default(),
    }
  }
}

impl QueryConfig {
  pub fn scoring_timeout(&self) -> Duration {
    Duration::from_millis(self.scoring_timeout_ms)
  }
}
