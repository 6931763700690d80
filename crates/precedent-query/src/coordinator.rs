//! The `find` pipeline.
//!
//! A query moves through `Received → CandidatesFetched → ValidityAnnotated →
//! Scored → Anchored → Complete`. Any stage failure moves it to `Failed` and
//! aborts the whole query; no state is entered twice. One clock reading is
//! taken per query and used as the transaction time of every stage; validity
//! and citation counts read the edge revision the store knew at that time.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use precedent_core::{
  anchor::{ProvenanceAnchor, excerpt},
  citation::looks_like_citation,
  document::{DocumentId, DocumentType, normalize_text},
  store::{CandidateQuery, LegalStore},
  temporal::TemporalRecord,
  validity::ValidityStatus,
};
use serde::{Deserialize, Serialize};
use tokio::{task::JoinSet, time::timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  QueryConfig, QueryError, Result,
  anchor::{AnchorService, best_locator},
  candidates::Candidates,
  graph::CitationGraph,
  ranker::{Candidate, RankOptions, RetrievalRanker, WeightOverrides},
  relevance::RelevanceScorer,
};

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum QueryState {
  Received,
  CandidatesFetched,
  ValidityAnnotated,
  Scored,
  Anchored,
  Complete,
  Failed(String),
}

impl QueryState {
  fn successor(&self) -> Option<Self> {
    match self {
      Self::Received => Some(Self::CandidatesFetched),
      Self::CandidatesFetched => Some(Self::ValidityAnnotated),
      Self::ValidityAnnotated => Some(Self::Scored),
      Self::Scored => Some(Self::Anchored),
      Self::Anchored => Some(Self::Complete),
      Self::Complete | Self::Failed(_) => None,
    }
  }

  pub fn is_terminal(&self) -> bool { self.successor().is_none() }
}

/// The states a query has passed through, in order.
#[derive(Debug, Clone)]
pub struct QueryLifecycle {
  trail: Vec<QueryState>,
}

impl Default for QueryLifecycle {
  fn default() -> Self { Self::new() }
}

impl QueryLifecycle {
  pub fn new() -> Self {
    Self {
      trail: vec![QueryState::Received],
    }
  }

  pub fn state(&self) -> &QueryState {
    // The trail always starts with `Received`.
    &self.trail[self.trail.len() - 1]
  }

  pub fn trail(&self) -> &[QueryState] { &self.trail }

  /// Move to `next`, which must be the direct successor of the current state.
  pub fn advance(&mut self, next: QueryState) -> Result<()> {
    let current = self.state();
    if current.successor().as_ref() != Some(&next) {
      return Err(QueryError::InvalidTransition {
        from: current.clone(),
        to:   next,
      });
    }
    debug!(state = ?next, "query stage");
    self.trail.push(next);
    Ok(())
  }

  /// Move to `Failed` unless the query already finished.
  pub fn fail(&mut self, reason: impl Into<String>) {
    if !self.state().is_terminal() {
      self.trail.push(QueryState::Failed(reason.into()));
    }
  }
}

// ─── Request / response ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FindOptions {
  #[serde(default)]
  pub document_type:      Option<DocumentType>,
  /// Further jurisdictions whose law applies, e.g. federal law in a state.
  #[serde(default)]
  pub also_jurisdictions: Vec<String>,
  #[serde(default)]
  pub min_validity:       Option<ValidityStatus>,
  #[serde(default)]
  pub jurisdiction_boost: Option<f64>,
  #[serde(default)]
  pub weights:            WeightOverrides,
  #[serde(default)]
  pub limit:              Option<usize>,
  #[serde(default)]
  pub offset:             usize,
  /// Read the store as it was at this instant instead of now.
  #[serde(default)]
  pub transaction_time:   Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMetadata {
  pub text:             String,
  pub jurisdiction:     String,
  pub as_of:            NaiveDate,
  pub transaction_time: DateTime<Utc>,
  /// Set when the text was read as a reporter citation.
  pub citation:         Option<String>,
  /// Edge revision every validity and citation read was pinned to.
  pub edge_revision:    u64,
  /// In-force records paged in and scored for relevance.
  pub scanned:          usize,
  /// Records kept for validity annotation and ranking.
  pub candidate_count:  usize,
  /// Set when in-force records were left out of ranking, either because the
  /// scan limit was reached or because they fell below the relevance
  /// shortlist.
  pub truncated:        bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
  pub document_id:        DocumentId,
  pub canonical_citation: String,
  pub title:              String,
  pub jurisdiction:       String,
  pub record_id:          Uuid,
  pub valid_from:         NaiveDate,
  pub valid_to:           Option<NaiveDate>,
  pub excerpt:            String,
  pub anchor:             ProvenanceAnchor,
  pub validity:           ValidityStatus,
  pub score:              f64,
  pub relevance:          f32,
  pub citation_count:     u64,
  pub verified:           bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindResponse {
  pub query:  QueryMetadata,
  pub hits:   Vec<Hit>,
  pub stages: Vec<QueryState>,
}

// ─── Relevance shortlist ─────────────────────────────────────────────────────

/// Keeps the `capacity` most relevant records seen so far; ties keep the
/// lower document id.
struct Shortlist {
  capacity: usize,
  entries:  Vec<(TemporalRecord, f32)>,
}

impl Shortlist {
  fn new(capacity: usize) -> Self {
    Self {
      capacity,
      entries: Vec::new(),
    }
  }

  fn extend(
    &mut self,
    page: Vec<TemporalRecord>,
    scores: &HashMap<DocumentId, f32>,
    floor: f32,
  ) {
    self.entries.extend(page.into_iter().map(|record| {
      let score = scores.get(record.document_id()).copied().unwrap_or(floor);
      (record, score)
    }));
    if self.entries.len() > self.capacity {
      self.entries.sort_by(|(a, a_score), (b, b_score)| {
        b_score
          .total_cmp(a_score)
          .then_with(|| a.document_id().cmp(b.document_id()))
      });
      self.entries.truncate(self.capacity);
    }
  }

  fn finish(self) -> (Vec<TemporalRecord>, HashMap<DocumentId, f32>) {
    let relevance = self
      .entries
      .iter()
      .map(|(record, score)| (record.document_id().clone(), *score))
      .collect();
    let records = self.entries.into_iter().map(|(record, _)| record).collect();
    (records, relevance)
  }
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

pub struct QueryCoordinator<S, R> {
  store:   Arc<S>,
  graph:   Arc<CitationGraph<S>>,
  anchors: AnchorService<S>,
  scorer:  Arc<R>,
  ranker:  RetrievalRanker,
  config:  QueryConfig,
}

impl<S, R> QueryCoordinator<S, R>
where
  S: LegalStore + 'static,
  R: RelevanceScorer + 'static,
{
  pub fn new(store: Arc<S>, scorer: R, config: QueryConfig) -> Self {
    Self {
      graph: Arc::new(CitationGraph::new(
        store.clone(),
        config.validity_cache_capacity,
      )),
      anchors: AnchorService::new(store.clone()),
      ranker: RetrievalRanker::new(config.weights),
      scorer: Arc::new(scorer),
      store,
      config,
    }
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn graph(&self) -> &CitationGraph<S> { &self.graph }

  pub fn anchors(&self) -> &AnchorService<S> { &self.anchors }

  pub fn config(&self) -> &QueryConfig { &self.config }

  /// Ranked, anchored hits for `query_text` under the law of `jurisdiction`
  /// as it stood on `as_of`.
  pub async fn find(
    &self,
    query_text: &str,
    jurisdiction: &str,
    as_of: NaiveDate,
    options: FindOptions,
  ) -> Result<FindResponse> {
    let mut lifecycle = QueryLifecycle::new();
    match self
      .run(&mut lifecycle, query_text, jurisdiction, as_of, options)
      .await
    {
      Ok(response) => Ok(response),
      Err(e) => {
        lifecycle.fail(e.to_string());
        warn!(error = %e, stages = ?lifecycle.trail(), "query failed");
        Err(e)
      }
    }
  }

  async fn run(
    &self,
    lifecycle: &mut QueryLifecycle,
    query_text: &str,
    jurisdiction: &str,
    as_of: NaiveDate,
    options: FindOptions,
  ) -> Result<FindResponse> {
    let text = normalize_text(query_text);
    if text.is_empty() {
      return Err(QueryError::InvalidQuery("query text is blank".into()));
    }
    let jurisdiction = jurisdiction.trim();
    if jurisdiction.is_empty() {
      return Err(QueryError::InvalidQuery("jurisdiction is blank".into()));
    }
    let transaction_time = options.transaction_time.unwrap_or_else(Utc::now);
    let citation = looks_like_citation(&text).then(|| text.clone());

    // ── Candidates ────────────────────────────────────────────────────────
    // Every page is scored as it arrives, so the candidate cap keeps the most
    // relevant records rather than the first ones by id.
    let mut query = CandidateQuery::new(jurisdiction, as_of, transaction_time);
    query.also_jurisdictions = options.also_jurisdictions.clone();
    query.document_type = options.document_type;
    query.citation = citation.clone();
    query.limit = self.config.page_size;
    let mut pager = Candidates::new(&*self.store, query, self.config.max_scanned);
    let mut shortlist = Shortlist::new(self.config.max_candidates);
    let mut scanned = 0;
    while let Some(page) = pager.next_page().await? {
      scanned += page.len();
      let scores = self.score_relevance(&text, &page).await?;
      shortlist.extend(page, &scores, self.config.relevance_floor);
    }
    let (records, relevance) = shortlist.finish();
    let candidate_count = records.len();
    let truncated = !pager.is_exhausted() || candidate_count < scanned;
    if truncated {
      warn!(
        query = %text,
        %jurisdiction,
        scanned,
        kept = candidate_count,
        scan_complete = pager.is_exhausted(),
        "candidate set truncated"
      );
    }
    lifecycle.advance(QueryState::CandidatesFetched)?;

    // ── Validity ──────────────────────────────────────────────────────────
    let edge_revision = self.graph.snapshot(options.transaction_time).await?;
    let validity = self
      .annotate_validity(&records, as_of, edge_revision)
      .await?;
    let ids: Vec<DocumentId> =
      records.iter().map(|r| r.document_id().clone()).collect();
    let counts = self
      .graph
      .citation_counts(&ids, as_of, Some(edge_revision))
      .await?;
    lifecycle.advance(QueryState::ValidityAnnotated)?;

    // ── Relevance ─────────────────────────────────────────────────────────
    // Scores were taken while paging; this stage only seals them.
    lifecycle.advance(QueryState::Scored)?;

    // ── Rank and anchor ───────────────────────────────────────────────────
    let candidates = records
      .into_iter()
      .zip(validity)
      .map(|(record, validity)| Candidate {
        citation_count: counts.get(record.document_id()).copied().unwrap_or(0),
        record,
        validity,
      })
      .collect();
    let rank_options = RankOptions {
      weights:            options.weights,
      min_validity:       options.min_validity,
      jurisdiction_boost: options.jurisdiction_boost,
    };
    let limit = options.limit.unwrap_or(self.config.default_limit);
    let ranked: Vec<_> = self
      .ranker
      .rank(candidates, &relevance, as_of, jurisdiction, &rank_options)
      .into_iter()
      .skip(options.offset)
      .take(limit)
      .collect();

    let mut hits = Vec::with_capacity(ranked.len());
    for ranked in ranked {
      let record = ranked.record;
      let locator = best_locator(&record, &text);
      let excerpt_text = excerpt(&record.document.content, &locator)
        .unwrap_or_default()
        .to_owned();
      let anchor = self
        .anchors
        .anchor(record.document_id(), locator, transaction_time)
        .await?;
      let verified = self.anchors.verify(&anchor).await;

      hits.push(Hit {
        document_id: record.document.document_id,
        canonical_citation: record.document.canonical_citation,
        title: record.document.title,
        jurisdiction: record.document.jurisdiction,
        record_id: record.record_id,
        valid_from: record.valid_from,
        valid_to: record.valid_to,
        excerpt: excerpt_text,
        anchor,
        validity: ranked.validity,
        score: ranked.score,
        relevance: ranked.relevance,
        citation_count: ranked.citation_count,
        verified,
      });
    }
    lifecycle.advance(QueryState::Anchored)?;
    lifecycle.advance(QueryState::Complete)?;

    info!(
      query = %text,
      %jurisdiction,
      %as_of,
      candidates = candidate_count,
      hits = hits.len(),
      "query complete"
    );

    Ok(FindResponse {
      query: QueryMetadata {
        text,
        jurisdiction: jurisdiction.to_owned(),
        as_of,
        transaction_time,
        citation,
        edge_revision,
        scanned,
        candidate_count,
        truncated,
      },
      hits,
      stages: lifecycle.trail().to_vec(),
    })
  }

  /// Resolve every candidate's validity concurrently; results keep the
  /// candidate order.
  async fn annotate_validity(
    &self,
    records: &[TemporalRecord],
    as_of: NaiveDate,
    snapshot: u64,
  ) -> Result<Vec<ValidityStatus>> {
    let mut tasks = JoinSet::new();
    for (index, record) in records.iter().enumerate() {
      let graph = self.graph.clone();
      let document_id = record.document_id().clone();
      tasks.spawn(async move {
        let resolution = graph.resolve_upto(&document_id, as_of, snapshot).await;
        (index, resolution.map(|r| r.status))
      });
    }

    let mut statuses = vec![ValidityStatus::Unknown; records.len()];
    while let Some(joined) = tasks.join_next().await {
      let (index, status) = joined?;
      statuses[index] = status?;
    }
    Ok(statuses)
  }

  /// Score every candidate concurrently. A timeout, a scorer error, or a
  /// non-finite score degrades that candidate to the relevance floor.
  async fn score_relevance(
    &self,
    text: &str,
    records: &[TemporalRecord],
  ) -> Result<HashMap<DocumentId, f32>> {
    let limit = self.config.scoring_timeout();
    let floor = self.config.relevance_floor;

    let mut tasks = JoinSet::new();
    for record in records {
      let scorer = self.scorer.clone();
      let query = text.to_owned();
      let document = record.document.clone();
      tasks.spawn(async move {
        let outcome = timeout(limit, scorer.score(&query, &document)).await;
        (document.document_id, outcome)
      });
    }

    let mut scores = HashMap::with_capacity(records.len());
    while let Some(joined) = tasks.join_next().await {
      let (document_id, outcome) = joined?;
      let score = match outcome {
        Ok(Ok(score)) if score.is_finite() => score.clamp(0.0, 1.0),
        Ok(Ok(score)) => {
          warn!(%document_id, score, "non-finite relevance score, using floor");
          floor
        }
        Ok(Err(e)) => {
          warn!(%document_id, error = %e, "relevance scoring failed, using floor");
          floor
        }
        Err(_) => {
          warn!(
            %document_id,
            timeout_ms = limit.as_millis() as u64,
            "relevance scoring timed out, using floor"
          );
          floor
        }
      };
      scores.insert(document_id, score);
    }
    Ok(scores)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lifecycle_walks_forward_only() {
    let mut lc = QueryLifecycle::new();
    lc.advance(QueryState::CandidatesFetched).unwrap();
    assert!(matches!(
      lc.advance(QueryState::CandidatesFetched),
      Err(QueryError::InvalidTransition { .. })
    ));
    assert!(lc.advance(QueryState::Scored).is_err());
    lc.advance(QueryState::ValidityAnnotated).unwrap();
    lc.fail("scorer exploded");
    assert!(matches!(lc.state(), QueryState::Failed(_)));
    assert!(lc.advance(QueryState::Scored).is_err());
    assert_eq!(lc.trail().len(), 4);
  }

  #[test]
  fn completed_query_cannot_fail() {
    let mut lc = QueryLifecycle::new();
    for next in [
      QueryState::CandidatesFetched,
      QueryState::ValidityAnnotated,
      QueryState::Scored,
      QueryState::Anchored,
      QueryState::Complete,
    ] {
      lc.advance(next).unwrap();
    }
    lc.fail("late");
    assert_eq!(lc.state(), &QueryState::Complete);
  }

  #[test]
  fn states_serialise_with_reason() {
    let json = serde_json::to_value(QueryState::Failed("x".into())).unwrap();
    assert_eq!(json, serde_json::json!({ "state": "failed", "reason": "x" }));
    let json = serde_json::to_value(QueryState::Scored).unwrap();
    assert_eq!(json, serde_json::json!({ "state": "scored" }));
  }
}
