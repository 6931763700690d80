//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{NaiveDate, Utc};
use precedent_core::{
  Error as CoreError,
  citation::{NewEdge, RelationKind},
  document::{DocumentContent, DocumentId, DocumentType, LegalDocument},
  store::{CandidateQuery, CitationStore, LegalStore, TemporalStore},
  temporal::{IngestionUnit, NewRecord},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn d(s: &str) -> NaiveDate { s.parse().unwrap() }

fn doc(id: &str, jurisdiction: &str, text: &str) -> LegalDocument {
  LegalDocument::new(
    id,
    jurisdiction,
    DocumentType::Case,
    format!("{} Rep. 1", id.len()),
    format!("In re {id}"),
    DocumentContent::from_text(text),
  )
  .unwrap()
}

fn record(id: &str, from: &str) -> NewRecord {
  NewRecord::new(doc(id, "NY", "Damages for breach of contract."), d(from))
}

fn domain(err: Error) -> CoreError {
  match err {
    Error::Core(e) => e,
    other => panic!("expected a domain error, got {other:?}"),
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_then_query_at_valid_from() {
  let s = store().await;
  let rec = s.ingest(record("a", "2010-01-01")).await.unwrap();

  let found = s
    .query_as_of(&"a".into(), d("2010-01-01"), Utc::now())
    .await
    .unwrap()
    .expect("record in force");
  assert_eq!(found, rec);
  assert!(
    s.query_as_of(&"a".into(), d("2009-12-31"), Utc::now())
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn overlapping_ingest_is_rejected() {
  let s = store().await;
  let first = s
    .ingest(record("a", "2010-01-01").until(d("2014-12-31")))
    .await
    .unwrap();

  let err = s.ingest(record("a", "2014-06-01")).await.unwrap_err();
  match domain(err) {
    CoreError::OverlapConflict {
      document_id,
      existing,
    } => {
      assert_eq!(document_id, DocumentId::from("a"));
      assert_eq!(existing, first.record_id);
    }
    other => panic!("unexpected {other:?}"),
  }

  // Adjacent interval is fine.
  s.ingest(record("a", "2015-01-01")).await.unwrap();
}

#[tokio::test]
async fn invalid_interval_and_tampered_hash_are_rejected() {
  let s = store().await;
  let err = s
    .ingest(record("a", "2015-01-01").until(d("2014-01-01")))
    .await
    .unwrap_err();
  assert!(matches!(domain(err), CoreError::InvalidInterval { .. }));

  let mut tampered = record("b", "2015-01-01");
  tampered.document.content_hash = "00".repeat(32);
  let err = s.ingest(tampered).await.unwrap_err();
  assert!(matches!(domain(err), CoreError::ContentHashMismatch { .. }));
}

#[tokio::test]
async fn transaction_times_strictly_increase() {
  let s = store().await;
  let mut last = None;
  for i in 0..20 {
    let rec = s.ingest(record(&format!("doc-{i}"), "2010-01-01")).await.unwrap();
    if let Some(prev) = last {
      assert!(rec.transaction_time > prev);
    }
    last = Some(rec.transaction_time);
  }
}

#[tokio::test]
async fn supersede_replaces_and_past_reads_are_stable() {
  let s = store().await;
  let old = s.ingest(record("a", "2010-01-01")).await.unwrap();
  let before = Utc::now();

  let replacement = NewRecord::new(
    doc("a", "NY", "Damages for breach of contract, corrected."),
    d("2010-01-01"),
  );
  let (sup, new) = s.supersede(old.record_id, replacement).await.unwrap();
  assert_eq!(sup.old_record_id, old.record_id);
  assert_eq!(new.supersedes, Some(old.record_id));

  let now = s
    .query_as_of(&"a".into(), d("2012-01-01"), Utc::now())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(now.record_id, new.record_id);

  let then = s
    .query_as_of(&"a".into(), d("2012-01-01"), before)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(then.record_id, old.record_id);

  let resolved = s.get_record(old.record_id).await.unwrap().unwrap();
  assert!(!resolved.status.is_current());
}

#[tokio::test]
async fn supersede_errors() {
  let s = store().await;
  let old = s.ingest(record("a", "2010-01-01")).await.unwrap();

  let err = s
    .supersede(Uuid::new_v4(), record("a", "2010-01-01"))
    .await
    .unwrap_err();
  assert!(matches!(domain(err), CoreError::UnknownRecord(_)));

  let err = s
    .supersede(old.record_id, record("b", "2010-01-01"))
    .await
    .unwrap_err();
  assert!(matches!(domain(err), CoreError::DocumentMismatch { .. }));

  s.supersede(old.record_id, record("a", "2011-01-01"))
    .await
    .unwrap();
  let err = s
    .supersede(old.record_id, record("a", "2012-01-01"))
    .await
    .unwrap_err();
  assert!(matches!(domain(err), CoreError::AlreadySuperseded(id) if id == old.record_id));
}

#[tokio::test]
async fn concurrent_supersessions_have_one_winner() {
  let s = store().await;
  let old = s.ingest(record("a", "2010-01-01")).await.unwrap();

  let (x, y) = tokio::join!(
    s.supersede(old.record_id, record("a", "2010-01-01")),
    s.supersede(old.record_id, record("a", "2010-01-01")),
  );
  assert_eq!(x.is_ok() as u8 + y.is_ok() as u8, 1);
  let loser = x.err().or(y.err()).unwrap();
  assert!(matches!(domain(loser), CoreError::AlreadySuperseded(_)));
}

#[tokio::test]
async fn history_lists_every_version_in_order() {
  let s = store().await;
  let first = s
    .ingest(record("a", "2010-01-01").until(d("2014-12-31")))
    .await
    .unwrap();
  let second = s.ingest(record("a", "2015-01-01")).await.unwrap();
  let (_, third) = s
    .supersede(second.record_id, record("a", "2015-06-01"))
    .await
    .unwrap();

  let history = s.history(&"a".into()).await.unwrap();
  let ids: Vec<Uuid> = history.iter().map(|r| r.record.record_id).collect();
  assert_eq!(ids, vec![first.record_id, second.record_id, third.record_id]);
  assert!(history[0].status.is_current());
  assert!(!history[1].status.is_current());
  assert!(history[2].status.is_current());
}

// ─── Candidates ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn candidates_respect_jurisdiction_time_and_paging() {
  let s = store().await;
  for id in ["ny-1", "ny-2", "ny-3"] {
    s.ingest(record(id, "2010-01-01")).await.unwrap();
  }
  s.ingest(record("ny-late", "2016-01-01")).await.unwrap();
  s.ingest(NewRecord::new(doc("ca-1", "CA", "Damages."), d("2010-01-01")))
    .await
    .unwrap();
  s.ingest(NewRecord::new(doc("us-1", "US", "Damages."), d("2010-01-01")))
    .await
    .unwrap();

  let mut q = CandidateQuery::new("NY", d("2015-01-01"), Utc::now());
  q.limit = 2;
  let page = s.search_candidates(&q).await.unwrap();
  let ids: Vec<&str> = page.iter().map(|r| r.document_id().as_str()).collect();
  assert_eq!(ids, vec!["ny-1", "ny-2"]);

  q.after = Some("ny-2".into());
  let page = s.search_candidates(&q).await.unwrap();
  let ids: Vec<&str> = page.iter().map(|r| r.document_id().as_str()).collect();
  assert_eq!(ids, vec!["ny-3"]);

  let mut q = CandidateQuery::new("NY", d("2015-01-01"), Utc::now());
  q.also_jurisdictions = vec!["US".into()];
  let page = s.search_candidates(&q).await.unwrap();
  assert_eq!(page.len(), 4);
}

#[tokio::test]
async fn candidate_text_and_citation_filters() {
  let s = store().await;
  s.ingest(NewRecord::new(
    doc("a", "NY", "Consequential DAMAGES are recoverable."),
    d("2010-01-01"),
  ))
  .await
  .unwrap();
  s.ingest(NewRecord::new(doc("bb", "NY", "Adverse possession."), d("2010-01-01")))
    .await
    .unwrap();
  s.ingest(NewRecord::new(doc("c", "NY", "100% of the_fee."), d("2010-01-01")))
    .await
    .unwrap();

  let mut q = CandidateQuery::new("NY", d("2015-01-01"), Utc::now());
  q.text = Some("consequential damages".into());
  let page = s.search_candidates(&q).await.unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].document_id().as_str(), "a");

  q.text = Some("%".into());
  let page = s.search_candidates(&q).await.unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].document_id().as_str(), "c");

  let mut q = CandidateQuery::new("NY", d("2015-01-01"), Utc::now());
  q.citation = Some("2 Rep. 1".into());
  let page = s.search_candidates(&q).await.unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].document_id().as_str(), "bb");
}

#[tokio::test]
async fn superseded_record_is_not_a_candidate_twice() {
  let s = store().await;
  let old = s.ingest(record("a", "2010-01-01")).await.unwrap();
  s.supersede(old.record_id, record("a", "2010-01-01"))
    .await
    .unwrap();

  let q = CandidateQuery::new("NY", d("2015-01-01"), Utc::now());
  let page = s.search_candidates(&q).await.unwrap();
  assert_eq!(page.len(), 1);
  assert_eq!(page[0].supersedes, Some(old.record_id));
}

// ─── Edges ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_edge_is_idempotent() {
  let s = store().await;
  s.ingest(record("a", "2010-01-01")).await.unwrap();
  s.ingest(record("b", "2010-01-01")).await.unwrap();

  let edge = NewEdge::new("b", RelationKind::Overrules, "a", d("2020-06-01"));
  let first = s.add_edge(edge.clone()).await.unwrap();
  let second = s.add_edge(edge).await.unwrap();
  assert_eq!(first, second);
  assert_eq!(s.graph_revision().await.unwrap(), first.sequence);
  assert_eq!(s.edges_for(&"a".into(), None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn edge_to_unknown_document_is_rejected() {
  let s = store().await;
  s.ingest(record("a", "2010-01-01")).await.unwrap();

  let err = s
    .add_edge(NewEdge::new("ghost", RelationKind::Cites, "a", d("2020-01-01")))
    .await
    .unwrap_err();
  assert!(matches!(domain(err), CoreError::UnknownDocument(id) if id.as_str() == "ghost"));
}

#[tokio::test]
async fn edge_batch_is_all_or_nothing() {
  let s = store().await;
  s.ingest(record("a", "2010-01-01")).await.unwrap();
  s.ingest(record("b", "2010-01-01")).await.unwrap();

  let err = s
    .add_edges(vec![
      NewEdge::new("b", RelationKind::Cites, "a", d("2020-01-01")),
      NewEdge::new("b", RelationKind::Cites, "ghost", d("2020-01-01")),
    ])
    .await
    .unwrap_err();
  assert!(matches!(domain(err), CoreError::UnknownDocument(_)));
  assert_eq!(s.graph_revision().await.unwrap(), 0);

  let edges = s
    .add_edges(vec![
      NewEdge::new("b", RelationKind::Cites, "a", d("2020-01-01")),
      NewEdge::new("b", RelationKind::Questions, "a", d("2021-01-01")),
    ])
    .await
    .unwrap();
  assert_eq!(edges.len(), 2);
  assert!(edges[0].sequence < edges[1].sequence);
}

#[tokio::test]
async fn edges_for_respects_snapshot_and_revision() {
  let s = store().await;
  for id in ["a", "b", "c"] {
    s.ingest(record(id, "2010-01-01")).await.unwrap();
  }
  let e1 = s
    .add_edge(NewEdge::new("b", RelationKind::Cites, "a", d("2020-01-01")))
    .await
    .unwrap();
  let e2 = s
    .add_edge(NewEdge::new("c", RelationKind::Cites, "b", d("2020-01-01")))
    .await
    .unwrap();

  assert_eq!(s.edges_for(&"b".into(), Some(e1.sequence)).await.unwrap().len(), 1);
  assert_eq!(s.edges_for(&"b".into(), None).await.unwrap().len(), 2);
  assert_eq!(s.revision(&["a".into()], None).await.unwrap(), e1.sequence);
  assert_eq!(
    s.revision(&["a".into(), "c".into()], None).await.unwrap(),
    e2.sequence
  );
  assert_eq!(
    s.revision(&["b".into(), "c".into()], Some(e1.sequence)).await.unwrap(),
    e1.sequence
  );
  assert_eq!(s.revision(&["c".into()], Some(e1.sequence)).await.unwrap(), 0);
  assert_eq!(s.revision(&["zzz".into()], None).await.unwrap(), 0);
}

#[tokio::test]
async fn revision_at_cuts_on_recorded_at() {
  let s = store().await;
  s.ingest(record("a", "2010-01-01")).await.unwrap();
  s.ingest(record("b", "2010-01-01")).await.unwrap();
  let before_edges = s
    .ingest(record("c", "2010-01-01"))
    .await
    .unwrap()
    .transaction_time;
  assert_eq!(s.revision_at(before_edges).await.unwrap(), 0);

  let e1 = s
    .add_edge(NewEdge::new("b", RelationKind::Cites, "a", d("2020-01-01")))
    .await
    .unwrap();
  let e2 = s
    .add_edge(NewEdge::new("c", RelationKind::Overrules, "a", d("2020-01-01")))
    .await
    .unwrap();

  assert_eq!(s.revision_at(before_edges).await.unwrap(), 0);
  assert_eq!(s.revision_at(e1.recorded_at).await.unwrap(), e1.sequence);
  assert_eq!(s.revision_at(e2.recorded_at).await.unwrap(), e2.sequence);
  assert!(e1.recorded_at > before_edges);
  assert!(e2.recorded_at > e1.recorded_at);
}

#[tokio::test]
async fn citation_counts_skip_supersession_and_future_edges() {
  let s = store().await;
  for id in ["a", "b", "c", "d"] {
    s.ingest(record(id, "2010-01-01")).await.unwrap();
  }
  s.add_edges(vec![
    NewEdge::new("b", RelationKind::Cites, "a", d("2012-01-01")),
    NewEdge::new("c", RelationKind::Affirms, "a", d("2013-01-01")),
    NewEdge::new("d", RelationKind::Cites, "a", d("2030-01-01")),
    NewEdge::new("a", RelationKind::SupersededBy, "b", d("2012-01-01")),
  ])
  .await
  .unwrap();

  let counts = s
    .citation_counts(&["a".into(), "b".into(), "c".into()], d("2020-01-01"), None)
    .await
    .unwrap();
  assert_eq!(counts.get(&DocumentId::from("a")), Some(&2));
  assert_eq!(counts.get(&DocumentId::from("b")), None);

  let earlier = s.graph_revision().await.unwrap();
  s.add_edge(NewEdge::new("d", RelationKind::Cites, "a", d("2015-01-01")))
    .await
    .unwrap();
  let pinned = s
    .citation_counts(&["a".into()], d("2020-01-01"), Some(earlier))
    .await
    .unwrap();
  assert_eq!(pinned.get(&DocumentId::from("a")), Some(&2));
  let latest = s
    .citation_counts(&["a".into()], d("2020-01-01"), None)
    .await
    .unwrap();
  assert_eq!(latest.get(&DocumentId::from("a")), Some(&3));
}

#[tokio::test]
async fn ingest_unit_writes_record_and_edges_atomically() {
  let s = store().await;
  s.ingest(record("a", "2010-01-01")).await.unwrap();

  let bad = IngestionUnit {
    record:       record("b", "2020-01-01"),
    source_edges: vec![
      NewEdge::new("b", RelationKind::Overrules, "a", d("2020-06-01")),
      NewEdge::new("b", RelationKind::Cites, "ghost", d("2020-06-01")),
    ],
  };
  assert!(s.ingest_unit(bad).await.is_err());
  assert!(!s.document_exists(&"b".into()).await.unwrap());

  let good = IngestionUnit {
    record:       record("b", "2020-01-01"),
    source_edges: vec![NewEdge::new("b", RelationKind::Overrules, "a", d("2020-06-01"))],
  };
  let (rec, edges) = s.ingest_unit(good).await.unwrap();
  assert_eq!(rec.document_id().as_str(), "b");
  assert_eq!(edges.len(), 1);
  assert_eq!(edges[0].recorded_at, rec.transaction_time);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn data_survives_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("precedent.db");

  let rec = {
    let s = SqliteStore::open(&path).await.unwrap();
    s.ingest(record("a", "2010-01-01")).await.unwrap()
  };

  let s = SqliteStore::open(&path).await.unwrap();
  let again = s.get_record(rec.record_id).await.unwrap().unwrap();
  assert_eq!(again.record, rec);
}
