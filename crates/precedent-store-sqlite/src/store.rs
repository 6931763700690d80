//! [`SqliteStore`]: the SQLite implementation of the Precedent storage traits.

use std::{collections::HashMap, path::Path};

use chrono::{DateTime, Duration, NaiveDate, SubsecRound as _, Utc};
use precedent_core::{
  citation::{CitationEdge, NewEdge},
  document::DocumentId,
  store::{CandidateQuery, CitationStore, LegalStore, TemporalStore},
  temporal::{
    IngestionUnit, NewRecord, ResolvedRecord, Supersession, TemporalRecord,
  },
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    EDGE_COLUMNS, EdgeRow, RECORD_COLUMNS, RESOLVED_COLUMNS, RawEdge,
    RawRecord, RawResolvedRecord, RecordRow, decode_dt, decode_uuid,
    encode_date, encode_dt, encode_uuid, like_pattern,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Precedent store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Transaction helpers ─────────────────────────────────────────────────────
//
// These run on the connection thread inside an open transaction. Domain
// rejections travel back as the inner `Err` so the outer `Result` stays
// reserved for database failures; dropping the transaction rolls it back.

/// The wall clock truncated to microseconds, bumped one microsecond past the
/// latest stored record or edge time when the clock has not advanced.
fn next_transaction_time(conn: &Connection) -> tokio_rusqlite::Result<String> {
  let now = Utc::now().trunc_subsecs(6);
  let latest: Option<String> = conn.query_row(
    "SELECT MAX(t) FROM (
       SELECT MAX(transaction_time) AS t FROM records
       UNION ALL
       SELECT MAX(recorded_at) FROM citation_edges
     )",
    [],
    |r| r.get(0),
  )?;
  let Some(latest) = latest else {
    return Ok(encode_dt(now));
  };
  let latest =
    decode_dt(&latest).map_err(|e| tokio_rusqlite::Error::Other(Box::new(e)))?;
  Ok(encode_dt(now.max(latest + Duration::microseconds(1))))
}

/// A live record of the same document whose valid interval overlaps `row`.
fn find_overlap(
  conn: &Connection,
  row: &RecordRow,
  exclude: Option<&str>,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT r.record_id FROM records r
       WHERE r.document_id = ?1
         AND r.record_id != COALESCE(?4, '')
         AND r.valid_from <= COALESCE(?3, '9999-12-31')
         AND COALESCE(r.valid_to, '9999-12-31') >= ?2
         AND NOT EXISTS (
           SELECT 1 FROM supersessions s WHERE s.old_record_id = r.record_id
         )
       ORDER BY r.transaction_time
       LIMIT 1",
      params![row.document_id, row.valid_from, row.valid_to, exclude],
      |r| r.get(0),
    )
    .optional()
}

fn overlap_error(document_id: &str, existing: &str) -> Error {
  match decode_uuid(existing) {
    Ok(existing) => precedent_core::Error::OverlapConflict {
      document_id: DocumentId::new(document_id),
      existing,
    }
    .into(),
    Err(e) => e,
  }
}

fn insert_record(
  conn: &Connection,
  row: &RecordRow,
  transaction_time: &str,
  supersedes: Option<&str>,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO records (
       record_id, document_id, jurisdiction, document_type,
       canonical_citation, title, content_json, content_hash, search_text,
       valid_from, valid_to, transaction_time, supersedes
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    params![
      row.record_id,
      row.document_id,
      row.jurisdiction,
      row.document_type,
      row.canonical_citation,
      row.title,
      row.content_json,
      row.content_hash,
      row.search_text,
      row.valid_from,
      row.valid_to,
      transaction_time,
      supersedes,
    ],
  )?;
  Ok(())
}

/// Append one edge, or return the existing edge with the same identity.
fn insert_edge(
  conn: &Connection,
  row: &EdgeRow,
  recorded_at: &str,
) -> rusqlite::Result<Result<RawEdge>> {
  for endpoint in [&row.source, &row.target] {
    let known: bool = conn.query_row(
      "SELECT EXISTS (SELECT 1 FROM records WHERE document_id = ?1)",
      [endpoint],
      |r| r.get(0),
    )?;
    if !known {
      return Ok(Err(
        precedent_core::Error::UnknownDocument(DocumentId::new(endpoint.as_str()))
          .into(),
      ));
    }
  }

  conn.execute(
    "INSERT INTO citation_edges (
       source_document_id, target_document_id, relation, effective_date,
       scope, authority, recorded_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
     ON CONFLICT (source_document_id, target_document_id, relation, effective_date)
     DO NOTHING",
    params![
      row.source,
      row.target,
      row.relation,
      row.effective_date,
      row.scope,
      row.authority,
      recorded_at,
    ],
  )?;

  let raw = conn.query_row(
    &format!(
      "SELECT {EDGE_COLUMNS} FROM citation_edges
       WHERE source_document_id = ?1 AND target_document_id = ?2
         AND relation = ?3 AND effective_date = ?4"
    ),
    params![row.source, row.target, row.relation, row.effective_date],
    RawEdge::from_row,
  )?;
  Ok(Ok(raw))
}

fn to_sql_limit(n: u64) -> i64 { i64::try_from(n).unwrap_or(i64::MAX) }

// ─── TemporalStore impl ──────────────────────────────────────────────────────

impl TemporalStore for SqliteStore {
  type Error = Error;

  async fn ingest(&self, input: NewRecord) -> Result<TemporalRecord> {
    input.validate()?;
    let record_id = Uuid::new_v4();
    let row = RecordRow::new(
      record_id,
      &input.document,
      input.valid_from,
      input.valid_to,
    )?;

    let transaction_time = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(existing) = find_overlap(&tx, &row, None)? {
          return Ok(Err(overlap_error(&row.document_id, &existing)));
        }
        let transaction_time = next_transaction_time(&tx)?;
        insert_record(&tx, &row, &transaction_time, None)?;
        tx.commit()?;
        Ok(Ok(transaction_time))
      })
      .await??;

    info!(
      %record_id,
      document_id = %input.document.document_id,
      %transaction_time,
      "record ingested"
    );

    Ok(TemporalRecord {
      record_id,
      document: input.document,
      valid_from: input.valid_from,
      valid_to: input.valid_to,
      transaction_time: decode_dt(&transaction_time)?,
      supersedes: None,
    })
  }

  async fn supersede(
    &self,
    old_id: Uuid,
    replacement: NewRecord,
  ) -> Result<(Supersession, TemporalRecord)> {
    replacement.validate()?;
    let record_id = Uuid::new_v4();
    let supersession_id = Uuid::new_v4();
    let row = RecordRow::new(
      record_id,
      &replacement.document,
      replacement.valid_from,
      replacement.valid_to,
    )?;
    let old_str = encode_uuid(old_id);
    let supersession_str = encode_uuid(supersession_id);

    let transaction_time = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let old_document: Option<String> = tx
          .query_row(
            "SELECT document_id FROM records WHERE record_id = ?1",
            [&old_str],
            |r| r.get(0),
          )
          .optional()?;
        let Some(old_document) = old_document else {
          return Ok(Err(precedent_core::Error::UnknownRecord(old_id).into()));
        };
        if old_document != row.document_id {
          return Ok(Err(
            precedent_core::Error::DocumentMismatch {
              expected: DocumentId::new(old_document),
              found:    DocumentId::new(row.document_id.as_str()),
            }
            .into(),
          ));
        }

        let superseded: bool = tx.query_row(
          "SELECT EXISTS (SELECT 1 FROM supersessions WHERE old_record_id = ?1)",
          [&old_str],
          |r| r.get(0),
        )?;
        if superseded {
          return Ok(Err(
            precedent_core::Error::AlreadySuperseded(old_id).into(),
          ));
        }

        if let Some(existing) = find_overlap(&tx, &row, Some(&old_str))? {
          return Ok(Err(overlap_error(&row.document_id, &existing)));
        }

        let transaction_time = next_transaction_time(&tx)?;
        insert_record(&tx, &row, &transaction_time, Some(&old_str))?;

        // Compare-and-set: only the first supersession of a record lands.
        let claimed = tx.execute(
          "INSERT INTO supersessions (
             supersession_id, old_record_id, new_record_id, transaction_time
           ) VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (old_record_id) DO NOTHING",
          params![supersession_str, old_str, row.record_id, transaction_time],
        )?;
        if claimed == 0 {
          return Ok(Err(
            precedent_core::Error::AlreadySuperseded(old_id).into(),
          ));
        }

        tx.commit()?;
        Ok(Ok(transaction_time))
      })
      .await??;

    let transaction_time = decode_dt(&transaction_time)?;
    info!(
      old_record_id = %old_id,
      new_record_id = %record_id,
      document_id = %replacement.document.document_id,
      "record superseded"
    );

    let supersession = Supersession {
      supersession_id,
      old_record_id: old_id,
      new_record_id: record_id,
      transaction_time,
    };
    let record = TemporalRecord {
      record_id,
      document: replacement.document,
      valid_from: replacement.valid_from,
      valid_to: replacement.valid_to,
      transaction_time,
      supersedes: Some(old_id),
    };
    Ok((supersession, record))
  }

  async fn query_as_of<'a>(
    &'a self,
    document_id: &'a DocumentId,
    valid_time: NaiveDate,
    transaction_time: DateTime<Utc>,
  ) -> Result<Option<TemporalRecord>> {
    let document_id = document_id.as_str().to_owned();
    let valid_time = encode_date(valid_time);
    let transaction_time = encode_dt(transaction_time);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RECORD_COLUMNS} FROM records r
                 WHERE r.document_id = ?1
                   AND r.transaction_time <= ?3
                   AND r.valid_from <= ?2
                   AND COALESCE(r.valid_to, '9999-12-31') >= ?2
                   AND NOT EXISTS (
                     SELECT 1 FROM supersessions s
                     WHERE s.old_record_id = r.record_id
                       AND s.transaction_time <= ?3
                   )
                 ORDER BY r.transaction_time DESC
                 LIMIT 1"
              ),
              params![document_id, valid_time, transaction_time],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn get_record(&self, record_id: Uuid) -> Result<Option<ResolvedRecord>> {
    let id_str = encode_uuid(record_id);

    let raw: Option<RawResolvedRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {RESOLVED_COLUMNS} FROM records r
                 LEFT JOIN supersessions s ON s.old_record_id = r.record_id
                 WHERE r.record_id = ?1"
              ),
              [id_str],
              RawResolvedRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawResolvedRecord::into_resolved).transpose()
  }

  async fn history<'a>(
    &'a self,
    document_id: &'a DocumentId,
  ) -> Result<Vec<ResolvedRecord>> {
    let document_id = document_id.as_str().to_owned();

    let raws: Vec<RawResolvedRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RESOLVED_COLUMNS} FROM records r
           LEFT JOIN supersessions s ON s.old_record_id = r.record_id
           WHERE r.document_id = ?1
           ORDER BY r.transaction_time"
        ))?;
        let rows = stmt
          .query_map([document_id], RawResolvedRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawResolvedRecord::into_resolved)
      .collect()
  }

  async fn document_exists<'a>(&'a self, document_id: &'a DocumentId) -> Result<bool> {
    let document_id = document_id.as_str().to_owned();
    let exists = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS (SELECT 1 FROM records WHERE document_id = ?1)",
          [document_id],
          |r| r.get(0),
        )?)
      })
      .await?;
    Ok(exists)
  }

  async fn search_candidates<'a>(
    &'a self,
    query: &'a CandidateQuery,
  ) -> Result<Vec<TemporalRecord>> {
    let jurisdictions = serde_json::to_string(&query.jurisdictions())?;
    let transaction_time = encode_dt(query.transaction_time);
    let valid_time = encode_date(query.valid_time);
    let document_type = query.document_type.map(|t| t.as_ref().to_owned());
    let text = query
      .text
      .as_deref()
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .map(like_pattern);
    let citation = query.citation.clone();
    let after = query.after.as_ref().map(|d| d.as_str().to_owned());
    let limit = to_sql_limit(query.limit as u64);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          r"SELECT {RECORD_COLUMNS} FROM records r
            WHERE r.jurisdiction IN (SELECT value FROM json_each(?1))
              AND r.transaction_time <= ?2
              AND r.valid_from <= ?3
              AND COALESCE(r.valid_to, '9999-12-31') >= ?3
              AND NOT EXISTS (
                SELECT 1 FROM supersessions s
                WHERE s.old_record_id = r.record_id
                  AND s.transaction_time <= ?2
              )
              AND (?4 IS NULL OR r.document_type = ?4)
              AND (?5 IS NULL OR r.search_text LIKE ?5 ESCAPE '\')
              AND (?6 IS NULL OR r.canonical_citation = ?6)
              AND (?7 IS NULL OR r.document_id > ?7)
            ORDER BY r.document_id
            LIMIT ?8"
        ))?;
        let rows = stmt
          .query_map(
            params![
              jurisdictions,
              transaction_time,
              valid_time,
              document_type,
              text,
              citation,
              after,
              limit,
            ],
            RawRecord::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    debug!(rows = raws.len(), "candidate page fetched");
    raws.into_iter().map(RawRecord::into_record).collect()
  }
}

// ─── CitationStore impl ──────────────────────────────────────────────────────

impl CitationStore for SqliteStore {
  type Error = Error;

  async fn add_edge(&self, edge: NewEdge) -> Result<CitationEdge> {
    let row = EdgeRow::from(&edge);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let recorded_at = next_transaction_time(&tx)?;
        let raw = match insert_edge(&tx, &row, &recorded_at)? {
          Ok(raw) => raw,
          Err(e) => return Ok(Err(e)),
        };
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    let edge = raw.into_edge()?;
    info!(
      sequence = edge.sequence,
      source = %edge.source,
      relation = %edge.relation,
      target = %edge.target,
      "citation edge recorded"
    );
    Ok(edge)
  }

  async fn add_edges(&self, edges: Vec<NewEdge>) -> Result<Vec<CitationEdge>> {
    if edges.is_empty() {
      return Ok(Vec::new());
    }
    let rows: Vec<EdgeRow> = edges.iter().map(EdgeRow::from).collect();

    let raws = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let recorded_at = next_transaction_time(&tx)?;
        let mut raws = Vec::with_capacity(rows.len());
        for row in &rows {
          match insert_edge(&tx, row, &recorded_at)? {
            Ok(raw) => raws.push(raw),
            Err(e) => return Ok(Err(e)),
          }
        }
        tx.commit()?;
        Ok(Ok(raws))
      })
      .await??;

    let edges = raws
      .into_iter()
      .map(RawEdge::into_edge)
      .collect::<Result<Vec<_>>>()?;
    info!(count = edges.len(), "citation edge batch committed");
    Ok(edges)
  }

  async fn edges_for<'a>(
    &'a self,
    document_id: &'a DocumentId,
    upto: Option<u64>,
  ) -> Result<Vec<CitationEdge>> {
    let document_id = document_id.as_str().to_owned();
    let upto = upto.map_or(i64::MAX, to_sql_limit);

    let raws: Vec<RawEdge> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {EDGE_COLUMNS} FROM citation_edges
           WHERE (source_document_id = ?1 OR target_document_id = ?1)
             AND sequence <= ?2
           ORDER BY sequence"
        ))?;
        let rows = stmt
          .query_map(params![document_id, upto], RawEdge::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEdge::into_edge).collect()
  }

  async fn graph_revision(&self) -> Result<u64> {
    let revision: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COALESCE(MAX(sequence), 0) FROM citation_edges",
          [],
          |r| r.get(0),
        )?)
      })
      .await?;
    u64::try_from(revision)
      .map_err(|_| Error::Decode(format!("negative revision {revision}")))
  }

  async fn revision_at(&self, transaction_time: DateTime<Utc>) -> Result<u64> {
    let transaction_time = encode_dt(transaction_time);
    let revision: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COALESCE(MAX(sequence), 0) FROM citation_edges
           WHERE recorded_at <= ?1",
          [transaction_time],
          |r| r.get(0),
        )?)
      })
      .await?;
    u64::try_from(revision)
      .map_err(|_| Error::Decode(format!("negative revision {revision}")))
  }

  async fn revision<'a>(
    &'a self,
    document_ids: &'a [DocumentId],
    upto: Option<u64>,
  ) -> Result<u64> {
    let ids = serde_json::to_string(document_ids)?;
    let upto = upto.map_or(i64::MAX, to_sql_limit);
    let revision: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COALESCE(MAX(sequence), 0) FROM citation_edges
           WHERE (source_document_id IN (SELECT value FROM json_each(?1))
              OR target_document_id IN (SELECT value FROM json_each(?1)))
             AND sequence <= ?2",
          params![ids, upto],
          |r| r.get(0),
        )?)
      })
      .await?;
    u64::try_from(revision)
      .map_err(|_| Error::Decode(format!("negative revision {revision}")))
  }

  async fn citation_counts<'a>(
    &'a self,
    document_ids: &'a [DocumentId],
    as_of: NaiveDate,
    upto: Option<u64>,
  ) -> Result<HashMap<DocumentId, u64>> {
    let ids = serde_json::to_string(document_ids)?;
    let as_of = encode_date(as_of);
    let upto = upto.map_or(i64::MAX, to_sql_limit);

    let rows: Vec<(String, i64)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT target_document_id, COUNT(*) FROM citation_edges
           WHERE target_document_id IN (SELECT value FROM json_each(?1))
             AND relation != 'superseded_by'
             AND effective_date <= ?2
             AND sequence <= ?3
           GROUP BY target_document_id",
        )?;
        let rows = stmt
          .query_map(params![ids, as_of, upto], |r| Ok((r.get(0)?, r.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      rows
        .into_iter()
        .map(|(id, count)| (DocumentId::new(id), count.max(0) as u64))
        .collect(),
    )
  }
}

// ─── LegalStore impl ─────────────────────────────────────────────────────────

impl LegalStore for SqliteStore {
  async fn ingest_unit(
    &self,
    unit: IngestionUnit,
  ) -> Result<(TemporalRecord, Vec<CitationEdge>)> {
    let IngestionUnit {
      record,
      source_edges,
    } = unit;
    record.validate()?;
    let record_id = Uuid::new_v4();
    let row =
      RecordRow::new(record_id, &record.document, record.valid_from, record.valid_to)?;
    let edge_rows: Vec<EdgeRow> = source_edges.iter().map(EdgeRow::from).collect();

    let (transaction_time, raws) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Some(existing) = find_overlap(&tx, &row, None)? {
          return Ok(Err(overlap_error(&row.document_id, &existing)));
        }
        let transaction_time = next_transaction_time(&tx)?;
        insert_record(&tx, &row, &transaction_time, None)?;

        let mut raws = Vec::with_capacity(edge_rows.len());
        for edge in &edge_rows {
          match insert_edge(&tx, edge, &transaction_time)? {
            Ok(raw) => raws.push(raw),
            Err(e) => return Ok(Err(e)),
          }
        }
        tx.commit()?;
        Ok(Ok((transaction_time, raws)))
      })
      .await??;

    let edges = raws
      .into_iter()
      .map(RawEdge::into_edge)
      .collect::<Result<Vec<_>>>()?;
    info!(
      %record_id,
      document_id = %record.document.document_id,
      edges = edges.len(),
      "ingestion unit committed"
    );

    let record = TemporalRecord {
      record_id,
      document: record.document,
      valid_from: record.valid_from,
      valid_to: record.valid_to,
      transaction_time: decode_dt(&transaction_time)?,
      supersedes: None,
    };
    Ok((record, edges))
  }
}
