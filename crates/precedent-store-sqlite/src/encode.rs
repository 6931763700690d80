//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Transaction times are stored as fixed-width RFC 3339 strings with
//! microsecond precision, so lexical order equals chronological order. Valid
//! dates are stored as `YYYY-MM-DD`. Document content is stored as compact
//! JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use precedent_core::{
  citation::{CitationEdge, NewEdge},
  document::{DocumentContent, DocumentId, DocumentType, LegalDocument},
  temporal::{RecordStatus, ResolvedRecord, TemporalRecord},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_enum<T: std::str::FromStr>(what: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub fn like_pattern(text: &str) -> String {
  let mut escaped = String::with_capacity(text.len() + 2);
  escaped.push('%');
  for c in text.to_lowercase().chars() {
    if matches!(c, '%' | '_' | '\\') {
      escaped.push('\\');
    }
    escaped.push(c);
  }
  escaped.push('%');
  escaped
}

// ─── Write rows ──────────────────────────────────────────────────────────────

/// Owned column values for one `records` insert, minus the transaction time
/// which is assigned inside the write transaction.
pub struct RecordRow {
  pub record_id:          String,
  pub document_id:        String,
  pub jurisdiction:       String,
  pub document_type:      String,
  pub canonical_citation: String,
  pub title:              String,
  pub content_json:       String,
  pub content_hash:       String,
  pub search_text:        String,
  pub valid_from:         String,
  pub valid_to:           Option<String>,
}

impl RecordRow {
  pub fn new(
    record_id: Uuid,
    document: &LegalDocument,
    valid_from: NaiveDate,
    valid_to: Option<NaiveDate>,
  ) -> Result<Self> {
    let search_text = format!(
      "{}\n{}\n{}",
      document.title,
      document.canonical_citation,
      document.content.plain_text()
    )
    .to_lowercase();

    Ok(Self {
      record_id: encode_uuid(record_id),
      document_id: document.document_id.as_str().to_owned(),
      jurisdiction: document.jurisdiction.clone(),
      document_type: document.document_type.as_ref().to_owned(),
      canonical_citation: document.canonical_citation.clone(),
      title: document.title.clone(),
      content_json: serde_json::to_string(&document.content)?,
      content_hash: document.content_hash.clone(),
      search_text,
      valid_from: encode_date(valid_from),
      valid_to: valid_to.map(encode_date),
    })
  }
}

/// Owned column values for one `citation_edges` insert.
pub struct EdgeRow {
  pub source:         String,
  pub target:         String,
  pub relation:       String,
  pub effective_date: String,
  pub scope:          String,
  pub authority:      i64,
}

impl From<&NewEdge> for EdgeRow {
  fn from(edge: &NewEdge) -> Self {
    Self {
      source:         edge.source.as_str().to_owned(),
      target:         edge.target.as_str().to_owned(),
      relation:       edge.relation.as_ref().to_owned(),
      effective_date: encode_date(edge.effective_date),
      scope:          edge.scope.as_ref().to_owned(),
      authority:      i64::from(edge.authority),
    }
  }
}

// ─── Read rows ───────────────────────────────────────────────────────────────

/// Column list matching [`RawRecord::from_row`]; `r` aliases `records`.
pub const RECORD_COLUMNS: &str = "r.record_id, r.document_id, r.jurisdiction, \
  r.document_type, r.canonical_citation, r.title, r.content_json, \
  r.content_hash, r.valid_from, r.valid_to, r.transaction_time, r.supersedes";

/// Raw strings read directly from a `records` row.
pub struct RawRecord {
  pub record_id:          String,
  pub document_id:        String,
  pub jurisdiction:       String,
  pub document_type:      String,
  pub canonical_citation: String,
  pub title:              String,
  pub content_json:       String,
  pub content_hash:       String,
  pub valid_from:         String,
  pub valid_to:           Option<String>,
  pub transaction_time:   String,
  pub supersedes:         Option<String>,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:          row.get(0)?,
      document_id:        row.get(1)?,
      jurisdiction:       row.get(2)?,
      document_type:      row.get(3)?,
      canonical_citation: row.get(4)?,
      title:              row.get(5)?,
      content_json:       row.get(6)?,
      content_hash:       row.get(7)?,
      valid_from:         row.get(8)?,
      valid_to:           row.get(9)?,
      transaction_time:   row.get(10)?,
      supersedes:         row.get(11)?,
    })
  }

  pub fn into_record(self) -> Result<TemporalRecord> {
    let content: DocumentContent = serde_json::from_str(&self.content_json)?;
    let document = LegalDocument {
      document_id: DocumentId::new(self.document_id),
      jurisdiction: self.jurisdiction,
      document_type: decode_enum::<DocumentType>(
        "document type",
        &self.document_type,
      )?,
      canonical_citation: self.canonical_citation,
      title: self.title,
      content,
      content_hash: self.content_hash,
    };

    Ok(TemporalRecord {
      record_id: decode_uuid(&self.record_id)?,
      document,
      valid_from: decode_date(&self.valid_from)?,
      valid_to: self.valid_to.as_deref().map(decode_date).transpose()?,
      transaction_time: decode_dt(&self.transaction_time)?,
      supersedes: self.supersedes.as_deref().map(decode_uuid).transpose()?,
    })
  }
}

/// Column list matching [`RawResolvedRecord::from_row`]; expects
/// `supersessions s` left-joined on `s.old_record_id = r.record_id`.
pub const RESOLVED_COLUMNS: &str = "r.record_id, r.document_id, \
  r.jurisdiction, r.document_type, r.canonical_citation, r.title, \
  r.content_json, r.content_hash, r.valid_from, r.valid_to, \
  r.transaction_time, r.supersedes, s.new_record_id, s.transaction_time";

/// A `records` row joined with its supersession, if any.
pub struct RawResolvedRecord {
  pub record:        RawRecord,
  pub superseded_by: Option<String>,
  pub superseded_at: Option<String>,
}

impl RawResolvedRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record:        RawRecord::from_row(row)?,
      superseded_by: row.get(12)?,
      superseded_at: row.get(13)?,
    })
  }

  pub fn into_resolved(self) -> Result<ResolvedRecord> {
    let status = if let (Some(by), Some(at)) =
      (self.superseded_by, self.superseded_at)
    {
      RecordStatus::Superseded {
        by: decode_uuid(&by)?,
        at: decode_dt(&at)?,
      }
    } else {
      RecordStatus::Current
    };
    Ok(ResolvedRecord {
      record: self.record.into_record()?,
      status,
    })
  }
}

pub const EDGE_COLUMNS: &str = "sequence, source_document_id, \
  target_document_id, relation, effective_date, scope, authority, recorded_at";

/// Raw values read directly from a `citation_edges` row.
pub struct RawEdge {
  pub sequence:       i64,
  pub source:         String,
  pub target:         String,
  pub relation:       String,
  pub effective_date: String,
  pub scope:          String,
  pub authority:      i64,
  pub recorded_at:    String,
}

impl RawEdge {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      sequence:       row.get(0)?,
      source:         row.get(1)?,
      target:         row.get(2)?,
      relation:       row.get(3)?,
      effective_date: row.get(4)?,
      scope:          row.get(5)?,
      authority:      row.get(6)?,
      recorded_at:    row.get(7)?,
    })
  }

  pub fn into_edge(self) -> Result<CitationEdge> {
    Ok(CitationEdge {
      sequence:       u64::try_from(self.sequence)
        .map_err(|_| Error::Decode(format!("negative sequence {}", self.sequence)))?,
      source:         DocumentId::new(self.source),
      target:         DocumentId::new(self.target),
      relation:       decode_enum("relation", &self.relation)?,
      effective_date: decode_date(&self.effective_date)?,
      scope:          decode_enum("edge scope", &self.scope)?,
      authority:      u8::try_from(self.authority)
        .map_err(|_| Error::Decode(format!("authority {}", self.authority)))?,
      recorded_at:    decode_dt(&self.recorded_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_ordered() {
    let a: DateTime<Utc> = "2024-01-01T00:00:00Z".parse().unwrap();
    let b = a + chrono::Duration::microseconds(1);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea, "2024-01-01T00:00:00.000000Z");
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn edge_columns_match_the_decoded_names() {
    use precedent_core::citation::{EdgeScope, RelationKind};

    let new = NewEdge::new(
      "B",
      RelationKind::SupersededBy,
      "A",
      "2020-01-01".parse().unwrap(),
    )
    .partial();
    let row = EdgeRow::from(&new);
    assert_eq!(row.relation, "superseded_by");
    assert_eq!(row.scope, "partial");
    assert_eq!(row.effective_date, "2020-01-01");

    let raw = RawEdge {
      sequence:       1,
      source:         row.source,
      target:         row.target,
      relation:       row.relation,
      effective_date: row.effective_date,
      scope:          row.scope,
      authority:      row.authority,
      recorded_at:    "2024-01-01T00:00:00.000000Z".into(),
    };
    let edge = raw.into_edge().unwrap();
    assert_eq!(edge.relation, RelationKind::SupersededBy);
    assert_eq!(edge.scope, EdgeScope::Partial);
  }

  #[test]
  fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("50%_Off"), "%50\\%\\_off%");
  }
}
