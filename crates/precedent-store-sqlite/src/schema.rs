//! SQL schema for the Precedent SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Records are strictly append-only.
-- No UPDATE or DELETE is ever issued against any table in this schema.
CREATE TABLE IF NOT EXISTS records (
    record_id          TEXT PRIMARY KEY,
    document_id        TEXT NOT NULL,
    jurisdiction       TEXT NOT NULL,
    document_type      TEXT NOT NULL,
    canonical_citation TEXT NOT NULL,
    title              TEXT NOT NULL DEFAULT '',
    content_json       TEXT NOT NULL,   -- JSON DocumentContent
    content_hash       TEXT NOT NULL,   -- hex SHA-256 of content_json
    search_text        TEXT NOT NULL,   -- lowercased title, citation and text
    valid_from         TEXT NOT NULL,   -- YYYY-MM-DD, inclusive
    valid_to           TEXT,            -- YYYY-MM-DD, inclusive; NULL = open
    transaction_time   TEXT NOT NULL,   -- RFC 3339 UTC, microseconds
    supersedes         TEXT REFERENCES records(record_id),
    UNIQUE (document_id, valid_from, transaction_time)
);

-- A record replaced by a corrected version. The UNIQUE constraint is the
-- compare-and-set: a record loses its live status exactly once.
CREATE TABLE IF NOT EXISTS supersessions (
    supersession_id  TEXT PRIMARY KEY,
    old_record_id    TEXT NOT NULL REFERENCES records(record_id),
    new_record_id    TEXT NOT NULL REFERENCES records(record_id),
    transaction_time TEXT NOT NULL,
    UNIQUE (old_record_id),
    CHECK  (old_record_id != new_record_id)
);

-- Citation edges. `sequence` is the append order and the graph revision.
CREATE TABLE IF NOT EXISTS citation_edges (
    sequence           INTEGER PRIMARY KEY AUTOINCREMENT,
    source_document_id TEXT NOT NULL,
    target_document_id TEXT NOT NULL,
    relation           TEXT NOT NULL,
    effective_date     TEXT NOT NULL,
    scope              TEXT NOT NULL DEFAULT 'full',
    authority          INTEGER NOT NULL DEFAULT 0,
    recorded_at        TEXT NOT NULL,
    UNIQUE (source_document_id, target_document_id, relation, effective_date)
);

CREATE INDEX IF NOT EXISTS records_document_idx     ON records(document_id);
CREATE INDEX IF NOT EXISTS records_transaction_idx  ON records(transaction_time);
CREATE INDEX IF NOT EXISTS records_jurisdiction_idx ON records(jurisdiction, document_id);
CREATE INDEX IF NOT EXISTS edges_source_idx ON citation_edges(source_document_id, effective_date);
CREATE INDEX IF NOT EXISTS edges_target_idx ON citation_edges(target_document_id, effective_date);

PRAGMA user_version = 1;
";
