//! SQL schema for the Dossier SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Global person and company records. Exactly one of email/domain is set,
-- matching the kind, and each is unique across its kind.
CREATE TABLE IF NOT EXISTS records (
    record_id        TEXT PRIMARY KEY,
    kind             TEXT NOT NULL,          -- 'person' | 'company'
    email            TEXT UNIQUE,
    domain           TEXT UNIQUE,
    attributes       TEXT NOT NULL DEFAULT '{}',
    last_enriched_at TEXT,                   -- NULL until first enrichment
    created_at       TEXT NOT NULL,
    CHECK ((kind = 'person'  AND email  IS NOT NULL AND domain IS NULL)
        OR (kind = 'company' AND domain IS NOT NULL AND email  IS NULL))
);

-- Per-account overrides. One row per (record, account); writes update the
-- row in place, so rowid order is first-write order.
CREATE TABLE IF NOT EXISTS overlays (
    record_id  TEXT NOT NULL REFERENCES records(record_id),
    account_id TEXT NOT NULL,
    fields     TEXT NOT NULL DEFAULT '{}',
    updated_at TEXT NOT NULL,
    PRIMARY KEY (record_id, account_id)
);

-- Durable enrichment queue. A claimed task has available_at pushed out by
-- its lease and is deleted once it completes.
CREATE TABLE IF NOT EXISTS enrichment_tasks (
    task_id      TEXT PRIMARY KEY,
    payload      TEXT NOT NULL,   -- JSON-encoded EnrichmentTask
    attempt      INTEGER NOT NULL,
    available_at TEXT NOT NULL,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS tasks_available_idx ON enrichment_tasks(available_at);

PRAGMA user_version = 1;
";
