//! [`SqliteStore`]: the SQLite implementation of [`ProfileStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};

use dossier_core::{
  query::{Page, Predicate},
  record::{Attributes, Record, merge_fields},
  store::{Insert, ProfileStore},
};

use crate::{
  Result,
  encode::{
    RawOverlay, RawRecord, decode_attributes, encode_attributes, encode_dt,
    encode_kind, json_err, key_column,
  },
  schema::SCHEMA,
  sql::{RECORD_COLUMNS, select_matching},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Dossier profile store and task queue backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
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

  /// Fetch one record by an equality match on `column`.
  async fn find_where(
    &self,
    column: &'static str,
    value: &str,
  ) -> Result<Option<Record>> {
    let value = value.to_owned();

    let raw = self
      .conn
      .call(move |conn| Ok(fetch_one(conn, column, &value)?))
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

fn read_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
  Ok(RawRecord {
    record_id:        row.get(0)?,
    kind:             row.get(1)?,
    email:            row.get(2)?,
    domain:           row.get(3)?,
    attributes:       row.get(4)?,
    last_enriched_at: row.get(5)?,
    created_at:       row.get(6)?,
    overlays:         Vec::new(),
  })
}

fn load_overlays(
  conn: &rusqlite::Connection,
  raw: &mut RawRecord,
) -> rusqlite::Result<()> {
  let mut stmt = conn.prepare_cached(
    "SELECT account_id, fields FROM overlays WHERE record_id = ?1 ORDER BY rowid",
  )?;
  raw.overlays = stmt
    .query_map(rusqlite::params![raw.record_id], |row| {
      Ok(RawOverlay { account_id: row.get(0)?, fields: row.get(1)? })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(())
}

fn fetch_one(
  conn: &rusqlite::Connection,
  column: &str,
  value: &str,
) -> rusqlite::Result<Option<RawRecord>> {
  let sql =
    format!("SELECT {RECORD_COLUMNS} FROM records r WHERE r.{column} = ?1");

  let raw = conn
    .query_row(&sql, rusqlite::params![value], read_record)
    .optional()?;

  match raw {
    Some(mut raw) => {
      load_overlays(conn, &mut raw)?;
      Ok(Some(raw))
    }
    None => Ok(None),
  }
}

/// What `insert_record` found inside its transaction.
enum RawInsert {
  Created(RawRecord),
  KeyTaken(RawRecord),
  IdTaken,
}

// ─── ProfileStore impl ───────────────────────────────────────────────────────

impl ProfileStore for SqliteStore {
  type Error = crate::Error;

  async fn find_by_email(&self, email: &str) -> Result<Option<Record>> {
    self.find_where("email", email).await
  }

  async fn find_by_domain(&self, domain: &str) -> Result<Option<Record>> {
    self.find_where("domain", domain).await
  }

  async fn find_by_id(&self, id: &str) -> Result<Option<Record>> {
    self.find_where("record_id", id).await
  }

  async fn id_exists(&self, id: &str) -> Result<bool> {
    let id = id.to_owned();

    let exists = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM records WHERE record_id = ?1",
              rusqlite::params![id],
              |_| Ok(()),
            )
            .optional()?
            .is_some(),
        )
      })
      .await?;

    Ok(exists)
  }

  async fn insert_record(&self, record: Record) -> Result<Insert> {
    let key_col        = key_column(record.kind);
    let id             = record.id.clone();
    let key            = record.key.clone();
    let kind_str       = encode_kind(record.kind);
    let attributes_str = encode_attributes(&record.attributes)?;
    let enriched_str   = record.last_enriched_at.map(encode_dt);
    let created_str    = encode_dt(record.created_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let id_taken = tx
          .query_row(
            "SELECT 1 FROM records WHERE record_id = ?1",
            rusqlite::params![id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if id_taken {
          return Ok(RawInsert::IdTaken);
        }

        if let Some(existing) = fetch_one(&tx, key_col, &key)? {
          return Ok(RawInsert::KeyTaken(existing));
        }

        let sql = format!(
          "INSERT INTO records (
             record_id, kind, {key_col}, attributes, last_enriched_at, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        );
        tx.execute(
          &sql,
          rusqlite::params![
            id,
            kind_str,
            key,
            attributes_str,
            enriched_str,
            created_str,
          ],
        )?;

        let created = fetch_one(&tx, "record_id", &id)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(RawInsert::Created(created))
      })
      .await?;

    Ok(match outcome {
      RawInsert::Created(raw) => Insert::Created(raw.into_record()?),
      RawInsert::KeyTaken(raw) => Insert::KeyTaken(raw.into_record()?),
      RawInsert::IdTaken => Insert::IdTaken,
    })
  }

  async fn merge_attributes(
    &self,
    id: &str,
    data: Attributes,
    enriched_at: Option<DateTime<Utc>>,
  ) -> Result<Option<Record>> {
    let id           = id.to_owned();
    let enriched_str = enriched_at.map(encode_dt);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<String> = tx
          .query_row(
            "SELECT attributes FROM records WHERE record_id = ?1",
            rusqlite::params![id],
            |row| row.get(0),
          )
          .optional()?;
        let Some(current) = current else {
          return Ok(None);
        };

        let mut attributes = decode_attributes(&current).map_err(json_err)?;
        merge_fields(&mut attributes, data);
        let merged = serde_json::to_string(&attributes).map_err(json_err)?;

        tx.execute(
          "UPDATE records
             SET attributes = ?2,
                 last_enriched_at = COALESCE(?3, last_enriched_at)
           WHERE record_id = ?1",
          rusqlite::params![id, merged, enriched_str],
        )?;

        let updated = fetch_one(&tx, "record_id", &id)?;
        tx.commit()?;
        Ok(updated)
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn merge_overlay(
    &self,
    id: &str,
    account_id: &str,
    data: Attributes,
  ) -> Result<Option<Record>> {
    let id         = id.to_owned();
    let account_id = account_id.to_owned();
    let now_str    = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM records WHERE record_id = ?1",
            rusqlite::params![id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }

        let current: Option<String> = tx
          .query_row(
            "SELECT fields FROM overlays WHERE record_id = ?1 AND account_id = ?2",
            rusqlite::params![id, account_id],
            |row| row.get(0),
          )
          .optional()?;

        let mut fields = match current {
          Some(s) => decode_attributes(&s).map_err(json_err)?,
          None => Attributes::new(),
        };
        merge_fields(&mut fields, data);
        let fields_str = serde_json::to_string(&fields).map_err(json_err)?;

        tx.execute(
          "INSERT INTO overlays (record_id, account_id, fields, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (record_id, account_id)
           DO UPDATE SET fields = excluded.fields, updated_at = excluded.updated_at",
          rusqlite::params![id, account_id, fields_str, now_str],
        )?;

        let updated = fetch_one(&tx, "record_id", &id)?;
        tx.commit()?;
        Ok(updated)
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn run_query(
    &self,
    predicate: &Predicate,
    page: &Page,
  ) -> Result<Vec<Record>> {
    let query = select_matching(predicate, page);

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&query.sql)?;
        let mut rows = stmt
          .query_map(rusqlite::params_from_iter(query.params.iter()), read_record)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        for raw in &mut rows {
          load_overlays(conn, raw)?;
        }
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}
