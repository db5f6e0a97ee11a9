//! Encoding and decoding helpers between Dossier domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are fixed-width RFC 3339 strings so they order correctly as
//! text. Attribute maps and overlay fields are stored as compact JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dossier_core::{
  enrichment::EnrichmentTask,
  record::{Attributes, Overlay, Record, RecordKind, format_timestamp},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { format_timestamp(dt) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── RecordKind ──────────────────────────────────────────────────────────────

pub fn encode_kind(kind: RecordKind) -> &'static str {
  match kind {
    RecordKind::Person => "person",
    RecordKind::Company => "company",
  }
}

pub fn decode_kind(s: &str) -> Result<RecordKind> {
  s.parse().map_err(|_| Error::UnknownKind(s.to_owned()))
}

/// Column holding the unique key for `kind`.
pub fn key_column(kind: RecordKind) -> &'static str { kind.key_field() }

// ─── JSON documents ──────────────────────────────────────────────────────────

pub fn encode_attributes(attributes: &Attributes) -> Result<String> {
  Ok(serde_json::to_string(attributes)?)
}

pub fn decode_attributes(s: &str) -> serde_json::Result<Attributes> {
  serde_json::from_str(s)
}

pub fn encode_task(task: &EnrichmentTask) -> Result<String> {
  Ok(serde_json::to_string(task)?)
}

pub fn decode_task(s: &str) -> Result<EnrichmentTask> {
  Ok(serde_json::from_str(s)?)
}

/// SQLite JSON path for a dotted field name, every segment quoted:
/// `employment.title` becomes `$."employment"."title"`.
pub fn json_path(field: &str) -> String {
  field.split('.').fold(String::from("$"), |mut path, segment| {
    path.push_str(".\"");
    path.push_str(segment);
    path.push('"');
    path
  })
}

/// Surface a JSON failure from inside a connection closure.
pub fn json_err(err: serde_json::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(err))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `records` row plus its overlays.
pub struct RawRecord {
  pub record_id:        String,
  pub kind:             String,
  pub email:            Option<String>,
  pub domain:           Option<String>,
  pub attributes:       String,
  pub last_enriched_at: Option<String>,
  pub created_at:       String,
  pub overlays:         Vec<RawOverlay>,
}

/// Raw strings read from an `overlays` row.
pub struct RawOverlay {
  pub account_id: String,
  pub fields:     String,
}

impl RawRecord {
  pub fn into_record(self) -> Result<Record> {
    let kind = decode_kind(&self.kind)?;
    let key = match kind {
      RecordKind::Person => self.email,
      RecordKind::Company => self.domain,
    }
    .ok_or_else(|| Error::Corrupt {
      id:     self.record_id.clone(),
      reason: format!("missing {}", kind.key_field()),
    })?;

    let mut overlays = BTreeMap::new();
    for raw in self.overlays {
      let fields = decode_attributes(&raw.fields)?;
      overlays.insert(raw.account_id.clone(), Overlay {
        account_id: raw.account_id,
        fields,
      });
    }

    Ok(Record {
      id: self.record_id,
      kind,
      key,
      attributes: decode_attributes(&self.attributes)?,
      last_enriched_at: self
        .last_enriched_at
        .as_deref()
        .map(decode_dt)
        .transpose()?,
      created_at: decode_dt(&self.created_at)?,
      overlays,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn json_path_quotes_each_segment() {
    assert_eq!(json_path("salary"), "$.\"salary\"");
    assert_eq!(json_path("employment.title"), "$.\"employment\".\"title\"");
  }

  #[test]
  fn timestamps_roundtrip_and_sort() {
    use chrono::SubsecRound as _;

    let earlier = Utc::now().trunc_subsecs(6);
    let later = earlier + chrono::TimeDelta::milliseconds(1500);

    assert_eq!(decode_dt(&encode_dt(earlier)).unwrap(), earlier);
    assert!(encode_dt(earlier) < encode_dt(later));
  }

  #[test]
  fn unknown_kind_is_rejected() {
    assert!(matches!(decode_kind("group"), Err(Error::UnknownKind(_))));
    assert_eq!(
      decode_kind(encode_kind(RecordKind::Company)).unwrap(),
      RecordKind::Company
    );
  }
}
