//! Records, the global person/company profiles, and their per-account
//! overlays.
//!
//! A record holds the base attributes shared by every account. An overlay is
//! a fragment of fields one account has customised; it wins over the base
//! attributes in that account's combined view and is invisible to every
//! other account.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Open field mapping used for base attributes and overlay fragments.
pub type Attributes = serde_json::Map<String, Value>;

/// Fields that must never surface in a combined view.
const HIDDEN_FIELDS: [&str; 2] = ["overlays", "account_id"];

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Whether a record describes a person (keyed by email) or a company (keyed
/// by domain).
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecordKind {
  Person,
  Company,
}

impl RecordKind {
  /// Name of the unique key field for this kind.
  pub fn key_field(self) -> &'static str {
    match self {
      Self::Person => "email",
      Self::Company => "domain",
    }
  }
}

// ─── Overlay ─────────────────────────────────────────────────────────────────

/// Account-specific field overrides attached to a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
  pub account_id: String,
  pub fields:     Attributes,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A global person or company profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  /// Assigned at creation; never changes.
  pub id:               String,
  pub kind:             RecordKind,
  /// The email (person) or domain (company); unique per kind.
  pub key:              String,
  pub attributes:       Attributes,
  /// `None` until the first successful enrichment.
  pub last_enriched_at: Option<DateTime<Utc>>,
  pub created_at:       DateTime<Utc>,
  /// At most one overlay per account, keyed by account id.
  pub overlays:         BTreeMap<String, Overlay>,
}

impl Record {
  /// A fresh, never-enriched record with no attributes or overlays.
  pub fn new(
    id: impl Into<String>,
    kind: RecordKind,
    key: impl Into<String>,
    created_at: DateTime<Utc>,
  ) -> Self {
    Self {
      id: id.into(),
      kind,
      key: key.into(),
      attributes: Attributes::new(),
      last_enriched_at: None,
      created_at,
      overlays: BTreeMap::new(),
    }
  }

  pub fn is_company(&self) -> bool { self.kind == RecordKind::Company }

  pub fn overlay(&self, account_id: &str) -> Option<&Overlay> {
    self.overlays.get(account_id)
  }

  /// The record as seen by `account_id`: base attributes, then the primary
  /// key field and enrichment timestamp, then that account's overlay on top.
  /// The record id always reflects the record itself.
  pub fn combined(&self, account_id: Option<&str>) -> CombinedView {
    let mut view = self.attributes.clone();

    view.insert(
      self.kind.key_field().to_owned(),
      Value::String(self.key.clone()),
    );
    if let Some(at) = self.last_enriched_at {
      view.insert(
        "last_enriched_at".to_owned(),
        Value::String(format_timestamp(at)),
      );
    }

    if let Some(overlay) = account_id.and_then(|a| self.overlay(a)) {
      merge_fields(&mut view, overlay.fields.clone());
    }

    for field in HIDDEN_FIELDS {
      view.remove(field);
    }
    view.insert("id".to_owned(), Value::String(self.id.clone()));

    CombinedView(view)
  }
}

/// Fixed-width RFC 3339 in UTC, so formatted timestamps sort as strings.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Shallow merge: every top-level key in `data` replaces the one in
/// `target`; keys absent from `data` are kept.
pub fn merge_fields(target: &mut Attributes, data: Attributes) {
  for (key, value) in data {
    target.insert(key, value);
  }
}

// ─── Views ───────────────────────────────────────────────────────────────────

/// A record flattened for one account; the only shape handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombinedView(pub Attributes);

impl CombinedView {
  pub fn get(&self, field: &str) -> Option<&Value> { self.0.get(field) }

  pub fn id(&self) -> Option<&str> { self.get("id").and_then(Value::as_str) }

  /// The email visible to this account, which an overlay may have replaced.
  pub fn email(&self) -> Option<&str> {
    self.get("email").and_then(Value::as_str)
  }
}

/// A person and their company as seen by one account. Either side may be
/// absent: domain lookups carry no person, and a person's company record may
/// not exist yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombinedProfile {
  pub person:  Option<CombinedView>,
  pub company: Option<CombinedView>,
}

/// Outcome of registering an email.
#[derive(Debug, Clone)]
pub struct Registration {
  pub person:  Record,
  pub company: Option<Record>,
  /// `true` only when the person record itself was created by this call.
  pub is_new:  bool,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn person() -> Record {
    let mut record =
      Record::new("p1", RecordKind::Person, "jo@example.com", Utc::now());
    record.attributes.insert("occupation".into(), json!("Engineer"));
    record.attributes.insert("salary".into(), json!(70000));
    record
  }

  fn with_overlay(mut record: Record, account: &str, fields: Value) -> Record {
    let Value::Object(fields) = fields else {
      panic!("overlay fields must be an object")
    };
    record.overlays.insert(
      account.into(),
      Overlay { account_id: account.into(), fields },
    );
    record
  }

  #[test]
  fn combined_without_overlay_is_base() {
    let view = person().combined(Some("A1"));
    assert_eq!(view.get("occupation"), Some(&json!("Engineer")));
    assert_eq!(view.email(), Some("jo@example.com"));
    assert_eq!(view.id(), Some("p1"));
    assert!(view.get("last_enriched_at").is_none());
  }

  #[test]
  fn overlay_wins_field_by_field() {
    let record =
      with_overlay(person(), "A1", json!({ "salary": 90000, "title": "Lead" }));

    let view = record.combined(Some("A1"));
    assert_eq!(view.get("salary"), Some(&json!(90000)));
    assert_eq!(view.get("title"), Some(&json!("Lead")));
    assert_eq!(view.get("occupation"), Some(&json!("Engineer")));
  }

  #[test]
  fn other_accounts_do_not_see_overlay() {
    let record = with_overlay(person(), "A1", json!({ "salary": 90000 }));

    assert_eq!(record.combined(Some("A2")).get("salary"), Some(&json!(70000)));
    assert_eq!(record.combined(None).get("salary"), Some(&json!(70000)));
  }

  #[test]
  fn internal_fields_never_exposed() {
    let mut record = with_overlay(
      person(),
      "A1",
      json!({ "account_id": "A1", "id": "spoofed", "overlays": [] }),
    );
    record.attributes.insert("overlays".into(), json!(["stale"]));

    let view = record.combined(Some("A1"));
    assert!(view.get("overlays").is_none());
    assert!(view.get("account_id").is_none());
    assert_eq!(view.id(), Some("p1"));
  }

  #[test]
  fn overlay_may_replace_email() {
    let record = with_overlay(person(), "A1", json!({ "email": "jo@other.io" }));
    assert_eq!(record.combined(Some("A1")).email(), Some("jo@other.io"));
  }

  #[test]
  fn merge_fields_keeps_untouched_keys() {
    let mut target = Attributes::new();
    target.insert("a".into(), json!(1));
    target.insert("b".into(), json!(2));

    let mut data = Attributes::new();
    data.insert("b".into(), json!(3));
    data.insert("c".into(), json!(4));

    merge_fields(&mut target, data);
    assert_eq!(Value::Object(target), json!({ "a": 1, "b": 3, "c": 4 }));
  }
}
