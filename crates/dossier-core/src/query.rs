//! The filter-string compiler.
//!
//! A filter is a comma-separated list of conditions, each either
//! `field=value` or `field=op=value` with `op` one of `lt`, `gt`, `lte`,
//! `gte`. All conditions must hold together, either on a record's base
//! attributes or on the calling account's overlay. The two scopes are never
//! mixed within one branch.

use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;

use crate::{
  Error, Result,
  record::{Attributes, Record, format_timestamp},
};

/// Upper bound on records returned by one query page.
pub const PAGE_SIZE: usize = 25;

// ─── Operators and values ────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::AsRefStr, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Operator {
  /// Implied by the two-part `field=value` form; never spelled out.
  #[strum(disabled)]
  Eq,
  Lt,
  Gt,
  Lte,
  Gte,
}

impl Operator {
  fn accepts(self, ordering: Ordering) -> bool {
    match self {
      Self::Eq => ordering.is_eq(),
      Self::Lt => ordering.is_lt(),
      Self::Gt => ordering.is_gt(),
      Self::Lte => ordering.is_le(),
      Self::Gte => ordering.is_ge(),
    }
  }
}

/// A condition's right-hand side after coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
  Integer(i64),
  Float(f64),
  Text(String),
}

impl QueryValue {
  /// Integer if it parses as one, else float, else the raw text.
  pub fn coerce(raw: &str) -> Self {
    if let Ok(int) = raw.parse::<i64>() {
      Self::Integer(int)
    } else if let Ok(float) = raw.parse::<f64>() {
      Self::Float(float)
    } else {
      Self::Text(raw.to_owned())
    }
  }

  pub fn is_numeric(&self) -> bool { !matches!(self, Self::Text(_)) }

  /// Order a stored value against this one. Numbers only compare with
  /// numbers and strings with strings; any other pairing is unordered.
  fn compare(&self, stored: &Value) -> Option<Ordering> {
    match (stored, self) {
      (Value::Number(n), Self::Integer(q)) => match n.as_i64() {
        Some(i) => Some(i.cmp(q)),
        None => n.as_f64()?.partial_cmp(&(*q as f64)),
      },
      (Value::Number(n), Self::Float(q)) => n.as_f64()?.partial_cmp(q),
      (Value::String(s), Self::Text(q)) => Some(s.as_str().cmp(q.as_str())),
      _ => None,
    }
  }
}

// ─── Predicate ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
  /// Field name; dots address nested attributes (`employment.title`).
  pub field: String,
  pub op:    Operator,
  pub value: QueryValue,
}

impl Condition {
  pub fn path(&self) -> impl Iterator<Item = &str> { self.field.split('.') }

  fn holds(&self, stored: Option<&Value>) -> bool {
    stored
      .and_then(|v| self.value.compare(v))
      .is_some_and(|ordering| self.op.accepts(ordering))
  }
}

/// Which fields a branch is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
  /// The record's own fields and base attributes.
  Base,
  /// The fields of this account's overlay fragment only.
  Overlay { account_id: String },
}

/// A conjunction of conditions over a single scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Branch {
  pub scope:      Scope,
  pub conditions: Vec<Condition>,
}

/// A disjunction of branches; a record matches when any branch does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Predicate {
  pub branches: Vec<Branch>,
}

impl Predicate {
  /// Evaluate against an in-memory record. Storage backends translate the
  /// same structure into their own query language.
  pub fn matches(&self, record: &Record) -> bool {
    self.branches.iter().any(|branch| match &branch.scope {
      Scope::Base => branch
        .conditions
        .iter()
        .all(|c| c.holds(base_field(record, c).as_ref())),
      Scope::Overlay { account_id } => {
        record.overlay(account_id).is_some_and(|overlay| {
          branch
            .conditions
            .iter()
            .all(|c| c.holds(nested(&overlay.fields, c.path())))
        })
      }
    })
  }
}

/// Resolve a condition against a record's own fields before its attributes.
fn base_field(record: &Record, condition: &Condition) -> Option<Value> {
  match condition.field.as_str() {
    "id" => Some(Value::String(record.id.clone())),
    "last_enriched_at" => record
      .last_enriched_at
      .map(|at| Value::String(format_timestamp(at))),
    field if field == record.kind.key_field() => {
      Some(Value::String(record.key.clone()))
    }
    _ => nested(&record.attributes, condition.path()).cloned(),
  }
}

fn nested<'a, 'p>(
  fields: &'a Attributes,
  mut path: impl Iterator<Item = &'p str>,
) -> Option<&'a Value> {
  let mut current = fields.get(path.next()?)?;
  for segment in path {
    current = current.as_object()?.get(segment)?;
  }
  Some(current)
}

// ─── Compiler ────────────────────────────────────────────────────────────────

/// Compile `filter` for the account `account_id`.
///
/// Conditions without an `=` or with more than three parts are skipped. An
/// unknown operator, an unsupported field name, or a filter left with no
/// conditions at all rejects the whole filter.
pub fn compile(filter: &str, account_id: &str) -> Result<Predicate> {
  let mut conditions = Vec::new();

  for raw in filter.split(',') {
    let (field, op, value) = match raw.split('=').collect::<Vec<_>>()[..] {
      [field, value] => (field, Operator::Eq, value),
      [field, op, value] => {
        let op = op.parse::<Operator>().map_err(|_| {
          Error::InvalidQuery(format!("unknown operator {op:?} in {raw:?}"))
        })?;
        (field, op, value)
      }
      _ => {
        tracing::debug!(condition = raw, "skipping malformed condition");
        continue;
      }
    };

    if field.is_empty() {
      tracing::debug!(condition = raw, "skipping condition without a field");
      continue;
    }
    if !is_valid_field(field) {
      return Err(Error::InvalidQuery(format!("unsupported field {field:?}")));
    }

    conditions.push(Condition {
      field: field.to_owned(),
      op,
      value: QueryValue::coerce(value),
    });
  }

  if conditions.is_empty() {
    return Err(Error::InvalidQuery(format!("no conditions in {filter:?}")));
  }

  Ok(Predicate {
    branches: vec![
      Branch { scope: Scope::Base, conditions: conditions.clone() },
      Branch {
        scope: Scope::Overlay { account_id: account_id.to_owned() },
        conditions,
      },
    ],
  })
}

fn is_valid_field(field: &str) -> bool {
  field.split('.').all(|segment| {
    !segment.is_empty()
      && segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
  })
}

// ─── Pagination ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
  Ascending,
  Descending,
}

/// Keyset cursor on record id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
  /// Records with an id strictly below this one, newest first.
  Before(String),
  /// Records with an id strictly above this one.
  After(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
  pub cursor: Option<Cursor>,
  pub limit:  usize,
}

impl Page {
  pub fn new(cursor: Option<Cursor>) -> Self {
    Self { cursor, limit: PAGE_SIZE }
  }

  pub fn direction(&self) -> SortDirection {
    match self.cursor {
      Some(Cursor::Before(_)) => SortDirection::Descending,
      _ => SortDirection::Ascending,
    }
  }
}

impl Default for Page {
  fn default() -> Self { Self::new(None) }
}
