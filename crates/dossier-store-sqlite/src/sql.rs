//! Translation of a compiled [`Predicate`] into a parameterised SQLite
//! query.
//!
//! Stored JSON values are type-bracketed the same way
//! [`Predicate::matches`] brackets them: a numeric condition only looks at
//! `integer`/`real` JSON values and a text condition only at `text` ones,
//! since SQLite would otherwise order every number before every string.

use dossier_core::query::{
  Branch, Condition, Cursor, Operator, Page, Predicate, QueryValue, Scope,
  SortDirection,
};
use rusqlite::types::Value as SqlValue;

use crate::encode::json_path;

/// Columns selected for every record read, in `read_record` order.
pub const RECORD_COLUMNS: &str = "r.record_id, r.kind, r.email, r.domain, \
                                  r.attributes, r.last_enriched_at, r.created_at";

/// A SQL fragment and the parameters it binds, in order.
#[derive(Debug, Default)]
pub struct Fragment {
  pub sql:    String,
  pub params: Vec<SqlValue>,
}

impl Fragment {
  fn push(&mut self, sql: &str) { self.sql.push_str(sql); }

  fn bind(&mut self, value: SqlValue) {
    self.sql.push('?');
    self.params.push(value);
  }
}

fn operator_sql(op: Operator) -> &'static str {
  match op {
    Operator::Eq => " = ",
    Operator::Lt => " < ",
    Operator::Gt => " > ",
    Operator::Lte => " <= ",
    Operator::Gte => " >= ",
  }
}

fn value_sql(value: &QueryValue) -> SqlValue {
  match value {
    QueryValue::Integer(i) => SqlValue::Integer(*i),
    QueryValue::Float(f) => SqlValue::Real(*f),
    QueryValue::Text(s) => SqlValue::Text(s.clone()),
  }
}

/// `json_extract(doc, path) op value`, guarded by the JSON type family.
fn json_condition(out: &mut Fragment, doc: &str, condition: &Condition) {
  let path = json_path(&condition.field);
  let types = if condition.value.is_numeric() {
    " IN ('integer', 'real')"
  } else {
    " = 'text'"
  };

  out.push("(json_type(");
  out.push(doc);
  out.push(", ");
  out.bind(SqlValue::Text(path.clone()));
  out.push(")");
  out.push(types);
  out.push(" AND json_extract(");
  out.push(doc);
  out.push(", ");
  out.bind(SqlValue::Text(path));
  out.push(")");
  out.push(operator_sql(condition.op));
  out.bind(value_sql(&condition.value));
  out.push(")");
}

/// A text column compared directly. Numbers never match text.
fn column_condition(out: &mut Fragment, column: &str, condition: &Condition) {
  if condition.value.is_numeric() {
    out.push("0");
    return;
  }
  out.push("(");
  out.push(column);
  out.push(operator_sql(condition.op));
  out.bind(value_sql(&condition.value));
  out.push(")");
}

/// A base-scope condition. `email` and `domain` name the key column when the
/// record has one and fall back to the attributes otherwise.
fn base_condition(out: &mut Fragment, condition: &Condition) {
  match condition.field.as_str() {
    "id" => column_condition(out, "r.record_id", condition),
    "last_enriched_at" => column_condition(out, "r.last_enriched_at", condition),
    key @ ("email" | "domain") => {
      let column = format!("r.{key}");
      out.push("((");
      out.push(&column);
      out.push(" IS NOT NULL AND ");
      column_condition(out, &column, condition);
      out.push(") OR (");
      out.push(&column);
      out.push(" IS NULL AND ");
      json_condition(out, "r.attributes", condition);
      out.push("))");
    }
    _ => json_condition(out, "r.attributes", condition),
  }
}

fn branch_sql(out: &mut Fragment, branch: &Branch) {
  match &branch.scope {
    Scope::Base => {
      out.push("(");
      for (i, condition) in branch.conditions.iter().enumerate() {
        if i > 0 {
          out.push(" AND ");
        }
        base_condition(out, condition);
      }
      out.push(")");
    }
    Scope::Overlay { account_id } => {
      out.push(
        "EXISTS (SELECT 1 FROM overlays o WHERE o.record_id = r.record_id \
         AND o.account_id = ",
      );
      out.bind(SqlValue::Text(account_id.clone()));
      for condition in &branch.conditions {
        out.push(" AND ");
        json_condition(out, "o.fields", condition);
      }
      out.push(")");
    }
  }
}

/// Full `SELECT` for one page of records matching `predicate`.
pub fn select_matching(predicate: &Predicate, page: &Page) -> Fragment {
  let mut out = Fragment::default();
  out.push("SELECT ");
  out.push(RECORD_COLUMNS);
  out.push(" FROM records r WHERE (");

  if predicate.branches.is_empty() {
    out.push("0");
  }
  for (i, branch) in predicate.branches.iter().enumerate() {
    if i > 0 {
      out.push(" OR ");
    }
    branch_sql(&mut out, branch);
  }
  out.push(")");

  match &page.cursor {
    Some(Cursor::Before(id)) => {
      out.push(" AND r.record_id < ");
      out.bind(SqlValue::Text(id.clone()));
    }
    Some(Cursor::After(id)) => {
      out.push(" AND r.record_id > ");
      out.bind(SqlValue::Text(id.clone()));
    }
    None => {}
  }

  out.push(match page.direction() {
    SortDirection::Ascending => " ORDER BY r.record_id ASC LIMIT ",
    SortDirection::Descending => " ORDER BY r.record_id DESC LIMIT ",
  });
  out.bind(SqlValue::Integer(page.limit as i64));

  out
}

#[cfg(test)]
mod tests {
  use dossier_core::query::compile;

  use super::*;

  #[test]
  fn binds_every_value_as_a_parameter() {
    let predicate = compile("occupation=Engineer", "A1").unwrap();
    let fragment = select_matching(&predicate, &Page::default());

    assert_eq!(
      fragment.sql.matches('?').count(),
      fragment.params.len()
    );
    assert!(!fragment.sql.contains("Engineer"));
    assert!(!fragment.sql.contains("A1"));
  }

  #[test]
  fn cursor_sets_bound_and_order() {
    let predicate = compile("a=1", "A1").unwrap();

    let before =
      select_matching(&predicate, &Page::new(Some(Cursor::Before("m".into()))));
    assert!(before.sql.contains("r.record_id < ?"));
    assert!(before.sql.contains("DESC"));

    let after =
      select_matching(&predicate, &Page::new(Some(Cursor::After("m".into()))));
    assert!(after.sql.contains("r.record_id > ?"));
    assert!(after.sql.contains("ASC"));
  }
}
