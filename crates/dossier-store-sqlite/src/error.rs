//! Error type for `dossier-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown record kind: {0:?}")]
  UnknownKind(String),

  /// A row violates an invariant the schema cannot express.
  #[error("corrupt record {id}: {reason}")]
  Corrupt { id: String, reason: String },

  #[error("delay out of range: {0}")]
  Delay(#[from] chrono::OutOfRangeError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
