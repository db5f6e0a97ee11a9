//! Error types for `dossier-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed filter syntax or an unknown comparison operator.
  #[error("invalid query: {0}")]
  InvalidQuery(String),

  #[error("invalid email address: {0:?}")]
  InvalidEmail(String),

  /// No free record id was found within the probe budget.
  #[error("unable to generate a unique id after {attempts} attempts")]
  IdExhausted { attempts: usize },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("queue error: {0}")]
  Queue(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }

  pub fn queue<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Queue(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
