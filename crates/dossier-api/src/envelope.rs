//! The `{success, message, data}` body every route answers with.

use serde::{Deserialize, Serialize};

/// Response envelope. `success` is true exactly when the status is 2xx.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
  pub success: bool,
  pub message: Option<String>,
  pub data:    Option<T>,
}

impl<T> Envelope<T> {
  pub fn data(data: T) -> Self {
    Self { success: true, message: None, data: Some(data) }
  }

  pub fn message(message: impl Into<String>) -> Self {
    Self { success: true, message: Some(message.into()), data: None }
  }

  pub fn failure(message: impl Into<String>) -> Self {
    Self { success: false, message: Some(message.into()), data: None }
  }
}
