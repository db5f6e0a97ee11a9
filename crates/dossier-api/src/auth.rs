//! API-key account resolution.
//!
//! The key is read from the `API_KEY` query parameter, or failing that from
//! the `x-api-key` header.

use std::collections::HashMap;

use axum::{
  extract::{FromRequestParts, Query},
  http::request::Parts,
};
use serde::Deserialize;

use crate::{AppState, error::ApiError};

pub const API_KEY_PARAM: &str = "API_KEY";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Maps API keys to the account they belong to.
pub trait AccountDirectory: Send + Sync {
  /// The account id for `api_key`, or `None` if the key is unknown.
  fn account_for(&self, api_key: &str) -> Option<String>;
}

/// A fixed in-memory key → account table, loaded from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticAccounts {
  by_key: HashMap<String, String>,
}

impl StaticAccounts {
  pub fn new<I, K, A>(entries: I) -> Self
  where
    I: IntoIterator<Item = (K, A)>,
    K: Into<String>,
    A: Into<String>,
  {
    Self {
      by_key: entries
        .into_iter()
        .map(|(key, account)| (key.into(), account.into()))
        .collect(),
    }
  }
}

impl AccountDirectory for StaticAccounts {
  fn account_for(&self, api_key: &str) -> Option<String> {
    self.by_key.get(api_key).cloned()
  }
}

/// The calling account. Present in a handler means the key was valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account(pub String);

impl Account {
  pub fn id(&self) -> &str { &self.0 }
}

#[derive(Deserialize)]
struct KeyParams {
  #[serde(rename = "API_KEY")]
  api_key: Option<String>,
}

fn api_key(parts: &Parts) -> Option<String> {
  let from_query = Query::<KeyParams>::try_from_uri(&parts.uri)
    .ok()
    .and_then(|Query(params)| params.api_key);

  from_query.or_else(|| {
    parts
      .headers
      .get(API_KEY_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::to_owned)
  })
}

impl<S, P> FromRequestParts<AppState<S, P>> for Account
where
  S: Send + Sync,
  P: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, P>,
  ) -> Result<Self, Self::Rejection> {
    let account = api_key(parts)
      .filter(|key| !key.is_empty())
      .and_then(|key| state.accounts.account_for(&key));

    match account {
      Some(id) => Ok(Account(id)),
      None => {
        tracing::debug!(path = %parts.uri.path(), "rejected API key");
        Err(ApiError::Unauthorized("Invalid API Key".into()))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{body::Body, http::Request};

  use super::*;

  fn state() -> AppState<(), ()> {
    AppState {
      store:    Arc::new(()),
      provider: Arc::new(()),
      accounts: Arc::new(StaticAccounts::new([("k1", "A1"), ("k2", "A2")])),
    }
  }

  async fn extract(req: Request<Body>) -> Result<Account, ApiError> {
    let (mut parts, _) = req.into_parts();
    Account::from_request_parts(&mut parts, &state()).await
  }

  #[tokio::test]
  async fn key_from_query_parameter() {
    let req = Request::builder()
      .uri("/a@x.com?fname=Jo&API_KEY=k2")
      .body(Body::empty())
      .unwrap();
    assert_eq!(extract(req).await.unwrap(), Account("A2".into()));
  }

  #[tokio::test]
  async fn key_from_header() {
    let req = Request::builder()
      .uri("/a@x.com")
      .header(API_KEY_HEADER, "k1")
      .body(Body::empty())
      .unwrap();
    assert_eq!(extract(req).await.unwrap().id(), "A1");
  }

  #[tokio::test]
  async fn query_parameter_wins_over_header() {
    let req = Request::builder()
      .uri("/a@x.com?API_KEY=k1")
      .header(API_KEY_HEADER, "k2")
      .body(Body::empty())
      .unwrap();
    assert_eq!(extract(req).await.unwrap().id(), "A1");
  }

  #[tokio::test]
  async fn unknown_or_missing_key() {
    for uri in ["/a@x.com?API_KEY=nope", "/a@x.com", "/a@x.com?API_KEY="] {
      let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
      assert!(matches!(extract(req).await, Err(ApiError::Unauthorized(_))), "{uri}");
    }
  }
}
