//! Handler for `GET /query`.
//!
//! Stale records are returned as stored; only single-profile reads refresh.

use axum::{
  Json,
  extract::{Query, State},
};
use dossier_core::{
  profile,
  provider::EnrichmentProvider,
  query::{Cursor, Page},
  record::CombinedProfile,
  store::ProfileStore,
};
use serde::Deserialize;

use crate::{AppState, Envelope, auth::Account, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  pub q:          Option<String>,
  /// Page backwards from this id, newest first.
  pub get_before: Option<String>,
  pub get_after:  Option<String>,
}

impl SearchParams {
  fn page(&self) -> Page {
    let cursor = match (&self.get_before, &self.get_after) {
      (Some(id), _) => Some(Cursor::Before(id.clone())),
      (None, Some(id)) => Some(Cursor::After(id.clone())),
      (None, None) => None,
    };
    Page::new(cursor)
  }
}

/// `GET /query?q=<filter>[&get_before=<id>|&get_after=<id>]`
pub async fn handler<S, P>(
  State(state): State<AppState<S, P>>,
  account: Account,
  Query(params): Query<SearchParams>,
) -> Result<Json<Envelope<Vec<CombinedProfile>>>, ApiError>
where
  S: ProfileStore,
  P: EnrichmentProvider,
{
  let filter = params
    .q
    .as_deref()
    .filter(|q| !q.is_empty())
    .ok_or_else(|| ApiError::BadRequest("No query provided".into()))?;

  let results =
    profile::search(&*state.store, filter, account.id(), &params.page()).await?;
  tracing::debug!(account_id = account.id(), hits = results.len(), "query served");

  Ok(Json(Envelope::data(results)))
}
