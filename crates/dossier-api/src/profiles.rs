//! Handlers for `/{identifier}`.
//!
//! | Method | Notes |
//! |--------|-------|
//! | `POST` | Register an email; 400 for anything that is not an email |
//! | `GET`  | Combined profile, refreshed when stale; 404 if not found |
//! | `PUT`  | Merge `data` into the base record or the caller's overlay |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use base64::{
  Engine as _,
  engine::general_purpose::{STANDARD, URL_SAFE},
};
use chrono::Utc;
use dossier_core::{
  enrichment::{self, EnrichmentTask},
  profile,
  provider::EnrichmentProvider,
  record::{Attributes, CombinedProfile},
  staleness,
  store::{ProfileStore, TaskQueue},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{AppState, Envelope, auth::Account, error::ApiError};

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterParams {
  pub fname: Option<String>,
  pub lname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registered {
  pub person_id:  String,
  pub company_id: Option<String>,
}

/// `POST /{email}[?fname=<given>&lname=<family>]`
pub async fn register<S, P>(
  State(state): State<AppState<S, P>>,
  account: Account,
  Path(email): Path<String>,
  Query(params): Query<RegisterParams>,
) -> Result<Json<Envelope<Registered>>, ApiError>
where
  S: ProfileStore + TaskQueue,
  P: EnrichmentProvider,
{
  let registration = profile::create_person_profile(
    &*state.store,
    &email,
    params.fname.as_deref(),
    params.lname.as_deref(),
    Some(account.id()),
  )
  .await?;

  if registration.is_new {
    let task =
      EnrichmentTask::new(Some(&registration.person), registration.company.as_ref());
    if let Err(err) = enrichment::dispatch(&*state.store, task).await {
      tracing::warn!(
        record_id = %registration.person.id,
        error = %err,
        "failed to queue enrichment for new profile"
      );
    }
  }

  Ok(Json(Envelope::data(Registered {
    person_id:  registration.person.id,
    company_id: registration.company.map(|c| c.id),
  })))
}

// ─── Fetch ───────────────────────────────────────────────────────────────────

/// `GET /{identifier}`
pub async fn fetch<S, P>(
  State(state): State<AppState<S, P>>,
  account: Account,
  Path(identifier): Path<String>,
) -> Result<Json<Envelope<CombinedProfile>>, ApiError>
where
  S: ProfileStore,
  P: EnrichmentProvider,
{
  let profile = staleness::fetch_fresh_profile(
    &*state.store,
    &*state.provider,
    &identifier,
    Some(account.id()),
    Utc::now(),
  )
  .await?
  .ok_or_else(|| ApiError::NotFound("No Profile Found".into()))?;

  Ok(Json(Envelope::data(profile)))
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateParams {
  pub data: Option<String>,
}

/// Decode the `data` parameter: base64 (standard or URL-safe alphabet) of a
/// JSON object.
pub fn decode_data(encoded: &str) -> Result<Attributes, ApiError> {
  let bytes = STANDARD
    .decode(encoded)
    .or_else(|_| URL_SAFE.decode(encoded))
    .map_err(|_| ApiError::BadRequest("data is not valid base64".into()))?;

  match serde_json::from_slice::<Value>(&bytes) {
    Ok(Value::Object(fields)) => Ok(fields),
    Ok(_) => Err(ApiError::BadRequest("data must be a JSON object".into())),
    Err(e) => Err(ApiError::BadRequest(format!("data is not valid JSON: {e}"))),
  }
}

/// `PUT /{identifier}?data=<base64 JSON object>`
pub async fn update<S, P>(
  State(state): State<AppState<S, P>>,
  account: Account,
  Path(identifier): Path<String>,
  Query(params): Query<UpdateParams>,
) -> Result<Json<Envelope<()>>, ApiError>
where
  S: ProfileStore,
  P: EnrichmentProvider,
{
  let encoded = params
    .data
    .filter(|d| !d.is_empty())
    .ok_or_else(|| ApiError::BadRequest("No data provided".into()))?;
  let data = decode_data(&encoded)?;

  profile::update_profile(&*state.store, &identifier, data, Some(account.id()))
    .await?
    .ok_or_else(|| ApiError::NotFound("No Profile Found".into()))?;

  Ok(Json(Envelope::message("Profile Updated")))
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn decodes_both_base64_alphabets() {
    // `{"a":"??>"}` encodes with `+`/`/` in the standard alphabet.
    let raw = br#"{"a":"??>"}"#;
    for encoded in [STANDARD.encode(raw), URL_SAFE.encode(raw)] {
      let fields = decode_data(&encoded).unwrap();
      assert_eq!(fields["a"], json!("??>"));
    }
  }

  #[test]
  fn rejects_non_objects_and_garbage() {
    for encoded in [
      STANDARD.encode("[1, 2]"),
      STANDARD.encode("not json"),
      "***".to_owned(),
    ] {
      assert!(matches!(decode_data(&encoded), Err(ApiError::BadRequest(_))), "{encoded}");
    }
  }
}
