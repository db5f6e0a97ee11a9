//! Router-level tests against an in-memory SQLite store.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use axum::{
  body::Body,
  http::{Request, StatusCode},
  response::Response,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use chrono::{TimeDelta, Utc};
use dossier_core::{
  provider::{CombinedLookup, EnrichmentProvider, ProviderError},
  record::Attributes,
  store::TaskQueue,
};
use dossier_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use super::*;

// ─── Harness ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct StubProvider {
  calls: AtomicUsize,
}

impl StubProvider {
  fn person() -> Attributes {
    json!({ "bio": "Writes things" }).as_object().cloned().unwrap_or_default()
  }

  fn company() -> Attributes {
    json!({ "employees": 40 }).as_object().cloned().unwrap_or_default()
  }
}

impl EnrichmentProvider for StubProvider {
  async fn lookup_person(&self, _email: &str) -> Result<Attributes, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(Self::person())
  }

  async fn lookup_company(&self, _domain: &str) -> Result<Attributes, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(Self::company())
  }

  async fn lookup_combined(&self, _email: &str) -> Result<CombinedLookup, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(CombinedLookup { person: Self::person(), company: Self::company() })
  }
}

const KEY_A: &str = "key-a";
const KEY_B: &str = "key-b";

async fn make_state() -> AppState<SqliteStore, StubProvider> {
  let store = SqliteStore::open_in_memory().await.unwrap();
  AppState {
    store:    Arc::new(store),
    provider: Arc::new(StubProvider::default()),
    accounts: Arc::new(StaticAccounts::new([(KEY_A, "A1"), (KEY_B, "A2")])),
  }
}

async fn send(
  state: &AppState<SqliteStore, StubProvider>,
  method: &str,
  uri: &str,
) -> Response {
  let req = Request::builder()
    .method(method)
    .uri(uri)
    .body(Body::empty())
    .unwrap();
  api_router(state.clone()).oneshot(req).await.unwrap()
}

async fn body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

async fn register(state: &AppState<SqliteStore, StubProvider>, email: &str) -> Value {
  let resp = send(state, "POST", &format!("/{email}?API_KEY={KEY_A}")).await;
  assert_eq!(resp.status(), StatusCode::OK);
  body(resp).await["data"].clone()
}

fn encode(value: Value) -> String { URL_SAFE.encode(value.to_string()) }

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_route_requires_a_known_key() {
  let state = make_state().await;

  for (method, uri) in [
    ("POST", "/a@x.com"),
    ("GET", "/a@x.com"),
    ("PUT", "/a@x.com?data=e30="),
    ("GET", "/query?q=a=1"),
    ("GET", "/a@x.com?API_KEY=wrong"),
  ] {
    let resp = send(&state, method, uri).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    let body = body(resp).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Invalid API Key"));
  }
}

#[tokio::test]
async fn key_header_is_accepted() {
  let state = make_state().await;
  let req = Request::builder()
    .method("POST")
    .uri("/a@x.com")
    .header(auth::API_KEY_HEADER, KEY_B)
    .body(Body::empty())
    .unwrap();

  let resp = api_router(state).oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::OK);
}

// ─── Register ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_returns_ids_and_queues_enrichment() {
  let state = make_state().await;

  let data = register(&state, "a@x.com").await;
  let person_id = data["person_id"].as_str().unwrap();
  let company_id = data["company_id"].as_str().unwrap();
  assert_ne!(person_id, company_id);

  let lease = std::time::Duration::from_secs(30);
  let claimed = state
    .store
    .claim_next(Utc::now() + TimeDelta::seconds(1), lease)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(claimed.task.person.unwrap().id, person_id);
  assert_eq!(claimed.task.company.unwrap().id, company_id);
  assert_eq!(claimed.task.attempt, 1);
}

#[tokio::test]
async fn repeat_registration_queues_nothing() {
  let state = make_state().await;
  let first = register(&state, "a@x.com").await;

  let lease = std::time::Duration::from_secs(30);
  let now = Utc::now() + TimeDelta::seconds(1);
  let task = state.store.claim_next(now, lease).await.unwrap().unwrap();
  state.store.complete(&task.task_id).await.unwrap();

  let second = register(&state, "a@x.com").await;
  assert_eq!(first, second);
  assert!(state.store.claim_next(now, lease).await.unwrap().is_none());
}

#[tokio::test]
async fn register_with_name_shows_in_own_view_only() {
  let state = make_state().await;
  let resp = send(&state, "POST", &format!("/a@x.com?fname=Jo&API_KEY={KEY_A}")).await;
  assert_eq!(resp.status(), StatusCode::OK);

  let mine = body(send(&state, "GET", &format!("/a@x.com?API_KEY={KEY_A}")).await).await;
  assert_eq!(mine["data"]["person"]["name"]["givenName"], json!("Jo"));

  let theirs = body(send(&state, "GET", &format!("/a@x.com?API_KEY={KEY_B}")).await).await;
  assert!(theirs["data"]["person"].get("name").is_none());
}

#[tokio::test]
async fn register_rejects_non_emails() {
  let state = make_state().await;

  for id in ["x.com", "opaque", "nobody@"] {
    let resp = send(&state, "POST", &format!("/{id}?API_KEY={KEY_A}")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{id}");
    assert_eq!(body(resp).await["message"], json!("Invalid Email Address"));
  }
}

// ─── Fetch ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_enriches_stale_records_and_hides_internals() {
  let state = make_state().await;
  let ids = register(&state, "a@x.com").await;

  let resp = send(&state, "GET", &format!("/a@x.com?API_KEY={KEY_A}")).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body(resp).await;

  assert_eq!(body["success"], json!(true));
  let person = &body["data"]["person"];
  assert_eq!(person["id"], ids["person_id"]);
  assert_eq!(person["email"], json!("a@x.com"));
  assert_eq!(person["bio"], json!("Writes things"));
  assert!(person["last_enriched_at"].is_string());
  assert!(person.get("overlays").is_none());
  assert_eq!(body["data"]["company"]["employees"], json!(40));
  assert_eq!(state.provider.calls.load(Ordering::SeqCst), 2);

  // Now fresh: a second read does not call out again.
  send(&state, "GET", &format!("/a@x.com?API_KEY={KEY_A}")).await;
  assert_eq!(state.provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn fetch_by_domain_and_id() {
  let state = make_state().await;
  let ids = register(&state, "a@x.com").await;
  let company_id = ids["company_id"].as_str().unwrap();

  for identifier in ["x.com", company_id] {
    let resp = send(&state, "GET", &format!("/{identifier}?API_KEY={KEY_A}")).await;
    assert_eq!(resp.status(), StatusCode::OK, "{identifier}");
    let body = body(resp).await;
    assert!(body["data"]["person"].is_null());
    assert_eq!(body["data"]["company"]["id"], json!(company_id));
    assert_eq!(body["data"]["company"]["domain"], json!("x.com"));
  }
}

#[tokio::test]
async fn fetch_unknown_is_not_found() {
  let state = make_state().await;

  let resp = send(&state, "GET", &format!("/ghost@x.com?API_KEY={KEY_A}")).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  let body = body(resp).await;
  assert_eq!(body["success"], json!(false));
  assert_eq!(body["message"], json!("No Profile Found"));
  assert!(body["data"].is_null());
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_writes_callers_overlay() {
  let state = make_state().await;
  register(&state, "a@x.com").await;

  let data = encode(json!({ "title": "Lead" }));
  let resp = send(&state, "PUT", &format!("/a@x.com?data={data}&API_KEY={KEY_A}")).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let ack = body(resp).await;
  assert_eq!(ack["success"], json!(true));
  assert_eq!(ack["message"], json!("Profile Updated"));

  let mine = body(send(&state, "GET", &format!("/a@x.com?API_KEY={KEY_A}")).await).await;
  assert_eq!(mine["data"]["person"]["title"], json!("Lead"));

  let theirs = body(send(&state, "GET", &format!("/a@x.com?API_KEY={KEY_B}")).await).await;
  assert!(theirs["data"]["person"].get("title").is_none());
}

#[tokio::test]
async fn update_rejects_missing_or_malformed_data() {
  let state = make_state().await;
  register(&state, "a@x.com").await;

  let not_object = encode(json!(["a"]));
  for query in [String::new(), "data=".into(), "data=***".into(), format!("data={not_object}")] {
    let resp = send(&state, "PUT", &format!("/a@x.com?{query}&API_KEY={KEY_A}")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{query}");
  }
}

#[tokio::test]
async fn update_unknown_is_not_found() {
  let state = make_state().await;
  let data = encode(json!({ "a": 1 }));

  let resp = send(&state, "PUT", &format!("/ghost@x.com?data={data}&API_KEY={KEY_A}")).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ─── Query ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_returns_combined_profiles() {
  let state = make_state().await;
  let ids = register(&state, "a@x.com").await;
  register(&state, "b@x.com").await;

  let data = encode(json!({ "team": "core" }));
  send(&state, "PUT", &format!("/a@x.com?data={data}&API_KEY={KEY_A}")).await;

  let resp = send(&state, "GET", &format!("/query?q=team=core&API_KEY={KEY_A}")).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = body(resp).await;
  let hits = body["data"].as_array().unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0]["person"]["id"], ids["person_id"]);
  assert_eq!(hits[0]["company"]["id"], ids["company_id"]);

  // Another account's overlay is invisible to the filter.
  let resp = send(&state, "GET", &format!("/query?q=team=core&API_KEY={KEY_B}")).await;
  assert_eq!(body_len(resp).await, 0);
}

async fn body_len(resp: Response) -> usize {
  body(resp).await["data"].as_array().map_or(0, Vec::len)
}

#[tokio::test]
async fn query_pages_with_cursors() {
  let state = make_state().await;
  let mut person_ids = Vec::new();
  for i in 0..3 {
    let ids = register(&state, &format!("p{i}@x.com")).await;
    person_ids.push(ids["person_id"].as_str().unwrap().to_owned());
  }
  person_ids.sort();
  let filter = "domain=x.com";

  let all = send(&state, "GET", &format!("/query?q={filter}&API_KEY={KEY_A}")).await;
  // The company matches by its key; people do not have a domain field.
  assert_eq!(body_len(all).await, 1);

  let q = "email=gte=p";
  let after = &person_ids[0];
  let resp = send(&state, "GET", &format!("/query?q={q}&get_after={after}&API_KEY={KEY_A}")).await;
  assert_eq!(body_len(resp).await, 2);

  let before = &person_ids[2];
  let resp = send(&state, "GET", &format!("/query?q={q}&get_before={before}&API_KEY={KEY_A}")).await;
  let body = body(resp).await;
  let got: Vec<&str> = body["data"]
    .as_array()
    .unwrap()
    .iter()
    .map(|hit| hit["person"]["id"].as_str().unwrap())
    .collect();
  assert_eq!(got, [person_ids[1].as_str(), person_ids[0].as_str()]);
}

#[tokio::test]
async fn query_rejects_missing_and_invalid_filters() {
  let state = make_state().await;

  let resp = send(&state, "GET", &format!("/query?API_KEY={KEY_A}")).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(body(resp).await["message"], json!("No query provided"));

  let resp = send(&state, "GET", &format!("/query?q=salary=ne=1&API_KEY={KEY_A}")).await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert_eq!(body(resp).await["message"], json!("Invalid Query"));
}
