//! JSON API for Dossier.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`ProfileStore`] and [`TaskQueue`], and any [`EnrichmentProvider`].
//! Every route resolves the calling account from its API key first.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/{email}` | Optional `?fname=&lname=`; queues enrichment for new records |
//! | `GET`  | `/{identifier}` | Email, domain or id; stale records are re-enriched first |
//! | `PUT`  | `/{identifier}` | `?data=<base64 JSON object>` |
//! | `GET`  | `/query` | `?q=<filter>[&get_before=<id>\|&get_after=<id>]` |

pub mod auth;
pub mod envelope;
pub mod error;
pub mod profiles;
pub mod search;

use std::sync::Arc;

use axum::{Router, routing::get};
use dossier_core::{
  provider::EnrichmentProvider,
  store::{ProfileStore, TaskQueue},
};
use tower_http::trace::TraceLayer;

pub use auth::{Account, AccountDirectory, StaticAccounts};
pub use envelope::Envelope;
pub use error::ApiError;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, P> {
  pub store:    Arc<S>,
  pub provider: Arc<P>,
  pub accounts: Arc<dyn AccountDirectory>,
}

impl<S, P> Clone for AppState<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      provider: Arc::clone(&self.provider),
      accounts: Arc::clone(&self.accounts),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, P>(state: AppState<S, P>) -> Router<()>
where
  S: ProfileStore + TaskQueue + 'static,
  P: EnrichmentProvider + 'static,
{
  Router::new()
    .route("/query", get(search::handler::<S, P>))
    .route(
      "/{identifier}",
      get(profiles::fetch::<S, P>)
        .post(profiles::register::<S, P>)
        .put(profiles::update::<S, P>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
