//! HTTP client for the external enrichment provider.
//!
//! Speaks the Clearbit streaming API shape: person lookup by email, company
//! lookup by domain, and a combined lookup returning both. Implements the
//! core [`EnrichmentProvider`](dossier_core::provider::EnrichmentProvider)
//! seam.

mod client;
mod config;

pub use client::{BuildError, HttpProvider};
pub use config::ProviderConfig;
