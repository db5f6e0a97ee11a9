//! Core types and operations for the Dossier identity service.
//!
//! This crate has no HTTP or database dependencies. The
//! document store, the work queue and the enrichment provider are reached
//! through the traits in [`store`] and [`provider`]; everything else here is
//! plain logic over those seams.

pub mod enrichment;
pub mod error;
pub mod id;
pub mod identifier;
pub mod profile;
pub mod provider;
pub mod query;
pub mod record;
pub mod staleness;
pub mod store;

pub use error::{Error, Result};
