//! SQLite backend for the Dossier profile store and enrichment queue.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every write runs inside one
//! `IMMEDIATE` transaction, which is what makes check-then-insert and
//! read-merge-write atomic per record.

mod encode;
mod queue;
mod schema;
mod sql;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
