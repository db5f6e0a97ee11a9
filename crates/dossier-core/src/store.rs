//! The `ProfileStore` and `TaskQueue` traits.
//!
//! Both are implemented by storage backends (e.g. `dossier-store-sqlite`).
//! The operations in [`crate::profile`] and [`crate::enrichment`] depend on
//! these abstractions, not on any concrete backend.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
  enrichment::EnrichmentTask,
  query::{Page, Predicate},
  record::{Attributes, Record},
};

// ─── Profile store ───────────────────────────────────────────────────────────

/// Result of [`ProfileStore::insert_record`].
#[derive(Debug, Clone)]
pub enum Insert {
  /// The record was stored as given.
  Created(Record),
  /// Another record already owns the email/domain; it is returned unchanged.
  KeyTaken(Record),
  /// The id collided with an existing record. Nothing was written; the
  /// caller should retry with a fresh id.
  IdTaken,
}

/// Abstraction over a document store holding person and company records.
///
/// Every write is atomic per record: check-and-insert on the unique key,
/// attribute merges, and overlay merges must not lose concurrent updates to
/// the same record.
pub trait ProfileStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up a person by email. Returns `None` if not found.
  fn find_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + 'a;

  /// Look up a company by domain. Returns `None` if not found.
  fn find_by_domain<'a>(
    &'a self,
    domain: &'a str,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + 'a;

  /// Look up a record of either kind by id. Returns `None` if not found.
  fn find_by_id<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + 'a;

  /// Whether any record already uses `id`.
  fn id_exists<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Insert `record` unless its id or its unique key is already taken, as a
  /// single atomic step.
  fn insert_record(
    &self,
    record: Record,
  ) -> impl Future<Output = Result<Insert, Self::Error>> + Send + '_;

  /// Merge `data` into the base attributes of record `id`, and set
  /// `last_enriched_at` when `enriched_at` is given. Returns the updated
  /// record, or `None` if it does not exist.
  fn merge_attributes<'a>(
    &'a self,
    id: &'a str,
    data: Attributes,
    enriched_at: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + 'a;

  /// Merge `data` into `account_id`'s overlay on record `id`, creating the
  /// overlay if the account has none. Returns the updated record, or `None`
  /// if it does not exist.
  fn merge_overlay<'a>(
    &'a self,
    id: &'a str,
    account_id: &'a str,
    data: Attributes,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + 'a;

  /// Records matching `predicate`, ordered by id in the page's direction and
  /// bounded by its cursor and limit.
  fn run_query<'a>(
    &'a self,
    predicate: &'a Predicate,
    page: &'a Page,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + 'a;
}

// ─── Work queue ──────────────────────────────────────────────────────────────

/// A task taken off the queue, invisible to other workers until its lease
/// runs out.
#[derive(Debug, Clone)]
pub struct ClaimedTask {
  pub task_id: String,
  pub task:    EnrichmentTask,
}

/// Durable, delayed, at-least-once queue of enrichment tasks.
pub trait TaskQueue: Send + Sync {
  type QueueError: std::error::Error + Send + Sync + 'static;

  /// Persist `task`, runnable no earlier than `delay` from now. Returns the
  /// new task id.
  fn enqueue(
    &self,
    task: EnrichmentTask,
    delay: Duration,
  ) -> impl Future<Output = Result<String, Self::QueueError>> + Send + '_;

  /// Claim the earliest runnable task, hiding it for `lease`. A claimed
  /// task that is never completed becomes runnable again once the lease
  /// expires.
  fn claim_next(
    &self,
    now: DateTime<Utc>,
    lease: Duration,
  ) -> impl Future<Output = Result<Option<ClaimedTask>, Self::QueueError>>
  + Send
  + '_;

  /// Remove a finished task.
  fn complete<'a>(
    &'a self,
    task_id: &'a str,
  ) -> impl Future<Output = Result<(), Self::QueueError>> + Send + 'a;
}
