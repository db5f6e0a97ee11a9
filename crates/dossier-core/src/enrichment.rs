//! Enrichment orchestration.
//!
//! One attempt looks the subjects up at the provider and writes whatever
//! comes back, stamping `last_enriched_at` even when the provider had
//! nothing. Rate-limited attempts from the background path are put back on
//! the queue with a fixed delay until [`MAX_ATTEMPTS`] is reached; every
//! other failure ends the chain.

use std::{fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  profile::ensure_company,
  provider::{EnrichmentProvider, ProviderError},
  record::{Attributes, Record, RecordKind},
  store::{ProfileStore, TaskQueue},
};

/// Delay before a rate-limited task runs again; the provider's rate-limit
/// window.
pub const RATE_LIMIT_DELAY: Duration = Duration::from_secs(60);

/// Attempts per chain, counting the first one.
pub const MAX_ATTEMPTS: u32 = 10;

// ─── Task payload ────────────────────────────────────────────────────────────

/// The minimum needed to enrich a record: where to write and what to ask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
  pub id:  String,
  /// Email or domain, matching the record kind.
  pub key: String,
}

impl From<&Record> for RecordRef {
  fn from(record: &Record) -> Self {
    Self { id: record.id.clone(), key: record.key.clone() }
  }
}

/// A queued enrichment request for a person, a company, or both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentTask {
  pub person:  Option<RecordRef>,
  pub company: Option<RecordRef>,
  /// 1 for the first attempt.
  pub attempt: u32,
}

impl EnrichmentTask {
  pub fn new(person: Option<&Record>, company: Option<&Record>) -> Self {
    Self {
      person:  person.map(RecordRef::from),
      company: company.map(RecordRef::from),
      attempt: 1,
    }
  }

  /// The same subjects, one attempt later.
  pub fn next_attempt(&self) -> Self {
    Self { attempt: self.attempt + 1, ..self.clone() }
  }
}

impl fmt::Display for EnrichmentTask {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (&self.person, &self.company) {
      (Some(p), Some(c)) => write!(f, "person {}, company {}", p.id, c.id),
      (Some(p), None) => write!(f, "person {}", p.id),
      (None, Some(c)) => write!(f, "company {}", c.id),
      (None, None) => f.write_str("nothing"),
    }
  }
}

// ─── Attempt ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Succeeded,
  RateLimited,
  Failed,
}

/// Run one lookup for the given subjects and persist the results.
///
/// When both are given they are fetched with a single combined lookup but
/// written as two independent record updates. Provider faults become
/// [`Outcome`]s; only store faults are returned as errors.
pub async fn enrich<S, P>(
  store: &S,
  provider: &P,
  person: Option<&RecordRef>,
  company: Option<&RecordRef>,
) -> Result<Outcome>
where
  S: ProfileStore,
  P: EnrichmentProvider,
{
  let lookup = match (person, company) {
    (Some(p), Some(_)) => provider
      .lookup_combined(&p.key)
      .await
      .map(|found| (found.person, found.company)),
    (Some(p), None) => provider
      .lookup_person(&p.key)
      .await
      .map(|found| (found, Attributes::new())),
    (None, Some(c)) => provider
      .lookup_company(&c.key)
      .await
      .map(|found| (Attributes::new(), found)),
    (None, None) => return Ok(Outcome::Succeeded),
  };

  let (person_fields, company_fields) = match lookup {
    Ok(fields) => fields,
    Err(ProviderError::RateLimited) => return Ok(Outcome::RateLimited),
    Err(err) => {
      tracing::warn!(error = %err, "enrichment lookup failed");
      return Ok(Outcome::Failed);
    }
  };

  let now = Utc::now();
  if let Some(target) = person {
    persist(store, RecordKind::Person, target, person_fields, now).await?;
  }
  if let Some(target) = company {
    persist(store, RecordKind::Company, target, company_fields, now).await?;
  }

  Ok(Outcome::Succeeded)
}

async fn persist<S: ProfileStore>(
  store: &S,
  kind: RecordKind,
  target: &RecordRef,
  fields: Attributes,
  now: DateTime<Utc>,
) -> Result<()> {
  let missing_company = kind == RecordKind::Company
    && !store.id_exists(&target.id).await.map_err(Error::store)?;
  let id = if missing_company {
    ensure_company(store, &target.key).await?.id
  } else {
    target.id.clone()
  };

  let updated = store
    .merge_attributes(&id, fields, Some(now))
    .await
    .map_err(Error::store)?;

  match updated {
    Some(_) => tracing::info!(record_id = %id, %kind, "stored enrichment"),
    None => tracing::warn!(record_id = %id, %kind, "enriched record vanished"),
  }
  Ok(())
}

// ─── Background path ─────────────────────────────────────────────────────────

/// Queue the first attempt for a task.
pub async fn dispatch<Q: TaskQueue>(queue: &Q, task: EnrichmentTask) -> Result<String> {
  let task_id = queue
    .enqueue(task, Duration::ZERO)
    .await
    .map_err(Error::queue)?;
  tracing::debug!(task_id = %task_id, "queued enrichment");
  Ok(task_id)
}

/// Run a queued task to its outcome, rescheduling it on rate limiting while
/// attempts remain. A rate-limited final attempt ends the chain as
/// [`Outcome::Failed`]. Nothing is surfaced to a waiting caller; the returned
/// outcome is informational.
pub async fn run_task<S, Q, P>(
  store: &S,
  queue: &Q,
  provider: &P,
  task: &EnrichmentTask,
) -> Result<Outcome>
where
  S: ProfileStore,
  Q: TaskQueue,
  P: EnrichmentProvider,
{
  let outcome =
    match enrich(store, provider, task.person.as_ref(), task.company.as_ref())
      .await
    {
      Ok(outcome) => outcome,
      Err(err) => {
        tracing::warn!(error = %err, %task, "failed to store enrichment");
        Outcome::Failed
      }
    };

  if outcome != Outcome::RateLimited {
    return Ok(outcome);
  }

  if task.attempt >= MAX_ATTEMPTS {
    tracing::warn!(attempt = task.attempt, %task, "abandoning enrichment");
    return Ok(Outcome::Failed);
  }

  let retry = task.next_attempt();
  tracing::warn!(
    attempt = retry.attempt,
    delay_secs = RATE_LIMIT_DELAY.as_secs(),
    %task,
    "enrichment rate limited, queueing retry"
  );
  queue
    .enqueue(retry, RATE_LIMIT_DELAY)
    .await
    .map_err(Error::queue)?;

  Ok(outcome)
}

// ─── Synchronous path ────────────────────────────────────────────────────────

/// Enrich a single record in-line. Every failure, including rate limiting,
/// is logged and reported as `false`; nothing is rescheduled.
pub async fn enrich_now<S, P>(store: &S, provider: &P, record: &Record) -> bool
where
  S: ProfileStore,
  P: EnrichmentProvider,
{
  let target = RecordRef::from(record);
  let (person, company) = match record.kind {
    RecordKind::Person => (Some(&target), None),
    RecordKind::Company => (None, Some(&target)),
  };

  match enrich(store, provider, person, company).await {
    Ok(Outcome::Succeeded) => true,
    Ok(outcome) => {
      tracing::debug!(record_id = %record.id, ?outcome, "in-line enrichment skipped");
      false
    }
    Err(err) => {
      tracing::warn!(record_id = %record.id, error = %err, "in-line enrichment failed");
      false
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn task() -> EnrichmentTask {
    EnrichmentTask {
      person:  Some(RecordRef { id: "p1".into(), key: "jo@example.com".into() }),
      company: Some(RecordRef { id: "c1".into(), key: "example.com".into() }),
      attempt: 1,
    }
  }

  #[test]
  fn next_attempt_keeps_subjects() {
    let next = task().next_attempt();
    assert_eq!(next.attempt, 2);
    assert_eq!(next.person, task().person);
    assert_eq!(next.company, task().company);
  }

  #[test]
  fn task_payload_roundtrips_through_json() {
    let json = serde_json::to_string(&task()).unwrap();
    let back: EnrichmentTask = serde_json::from_str(&json).unwrap();
    assert_eq!(back, task());
  }

  #[test]
  fn display_names_subjects() {
    assert_eq!(task().to_string(), "person p1, company c1");
    let company_only = EnrichmentTask { person: None, ..task() };
    assert_eq!(company_only.to_string(), "company c1");
  }
}
