//! Background enrichment worker.
//!
//! Polls the task queue, runs each claimed task through the enrichment
//! orchestrator, and deletes it once it has run. A task whose run fails
//! before completion is left to its lease and picked up again later.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use dossier_core::{
  Error, Result,
  enrichment,
  provider::EnrichmentProvider,
  store::{ProfileStore, TaskQueue},
};

use crate::WorkerConfig;

/// Claim and run at most one task. Returns whether a task was claimed.
pub async fn process_once<S, P>(store: &S, provider: &P, lease: Duration) -> Result<bool>
where
  S: ProfileStore + TaskQueue,
  P: EnrichmentProvider,
{
  let Some(claimed) = store
    .claim_next(Utc::now(), lease)
    .await
    .map_err(Error::queue)?
  else {
    return Ok(false);
  };

  let outcome = enrichment::run_task(store, store, provider, &claimed.task).await?;
  store.complete(&claimed.task_id).await.map_err(Error::queue)?;

  tracing::info!(
    task_id = %claimed.task_id,
    attempt = claimed.task.attempt,
    ?outcome,
    "enrichment task finished"
  );
  Ok(true)
}

pub async fn run_worker<S, P>(store: Arc<S>, provider: Arc<P>, config: WorkerConfig)
where
  S: ProfileStore + TaskQueue,
  P: EnrichmentProvider,
{
  let lease = Duration::from_secs(config.lease_secs);
  let idle = Duration::from_millis(config.poll_interval_ms);
  tracing::info!(lease_secs = config.lease_secs, "enrichment worker started");

  loop {
    match process_once(&*store, &*provider, lease).await {
      // Drain the queue before sleeping again.
      Ok(true) => continue,
      Ok(false) => {}
      Err(err) => tracing::error!(error = %err, "enrichment queue processing failed"),
    }

    tokio::time::sleep(idle).await;
  }
}
