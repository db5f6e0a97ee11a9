//! [`TaskQueue`] implementation over the `enrichment_tasks` table.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use dossier_core::{
  enrichment::EnrichmentTask,
  store::{ClaimedTask, TaskQueue},
};

use crate::{
  Result, SqliteStore,
  encode::{decode_task, encode_dt, encode_task},
};

impl TaskQueue for SqliteStore {
  type QueueError = crate::Error;

  async fn enqueue(&self, task: EnrichmentTask, delay: Duration) -> Result<String> {
    let now = Utc::now();

    let task_id          = Uuid::new_v4().hyphenated().to_string();
    let payload_str      = encode_task(&task)?;
    let attempt          = task.attempt;
    let available_at_str = encode_dt(now + TimeDelta::from_std(delay)?);
    let created_at_str   = encode_dt(now);

    let id = task_id.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO enrichment_tasks (task_id, payload, attempt, available_at, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id, payload_str, attempt, available_at_str, created_at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(task_id)
  }

  async fn claim_next(
    &self,
    now: DateTime<Utc>,
    lease: Duration,
  ) -> Result<Option<ClaimedTask>> {
    let now_str         = encode_dt(now);
    let lease_until_str = encode_dt(now + TimeDelta::from_std(lease)?);

    let claimed = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        loop {
          let next: Option<(String, String)> = tx
            .query_row(
              "SELECT task_id, payload FROM enrichment_tasks
               WHERE available_at <= ?1
               ORDER BY available_at ASC, created_at ASC
               LIMIT 1",
              rusqlite::params![now_str],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

          let Some((task_id, payload)) = next else {
            tx.commit()?;
            return Ok(None);
          };

          // An undecodable payload would fail on every claim; drop it.
          let task = match decode_task(&payload) {
            Ok(task) => task,
            Err(err) => {
              tracing::warn!(task_id = %task_id, error = %err, "dropping undecodable task");
              tx.execute(
                "DELETE FROM enrichment_tasks WHERE task_id = ?1",
                rusqlite::params![task_id],
              )?;
              continue;
            }
          };

          tx.execute(
            "UPDATE enrichment_tasks SET available_at = ?2 WHERE task_id = ?1",
            rusqlite::params![task_id, lease_until_str],
          )?;
          tx.commit()?;
          return Ok(Some(ClaimedTask { task_id, task }));
        }
      })
      .await?;

    Ok(claimed)
  }

  async fn complete(&self, task_id: &str) -> Result<()> {
    let task_id = task_id.to_owned();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM enrichment_tasks WHERE task_id = ?1",
          rusqlite::params![task_id],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }
}
