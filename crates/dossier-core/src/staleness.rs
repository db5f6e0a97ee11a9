//! Read-time freshness: re-enrich stale records before answering.

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
  Result,
  enrichment::enrich_now,
  profile::resolve,
  provider::EnrichmentProvider,
  record::CombinedProfile,
  store::ProfileStore,
};

/// Age after which an enriched record is considered stale.
pub const STALE_AFTER_DAYS: i64 = 30;

/// Never enriched, or last enriched more than [`STALE_AFTER_DAYS`] ago.
pub fn is_stale(last_enriched_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
  match last_enriched_at {
    None => true,
    Some(at) => now - at > TimeDelta::days(STALE_AFTER_DAYS),
  }
}

/// The combined profile for `identifier`, with stale person/company records
/// re-enriched in-line first.
///
/// Enrichment failures are swallowed and the data already stored is served.
/// If any enrichment succeeded the profile is read again so the answer
/// reflects what was written.
pub async fn fetch_fresh_profile<S, P>(
  store: &S,
  provider: &P,
  identifier: &str,
  account_id: Option<&str>,
  now: DateTime<Utc>,
) -> Result<Option<CombinedProfile>>
where
  S: ProfileStore,
  P: EnrichmentProvider,
{
  let Some(resolved) = resolve(store, identifier, account_id).await? else {
    return Ok(None);
  };

  let mut refreshed = false;
  for record in [resolved.person.as_ref(), resolved.company.as_ref()]
    .into_iter()
    .flatten()
  {
    if is_stale(record.last_enriched_at, now) {
      tracing::debug!(record_id = %record.id, "record is stale, enriching");
      refreshed |= enrich_now(store, provider, record).await;
    }
  }

  let resolved = if refreshed {
    resolve(store, identifier, account_id)
      .await?
      .unwrap_or(resolved)
  } else {
    resolved
  };

  Ok(Some(resolved.combined(account_id)))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn never_enriched_is_stale() {
    assert!(is_stale(None, Utc::now()));
  }

  #[test]
  fn thirty_one_days_is_stale() {
    let now = Utc::now();
    assert!(is_stale(Some(now - TimeDelta::days(31)), now));
  }

  #[test]
  fn twenty_nine_days_is_fresh() {
    let now = Utc::now();
    assert!(!is_stale(Some(now - TimeDelta::days(29)), now));
    assert!(!is_stale(Some(now), now));
  }
}
