//! Profile operations: registration, combined reads, updates and search.
//!
//! Every function here is generic over [`ProfileStore`]; the store supplies
//! atomic single-record writes and this module supplies the merge rules.

use chrono::Utc;
use serde_json::json;

use crate::{
  Error, Result,
  id::{MAX_ID_ATTEMPTS, generate_id},
  identifier::{IdentifierKind, classify, derive_domain},
  query::{Page, Predicate, compile},
  record::{Attributes, CombinedProfile, Record, RecordKind, Registration},
  store::{Insert, ProfileStore},
};

// ─── Resolution ──────────────────────────────────────────────────────────────

/// The raw records behind a profile, before any account view is applied.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
  pub person:  Option<Record>,
  pub company: Option<Record>,
}

impl Resolved {
  fn company_only(company: Record) -> Self {
    Self { person: None, company: Some(company) }
  }

  pub fn combined(&self, account_id: Option<&str>) -> CombinedProfile {
    CombinedProfile {
      person:  self.person.as_ref().map(|r| r.combined(account_id)),
      company: self.company.as_ref().map(|r| r.combined(account_id)),
    }
  }
}

/// Locate the record an identifier points at. Opaque identifiers are record
/// ids and may resolve to either kind.
pub async fn find_record<S: ProfileStore>(
  store: &S,
  identifier: &str,
) -> Result<Option<Record>> {
  let found = match classify(identifier) {
    IdentifierKind::Email => store.find_by_email(identifier).await,
    IdentifierKind::Domain => store.find_by_domain(identifier).await,
    IdentifierKind::Opaque => store.find_by_id(identifier).await,
  };
  found.map_err(Error::store)
}

/// Resolve an identifier to its person and company records.
///
/// A person's company is found by the domain of the email `account_id`
/// sees, never through a stored link, and is `None` when no record exists
/// for that domain.
pub async fn resolve<S: ProfileStore>(
  store: &S,
  identifier: &str,
  account_id: Option<&str>,
) -> Result<Option<Resolved>> {
  let Some(record) = find_record(store, identifier).await? else {
    return Ok(None);
  };

  if record.is_company() {
    return Ok(Some(Resolved::company_only(record)));
  }

  let company = company_of(store, &record, account_id).await?;
  Ok(Some(Resolved { person: Some(record), company }))
}

async fn company_of<S: ProfileStore>(
  store: &S,
  person: &Record,
  account_id: Option<&str>,
) -> Result<Option<Record>> {
  let view = person.combined(account_id);
  let Some(domain) = view.email().and_then(derive_domain) else {
    tracing::debug!(record_id = %person.id, "person has no usable email domain");
    return Ok(None);
  };
  store.find_by_domain(domain).await.map_err(Error::store)
}

/// `GET`-style read: the combined person/company view for `account_id`.
pub async fn get_combined_profile<S: ProfileStore>(
  store: &S,
  identifier: &str,
  account_id: Option<&str>,
) -> Result<Option<CombinedProfile>> {
  Ok(
    resolve(store, identifier, account_id)
      .await?
      .map(|resolved| resolved.combined(account_id)),
  )
}

// ─── Creation ────────────────────────────────────────────────────────────────

/// Insert a record for `key` under a fresh id, or return the record that
/// already owns the key. The flag is `true` when this call created it.
///
/// An id that collides at insert time is retried with a new id.
async fn insert_or_existing<S: ProfileStore>(
  store: &S,
  kind: RecordKind,
  key: &str,
) -> Result<(Record, bool)> {
  for _ in 0..MAX_ID_ATTEMPTS {
    let id = generate_id(store).await?;
    let record = Record::new(id, kind, key, Utc::now());

    match store.insert_record(record).await.map_err(Error::store)? {
      Insert::Created(record) => {
        tracing::info!(record_id = %record.id, %kind, key, "created record");
        return Ok((record, true));
      }
      Insert::KeyTaken(existing) => return Ok((existing, false)),
      Insert::IdTaken => {
        tracing::debug!(%kind, key, "id taken at insert time, retrying");
      }
    }
  }

  Err(Error::IdExhausted { attempts: MAX_ID_ATTEMPTS })
}

/// The company record for `domain`, created if it does not exist yet.
pub async fn ensure_company<S: ProfileStore>(
  store: &S,
  domain: &str,
) -> Result<Record> {
  if let Some(company) =
    store.find_by_domain(domain).await.map_err(Error::store)?
  {
    return Ok(company);
  }
  Ok(insert_or_existing(store, RecordKind::Company, domain).await?.0)
}

/// Register `email`, creating the person and company records as needed.
///
/// With no name supplied, an already-registered email is returned untouched.
/// A supplied name is written to `account_id`'s overlay on the person, or to
/// the base attributes when there is no account.
pub async fn create_person_profile<S: ProfileStore>(
  store: &S,
  email: &str,
  given_name: Option<&str>,
  family_name: Option<&str>,
  account_id: Option<&str>,
) -> Result<Registration> {
  let domain = match classify(email) {
    IdentifierKind::Email => derive_domain(email),
    _ => None,
  }
  .ok_or_else(|| Error::InvalidEmail(email.to_owned()))?;

  let given = given_name.filter(|s| !s.is_empty());
  let family = family_name.filter(|s| !s.is_empty());
  let overriding_name = given.is_some() || family.is_some();

  let existing = store.find_by_email(email).await.map_err(Error::store)?;
  let (person, is_new) = match existing {
    Some(person) if !overriding_name => {
      let company =
        store.find_by_domain(domain).await.map_err(Error::store)?;
      return Ok(Registration { person, company, is_new: false });
    }
    Some(person) => (person, false),
    None => insert_or_existing(store, RecordKind::Person, email).await?,
  };

  let company = ensure_company(store, domain).await?;

  if !overriding_name {
    return Ok(Registration { person, company: Some(company), is_new });
  }

  let fields = name_fields(given, family);
  let updated = match account_id {
    Some(account) => store.merge_overlay(&person.id, account, fields).await,
    None => store.merge_attributes(&person.id, fields, None).await,
  }
  .map_err(Error::store)?;

  Ok(Registration {
    person: updated.unwrap_or(person),
    company: Some(company),
    is_new,
  })
}

fn name_fields(given: Option<&str>, family: Option<&str>) -> Attributes {
  let full = [given, family].into_iter().flatten().collect::<Vec<_>>();

  let mut fields = Attributes::new();
  fields.insert(
    "name".to_owned(),
    json!({
      "fullName":   full.join(" "),
      "givenName":  given,
      "familyName": family,
    }),
  );
  fields
}

// ─── Updates ─────────────────────────────────────────────────────────────────

/// Merge `data` into the record `identifier` points at: into its base
/// attributes, or into `account_id`'s overlay when an account is given.
/// Returns `None` when nothing matches the identifier.
pub async fn update_profile<S: ProfileStore>(
  store: &S,
  identifier: &str,
  data: Attributes,
  account_id: Option<&str>,
) -> Result<Option<Record>> {
  let Some(target) = find_record(store, identifier).await? else {
    return Ok(None);
  };

  let updated = match account_id {
    Some(account) => store.merge_overlay(&target.id, account, data).await,
    None => store.merge_attributes(&target.id, data, None).await,
  };
  updated.map_err(Error::store)
}

// ─── Search ──────────────────────────────────────────────────────────────────

/// Execute a compiled predicate. Any store fault is logged and reported as
/// `None`, which callers treat as an invalid query.
pub async fn run_query<S: ProfileStore>(
  store: &S,
  predicate: &Predicate,
  page: &Page,
) -> Option<Vec<Record>> {
  match store.run_query(predicate, page).await {
    Ok(records) => Some(records),
    Err(err) => {
      tracing::warn!(error = %err, "query execution failed");
      None
    }
  }
}

/// Compile `filter` for `account_id`, run it, and shape each hit as a
/// combined profile: people with their derived company, companies alone.
pub async fn search<S: ProfileStore>(
  store: &S,
  filter: &str,
  account_id: &str,
  page: &Page,
) -> Result<Vec<CombinedProfile>> {
  let predicate = compile(filter, account_id)?;
  let unexecutable = || Error::InvalidQuery(format!("could not execute {filter:?}"));
  let records = run_query(store, &predicate, page)
    .await
    .ok_or_else(unexecutable)?;

  let mut profiles = Vec::with_capacity(records.len());
  for record in records {
    let resolved = if record.is_company() {
      Resolved::company_only(record)
    } else {
      let company = company_of(store, &record, Some(account_id))
        .await
        .map_err(|err| {
          tracing::warn!(record_id = %record.id, error = %err, "company lookup failed during query");
          unexecutable()
        })?;
      Resolved { person: Some(record), company }
    };
    profiles.push(resolved.combined(Some(account_id)));
  }

  Ok(profiles)
}
