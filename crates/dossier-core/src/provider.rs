//! The external enrichment provider seam.

use std::future::Future;

use thiserror::Error;

use crate::record::Attributes;

/// Failure modes of a provider lookup.
#[derive(Debug, Error)]
pub enum ProviderError {
  /// The provider is throttling us; the lookup may succeed later.
  #[error("provider rate limit exceeded")]
  RateLimited,

  /// The request never produced a usable response.
  #[error("provider transport error: {0}")]
  Transport(String),

  /// The provider answered, but not with something we understand.
  #[error("unexpected provider response: {0}")]
  Unexpected(String),
}

/// Person and company fields returned by a combined lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedLookup {
  pub person:  Attributes,
  pub company: Attributes,
}

/// A source of person and company attributes.
///
/// An empty result means the provider knows nothing about the subject; that
/// is still a successful lookup.
pub trait EnrichmentProvider: Send + Sync {
  fn lookup_person<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Attributes, ProviderError>> + Send + 'a;

  fn lookup_company<'a>(
    &'a self,
    domain: &'a str,
  ) -> impl Future<Output = Result<Attributes, ProviderError>> + Send + 'a;

  /// Person and company in a single round trip, keyed by the email.
  fn lookup_combined<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<CombinedLookup, ProviderError>> + Send + 'a;
}
