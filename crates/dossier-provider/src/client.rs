//! [`HttpProvider`]: the reqwest-backed [`EnrichmentProvider`].

use std::time::Duration;

use dossier_core::{
  provider::{CombinedLookup, EnrichmentProvider, ProviderError},
  record::Attributes,
};
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::ProviderConfig;

/// The HTTP client could not be constructed.
#[derive(Debug, thiserror::Error)]
#[error("failed to build provider HTTP client: {0}")]
pub struct BuildError(#[from] reqwest::Error);

/// Async client for the provider's streaming lookup endpoints.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpProvider {
  client: Client,
  config: ProviderConfig,
}

impl HttpProvider {
  pub fn new(config: ProviderConfig) -> Result<Self, BuildError> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, config })
  }

  fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    if self.config.api_key.is_empty() {
      req
    } else {
      req.bearer_auth(&self.config.api_key)
    }
  }

  /// `GET <url>?<param>=<value>`. `None` means the provider has nothing on
  /// the subject.
  async fn find(
    &self,
    url: &str,
    param: &str,
    value: &str,
  ) -> Result<Option<Value>, ProviderError> {
    let resp = self
      .auth(self.client.get(url))
      .query(&[(param, value)])
      .send()
      .await
      .map_err(|e| ProviderError::Transport(e.to_string()))?;

    let status = resp.status();
    match status {
      StatusCode::OK => resp
        .json()
        .await
        .map(Some)
        .map_err(|e| ProviderError::Unexpected(format!("decoding body: {e}"))),
      StatusCode::ACCEPTED | StatusCode::NOT_FOUND => {
        tracing::debug!(%status, url, "provider has no data");
        Ok(None)
      }
      StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimited),
      StatusCode::BAD_REQUEST => {
        let body = resp.text().await.unwrap_or_default();
        if body.contains("rate_limit") {
          Err(ProviderError::RateLimited)
        } else {
          Err(ProviderError::Unexpected(format!("{status}: {body}")))
        }
      }
      _ => Err(ProviderError::Unexpected(format!("{status} from {url}"))),
    }
  }
}

fn into_attributes(value: Option<Value>) -> Result<Attributes, ProviderError> {
  match value {
    None | Some(Value::Null) => Ok(Attributes::new()),
    Some(Value::Object(map)) => Ok(map),
    Some(other) => Err(ProviderError::Unexpected(format!(
      "expected an object, got {other}"
    ))),
  }
}

impl EnrichmentProvider for HttpProvider {
  async fn lookup_person(&self, email: &str) -> Result<Attributes, ProviderError> {
    into_attributes(self.find(&self.config.person_url, "email", email).await?)
  }

  async fn lookup_company(&self, domain: &str) -> Result<Attributes, ProviderError> {
    into_attributes(
      self
        .find(&self.config.company_url, "domain", domain)
        .await?,
    )
  }

  async fn lookup_combined(&self, email: &str) -> Result<CombinedLookup, ProviderError> {
    let Some(mut found) = self.find(&self.config.combined_url, "email", email).await?
    else {
      return Ok(CombinedLookup::default());
    };

    Ok(CombinedLookup {
      person:  into_attributes(found.get_mut("person").map(Value::take))?,
      company: into_attributes(found.get_mut("company").map(Value::take))?,
    })
  }
}
