use serde::Deserialize;

/// Connection settings for the enrichment provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
  /// Secret key, sent as a bearer token. Empty disables authentication.
  pub api_key:      String,
  pub person_url:   String,
  pub company_url:  String,
  pub combined_url: String,
  pub timeout_secs: u64,
}

impl Default for ProviderConfig {
  fn default() -> Self {
    Self {
      api_key:      String::new(),
      person_url:   "https://person-stream.clearbit.com/v2/people/find".into(),
      company_url:  "https://company-stream.clearbit.com/v2/companies/find"
        .into(),
      combined_url: "https://person-stream.clearbit.com/v2/combined/find"
        .into(),
      timeout_secs: 60,
    }
  }
}
