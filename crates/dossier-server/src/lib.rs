//! Server wiring for Dossier: configuration and the enrichment worker.

pub mod worker;

use std::path::PathBuf;

use dossier_api::StaticAccounts;
use dossier_provider::ProviderConfig;
use serde::Deserialize;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `DOSSIER_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  pub provider:   ProviderConfig,
  pub worker:     WorkerConfig,
  pub accounts:   Vec<AccountConfig>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".into(),
      port:       8080,
      store_path: PathBuf::from("dossier.db"),
      provider:   ProviderConfig::default(),
      worker:     WorkerConfig::default(),
      accounts:   Vec::new(),
    }
  }
}

impl ServerConfig {
  /// The account directory described by `accounts`.
  pub fn account_directory(&self) -> StaticAccounts {
    StaticAccounts::new(
      self
        .accounts
        .iter()
        .map(|a| (a.api_key.clone(), a.account_id.clone())),
    )
  }
}

/// Enrichment worker tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
  /// Sleep between polls when the queue is empty.
  pub poll_interval_ms: u64,
  /// How long a claimed task stays invisible to other workers.
  pub lease_secs:       u64,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self { poll_interval_ms: 1000, lease_secs: 300 }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
  pub api_key:    String,
  pub account_id: String,
}
