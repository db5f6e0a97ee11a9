//! dossier-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `DOSSIER_*` environment variables, opens the SQLite store, starts the
//! enrichment worker, and serves the JSON API over HTTP.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `DOSSIER_PROVIDER__API_KEY`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use dossier_api::AppState;
use dossier_provider::HttpProvider;
use dossier_server::{ServerConfig, worker::run_worker};
use dossier_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Dossier profile enrichment server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("DOSSIER")
        .prefix_separator("_")
        .separator("__"),
    )
    .build()
    .context("failed to read configuration")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.accounts.is_empty() {
    tracing::warn!("no accounts configured; every request will be rejected");
  }
  if server_cfg.provider.api_key.is_empty() {
    tracing::warn!("no provider API key configured");
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let provider = HttpProvider::new(server_cfg.provider.clone())
    .context("failed to build provider client")?;
  let provider = Arc::new(provider);

  tokio::spawn(run_worker(
    Arc::clone(&store),
    Arc::clone(&provider),
    server_cfg.worker.clone(),
  ));

  let state = AppState {
    store,
    provider,
    accounts: Arc::new(server_cfg.account_directory()),
  };
  let app = dossier_api::api_router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
