//! briefgate server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, serves the JSON API over HTTP and runs the weekly digest on
//! its schedule.
//!
//! # One-off digest
//!
//! ```sh
//! cargo run -p briefgate-server -- --run-digest-now
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use briefgate_server::{ServerConfig, router, run_digest_once, start_digest_schedule};
use briefgate_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::{net::TcpListener, sync::watch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "briefgate visibility and notification server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Build and deliver the weekly digest once, then exit.
  #[arg(long)]
  run_digest_now: bool,
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
    .add_source(config::Environment::with_prefix("BRIEFGATE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  if cli.run_digest_now {
    let (_cancel, cancelled) = watch::channel(false);
    let report = run_digest_once(store.as_ref(), &cancelled)
      .await
      .context("weekly digest failed")?;
    println!(
      "scanned {} users, sent {} digests, {} failed",
      report.users_scanned, report.digests_sent, report.failed
    );
    return Ok(());
  }

  let schedule = if server_cfg.digest_enabled {
    Some(
      start_digest_schedule(Arc::clone(&store), &server_cfg.digest_cron)
        .await
        .with_context(|| format!("failed to schedule digest {:?}", server_cfg.digest_cron))?,
    )
  } else {
    tracing::info!("weekly digest disabled");
    None
  };

  let app = router(Arc::clone(&store), &server_cfg);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  if let Some(schedule) = schedule {
    schedule.shutdown().await.context("failed to stop digest schedule")?;
  }
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
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
