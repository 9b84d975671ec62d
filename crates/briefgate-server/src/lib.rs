//! HTTP server and scheduled jobs for briefgate.
//!
//! Mounts the JSON API under `/api` and runs the weekly post digest on a cron
//! schedule. The binary in `main.rs` wires these to a SQLite store.

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use briefgate_core::{
  notify::{DEFAULT_DISPATCH_CONCURRENCY, DigestReport, NotificationSink, run_weekly_digest},
  store::MarketStore,
};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::watch;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Monday, 08:00.
pub const DEFAULT_DIGEST_CRON: &str = "0 0 8 * * Mon";

fn default_dispatch_concurrency() -> usize { DEFAULT_DISPATCH_CONCURRENCY }

fn default_digest_cron() -> String { DEFAULT_DIGEST_CRON.to_owned() }

fn default_true() -> bool { true }

/// Runtime server configuration, deserialised from `config.toml` and
/// `BRIEFGATE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  pub store_path:           PathBuf,
  #[serde(default = "default_dispatch_concurrency")]
  pub dispatch_concurrency: usize,
  /// Six-field cron expression (seconds first).
  #[serde(default = "default_digest_cron")]
  pub digest_cron:          String,
  #[serde(default = "default_true")]
  pub digest_enabled:       bool,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server's axum [`Router`].
pub fn router<S>(store: Arc<S>, config: &ServerConfig) -> Router
where
  S: MarketStore + NotificationSink + 'static,
{
  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", briefgate_api::api_router(store, config.dispatch_concurrency))
    .layer(TraceLayer::new_for_http())
}

// ─── Weekly digest ───────────────────────────────────────────────────────────

/// Run the digest once, now.
pub async fn run_digest_once<S>(
  store: &S,
  cancel: &watch::Receiver<bool>,
) -> briefgate_core::Result<DigestReport>
where
  S: MarketStore + NotificationSink,
{
  run_weekly_digest(store, store, Utc::now(), cancel).await
}

/// A running digest schedule.
pub struct DigestSchedule {
  scheduler: JobScheduler,
  cancel:    watch::Sender<bool>,
}

impl DigestSchedule {
  /// Stop a run in progress after its current user, and stop scheduling new
  /// ones.
  pub async fn shutdown(mut self) -> Result<(), JobSchedulerError> {
    self.cancel.send_replace(true);
    self.scheduler.shutdown().await
  }
}

/// Schedule the weekly digest on `cron`.
pub async fn start_digest_schedule<S>(
  store: Arc<S>,
  cron: &str,
) -> Result<DigestSchedule, JobSchedulerError>
where
  S: MarketStore + NotificationSink + 'static,
{
  let (cancel, cancelled) = watch::channel(false);
  let scheduler = JobScheduler::new().await?;

  scheduler
    .add(Job::new_async(cron, move |_, _| {
      let store = Arc::clone(&store);
      let cancelled = cancelled.clone();

      Box::pin(async move {
        match run_digest_once(store.as_ref(), &cancelled).await {
          Ok(report) => tracing::info!(
            sent = report.digests_sent,
            failed = report.failed,
            cancelled = report.cancelled,
            "scheduled weekly digest finished"
          ),
          Err(e) => tracing::error!(error = %e, "scheduled weekly digest failed"),
        }
      })
    })?)
    .await?;

  scheduler.start().await?;
  tracing::info!(%cron, "weekly digest scheduled");
  Ok(DigestSchedule { scheduler, cancel })
}
