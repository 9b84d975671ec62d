//! The weekly post digest: a batch run of the post visibility and interest
//! rules, one notification per user.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use super::{
  dispatch::NotificationSink,
  event::{Channel, Delivery, DigestItem, Notification},
};
use crate::{
  Error, Result,
  model::{Actor, Post},
  store::MarketStore,
  visibility::{Direction, classify_post_checked},
};

/// How far back a digest looks.
pub const DIGEST_WINDOW_DAYS: i64 = 7;
/// Most posts in one digest.
pub const MAX_DIGEST_ITEMS: usize = 10;
/// Longest run of consecutive posts from one organization.
pub const MAX_SAME_ORGANIZATION_RUN: usize = 2;
/// Descriptions are cut to this many characters.
pub const DESCRIPTION_LIMIT: usize = 120;

/// Drop items that would extend a run of more than `max_run` consecutive
/// items sharing the same key. Order is preserved.
pub fn limit_runs<T, K, F>(items: Vec<T>, max_run: usize, key: F) -> Vec<T>
where
  K: PartialEq,
  F: Fn(&T) -> K,
{
  let mut out: Vec<T> = Vec::with_capacity(items.len());
  let mut run = 0;
  for item in items {
    let continues = out.last().is_some_and(|last| key(last) == key(&item));
    run = if continues { run + 1 } else { 1 };
    if run <= max_run {
      out.push(item);
    }
  }
  out
}

fn truncate(text: &str, limit: usize) -> String { text.chars().take(limit).collect() }

/// Posts of the last week that `actor` receives and is interested in, newest
/// first, with same-organization runs limited and the total capped.
pub async fn digest_posts<S: MarketStore>(
  store: &S,
  actor: &Actor,
  now: DateTime<Utc>,
) -> Result<Vec<Post>> {
  let interests: HashSet<Uuid> = store
    .interests_of_user(actor.user_id)
    .await
    .map_err(Error::store)?
    .into_iter()
    .collect();
  if interests.is_empty() {
    return Ok(Vec::new());
  }

  let since = now - Duration::days(DIGEST_WINDOW_DAYS);
  let mut posts = store
    .published_posts(Some(since))
    .await
    .map_err(Error::store)?;
  posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

  let mut eligible = Vec::new();
  for post in posts {
    if post.is_draft || !post.categories.iter().any(|c| interests.contains(c)) {
      continue;
    }
    let classification = classify_post_checked(store, actor, &post).await;
    if classification.direction == Some(Direction::Received) {
      eligible.push(post);
    }
  }

  let mut digest = limit_runs(eligible, MAX_SAME_ORGANIZATION_RUN, |p| p.organization_id);
  digest.truncate(MAX_DIGEST_ITEMS);
  Ok(digest)
}

/// The digest notification for `actor`, or `None` when there is nothing to
/// tell them.
pub async fn weekly_digest_for<S: MarketStore>(
  store: &S,
  actor: &Actor,
  now: DateTime<Utc>,
) -> Result<Option<Delivery>> {
  let posts = digest_posts(store, actor, now).await?;
  if posts.is_empty() {
    return Ok(None);
  }

  let items: Vec<DigestItem> = posts
    .into_iter()
    .map(|p| DigestItem {
      post_id:         p.post_id,
      organization_id: p.organization_id,
      title:           p.title,
      description:     truncate(&p.description, DESCRIPTION_LIMIT),
      created_at:      p.created_at,
    })
    .collect();

  Ok(Some(Delivery {
    notification: Notification {
      notification_id: Uuid::new_v4(),
      event_id:        format!("weekly_digest:{}:{}", actor.user_id, now.date_naive()),
      kind:            "weekly_digest".into(),
      title:           "Your weekly digest".into(),
      description:     format!("{} new posts matching your interests", items.len()),
      link:            "/posts".into(),
      receiver_id:     actor.user_id,
      created_at:      now,
      items,
    },
    channels:     vec![Channel::InApp, Channel::Email],
  }))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestReport {
  pub users_scanned: usize,
  pub digests_sent:  usize,
  pub failed:        usize,
  /// The run stopped early on the cancellation signal.
  pub cancelled:     bool,
}

/// Build and deliver every user's digest.
///
/// `cancel` is checked between users; setting it to `true` stops the run
/// after the user in progress. A failure for one user is logged and the run
/// moves on. Restarting simply reprocesses everyone.
pub async fn run_weekly_digest<S, K>(
  store: &S,
  sink: &K,
  now: DateTime<Utc>,
  cancel: &watch::Receiver<bool>,
) -> Result<DigestReport>
where
  S: MarketStore,
  K: NotificationSink,
{
  let users = store.all_users().await.map_err(Error::store)?;
  let mut report = DigestReport::default();

  for user in users {
    if *cancel.borrow() {
      report.cancelled = true;
      tracing::info!(scanned = report.users_scanned, "weekly digest cancelled");
      break;
    }
    report.users_scanned += 1;

    let delivery = match weekly_digest_for(store, &user, now).await {
      Ok(Some(delivery)) => delivery,
      Ok(None) => continue,
      Err(e) => {
        tracing::warn!(user_id = %user.user_id, error = %e, "digest skipped");
        report.failed += 1;
        continue;
      }
    };
    match sink.deliver(&delivery).await {
      Ok(()) => report.digests_sent += 1,
      Err(e) => {
        tracing::warn!(user_id = %user.user_id, error = %e, "digest delivery failed");
        report.failed += 1;
      }
    }
  }

  tracing::info!(
    scanned = report.users_scanned,
    sent = report.digests_sent,
    failed = report.failed,
    "weekly digest finished"
  );
  Ok(report)
}
