//! Bounded, failure-isolated delivery of notification records.

use std::{collections::HashMap, future::Future, sync::Arc};

use tokio::{sync::Semaphore, task::JoinSet};
use uuid::Uuid;

use super::event::Delivery;

/// The external delivery collaborator: an outbox, a queue, a mailer.
///
/// All methods return `Send` futures so a sink can be driven from spawned
/// tasks.
pub trait NotificationSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Hand one notification to delivery on all of its channels.
  fn deliver<'a>(
    &'a self,
    delivery: &'a Delivery,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
  pub delivered: usize,
  /// Receivers whose delivery failed, in completion order.
  pub failed:    Vec<Uuid>,
}

/// Deliver every record with at most `concurrency` deliveries in flight.
///
/// A failing (or panicking) delivery is logged and counted; it never cancels
/// its siblings.
pub async fn dispatch<K>(
  sink: Arc<K>,
  deliveries: Vec<Delivery>,
  concurrency: usize,
) -> DispatchReport
where
  K: NotificationSink + 'static,
{
  let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
  let mut tasks = JoinSet::new();
  let mut receivers = HashMap::new();

  for delivery in deliveries {
    let sink = Arc::clone(&sink);
    let semaphore = Arc::clone(&semaphore);
    let receiver = delivery.notification.receiver_id;
    let handle = tasks.spawn(async move {
      // Never closed, so acquiring only fails if that changes.
      let _permit = semaphore.acquire_owned().await.ok();
      sink.deliver(&delivery).await
    });
    receivers.insert(handle.id(), receiver);
  }

  let mut report = DispatchReport::default();
  while let Some(joined) = tasks.join_next_with_id().await {
    let (id, outcome) = match joined {
      Ok((id, result)) => (id, Ok(result)),
      Err(e) => (e.id(), Err(e)),
    };
    let receiver = receivers.remove(&id).unwrap_or_default();
    match outcome {
      Ok(Ok(())) => report.delivered += 1,
      Ok(Err(e)) => {
        tracing::warn!(receiver_id = %receiver, error = %e, "delivery failed");
        report.failed.push(receiver);
      }
      Err(e) => {
        tracing::error!(receiver_id = %receiver, error = %e, "delivery task aborted");
        report.failed.push(receiver);
      }
    }
  }

  tracing::info!(
    delivered = report.delivered,
    failed = report.failed.len(),
    "dispatch finished"
  );
  report
}
