//! Handlers for `/events`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/events` | Body: a tagged [`EventKind`], e.g. `{"type":"new_post","post_id":"…"}` |
//!
//! The triggering user is always the caller; it is never taken from the
//! body. Only announcements are accepted here: `new_brief` and
//! `brief_changed` from the brief's client side, `new_post` and
//! `post_rating_created` from the post's company, `post_rating_answered` from
//! the rating's author. NDA decisions and brief responses are emitted by the
//! routes that record them. A subject the caller cannot see answers 404
//! exactly like a missing one.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use briefgate_core::{
  model::Actor,
  notify::{EventKind, NotificationEvent, NotificationSink, dispatch, resolve_recipients},
  store::MarketStore,
  visibility::{Classification, classify_post_checked},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  ApiState, actor::CurrentActor, briefs::visible_brief, error::ApiError, posts::visible_post,
};

/// What became of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutSummary {
  pub event_id:   String,
  pub recipients: usize,
  pub delivered:  usize,
  pub failed:     Vec<Uuid>,
}

/// Resolve the recipients of `event` and deliver to all of them.
pub async fn fan_out<S>(
  state: &ApiState<S>,
  event: &NotificationEvent,
) -> Result<FanOutSummary, ApiError>
where
  S: MarketStore + NotificationSink + 'static,
{
  let deliveries = resolve_recipients(state.store.as_ref(), event).await?;
  let recipients = deliveries.len();
  let report = dispatch(Arc::clone(&state.store), deliveries, state.dispatch_concurrency).await;
  Ok(FanOutSummary {
    event_id: event.fingerprint(),
    recipients,
    delivered: report.delivered,
    failed: report.failed,
  })
}

/// `POST /events`: returns 202 + [`FanOutSummary`].
pub async fn publish<S>(
  State(state): State<ApiState<S>>,
  CurrentActor(actor): CurrentActor,
  Json(kind): Json<EventKind>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MarketStore + NotificationSink + 'static,
{
  authorize_announcement(state.store.as_ref(), &actor, &kind).await?;

  let event = NotificationEvent {
    kind,
    triggered_by: actor.user_id,
    occurred_at: Utc::now(),
  };
  let summary = fan_out(&state, &event).await?;
  Ok((StatusCode::ACCEPTED, Json(summary)))
}

// ─── Authorization ───────────────────────────────────────────────────────────

fn require_sender(
  actor: &Actor,
  classification: &Classification,
  subject: &str,
) -> Result<(), ApiError> {
  if actor.is_platform_admin() || classification.is_sent() {
    Ok(())
  } else {
    Err(ApiError::Forbidden(format!("only the {subject}'s own side can announce it")))
  }
}

/// May `actor` announce `kind`?
async fn authorize_announcement<S: MarketStore>(
  store: &S,
  actor: &Actor,
  kind: &EventKind,
) -> Result<(), ApiError> {
  match kind {
    EventKind::NewBrief { brief_id, .. } | EventKind::BriefChanged { brief_id, .. } => {
      let (_, classification) = visible_brief(store, actor, *brief_id).await?;
      require_sender(actor, &classification, "brief")
    }

    EventKind::NewPost { post_id } => {
      let (_, classification) = visible_post(store, actor, *post_id).await?;
      require_sender(actor, &classification, "post")
    }

    EventKind::PostRatingCreated { rating_id } | EventKind::PostRatingAnswered { rating_id } => {
      let not_found = || ApiError::NotFound(format!("rating {rating_id} not found"));
      let rating = store
        .get_rating(*rating_id)
        .await
        .map_err(ApiError::store)?
        .ok_or_else(not_found)?;
      let post = store
        .get_post(rating.post_id)
        .await
        .map_err(ApiError::store)?
        .ok_or_else(not_found)?;
      let classification = classify_post_checked(store, actor, &post).await;
      if !classification.visible {
        return Err(not_found());
      }

      if matches!(kind, EventKind::PostRatingCreated { .. }) {
        require_sender(actor, &classification, "post")
      } else if actor.is_platform_admin() || rating.author_id == actor.user_id {
        Ok(())
      } else {
        Err(ApiError::Forbidden("only the rating's author can answer it".into()))
      }
    }

    EventKind::NdaUploaded { .. }
    | EventKind::NdaAccepted { .. }
    | EventKind::NdaDeclined { .. }
    | EventKind::BriefAccepted { .. }
    | EventKind::BriefDeclined { .. } => Err(ApiError::BadRequest(format!(
      "{} is emitted by the route that records it",
      kind.as_ref()
    ))),
  }
}
