//! Handlers for `/posts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/posts` | Posts addressed to the caller's company |
//! | `GET`  | `/posts/:id/visibility` | 404 if missing or hidden |

use axum::{
  Json,
  extract::{Path, State},
};
use briefgate_core::{
  listing::{ListedPost, list_received_posts},
  model::{Actor, Post},
  notify::NotificationSink,
  store::MarketStore,
  visibility::{Classification, classify_post_checked},
};
use uuid::Uuid;

use crate::{ApiState, actor::CurrentActor, error::ApiError};

/// `GET /posts`
pub async fn feed<S>(
  State(state): State<ApiState<S>>,
  CurrentActor(actor): CurrentActor,
) -> Result<Json<Vec<ListedPost>>, ApiError>
where
  S: MarketStore + NotificationSink + 'static,
{
  Ok(Json(list_received_posts(state.store.as_ref(), &actor).await?))
}

/// Load a post, answering 404 alike whether it is missing or hidden.
pub(crate) async fn visible_post<S: MarketStore>(
  store: &S,
  actor: &Actor,
  post_id: Uuid,
) -> Result<(Post, Classification), ApiError> {
  let not_found = || ApiError::NotFound(format!("post {post_id} not found"));
  let post = store
    .get_post(post_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(not_found)?;

  let classification = classify_post_checked(store, actor, &post).await;
  if !classification.visible {
    return Err(not_found());
  }
  Ok((post, classification))
}

/// `GET /posts/:id/visibility`
pub async fn visibility<S>(
  State(state): State<ApiState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(post_id): Path<Uuid>,
) -> Result<Json<Classification>, ApiError>
where
  S: MarketStore + NotificationSink + 'static,
{
  let (_, classification) = visible_post(state.store.as_ref(), &actor, post_id).await?;
  Ok(Json(classification))
}
