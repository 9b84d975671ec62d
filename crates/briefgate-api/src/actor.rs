//! The acting user, taken from the `x-actor-id` header.
//!
//! Authentication happens upstream; by the time a request reaches this
//! router the header carries a user id the gateway vouched for.

use axum::{extract::FromRequestParts, http::request::Parts};
use briefgate_core::{model::Actor, notify::NotificationSink, store::MarketStore};
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

pub const ACTOR_HEADER: &str = "x-actor-id";

/// The user the request is made on behalf of.
pub struct CurrentActor(pub Actor);

impl<S> FromRequestParts<ApiState<S>> for CurrentActor
where
  S: MarketStore + NotificationSink + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    let user_id = parts
      .headers
      .get(ACTOR_HEADER)
      .and_then(|v| v.to_str().ok())
      .and_then(|s| Uuid::parse_str(s.trim()).ok())
      .ok_or_else(|| ApiError::Unauthorized(format!("missing or invalid {ACTOR_HEADER}")))?;

    let actor = state
      .store
      .get_actor(user_id)
      .await
      .map_err(ApiError::store)?
      .ok_or_else(|| ApiError::Unauthorized(format!("unknown user {user_id}")))?;
    Ok(CurrentActor(actor))
  }
}
