//! JSON REST API for briefgate.
//!
//! Exposes an axum [`Router`] backed by any store that is both a
//! [`MarketStore`] and a [`NotificationSink`]. Authentication, TLS and
//! transport concerns are the caller's responsibility; the acting user
//! arrives in the `x-actor-id` header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", briefgate_api::api_router(store.clone(), 10))
//! ```

pub mod actor;
pub mod briefs;
pub mod error;
pub mod events;
pub mod posts;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use briefgate_core::{notify::NotificationSink, store::MarketStore};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:                Arc<S>,
  /// Deliveries in flight at once when an event fans out.
  pub dispatch_concurrency: usize,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:                Arc::clone(&self.store),
      dispatch_concurrency: self.dispatch_concurrency,
    }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>, dispatch_concurrency: usize) -> Router<()>
where
  S: MarketStore + NotificationSink + 'static,
{
  let state = ApiState { store, dispatch_concurrency };
  Router::new()
    // Briefs
    .route("/briefs", get(briefs::list::<S>))
    .route("/briefs/{id}/visibility", get(briefs::visibility::<S>))
    .route("/briefs/{id}/suppliers/{company_id}/nda", post(briefs::nda_action::<S>))
    .route("/briefs/{id}/nda/document", post(briefs::document_changed::<S>))
    .route("/briefs/{id}/response", post(briefs::respond::<S>))
    .route("/organizations/{id}/briefs", get(briefs::by_organization::<S>))
    // Posts
    .route("/posts", get(posts::feed::<S>))
    .route("/posts/{id}/visibility", get(posts::visibility::<S>))
    // Events
    .route("/events", post(events::publish::<S>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
