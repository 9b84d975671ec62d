//! Error types for `briefgate-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::nda::NdaAction;
use crate::model::NdaState;

#[derive(Debug, Error)]
pub enum Error {
  /// The NDA state machine does not allow `action` from `from`. Nothing was
  /// written.
  #[error("cannot apply {action} to an invitation in state {from}")]
  InvalidTransition { from: NdaState, action: NdaAction },

  /// The supplier already accepted or declined this brief.
  #[error("company {company_id} already responded to brief {brief_id}")]
  AlreadyResponded { brief_id: Uuid, company_id: Uuid },

  /// A notification candidate whose company or organization could not be
  /// resolved. Fan-out skips it and carries on.
  #[error("unresolved notification candidate {id}: {reason}")]
  UnresolvedCandidate { id: Uuid, reason: String },

  /// A listing filter that cannot be applied. Listings drop it and carry on.
  #[error("malformed filter: {0}")]
  MalformedFilter(String),

  #[error("not permitted: {0}")]
  NotPermitted(String),

  #[error("not found: {0}")]
  NotFound(String),

  /// Compare-and-swap on an invitation kept losing to concurrent writers.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box a collaborator error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
