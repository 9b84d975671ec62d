//! NDA state tracking for brief invitations.
//!
//! ```text
//!   Unset ──upload──▶ Pending ──accept──▶ Accepted
//!                      │   ▲                 │
//!                decline   └─document change─┤
//!                      ▼                     │
//!                   Declined ◀───────────────┘ (document change → Pending)
//! ```
//!
//! [`transition`] is pure. [`apply_nda_action`] adds authorization and a
//! compare-and-swap write, so concurrent accept/decline on the same
//! invitation leaves exactly one winner.

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::{
  Error, Result,
  model::{
    Actor, Brief, BriefSupplierInvitation, NdaRequirement, NdaState,
  },
  store::MarketStore,
};

/// Writers retry this many times after losing a compare-and-swap.
const MAX_SWAP_ATTEMPTS: usize = 3;

/// An action on an invitation's NDA state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(tag = "action", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NdaAction {
  /// The supplier uploads its signed copy of the brief's NDA.
  UploadNda,
  /// A brief admin or contact accepts the uploaded NDA.
  Accept,
  /// A brief admin or contact rejects the uploaded NDA.
  Decline { reason: String },
  /// The brief's NDA document was replaced; previous decisions lapse.
  NdaDocumentChanged,
}

/// Whether the brief's full content is disclosed to the invited company.
///
/// True iff the brief is always open, has no NDA, or the company's NDA was
/// accepted with a signed copy on file.
pub fn is_disclosed(
  brief: &Brief,
  invitation: Option<&BriefSupplierInvitation>,
) -> bool {
  if brief.nda_requirement == NdaRequirement::AlwaysOpen || !brief.has_nda {
    return true;
  }
  invitation
    .is_some_and(|i| i.nda_state == NdaState::Accepted && i.signed_nda)
}

/// Compute the invitation that results from `action`.
///
/// The input is never modified; a rejected action returns
/// [`Error::InvalidTransition`].
pub fn transition(
  invitation: &BriefSupplierInvitation,
  action: &NdaAction,
) -> Result<BriefSupplierInvitation> {
  use NdaState::*;

  let mut next = invitation.clone();
  match (invitation.nda_state, action) {
    (Unset | Pending, NdaAction::UploadNda) => {
      next.nda_state = Pending;
      next.signed_nda = false;
    }
    (Pending, NdaAction::Accept) => {
      next.nda_state = Accepted;
      next.signed_nda = true;
      next.decline_reason = None;
    }
    (Pending, NdaAction::Decline { reason }) => {
      next.nda_state = Declined;
      next.signed_nda = false;
      next.decline_reason = Some(reason.clone());
    }
    (Pending | Accepted | Declined, NdaAction::NdaDocumentChanged) => {
      next.nda_state = Pending;
      next.signed_nda = false;
      next.decline_reason = None;
    }
    (from, action) => {
      return Err(Error::InvalidTransition { from, action: action.clone() });
    }
  }
  next.revision += 1;
  Ok(next)
}

/// Record the supplier's answer to the brief itself. Only one answer is
/// accepted per invitation.
pub fn respond(
  invitation: &BriefSupplierInvitation,
  accept: bool,
) -> Result<BriefSupplierInvitation> {
  if invitation.accepted.is_some() {
    return Err(Error::AlreadyResponded {
      brief_id:   invitation.brief_id,
      company_id: invitation.supplier_company_id,
    });
  }
  let mut next = invitation.clone();
  next.accepted = Some(accept);
  next.revision += 1;
  Ok(next)
}

// ─── Store-backed operations ─────────────────────────────────────────────────

/// Authorize and apply `action` to the invitation of `supplier_company_id`
/// on `brief_id`. Returns the stored result.
pub async fn apply_nda_action<S: MarketStore>(
  store: &S,
  actor: &Actor,
  brief_id: Uuid,
  supplier_company_id: Uuid,
  action: NdaAction,
) -> Result<BriefSupplierInvitation> {
  let brief = load_brief(store, brief_id).await?;
  authorize(store, actor, &brief, Some(supplier_company_id), &action).await?;

  let updated = swap_with(store, brief_id, supplier_company_id, |current| {
    transition(current, &action)
  })
  .await?;

  tracing::info!(
    %brief_id,
    %supplier_company_id,
    %action,
    state = %updated.nda_state,
    "nda state changed"
  );
  Ok(updated)
}

/// The supplier accepts or declines the brief.
pub async fn respond_to_brief<S: MarketStore>(
  store: &S,
  actor: &Actor,
  brief_id: Uuid,
  accept: bool,
) -> Result<BriefSupplierInvitation> {
  let supplier_company_id = actor.company_id.ok_or_else(|| {
    Error::NotPermitted("only a supplier company can answer a brief".into())
  })?;
  swap_with(store, brief_id, supplier_company_id, |current| {
    respond(current, accept)
  })
  .await
}

/// Move every invitation with an NDA decision (or one under review) back to
/// `Pending` after the brief's NDA document changed.
pub async fn reset_for_document_change<S: MarketStore>(
  store: &S,
  actor: &Actor,
  brief_id: Uuid,
) -> Result<Vec<BriefSupplierInvitation>> {
  let brief = load_brief(store, brief_id).await?;
  authorize(store, actor, &brief, None, &NdaAction::NdaDocumentChanged).await?;
  let invitations = store
    .invitations_of_brief(brief_id)
    .await
    .map_err(Error::store)?;

  let mut updated = Vec::new();
  for invitation in invitations
    .iter()
    .filter(|i| i.nda_state != NdaState::Unset)
  {
    updated.push(
      swap_with(store, brief_id, invitation.supplier_company_id, |current| {
        transition(current, &NdaAction::NdaDocumentChanged)
      })
      .await?,
    );
  }
  Ok(updated)
}

async fn load_brief<S: MarketStore>(store: &S, brief_id: Uuid) -> Result<Brief> {
  store
    .get_brief(brief_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("brief {brief_id}")))
}

/// Read-modify-write with compare-and-swap on the invitation revision.
///
/// A lost race re-reads and re-applies `step`, so the loser of a concurrent
/// accept/decline sees the winner's terminal state and is rejected by the
/// state machine instead of overwriting it.
async fn swap_with<S, F>(
  store: &S,
  brief_id: Uuid,
  supplier_company_id: Uuid,
  step: F,
) -> Result<BriefSupplierInvitation>
where
  S: MarketStore,
  F: Fn(&BriefSupplierInvitation) -> Result<BriefSupplierInvitation>,
{
  for attempt in 1..=MAX_SWAP_ATTEMPTS {
    let current = store
      .get_invitation(brief_id, supplier_company_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| {
        Error::NotFound(format!(
          "invitation of company {supplier_company_id} to brief {brief_id}"
        ))
      })?;

    let next = step(&current)?;
    if store
      .swap_invitation(current.revision, next.clone())
      .await
      .map_err(Error::store)?
    {
      return Ok(next);
    }
    tracing::debug!(%brief_id, %supplier_company_id, attempt, "invitation swap lost");
  }
  Err(Error::Conflict(format!(
    "invitation of company {supplier_company_id} to brief {brief_id} is contended"
  )))
}

async fn authorize<S: MarketStore>(
  store: &S,
  actor: &Actor,
  brief: &Brief,
  supplier_company_id: Option<Uuid>,
  action: &NdaAction,
) -> Result<()> {
  if actor.is_platform_admin() {
    return Ok(());
  }

  let allowed = match action {
    NdaAction::UploadNda => {
      supplier_company_id.is_some() && actor.company_id == supplier_company_id
    }
    NdaAction::Accept | NdaAction::Decline { .. } => {
      brief.created_by == actor.user_id
        || store
          .get_membership(brief.brief_id, actor.user_id)
          .await
          .map_err(Error::store)?
          .is_some_and(|m| m.is_admin || m.is_contact)
    }
    NdaAction::NdaDocumentChanged => {
      brief.created_by == actor.user_id
        || store
          .get_membership(brief.brief_id, actor.user_id)
          .await
          .map_err(Error::store)?
          .is_some_and(|m| m.is_admin)
    }
  };

  if allowed {
    Ok(())
  } else {
    Err(Error::NotPermitted(format!("{action} on brief {}", brief.brief_id)))
  }
}
