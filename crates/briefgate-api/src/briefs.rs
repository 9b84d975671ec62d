//! Handlers for brief endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/briefs` | `?mode=` (default `all`), filters, optional `recent` |
//! | `GET`  | `/briefs/:id/visibility` | 404 if missing or hidden |
//! | `POST` | `/briefs/:id/suppliers/:company_id/nda` | Body: [`NdaAction`] |
//! | `POST` | `/briefs/:id/response` | Supplier's answer, body: [`BriefResponse`] |
//! | `POST` | `/briefs/:id/nda/document` | NDA document replaced; decided invitations go back to pending |
//! | `GET`  | `/organizations/:id/briefs` | Organization profile view |
//!
//! `categories` and `markets` are comma-separated id lists. `recent=n` puts
//! the caller's `n` most recently opened briefs first; it only applies to an
//! unfiltered listing in a single mode.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use briefgate_core::{
  listing::{
    ListedBrief, list_briefs, list_by_organization, list_recent_first,
    list_sent_and_received,
  },
  model::{Actor, Brief, BriefSupplierInvitation},
  nda::{NdaAction, apply_nda_action, reset_for_document_change, respond_to_brief},
  notify::{EventKind, NotificationEvent, NotificationSink},
  query::{BriefFilters, ListingMode},
  store::MarketStore,
  visibility::{Classification, classify_brief_checked},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  ApiState,
  actor::CurrentActor,
  error::ApiError,
  events::{FanOutSummary, fan_out},
};

fn not_found(brief_id: Uuid) -> ApiError {
  ApiError::NotFound(format!("brief {brief_id} not found"))
}

/// Load a brief, answering 404 alike whether it is missing or hidden.
pub(crate) async fn visible_brief<S: MarketStore>(
  store: &S,
  actor: &Actor,
  brief_id: Uuid,
) -> Result<(Brief, Classification), ApiError> {
  let brief = store
    .get_brief(brief_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(brief_id))?;
  let classification = classify_brief_checked(store, actor, &brief).await;
  if !classification.visible {
    return Err(not_found(brief_id));
  }
  Ok((brief, classification))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeParam {
  /// Sent and received together.
  #[default]
  All,
  Sent,
  Received,
  Participating,
  Mine,
  TeamMember,
  Organization,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub mode:            ModeParam,
  /// Required with `mode=participating`.
  pub organization_id: Option<Uuid>,
  pub categories:      Option<String>,
  pub markets:         Option<String>,
  pub created_after:   Option<DateTime<Utc>>,
  pub created_before:  Option<DateTime<Utc>>,
  pub deadline_after:  Option<DateTime<Utc>>,
  pub deadline_before: Option<DateTime<Utc>>,
  pub recent:          Option<usize>,
}

fn parse_ids(name: &str, raw: Option<&str>) -> Result<Vec<Uuid>, ApiError> {
  let Some(raw) = raw else {
    return Ok(Vec::new());
  };
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| {
      Uuid::parse_str(s).map_err(|_| ApiError::BadRequest(format!("{name}: invalid id {s:?}")))
    })
    .collect()
}

impl ListParams {
  fn filters(&self) -> Result<BriefFilters, ApiError> {
    Ok(BriefFilters {
      categories:      parse_ids("categories", self.categories.as_deref())?,
      markets:         parse_ids("markets", self.markets.as_deref())?,
      created_after:   self.created_after,
      created_before:  self.created_before,
      deadline_after:  self.deadline_after,
      deadline_before: self.deadline_before,
    })
  }

  /// `None` for [`ModeParam::All`].
  fn listing_mode(&self) -> Result<Option<ListingMode>, ApiError> {
    Ok(Some(match self.mode {
      ModeParam::All => return Ok(None),
      ModeParam::Sent => ListingMode::Sent,
      ModeParam::Received => ListingMode::Received,
      ModeParam::Participating => {
        let organization_id = self.organization_id.ok_or_else(|| {
          ApiError::BadRequest("mode=participating requires organization_id".into())
        })?;
        ListingMode::Participating { organization_id }
      }
      ModeParam::Mine => ListingMode::Mine,
      ModeParam::TeamMember => ListingMode::TeamMember,
      ModeParam::Organization => ListingMode::Organization,
    }))
  }
}

/// `GET /briefs[?mode=...][&categories=a,b][&created_after=...][&recent=n]`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  CurrentActor(actor): CurrentActor,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ListedBrief>>, ApiError>
where
  S: MarketStore + NotificationSink + 'static,
{
  let store = state.store.as_ref();
  let filters = params.filters()?;

  let listed = match (params.listing_mode()?, params.recent) {
    (None, _) => list_sent_and_received(store, &actor, &filters).await?,
    (Some(mode), Some(recent)) if filters.is_empty() => {
      list_recent_first(store, &actor, mode, &filters, recent).await?
    }
    (Some(mode), _) => list_briefs(store, &actor, mode, &filters).await?,
  };
  Ok(Json(listed))
}

// ─── Visibility ──────────────────────────────────────────────────────────────

/// `GET /briefs/:id/visibility`
pub async fn visibility<S>(
  State(state): State<ApiState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(brief_id): Path<Uuid>,
) -> Result<Json<Classification>, ApiError>
where
  S: MarketStore + NotificationSink + 'static,
{
  let (_, classification) = visible_brief(state.store.as_ref(), &actor, brief_id).await?;
  Ok(Json(classification))
}

// ─── NDA ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationOutcome {
  pub invitation:   BriefSupplierInvitation,
  /// `None` when the change notifies nobody, or fan-out failed.
  pub notification: Option<FanOutSummary>,
}

/// Fan out `kind`, caused by `actor`. The write it reports has already
/// happened, so a failed fan-out is logged and reported as `None`.
async fn notify<S>(
  state: &ApiState<S>,
  actor: &Actor,
  brief_id: Uuid,
  kind: EventKind,
) -> Option<FanOutSummary>
where
  S: MarketStore + NotificationSink + 'static,
{
  let event = NotificationEvent {
    kind,
    triggered_by: actor.user_id,
    occurred_at: Utc::now(),
  };
  match fan_out(state, &event).await {
    Ok(summary) => Some(summary),
    Err(e) => {
      tracing::warn!(%brief_id, error = %e, "notification failed");
      None
    }
  }
}

fn nda_event(
  action: &NdaAction,
  brief_id: Uuid,
  supplier_company_id: Uuid,
) -> Option<EventKind> {
  match action {
    NdaAction::UploadNda => Some(EventKind::NdaUploaded { brief_id, supplier_company_id }),
    NdaAction::Accept => Some(EventKind::NdaAccepted { brief_id, supplier_company_id }),
    NdaAction::Decline { reason } => Some(EventKind::NdaDeclined {
      brief_id,
      supplier_company_id,
      reason: reason.clone(),
    }),
    NdaAction::NdaDocumentChanged => None,
  }
}

/// `POST /briefs/:id/suppliers/:company_id/nda`, body e.g.
/// `{"action":"decline","reason":"unsigned"}`.
pub async fn nda_action<S>(
  State(state): State<ApiState<S>>,
  CurrentActor(actor): CurrentActor,
  Path((brief_id, supplier_company_id)): Path<(Uuid, Uuid)>,
  Json(action): Json<NdaAction>,
) -> Result<Json<InvitationOutcome>, ApiError>
where
  S: MarketStore + NotificationSink + 'static,
{
  let store = state.store.as_ref();
  visible_brief(store, &actor, brief_id).await?;

  let event = nda_event(&action, brief_id, supplier_company_id);
  let invitation =
    apply_nda_action(store, &actor, brief_id, supplier_company_id, action).await?;

  let notification = match event {
    Some(kind) => notify(&state, &actor, brief_id, kind).await,
    None => None,
  };
  Ok(Json(InvitationOutcome { invitation, notification }))
}

/// `POST /briefs/:id/nda/document`: the brief's NDA document was replaced.
/// Returns the invitations that went back to pending.
pub async fn document_changed<S>(
  State(state): State<ApiState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(brief_id): Path<Uuid>,
) -> Result<Json<Vec<BriefSupplierInvitation>>, ApiError>
where
  S: MarketStore + NotificationSink + 'static,
{
  let store = state.store.as_ref();
  visible_brief(store, &actor, brief_id).await?;
  Ok(Json(reset_for_document_change(store, &actor, brief_id).await?))
}

// ─── Supplier response ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct BriefResponse {
  pub accept: bool,
  /// Passed on to the brief's contacts when declining.
  #[serde(default)]
  pub reason: Option<String>,
}

/// `POST /briefs/:id/response`, body e.g. `{"accept":false,"reason":"capacity"}`.
pub async fn respond<S>(
  State(state): State<ApiState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(brief_id): Path<Uuid>,
  Json(response): Json<BriefResponse>,
) -> Result<Json<InvitationOutcome>, ApiError>
where
  S: MarketStore + NotificationSink + 'static,
{
  let store = state.store.as_ref();
  visible_brief(store, &actor, brief_id).await?;

  let invitation = respond_to_brief(store, &actor, brief_id, response.accept).await?;
  let supplier_company_id = invitation.supplier_company_id;
  let kind = if response.accept {
    EventKind::BriefAccepted { brief_id, supplier_company_id }
  } else {
    EventKind::BriefDeclined { brief_id, supplier_company_id, reason: response.reason }
  };
  let notification = notify(&state, &actor, brief_id, kind).await;
  Ok(Json(InvitationOutcome { invitation, notification }))
}

// ─── Organization view ───────────────────────────────────────────────────────

/// `GET /organizations/:id/briefs`
pub async fn by_organization<S>(
  State(state): State<ApiState<S>>,
  CurrentActor(actor): CurrentActor,
  Path(organization_id): Path<Uuid>,
) -> Result<Json<Vec<ListedBrief>>, ApiError>
where
  S: MarketStore + NotificationSink + 'static,
{
  let listed = list_by_organization(state.store.as_ref(), &actor, organization_id).await?;
  Ok(Json(listed))
}
