//! Visibility policy: may this actor see this item, and how is it framed?
//!
//! Classification itself is pure. The `load_*` helpers perform the explicit
//! collaborator reads a classification needs (at most three per brief), and
//! the `*_checked` variants fail closed: an item whose context cannot be
//! loaded is hidden, never surfaced with an error.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  audience::{Audience, resolve_post_audience},
  model::{
    Actor, Brief, BriefMembership, BriefSupplierInvitation, NdaRequirement,
    Post,
  },
  nda::is_disclosed,
  store::MarketStore,
};

/// Which side of an exchange the actor is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
  /// The actor's side authored or owns the item.
  Sent,
  /// The item was addressed to the actor's company.
  Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
  pub visible:   bool,
  pub is_public: bool,
  /// `None` for hidden items and for the platform-admin view, which has no
  /// sent/received framing.
  pub direction: Option<Direction>,
}

impl Classification {
  pub const HIDDEN: Self = Self { visible: false, is_public: false, direction: None };

  const ADMIN: Self = Self { visible: true, is_public: true, direction: None };

  pub(crate) const SENT: Self = Self {
    visible:   true,
    is_public: true,
    direction: Some(Direction::Sent),
  };

  fn received(is_public: bool) -> Self {
    Self { visible: true, is_public, direction: Some(Direction::Received) }
  }

  pub fn is_sent(&self) -> bool { self.direction == Some(Direction::Sent) }
}

// ─── Briefs ──────────────────────────────────────────────────────────────────

/// Everything about an actor's relationship to one brief that
/// [`classify_brief`] consults.
#[derive(Debug, Clone, Default)]
pub struct BriefFacts {
  /// The actor's membership row on the brief.
  pub membership:             Option<BriefMembership>,
  /// The invitation addressed to the actor's company.
  pub invitation:             Option<BriefSupplierInvitation>,
  pub client_organization_id: Option<Uuid>,
  /// Disclosure precomputed by the query composer; recomputed from
  /// `invitation` when absent.
  pub disclosed:              Option<bool>,
}

/// Classify `brief` for `actor`. Rules apply in order and the first match
/// wins, so an item that is both sent and received is shown as sent.
pub fn classify_brief(actor: &Actor, brief: &Brief, facts: &BriefFacts) -> Classification {
  if brief.is_draft {
    return Classification::HIDDEN;
  }
  if actor.is_platform_admin() {
    return Classification::ADMIN;
  }

  let membership = facts.membership.filter(|m| {
    m.brief_id == brief.brief_id && m.user_id == actor.user_id
  });

  // Authors and brief admins always see their brief in full.
  if brief.created_by == actor.user_id || membership.is_some_and(|m| m.is_admin) {
    return Classification::SENT;
  }

  // The client company, unless the brief is restricted to its members.
  if actor.company_id == Some(brief.client_company_id)
    && (!brief.is_members_only() || membership.is_some())
  {
    return Classification::SENT;
  }

  // Invited suppliers, who also need a membership row on members-only briefs.
  let invitation = facts.invitation.as_ref().filter(|i| {
    i.brief_id == brief.brief_id
      && Some(i.supplier_company_id) == actor.company_id
  });
  if let Some(invitation) = invitation
    && (!brief.is_members_only() || membership.is_some())
  {
    let is_public = brief.nda_requirement == NdaRequirement::AlwaysOpen
      || facts
        .disclosed
        .unwrap_or_else(|| is_disclosed(brief, Some(invitation)));
    return Classification::received(is_public);
  }

  // Explicit membership on the client side team.
  if membership.is_some() {
    return Classification::SENT;
  }

  // Organization-wide broadcast, suppressed for members-only briefs.
  let same_organization = actor.organization_id.is_some()
    && actor.organization_id == facts.client_organization_id;
  if !brief.is_members_only() && same_organization {
    return Classification::SENT;
  }

  Classification::HIDDEN
}

/// Load the [`BriefFacts`] for `actor` and `brief`.
pub async fn load_brief_facts<S: MarketStore>(
  store: &S,
  actor: &Actor,
  brief: &Brief,
) -> Result<BriefFacts> {
  let membership = store
    .get_membership(brief.brief_id, actor.user_id)
    .await
    .map_err(Error::store)?;

  let invitation = match actor.company_id {
    Some(company_id) => store
      .get_invitation(brief.brief_id, company_id)
      .await
      .map_err(Error::store)?,
    None => None,
  };

  let client_organization_id = store
    .get_company(brief.client_company_id)
    .await
    .map_err(Error::store)?
    .map(|c| c.organization_id);

  Ok(BriefFacts { membership, invitation, client_organization_id, disclosed: None })
}

/// Load and classify, hiding the brief if its context cannot be loaded.
pub async fn classify_brief_checked<S: MarketStore>(
  store: &S,
  actor: &Actor,
  brief: &Brief,
) -> Classification {
  if brief.is_draft {
    return Classification::HIDDEN;
  }
  match load_brief_facts(store, actor, brief).await {
    Ok(facts) => classify_brief(actor, brief, &facts),
    Err(e) => {
      tracing::warn!(brief_id = %brief.brief_id, error = %e, "brief hidden: context unavailable");
      Classification::HIDDEN
    }
  }
}

// ─── Posts ───────────────────────────────────────────────────────────────────

/// Classify `post` for `actor` given the post's resolved [`Audience`].
///
/// A post never shows up as received by its own company. Posts have no NDA:
/// anything visible is public.
pub fn classify_post(actor: &Actor, post: &Post, audience: &Audience) -> Classification {
  if post.is_draft {
    return Classification::HIDDEN;
  }
  if actor.is_platform_admin() {
    return Classification::ADMIN;
  }
  if post.created_by == actor.user_id
    || actor.company_id == Some(post.supplier_company_id)
  {
    return Classification::SENT;
  }
  if audience.includes(actor.company_id) {
    return Classification::received(true);
  }
  Classification::HIDDEN
}

/// Resolve the audience and classify, hiding the post on lookup failure.
pub async fn classify_post_checked<S: MarketStore>(
  store: &S,
  actor: &Actor,
  post: &Post,
) -> Classification {
  if post.is_draft {
    return Classification::HIDDEN;
  }
  match resolve_post_audience(store, post).await {
    Ok(audience) => classify_post(actor, post, &audience),
    Err(e) => {
      tracing::warn!(post_id = %post.post_id, error = %e, "post hidden: audience unavailable");
      Classification::HIDDEN
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    model::{NdaState, PrivacyMode, PrivacyTier},
    testing::World,
  };

  fn everyone(w: &World) -> Vec<Actor> {
    vec![
      w.client_user.clone(),
      w.client_colleague.clone(),
      w.client_sibling_user.clone(),
      w.supplier_user.clone(),
      w.supplier_sibling_user.clone(),
      w.outsider_user.clone(),
      w.cpg_peer_user.clone(),
      w.admin.clone(),
    ]
  }

  // ── Briefs ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn drafts_are_hidden_from_everyone() {
    let w = World::build().await;
    let brief = Brief { is_draft: true, ..w.brief(1) };
    w.insert_brief(&brief).await;
    w.invite(&brief, w.supplier_company, NdaState::Accepted).await;

    for actor in everyone(&w) {
      let c = classify_brief_checked(&w.store, &actor, &brief).await;
      assert!(!c.visible, "draft visible to {:?}", actor.user_id);
    }
  }

  #[tokio::test]
  async fn always_open_is_public_in_every_nda_state() {
    let w = World::build().await;
    for state in [NdaState::Unset, NdaState::Pending, NdaState::Declined, NdaState::Accepted] {
      let brief = Brief {
        nda_requirement: NdaRequirement::AlwaysOpen,
        ..w.nda_brief(1)
      };
      w.insert_brief(&brief).await;
      w.invite(&brief, w.supplier_company, state).await;

      let c = classify_brief_checked(&w.store, &w.supplier_user, &brief).await;
      assert!(c.visible);
      assert!(c.is_public, "not public in {state}");
    }
  }

  #[tokio::test]
  async fn briefs_without_nda_are_public() {
    let w = World::build().await;
    let brief = w.brief(1);
    w.insert_brief(&brief).await;
    w.invite(&brief, w.supplier_company, NdaState::Unset).await;

    let c = classify_brief_checked(&w.store, &w.supplier_user, &brief).await;
    assert_eq!(c, Classification::received(true));
  }

  #[tokio::test]
  async fn pending_nda_is_private_until_accepted() {
    let w = World::build().await;
    let brief = w.nda_brief(1);
    w.insert_brief(&brief).await;
    let invitation = w.invite(&brief, w.supplier_company, NdaState::Pending).await;

    let c = classify_brief_checked(&w.store, &w.supplier_user, &brief).await;
    assert_eq!(c, Classification::received(false));

    w.store
      .insert_invitation(BriefSupplierInvitation {
        nda_state: NdaState::Accepted,
        signed_nda: true,
        ..invitation
      })
      .await;
    let c = classify_brief_checked(&w.store, &w.supplier_user, &brief).await;
    assert_eq!(c, Classification::received(true));
  }

  #[tokio::test]
  async fn members_only_hides_from_unrelated_actors() {
    let w = World::build().await;
    let brief = Brief { privacy_mode: PrivacyMode::MembersOnly, ..w.brief(1) };
    w.insert_brief(&brief).await;

    let c = classify_brief_checked(&w.store, &w.outsider_user, &brief).await;
    assert_eq!(c, Classification::HIDDEN);

    // Organization-wide visibility does not apply either.
    let c = classify_brief_checked(&w.store, &w.client_sibling_user, &brief).await;
    assert_eq!(c, Classification::HIDDEN);
    // Nor does merely sharing the client company.
    let c = classify_brief_checked(&w.store, &w.client_colleague, &brief).await;
    assert_eq!(c, Classification::HIDDEN);

    w.add_member(&brief, &w.client_sibling_user, false, false).await;
    let c = classify_brief_checked(&w.store, &w.client_sibling_user, &brief).await;
    assert_eq!(c, Classification::SENT);
  }

  #[tokio::test]
  async fn members_only_invitation_needs_a_membership_row() {
    let w = World::build().await;
    let brief = Brief { privacy_mode: PrivacyMode::MembersOnly, ..w.brief(1) };
    w.insert_brief(&brief).await;
    w.invite(&brief, w.supplier_company, NdaState::Unset).await;

    let c = classify_brief_checked(&w.store, &w.supplier_user, &brief).await;
    assert_eq!(c, Classification::HIDDEN);

    w.add_member(&brief, &w.supplier_user, false, false).await;
    let c = classify_brief_checked(&w.store, &w.supplier_user, &brief).await;
    assert_eq!(c, Classification::received(true));
    // The invited company's other users are still left out.
    let c = classify_brief_checked(&w.store, &w.supplier_colleague, &brief).await;
    assert_eq!(c, Classification::HIDDEN);
  }

  #[tokio::test]
  async fn open_briefs_reach_the_client_organization() {
    let w = World::build().await;
    let brief = w.brief(1);
    w.insert_brief(&brief).await;

    let sibling = classify_brief_checked(&w.store, &w.client_sibling_user, &brief).await;
    assert_eq!(sibling, Classification::SENT);
    let colleague = classify_brief_checked(&w.store, &w.client_colleague, &brief).await;
    assert_eq!(colleague, Classification::SENT);
    let peer = classify_brief_checked(&w.store, &w.cpg_peer_user, &brief).await;
    assert_eq!(peer, Classification::HIDDEN);
  }

  #[tokio::test]
  async fn sent_wins_over_received() {
    let w = World::build().await;
    let brief = w.nda_brief(1);
    w.insert_brief(&brief).await;
    // The client's own company was (oddly) routed its own brief.
    w.invite(&brief, w.client_company, NdaState::Pending).await;

    let c = classify_brief_checked(&w.store, &w.client_colleague, &brief).await;
    assert!(c.is_sent());
    assert!(c.is_public);
  }

  #[tokio::test]
  async fn brief_admins_see_sent_from_anywhere() {
    let w = World::build().await;
    let brief = Brief { privacy_mode: PrivacyMode::MembersOnly, ..w.nda_brief(1) };
    w.insert_brief(&brief).await;
    w.add_member(&brief, &w.cpg_peer_user, true, false).await;

    let c = classify_brief_checked(&w.store, &w.cpg_peer_user, &brief).await;
    assert_eq!(c, Classification::SENT);
  }

  #[tokio::test]
  async fn platform_admin_has_no_framing() {
    let w = World::build().await;
    let brief = Brief { privacy_mode: PrivacyMode::MembersOnly, ..w.nda_brief(1) };
    w.insert_brief(&brief).await;

    let c = classify_brief_checked(&w.store, &w.admin, &brief).await;
    assert!(c.visible && c.is_public);
    assert_eq!(c.direction, None);
  }

  #[tokio::test]
  async fn precomputed_disclosure_is_honoured() {
    let w = World::build().await;
    let brief = w.nda_brief(1);
    let invitation = BriefSupplierInvitation::new(brief.brief_id, w.supplier_company);
    let facts = BriefFacts {
      invitation: Some(invitation),
      disclosed: Some(true),
      ..BriefFacts::default()
    };
    let c = classify_brief(&w.supplier_user, &brief, &facts);
    assert_eq!(c, Classification::received(true));
  }

  #[tokio::test]
  async fn unloadable_context_fails_closed() {
    let w = World::build().await;
    let brief = w.brief(1);
    w.insert_brief(&brief).await;
    w.store.fail_company(w.client_company).await;

    let c = classify_brief_checked(&w.store, &w.client_sibling_user, &brief).await;
    assert_eq!(c, Classification::HIDDEN);
  }

  // ── Posts ───────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn selected_companies_only() {
    let w = World::build().await;
    let mut post = w.post(&w.supplier_user, PrivacyTier::SelectedCompanies, 1);
    post.recipient_company_ids = [w.client_company, w.cpg_peer_company].into();

    let x = classify_post_checked(&w.store, &w.client_user, &post).await;
    assert_eq!(x, Classification::received(true));
    let z = classify_post_checked(&w.store, &w.outsider_user, &post).await;
    assert!(!z.visible);
  }

  #[tokio::test]
  async fn own_posts_are_never_received() {
    let w = World::build().await;
    let post = w.post(&w.supplier_user, PrivacyTier::AllCompanies, 1);

    let author = classify_post_checked(&w.store, &w.supplier_user, &post).await;
    assert_eq!(author, Classification::SENT);
    let colleague = classify_post_checked(&w.store, &w.supplier_colleague, &post).await;
    assert_eq!(colleague, Classification::SENT);
    let anyone = classify_post_checked(&w.store, &w.outsider_user, &post).await;
    assert_eq!(anyone, Classification::received(true));
  }

  #[tokio::test]
  async fn my_organization_reaches_siblings_only() {
    let w = World::build().await;
    let post = w.post(&w.supplier_user, PrivacyTier::MyOrganization, 1);

    let sibling = classify_post_checked(&w.store, &w.supplier_sibling_user, &post).await;
    assert_eq!(sibling, Classification::received(true));
    let outsider = classify_post_checked(&w.store, &w.outsider_user, &post).await;
    assert!(!outsider.visible);
  }

  #[tokio::test]
  async fn potential_clients_follow_the_asymmetric_pool() {
    let w = World::build().await;

    // CPG author: every other CPG organization is a potential client.
    let cpg_post = w.post(&w.client_user, PrivacyTier::PotentialClients, 1);
    let peer = classify_post_checked(&w.store, &w.cpg_peer_user, &cpg_post).await;
    assert!(peer.visible);

    // Non-CPG author: only explicit relations.
    let post = w.post(&w.supplier_user, PrivacyTier::PotentialClients, 1);
    let related = classify_post_checked(&w.store, &w.outsider_user, &post).await;
    assert!(related.visible);
    let cpg = classify_post_checked(&w.store, &w.cpg_peer_user, &post).await;
    assert!(!cpg.visible);
  }

  #[tokio::test]
  async fn draft_posts_are_hidden() {
    let w = World::build().await;
    let post = Post { is_draft: true, ..w.post(&w.supplier_user, PrivacyTier::AllCompanies, 1) };
    for actor in everyone(&w) {
      assert!(!classify_post_checked(&w.store, &actor, &post).await.visible);
    }
  }
}
