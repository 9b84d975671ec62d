//! Listing execution: run an [`EligibilityPlan`], tag every item with its
//! classification and order the result.
//!
//! Listings are always newest first. Hidden items are dropped silently, so a
//! listing never hints at briefs the actor cannot see.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  membership::siblings_of_organization,
  model::{Actor, Brief, Post},
  query::{BriefFilters, ListingMode, Predicate, build_eligibility_predicate},
  store::MarketStore,
  visibility::{
    Classification, Direction, classify_brief, classify_brief_checked,
    classify_post_checked, load_brief_facts,
  },
};

/// A brief as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedBrief {
  #[serde(flatten)]
  pub brief:     Brief,
  pub is_public: bool,
  pub direction: Option<Direction>,
}

impl ListedBrief {
  fn new(brief: Brief, classification: Classification) -> Self {
    Self {
      brief,
      is_public: classification.is_public,
      direction: classification.direction,
    }
  }
}

/// A post as shown in a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedPost {
  #[serde(flatten)]
  pub post:      Post,
  pub direction: Option<Direction>,
}

fn newest_first(items: &mut [ListedBrief]) {
  items.sort_by(|a, b| b.brief.created_at.cmp(&a.brief.created_at));
}

// ─── Briefs ──────────────────────────────────────────────────────────────────

/// List the briefs `actor` may see in `mode`, narrowed by `filters`.
pub async fn list_briefs<S: MarketStore>(
  store: &S,
  actor: &Actor,
  mode: ListingMode,
  filters: &BriefFilters,
) -> Result<Vec<ListedBrief>> {
  let plan = build_eligibility_predicate(store, actor, mode, filters).await?;
  let candidates = store
    .briefs_matching(&plan.predicate)
    .await
    .map_err(Error::store)?;

  let mut listed = Vec::with_capacity(candidates.len());
  for brief in candidates {
    // Backends may over-approximate the predicate.
    if !plan.predicate.matches(&brief) {
      continue;
    }
    let mut facts = match load_brief_facts(store, actor, &brief).await {
      Ok(facts) => facts,
      Err(e) => {
        tracing::warn!(brief_id = %brief.brief_id, error = %e, "brief skipped: context unavailable");
        continue;
      }
    };
    facts.disclosed = plan.disclosure.get(&brief.brief_id).copied();

    let classification = classify_brief(actor, &brief, &facts);
    if !classification.visible {
      continue;
    }
    if plan.public_only && !classification.is_public {
      continue;
    }
    listed.push(ListedBrief::new(brief, classification));
  }

  newest_first(&mut listed);
  Ok(listed)
}

/// Merge sent and received listings into one newest-first list. A brief in
/// both keeps its sent entry; ties in `created_at` keep input order.
pub fn merge_sent_and_received(
  sent: Vec<ListedBrief>,
  received: Vec<ListedBrief>,
) -> Vec<ListedBrief> {
  let mut seen = HashSet::new();
  let mut merged: Vec<ListedBrief> = sent
    .into_iter()
    .chain(received)
    .filter(|b| seen.insert(b.brief.brief_id))
    .collect();
  newest_first(&mut merged);
  merged
}

pub async fn list_sent_and_received<S: MarketStore>(
  store: &S,
  actor: &Actor,
  filters: &BriefFilters,
) -> Result<Vec<ListedBrief>> {
  let sent = list_briefs(store, actor, ListingMode::Sent, filters).await?;
  let received = list_briefs(store, actor, ListingMode::Received, filters).await?;
  Ok(merge_sent_and_received(sent, received))
}

/// `last_viewed` followed by the rest of `remaining`, without repeating any
/// brief already in `last_viewed`.
pub fn with_last_viewed(
  last_viewed: Vec<ListedBrief>,
  remaining: Vec<ListedBrief>,
) -> Vec<ListedBrief> {
  let viewed: HashSet<Uuid> = last_viewed.iter().map(|b| b.brief.brief_id).collect();
  last_viewed
    .into_iter()
    .chain(remaining.into_iter().filter(|b| !viewed.contains(&b.brief.brief_id)))
    .collect()
}

/// Like [`list_briefs`], but the actor's most recently opened briefs come
/// first. Only briefs already in the listing can be promoted.
pub async fn list_recent_first<S: MarketStore>(
  store: &S,
  actor: &Actor,
  mode: ListingMode,
  filters: &BriefFilters,
  recent: usize,
) -> Result<Vec<ListedBrief>> {
  let listed = list_briefs(store, actor, mode, filters).await?;
  let viewed_ids = store
    .last_viewed_briefs(actor.user_id, recent)
    .await
    .map_err(Error::store)?;

  let last_viewed = viewed_ids
    .iter()
    .filter_map(|id| listed.iter().find(|b| b.brief.brief_id == *id).cloned())
    .collect();
  Ok(with_last_viewed(last_viewed, listed))
}

/// Briefs involving `organization_id` as client or as supplier, for the
/// organization profile view.
///
/// Platform admins see every such brief fully disclosed, whatever its NDA
/// state. Everyone else gets the regular per-brief classification.
pub async fn list_by_organization<S: MarketStore>(
  store: &S,
  actor: &Actor,
  organization_id: Uuid,
) -> Result<Vec<ListedBrief>> {
  let companies = siblings_of_organization(store, organization_id).await?;
  let mut routed = BTreeSet::new();
  for company_id in &companies {
    let invitations = store
      .invitations_of_company(*company_id)
      .await
      .map_err(Error::store)?;
    routed.extend(invitations.into_iter().map(|i| i.brief_id));
  }

  let predicate = Predicate::All(vec![
    Predicate::NotDraft,
    Predicate::Any(vec![
      Predicate::ClientIn(companies.into_iter().collect()),
      Predicate::BriefIn(routed),
    ]),
  ]);
  let candidates = store
    .briefs_matching(&predicate)
    .await
    .map_err(Error::store)?;

  let mut listed = Vec::new();
  for brief in candidates {
    if !predicate.matches(&brief) {
      continue;
    }
    let classification = classify_brief_checked(store, actor, &brief).await;
    if classification.visible {
      listed.push(ListedBrief::new(brief, classification));
    }
  }
  newest_first(&mut listed);
  Ok(listed)
}

// ─── Posts ───────────────────────────────────────────────────────────────────

/// Posts addressed to the actor's company, newest first. The actor's own
/// company's posts never appear here.
pub async fn list_received_posts<S: MarketStore>(
  store: &S,
  actor: &Actor,
) -> Result<Vec<ListedPost>> {
  let posts = store.published_posts(None).await.map_err(Error::store)?;

  let mut feed = Vec::new();
  for post in posts {
    let classification = classify_post_checked(store, actor, &post).await;
    if classification.visible && classification.direction != Some(Direction::Sent) {
      feed.push(ListedPost { post, direction: classification.direction });
    }
  }
  feed.sort_by(|a, b| b.post.created_at.cmp(&a.post.created_at));
  Ok(feed)
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::{
    model::{NdaState, PrivacyTier},
    testing::World,
  };

  fn ids(items: &[ListedBrief]) -> Vec<Uuid> {
    items.iter().map(|b| b.brief.brief_id).collect()
  }

  #[tokio::test]
  async fn received_listing_tags_disclosure() {
    let w = World::build().await;
    let gated = w.nda_brief(2);
    let open = w.brief(1);
    w.insert_brief(&gated).await;
    w.insert_brief(&open).await;
    w.invite(&gated, w.supplier_company, NdaState::Pending).await;
    w.invite(&open, w.supplier_company, NdaState::Unset).await;

    let listed = list_briefs(
      &w.store,
      &w.supplier_user,
      ListingMode::Received,
      &BriefFilters::default(),
    )
    .await
    .unwrap();

    assert_eq!(ids(&listed), vec![open.brief_id, gated.brief_id]);
    assert!(listed[0].is_public);
    assert!(!listed[1].is_public);
    assert!(listed.iter().all(|b| b.direction == Some(Direction::Received)));
  }

  #[tokio::test]
  async fn category_filter_drops_undisclosed_briefs() {
    let w = World::build().await;
    let gated = w.nda_brief(2);
    let open = w.brief(1);
    w.insert_brief(&gated).await;
    w.insert_brief(&open).await;
    w.invite(&gated, w.supplier_company, NdaState::Pending).await;
    w.invite(&open, w.supplier_company, NdaState::Unset).await;

    let filters = BriefFilters { categories: vec![w.packaging], ..BriefFilters::default() };
    let listed = list_briefs(&w.store, &w.supplier_user, ListingMode::Received, &filters)
      .await
      .unwrap();
    assert_eq!(ids(&listed), vec![open.brief_id]);
  }

  #[tokio::test]
  async fn drafts_never_listed() {
    let w = World::build().await;
    let draft = Brief { is_draft: true, ..w.brief(1) };
    w.insert_brief(&draft).await;
    w.invite(&draft, w.supplier_company, NdaState::Accepted).await;

    for (actor, mode) in [
      (&w.client_user, ListingMode::Mine),
      (&w.client_user, ListingMode::Sent),
      (&w.client_user, ListingMode::TeamMember),
      (&w.supplier_user, ListingMode::Received),
    ] {
      let listed = list_briefs(&w.store, actor, mode, &BriefFilters::default())
        .await
        .unwrap();
      assert!(listed.is_empty(), "draft listed in {mode:?}");
    }
  }

  #[tokio::test]
  async fn merge_is_deduplicated_and_sorted_by_creation() {
    let w = World::build().await;
    let a = ListedBrief::new(w.brief(5), Classification::SENT);
    let b = ListedBrief::new(w.brief(1), Classification::SENT);
    let c = ListedBrief {
      direction: Some(Direction::Received),
      ..ListedBrief::new(w.brief(3), Classification::SENT)
    };
    let b_as_received = ListedBrief { direction: Some(Direction::Received), ..b.clone() };

    let merged = merge_sent_and_received(vec![a.clone(), b.clone()], vec![c.clone(), b_as_received]);
    assert_eq!(ids(&merged), vec![b.brief.brief_id, c.brief.brief_id, a.brief.brief_id]);
    assert_eq!(merged[0].direction, Some(Direction::Sent));
  }

  #[tokio::test]
  async fn sent_and_received_listing_combines_both_sides() {
    let w = World::build().await;
    // The supplier organization publishes its own brief too.
    let own = Brief {
      client_company_id: w.supplier_company,
      created_by: w.supplier_user.user_id,
      ..w.brief(3)
    };
    let incoming = w.brief(1);
    w.insert_brief(&own).await;
    w.insert_brief(&incoming).await;
    w.invite(&incoming, w.supplier_company, NdaState::Unset).await;

    let listed = list_sent_and_received(&w.store, &w.supplier_colleague, &BriefFilters::default())
      .await
      .unwrap();
    assert_eq!(ids(&listed), vec![incoming.brief_id, own.brief_id]);
    assert_eq!(listed[0].direction, Some(Direction::Received));
    assert_eq!(listed[1].direction, Some(Direction::Sent));
  }

  #[tokio::test]
  async fn last_viewed_come_first_without_repeats() {
    let w = World::build().await;
    let old = w.brief(10);
    let mid = w.brief(5);
    let new = w.brief(1);
    for b in [&old, &mid, &new] {
      w.insert_brief(b).await;
    }
    w.store.record_view(w.client_user.user_id, old.brief_id, w.now - Duration::minutes(1)).await;
    w.store.record_view(w.client_user.user_id, mid.brief_id, w.now - Duration::minutes(9)).await;

    let listed = list_recent_first(
      &w.store,
      &w.client_user,
      ListingMode::Mine,
      &BriefFilters::default(),
      5,
    )
    .await
    .unwrap();
    assert_eq!(ids(&listed), vec![old.brief_id, mid.brief_id, new.brief_id]);
  }

  #[tokio::test]
  async fn hidden_views_are_not_promoted() {
    let w = World::build().await;
    let foreign = Brief { client_company_id: w.outsider_company, ..w.brief(1) };
    let own = w.brief(2);
    w.insert_brief(&foreign).await;
    w.insert_brief(&own).await;
    w.store.record_view(w.client_user.user_id, foreign.brief_id, w.now).await;

    let listed = list_recent_first(
      &w.store,
      &w.client_user,
      ListingMode::Sent,
      &BriefFilters::default(),
      5,
    )
    .await
    .unwrap();
    assert_eq!(ids(&listed), vec![own.brief_id]);
  }

  #[tokio::test]
  async fn organization_view_is_fully_public_for_admins() {
    let w = World::build().await;
    let routed = w.nda_brief(1);
    let unrelated = Brief { client_company_id: w.outsider_company, ..w.brief(2) };
    w.insert_brief(&routed).await;
    w.insert_brief(&unrelated).await;
    w.invite(&routed, w.supplier_sibling_company, NdaState::Pending).await;

    let admin_view = list_by_organization(&w.store, &w.admin, w.supplier_org).await.unwrap();
    assert_eq!(ids(&admin_view), vec![routed.brief_id]);
    assert!(admin_view[0].is_public);
    assert_eq!(admin_view[0].direction, None);

    // A supplier sibling sees it through its own invitation, still gated.
    let sibling_view = list_by_organization(&w.store, &w.supplier_sibling_user, w.supplier_org)
      .await
      .unwrap();
    assert_eq!(ids(&sibling_view), vec![routed.brief_id]);
    assert!(!sibling_view[0].is_public);

    // The supplier company itself was not routed the brief.
    let other_view = list_by_organization(&w.store, &w.supplier_user, w.supplier_org)
      .await
      .unwrap();
    assert!(other_view.is_empty());
  }

  #[tokio::test]
  async fn selected_recipient_sees_post_in_feed() {
    let w = World::build().await;
    let mut post = w.post(&w.supplier_user, PrivacyTier::SelectedCompanies, 1);
    post.recipient_company_ids = [w.client_company, w.cpg_peer_company].into();
    w.store.insert_post(post.clone()).await;
    let own = w.post(&w.client_user, PrivacyTier::AllCompanies, 2);
    w.store.insert_post(own.clone()).await;

    // No interests recorded for client_user: the feed still shows the post.
    let feed = list_received_posts(&w.store, &w.client_user).await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].post.post_id, post.post_id);

    let feed = list_received_posts(&w.store, &w.outsider_user).await.unwrap();
    assert_eq!(feed.iter().map(|p| p.post.post_id).collect::<Vec<_>>(), vec![own.post_id]);
  }
}
