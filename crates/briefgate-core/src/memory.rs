//! [`MemoryStore`]: an in-process [`MarketStore`] and [`NotificationSink`].
//!
//! Holds every table in a single `RwLock`. Used by the engine's own tests and
//! handy for embedding the engine without a database. Individual companies
//! and receivers can be marked as failing to exercise the skip-and-continue
//! paths of fan-out and dispatch.

use std::{
  collections::{HashMap, HashSet},
  sync::Arc,
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
  model::{
    Actor, Brief, BriefMembership, BriefSupplierInvitation, Company, Interest,
    Organization, OrganizationRelation, OrganizationType, Post, PostRating,
  },
  notify::{Delivery, NotificationSink},
  query::Predicate,
  store::MarketStore,
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("lookup failed for company {0}")]
  CompanyUnavailable(Uuid),

  #[error("delivery rejected for receiver {0}")]
  DeliveryRejected(Uuid),
}

#[derive(Debug, Default)]
struct Tables {
  actors:            HashMap<Uuid, Actor>,
  companies:         HashMap<Uuid, Company>,
  organizations:     HashMap<Uuid, Organization>,
  relations:         Vec<OrganizationRelation>,
  briefs:            HashMap<Uuid, Brief>,
  memberships:       Vec<BriefMembership>,
  invitations:       HashMap<(Uuid, Uuid), BriefSupplierInvitation>,
  posts:             HashMap<Uuid, Post>,
  ratings:           HashMap<Uuid, PostRating>,
  interests:         Vec<Interest>,
  views:             Vec<(Uuid, Uuid, DateTime<Utc>)>,
  delivered:         Vec<Delivery>,
  failing_companies: HashSet<Uuid>,
  failing_receivers: HashSet<Uuid>,
}

/// Every clone shares the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  // ── Seeding ───────────────────────────────────────────────────────────

  pub async fn insert_actor(&self, actor: Actor) {
    self.tables.write().await.actors.insert(actor.user_id, actor);
  }

  pub async fn insert_company(&self, company: Company) {
    self
      .tables
      .write()
      .await
      .companies
      .insert(company.company_id, company);
  }

  pub async fn insert_organization(&self, organization: Organization) {
    self
      .tables
      .write()
      .await
      .organizations
      .insert(organization.organization_id, organization);
  }

  pub async fn insert_relation(&self, relation: OrganizationRelation) {
    self.tables.write().await.relations.push(relation);
  }

  pub async fn insert_brief(&self, brief: Brief) {
    self.tables.write().await.briefs.insert(brief.brief_id, brief);
  }

  pub async fn insert_membership(&self, membership: BriefMembership) {
    let mut tables = self.tables.write().await;
    tables.memberships.retain(|m| {
      (m.brief_id, m.user_id) != (membership.brief_id, membership.user_id)
    });
    tables.memberships.push(membership);
  }

  pub async fn insert_invitation(&self, invitation: BriefSupplierInvitation) {
    self.tables.write().await.invitations.insert(
      (invitation.brief_id, invitation.supplier_company_id),
      invitation,
    );
  }

  pub async fn insert_post(&self, post: Post) {
    self.tables.write().await.posts.insert(post.post_id, post);
  }

  pub async fn insert_rating(&self, rating: PostRating) {
    self.tables.write().await.ratings.insert(rating.rating_id, rating);
  }

  pub async fn insert_interest(&self, interest: Interest) {
    self.tables.write().await.interests.push(interest);
  }

  pub async fn record_view(&self, user_id: Uuid, brief_id: Uuid, at: DateTime<Utc>) {
    self.tables.write().await.views.push((user_id, brief_id, at));
  }

  // ── Failure injection ─────────────────────────────────────────────────

  /// Make every user lookup for `company_id` fail.
  pub async fn fail_company(&self, company_id: Uuid) {
    self.tables.write().await.failing_companies.insert(company_id);
  }

  /// Make every delivery addressed to `receiver_id` fail.
  pub async fn fail_receiver(&self, receiver_id: Uuid) {
    self.tables.write().await.failing_receivers.insert(receiver_id);
  }

  /// Deliveries accepted so far, in arrival order.
  pub async fn delivered(&self) -> Vec<Delivery> {
    self.tables.read().await.delivered.clone()
  }
}

// ─── MarketStore impl ────────────────────────────────────────────────────────

impl MarketStore for MemoryStore {
  type Error = MemoryError;

  // ── Actors ────────────────────────────────────────────────────────────────

  async fn get_actor(&self, user_id: Uuid) -> Result<Option<Actor>, MemoryError> {
    Ok(self.tables.read().await.actors.get(&user_id).cloned())
  }

  async fn users_of_company(&self, company_id: Uuid) -> Result<Vec<Actor>, MemoryError> {
    let tables = self.tables.read().await;
    if tables.failing_companies.contains(&company_id) {
      return Err(MemoryError::CompanyUnavailable(company_id));
    }
    let mut users: Vec<Actor> = tables
      .actors
      .values()
      .filter(|a| a.company_id == Some(company_id))
      .cloned()
      .collect();
    users.sort_by_key(|a| a.user_id);
    Ok(users)
  }

  async fn all_users(&self) -> Result<Vec<Actor>, MemoryError> {
    let mut users: Vec<Actor> =
      self.tables.read().await.actors.values().cloned().collect();
    users.sort_by_key(|a| a.user_id);
    Ok(users)
  }

  // ── Companies and organizations ───────────────────────────────────────────

  async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>, MemoryError> {
    let tables = self.tables.read().await;
    if tables.failing_companies.contains(&company_id) {
      return Err(MemoryError::CompanyUnavailable(company_id));
    }
    Ok(tables.companies.get(&company_id).cloned())
  }

  async fn companies_of_organization(
    &self,
    organization_id: Uuid,
  ) -> Result<Vec<Company>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .companies
        .values()
        .filter(|c| c.organization_id == organization_id)
        .cloned()
        .collect(),
    )
  }

  async fn get_organization(
    &self,
    organization_id: Uuid,
  ) -> Result<Option<Organization>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .organizations
        .get(&organization_id)
        .cloned(),
    )
  }

  async fn organizations_of_type(
    &self,
    organization_type: &OrganizationType,
  ) -> Result<Vec<Organization>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .organizations
        .values()
        .filter(|o| o.organization_type.as_ref() == Some(organization_type))
        .cloned()
        .collect(),
    )
  }

  async fn relation_partners(&self, company_id: Uuid) -> Result<Vec<Uuid>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .relations
        .iter()
        .filter_map(|r| r.partner_of(company_id))
        .collect(),
    )
  }

  // ── Briefs ────────────────────────────────────────────────────────────────

  async fn get_brief(&self, brief_id: Uuid) -> Result<Option<Brief>, MemoryError> {
    Ok(self.tables.read().await.briefs.get(&brief_id).cloned())
  }

  async fn briefs_matching(&self, predicate: &Predicate) -> Result<Vec<Brief>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .briefs
        .values()
        .filter(|b| !b.is_draft && predicate.matches(b))
        .cloned()
        .collect(),
    )
  }

  async fn get_membership(
    &self,
    brief_id: Uuid,
    user_id: Uuid,
  ) -> Result<Option<BriefMembership>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .memberships
        .iter()
        .find(|m| m.brief_id == brief_id && m.user_id == user_id)
        .copied(),
    )
  }

  async fn memberships_of_user(
    &self,
    user_id: Uuid,
  ) -> Result<Vec<BriefMembership>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .memberships
        .iter()
        .filter(|m| m.user_id == user_id)
        .copied()
        .collect(),
    )
  }

  async fn memberships_of_brief(
    &self,
    brief_id: Uuid,
  ) -> Result<Vec<BriefMembership>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .memberships
        .iter()
        .filter(|m| m.brief_id == brief_id)
        .copied()
        .collect(),
    )
  }

  async fn get_invitation(
    &self,
    brief_id: Uuid,
    supplier_company_id: Uuid,
  ) -> Result<Option<BriefSupplierInvitation>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .invitations
        .get(&(brief_id, supplier_company_id))
        .cloned(),
    )
  }

  async fn invitations_of_brief(
    &self,
    brief_id: Uuid,
  ) -> Result<Vec<BriefSupplierInvitation>, MemoryError> {
    let mut invitations: Vec<BriefSupplierInvitation> = self
      .tables
      .read()
      .await
      .invitations
      .values()
      .filter(|i| i.brief_id == brief_id)
      .cloned()
      .collect();
    invitations.sort_by_key(|i| i.supplier_company_id);
    Ok(invitations)
  }

  async fn invitations_of_company(
    &self,
    supplier_company_id: Uuid,
  ) -> Result<Vec<BriefSupplierInvitation>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .invitations
        .values()
        .filter(|i| i.supplier_company_id == supplier_company_id)
        .cloned()
        .collect(),
    )
  }

  async fn swap_invitation(
    &self,
    expected_revision: u64,
    next: BriefSupplierInvitation,
  ) -> Result<bool, MemoryError> {
    let mut tables = self.tables.write().await;
    let key = (next.brief_id, next.supplier_company_id);
    match tables.invitations.get(&key) {
      Some(current) if current.revision == expected_revision => {
        tables.invitations.insert(key, next);
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn last_viewed_briefs(
    &self,
    user_id: Uuid,
    limit: usize,
  ) -> Result<Vec<Uuid>, MemoryError> {
    let tables = self.tables.read().await;
    let mut views: Vec<&(Uuid, Uuid, DateTime<Utc>)> =
      tables.views.iter().filter(|(u, _, _)| *u == user_id).collect();
    views.sort_by(|a, b| b.2.cmp(&a.2));

    let mut seen = HashSet::new();
    Ok(
      views
        .into_iter()
        .map(|(_, brief_id, _)| *brief_id)
        .filter(|id| seen.insert(*id))
        .take(limit)
        .collect(),
    )
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>, MemoryError> {
    Ok(self.tables.read().await.posts.get(&post_id).cloned())
  }

  async fn published_posts(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> Result<Vec<Post>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .posts
        .values()
        .filter(|p| !p.is_draft)
        .filter(|p| since.is_none_or(|s| p.created_at >= s))
        .cloned()
        .collect(),
    )
  }

  async fn get_rating(&self, rating_id: Uuid) -> Result<Option<PostRating>, MemoryError> {
    Ok(self.tables.read().await.ratings.get(&rating_id).cloned())
  }

  async fn interests_of_user(&self, user_id: Uuid) -> Result<Vec<Uuid>, MemoryError> {
    Ok(
      self
        .tables
        .read()
        .await
        .interests
        .iter()
        .filter(|i| i.user_id == user_id)
        .map(|i| i.category_id)
        .collect(),
    )
  }
}

// ─── NotificationSink impl ───────────────────────────────────────────────────

impl NotificationSink for MemoryStore {
  type Error = MemoryError;

  async fn deliver(&self, delivery: &Delivery) -> Result<(), MemoryError> {
    let mut tables = self.tables.write().await;
    let receiver = delivery.notification.receiver_id;
    if tables.failing_receivers.contains(&receiver) {
      return Err(MemoryError::DeliveryRejected(receiver));
    }
    tables.delivered.push(delivery.clone());
    Ok(())
  }
}
