//! The `MarketStore` trait: the read collaborator the engine runs against.
//!
//! The trait is implemented by storage backends (e.g.
//! `briefgate-store-sqlite`, or [`crate::memory::MemoryStore`] in tests).
//! Every join the engine needs is an explicit call here; no method fans out
//! further than the entity it names, so the cost of a classification is the
//! number of calls it makes.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  model::{
    Actor, Brief, BriefMembership, BriefSupplierInvitation, Company,
    Organization, OrganizationType, Post, PostRating,
  },
  query::Predicate,
};

/// Abstraction over the marketplace data store.
///
/// All methods are reads except [`MarketStore::swap_invitation`], the single
/// mutation path of the engine.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait MarketStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Actors ────────────────────────────────────────────────────────────

  fn get_actor(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Actor>, Self::Error>> + Send + '_;

  /// Every user whose company is `company_id`.
  fn users_of_company(
    &self,
    company_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Actor>, Self::Error>> + Send + '_;

  /// Every user on the platform; used by the periodic digest.
  fn all_users(
    &self,
  ) -> impl Future<Output = Result<Vec<Actor>, Self::Error>> + Send + '_;

  // ── Companies and organizations ───────────────────────────────────────

  fn get_company(
    &self,
    company_id: Uuid,
  ) -> impl Future<Output = Result<Option<Company>, Self::Error>> + Send + '_;

  fn companies_of_organization(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Company>, Self::Error>> + Send + '_;

  fn get_organization(
    &self,
    organization_id: Uuid,
  ) -> impl Future<Output = Result<Option<Organization>, Self::Error>> + Send + '_;

  fn organizations_of_type<'a>(
    &'a self,
    organization_type: &'a OrganizationType,
  ) -> impl Future<Output = Result<Vec<Organization>, Self::Error>> + Send + 'a;

  /// Companies paired with `company_id` in an explicit potential-client
  /// relation, in either direction.
  fn relation_partners(
    &self,
    company_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Briefs ────────────────────────────────────────────────────────────

  fn get_brief(
    &self,
    brief_id: Uuid,
  ) -> impl Future<Output = Result<Option<Brief>, Self::Error>> + Send + '_;

  /// Non-draft briefs for which `predicate` holds. Backends may push the
  /// predicate down or evaluate [`Predicate::matches`] themselves.
  fn briefs_matching<'a>(
    &'a self,
    predicate: &'a Predicate,
  ) -> impl Future<Output = Result<Vec<Brief>, Self::Error>> + Send + 'a;

  fn get_membership(
    &self,
    brief_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<BriefMembership>, Self::Error>> + Send + '_;

  fn memberships_of_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<BriefMembership>, Self::Error>> + Send + '_;

  fn memberships_of_brief(
    &self,
    brief_id: Uuid,
  ) -> impl Future<Output = Result<Vec<BriefMembership>, Self::Error>> + Send + '_;

  fn get_invitation(
    &self,
    brief_id: Uuid,
    supplier_company_id: Uuid,
  ) -> impl Future<Output = Result<Option<BriefSupplierInvitation>, Self::Error>>
  + Send
  + '_;

  fn invitations_of_brief(
    &self,
    brief_id: Uuid,
  ) -> impl Future<Output = Result<Vec<BriefSupplierInvitation>, Self::Error>>
  + Send
  + '_;

  fn invitations_of_company(
    &self,
    supplier_company_id: Uuid,
  ) -> impl Future<Output = Result<Vec<BriefSupplierInvitation>, Self::Error>>
  + Send
  + '_;

  /// Replace the stored invitation with `next` only if its current revision
  /// is still `expected_revision`. Returns `false` when another writer won.
  fn swap_invitation(
    &self,
    expected_revision: u64,
    next: BriefSupplierInvitation,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Brief ids the user opened most recently, newest first.
  fn last_viewed_briefs(
    &self,
    user_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Posts ─────────────────────────────────────────────────────────────

  fn get_post(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// Non-draft posts, optionally only those created at or after `since`.
  fn published_posts(
    &self,
    since: Option<DateTime<Utc>>,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  fn get_rating(
    &self,
    rating_id: Uuid,
  ) -> impl Future<Output = Result<Option<PostRating>, Self::Error>> + Send + '_;

  /// Category ids the user declared an interest in.
  fn interests_of_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;
}
