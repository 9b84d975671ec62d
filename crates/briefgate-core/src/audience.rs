//! Post audiences: which companies a post's privacy tier reaches.
//!
//! Visibility ([`crate::visibility::classify_post`]) and new-post fan-out
//! both go through [`resolve_post_audience`], so a company that can see a
//! post is exactly a company whose users may be notified about it.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
  Result,
  membership::{related_to_company, siblings_of_organization},
  model::{Post, PrivacyTier},
  store::MarketStore,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
  /// Every company on the platform.
  Everyone,
  Companies(HashSet<Uuid>),
}

impl Audience {
  pub fn includes(&self, company_id: Option<Uuid>) -> bool {
    match self {
      Self::Everyone => true,
      Self::Companies(ids) => company_id.is_some_and(|id| ids.contains(&id)),
    }
  }
}

pub async fn resolve_post_audience<S: MarketStore>(
  store: &S,
  post: &Post,
) -> Result<Audience> {
  let audience = match post.privacy_tier {
    PrivacyTier::AllCompanies => Audience::Everyone,
    PrivacyTier::MyOrganization => Audience::Companies(
      siblings_of_organization(store, post.organization_id).await?,
    ),
    PrivacyTier::PotentialClients => Audience::Companies(
      related_to_company(store, post.supplier_company_id).await?,
    ),
    PrivacyTier::SelectedCompanies => {
      Audience::Companies(post.recipient_company_ids.iter().copied().collect())
    }
  };
  Ok(audience)
}
