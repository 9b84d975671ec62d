//! Membership resolution: which companies an actor is affiliated with.
//!
//! An actor without a company or organization simply has no relations; that
//! is a valid terminal state, not an error.

use std::collections::HashSet;

use uuid::Uuid;

use crate::{
  Error, Result,
  model::{Actor, OrganizationType},
  store::MarketStore,
};

/// Every company sharing `organization_id`, the queried one included.
pub async fn siblings_of_organization<S: MarketStore>(
  store: &S,
  organization_id: Uuid,
) -> Result<HashSet<Uuid>> {
  let companies = store
    .companies_of_organization(organization_id)
    .await
    .map_err(Error::store)?;
  Ok(companies.into_iter().map(|c| c.company_id).collect())
}

/// Companies in the actor's organization, the actor's own company included.
pub async fn organization_siblings<S: MarketStore>(
  store: &S,
  actor: &Actor,
) -> Result<HashSet<Uuid>> {
  match actor.organization_id {
    Some(organization_id) => siblings_of_organization(store, organization_id).await,
    None => Ok(HashSet::new()),
  }
}

/// The potential-client pool of `company_id`.
///
/// Explicit relation partners. When the company's organization is classified
/// as CPG industry, also every company of every other CPG organization.
/// Non-CPG organizations only get their explicit partners, so the pool is
/// asymmetric.
pub async fn related_to_company<S: MarketStore>(
  store: &S,
  company_id: Uuid,
) -> Result<HashSet<Uuid>> {
  let mut related: HashSet<Uuid> = store
    .relation_partners(company_id)
    .await
    .map_err(Error::store)?
    .into_iter()
    .collect();

  let Some(company) = store.get_company(company_id).await.map_err(Error::store)?
  else {
    return Ok(related);
  };
  let organization = store
    .get_organization(company.organization_id)
    .await
    .map_err(Error::store)?;

  // An unclassified organization is an unresolved lookup: keep the explicit
  // partners and skip the CPG expansion.
  let Some(organization_type) = organization
    .as_ref()
    .and_then(|o| o.organization_type.as_ref())
  else {
    let unresolved = Error::UnresolvedCandidate {
      id:     company.organization_id,
      reason: "organization has no classification".into(),
    };
    tracing::warn!(%company_id, error = %unresolved, "potential clients limited to explicit relations");
    related.remove(&company_id);
    return Ok(related);
  };

  if *organization_type == OrganizationType::CpgIndustry {
    let peers = store
      .organizations_of_type(&OrganizationType::CpgIndustry)
      .await
      .map_err(Error::store)?;
    for peer in peers
      .iter()
      .filter(|o| o.organization_id != company.organization_id)
    {
      related.extend(siblings_of_organization(store, peer.organization_id).await?);
    }
  }

  related.remove(&company_id);
  Ok(related)
}

/// The potential-client pool of the actor's company.
pub async fn related_companies<S: MarketStore>(
  store: &S,
  actor: &Actor,
) -> Result<HashSet<Uuid>> {
  match actor.company_id {
    Some(company_id) => related_to_company(store, company_id).await,
    None => Ok(HashSet::new()),
  }
}
