//! Query composition: from a listing mode and filters to an eligibility
//! predicate over briefs.
//!
//! The result is plain data. Everything the composer learns along the way
//! (currently the per-brief disclosure of received briefs) travels in the
//! returned [`EligibilityPlan`], never in shared state, so plans for
//! different actors can be built concurrently.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  membership::{organization_siblings, siblings_of_organization},
  model::{Actor, Brief},
  nda::is_disclosed,
  store::MarketStore,
};

// ─── Predicate ───────────────────────────────────────────────────────────────

/// A boolean condition over a [`Brief`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "arg", rename_all = "snake_case")]
pub enum Predicate {
  /// True when every child is; an empty list is true.
  All(Vec<Predicate>),
  /// True when some child is; an empty list is false.
  Any(Vec<Predicate>),
  Not(Box<Predicate>),
  NotDraft,
  MembersOnly,
  ClientIn(BTreeSet<Uuid>),
  BriefIn(BTreeSet<Uuid>),
  CreatedBy(Uuid),
  /// The brief carries at least one of these categories.
  CategoryAny(BTreeSet<Uuid>),
  MarketAny(BTreeSet<Uuid>),
  CreatedFrom(DateTime<Utc>),
  CreatedUntil(DateTime<Utc>),
  /// Briefs without a deadline never match deadline bounds.
  DeadlineFrom(DateTime<Utc>),
  DeadlineUntil(DateTime<Utc>),
}

impl Predicate {
  pub fn matches(&self, brief: &Brief) -> bool {
    match self {
      Self::All(children) => children.iter().all(|p| p.matches(brief)),
      Self::Any(children) => children.iter().any(|p| p.matches(brief)),
      Self::Not(inner) => !inner.matches(brief),
      Self::NotDraft => !brief.is_draft,
      Self::MembersOnly => brief.is_members_only(),
      Self::ClientIn(ids) => ids.contains(&brief.client_company_id),
      Self::BriefIn(ids) => ids.contains(&brief.brief_id),
      Self::CreatedBy(user_id) => brief.created_by == *user_id,
      Self::CategoryAny(ids) => brief.categories.iter().any(|c| ids.contains(c)),
      Self::MarketAny(ids) => brief.markets.iter().any(|m| ids.contains(m)),
      Self::CreatedFrom(t) => brief.created_at >= *t,
      Self::CreatedUntil(t) => brief.created_at <= *t,
      Self::DeadlineFrom(t) => brief.deadline.is_some_and(|d| d >= *t),
      Self::DeadlineUntil(t) => brief.deadline.is_some_and(|d| d <= *t),
    }
  }

  fn open() -> Self { Self::Not(Box::new(Self::MembersOnly)) }
}

// ─── Modes and filters ───────────────────────────────────────────────────────

/// Which briefs a listing is about, relative to the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ListingMode {
  /// Briefs published by the actor's organization.
  Sent,
  /// Briefs routed to the actor's company.
  Received,
  /// Briefs exchanged between the actor's organization and another one.
  Participating { organization_id: Uuid },
  /// Briefs the actor created.
  Mine,
  /// Briefs the actor created or is a team member of.
  TeamMember,
  /// Everything the actor's organization may see as client.
  Organization,
}

/// Caller-supplied narrowing, AND-ed after the mode predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefFilters {
  #[serde(default)]
  pub categories:      Vec<Uuid>,
  #[serde(default)]
  pub markets:         Vec<Uuid>,
  pub created_after:   Option<DateTime<Utc>>,
  pub created_before:  Option<DateTime<Utc>>,
  pub deadline_after:  Option<DateTime<Utc>>,
  pub deadline_before: Option<DateTime<Utc>>,
}

/// Filters turned into predicates.
#[derive(Debug, Default)]
pub struct CompiledFilters {
  pub predicates:  Vec<Predicate>,
  /// Category or market filtering never reveals undisclosed briefs.
  pub public_only: bool,
  /// Filters that were dropped instead of failing the query.
  pub rejected:    Vec<Error>,
}

impl BriefFilters {
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  pub fn compile(&self) -> CompiledFilters {
    let mut out = CompiledFilters::default();

    if !self.categories.is_empty() {
      out.predicates.push(Predicate::CategoryAny(self.categories.iter().copied().collect()));
      out.public_only = true;
    }
    if !self.markets.is_empty() {
      out.predicates.push(Predicate::MarketAny(self.markets.iter().copied().collect()));
      out.public_only = true;
    }

    range(
      &mut out,
      "created",
      self.created_after,
      self.created_before,
      Predicate::CreatedFrom,
      Predicate::CreatedUntil,
    );
    range(
      &mut out,
      "deadline",
      self.deadline_after,
      self.deadline_before,
      Predicate::DeadlineFrom,
      Predicate::DeadlineUntil,
    );

    out
  }
}

fn range(
  out: &mut CompiledFilters,
  name: &str,
  from: Option<DateTime<Utc>>,
  until: Option<DateTime<Utc>>,
  lower: fn(DateTime<Utc>) -> Predicate,
  upper: fn(DateTime<Utc>) -> Predicate,
) {
  if let (Some(f), Some(u)) = (from, until)
    && f > u
  {
    out.rejected.push(Error::MalformedFilter(format!(
      "{name} range starts after it ends ({f} > {u})"
    )));
    return;
  }
  out.predicates.extend(from.map(lower));
  out.predicates.extend(until.map(upper));
}

// ─── Plan ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct EligibilityPlan {
  pub mode:        ListingMode,
  pub predicate:   Predicate,
  /// brief id → whether it is disclosed to the actor's company; filled for
  /// received briefs.
  pub disclosure:  HashMap<Uuid, bool>,
  pub public_only: bool,
  pub rejected:    Vec<Error>,
}

/// Build the eligibility predicate for `actor` listing briefs in `mode`.
pub async fn build_eligibility_predicate<S: MarketStore>(
  store: &S,
  actor: &Actor,
  mode: ListingMode,
  filters: &BriefFilters,
) -> Result<EligibilityPlan> {
  let mut disclosure = HashMap::new();

  let mode_predicate = match mode {
    ListingMode::Sent => {
      let siblings = organization_siblings(store, actor).await?;
      let member_of = member_briefs(store, actor).await?;
      Predicate::Any(vec![
        Predicate::All(vec![
          Predicate::ClientIn(siblings.into_iter().collect()),
          Predicate::open(),
        ]),
        Predicate::All(vec![Predicate::MembersOnly, Predicate::BriefIn(member_of)]),
      ])
    }

    ListingMode::Received => {
      let invitations = match actor.company_id {
        Some(company_id) => store
          .invitations_of_company(company_id)
          .await
          .map_err(Error::store)?,
        None => Vec::new(),
      };
      let mut routed = BTreeSet::new();
      for invitation in invitations {
        routed.insert(invitation.brief_id);
        if let Some(brief) = store
          .get_brief(invitation.brief_id)
          .await
          .map_err(Error::store)?
        {
          disclosure.insert(brief.brief_id, is_disclosed(&brief, Some(&invitation)));
        }
      }
      let member_of = member_briefs(store, actor).await?;
      Predicate::All(vec![
        Predicate::BriefIn(routed),
        Predicate::Any(vec![Predicate::open(), Predicate::BriefIn(member_of)]),
      ])
    }

    ListingMode::Participating { organization_id } => {
      let mut routed = BTreeSet::new();
      for company_id in siblings_of_organization(store, organization_id).await? {
        let invitations = store
          .invitations_of_company(company_id)
          .await
          .map_err(Error::store)?;
        routed.extend(invitations.into_iter().map(|i| i.brief_id));
      }
      let siblings = organization_siblings(store, actor).await?;
      let member_of = member_briefs(store, actor).await?;
      let member_and_routed: BTreeSet<Uuid> =
        member_of.intersection(&routed).copied().collect();

      Predicate::Any(vec![
        Predicate::All(vec![
          Predicate::BriefIn(routed),
          Predicate::ClientIn(siblings.into_iter().collect()),
          Predicate::open(),
        ]),
        Predicate::All(vec![
          Predicate::MembersOnly,
          Predicate::BriefIn(member_and_routed),
        ]),
      ])
    }

    ListingMode::Mine => Predicate::CreatedBy(actor.user_id),

    ListingMode::TeamMember => Predicate::Any(vec![
      Predicate::BriefIn(member_briefs(store, actor).await?),
      Predicate::CreatedBy(actor.user_id),
    ]),

    ListingMode::Organization => {
      let siblings = organization_siblings(store, actor).await?;
      let member_of = member_briefs(store, actor).await?;
      Predicate::Any(vec![
        Predicate::All(vec![Predicate::MembersOnly, Predicate::BriefIn(member_of)]),
        Predicate::All(vec![
          Predicate::open(),
          Predicate::ClientIn(siblings.into_iter().collect()),
        ]),
      ])
    }
  };

  let compiled = filters.compile();
  for rejected in &compiled.rejected {
    tracing::warn!(user_id = %actor.user_id, error = %rejected, "filter ignored");
  }

  let mut clauses = vec![Predicate::NotDraft, mode_predicate];
  clauses.extend(compiled.predicates);

  let plan = EligibilityPlan {
    mode,
    predicate: Predicate::All(clauses),
    disclosure,
    public_only: compiled.public_only,
    rejected: compiled.rejected,
  };
  tracing::debug!(user_id = %actor.user_id, ?mode, public_only = plan.public_only, "eligibility plan built");
  Ok(plan)
}

async fn member_briefs<S: MarketStore>(store: &S, actor: &Actor) -> Result<BTreeSet<Uuid>> {
  Ok(
    store
      .memberships_of_user(actor.user_id)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|m| m.brief_id)
      .collect(),
  )
}
