//! A small seeded marketplace shared by the engine's unit tests.
//!
//! ```text
//! client org (CPG)      client_company ─ client_user, client_colleague
//!                       client_sibling_company ─ client_sibling_user
//! cpg peer org (CPG)    cpg_peer_company ─ cpg_peer_user
//! supplier org          supplier_company ─ supplier_user, supplier_colleague
//!                       supplier_sibling_company ─ supplier_sibling_user
//! outsider org (no type) outsider_company ─ outsider_user
//!
//! relation: supplier_company <-> outsider_company
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::{
  memory::MemoryStore,
  model::{
    Actor, Brief, BriefMembership, BriefSupplierInvitation, Company, Interest,
    NdaRequirement, NdaState, Organization, OrganizationRelation,
    OrganizationType, Post, PrivacyMode, PrivacyTier, Role,
  },
};

pub struct World {
  pub store: MemoryStore,
  pub now:   DateTime<Utc>,

  pub client_org:   Uuid,
  pub supplier_org: Uuid,
  pub outsider_org: Uuid,
  pub cpg_peer_org: Uuid,

  pub client_company:           Uuid,
  pub client_sibling_company:   Uuid,
  pub supplier_company:         Uuid,
  pub supplier_sibling_company: Uuid,
  pub outsider_company:         Uuid,
  pub cpg_peer_company:         Uuid,

  pub client_user:           Actor,
  pub client_colleague:      Actor,
  pub client_sibling_user:   Actor,
  pub supplier_user:         Actor,
  pub supplier_colleague:    Actor,
  pub supplier_sibling_user: Actor,
  pub outsider_user:         Actor,
  pub cpg_peer_user:         Actor,
  pub admin:                 Actor,

  pub packaging: Uuid,
  pub logistics: Uuid,
  pub market_eu: Uuid,
}

fn user(organization_id: Uuid, company_id: Uuid) -> Actor {
  Actor {
    user_id:         Uuid::new_v4(),
    organization_id: Some(organization_id),
    company_id:      Some(company_id),
    role:            Role::User,
  }
}

impl World {
  pub async fn build() -> Self {
    let store = MemoryStore::new();
    let now = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();

    let client_org = Uuid::new_v4();
    let supplier_org = Uuid::new_v4();
    let outsider_org = Uuid::new_v4();
    let cpg_peer_org = Uuid::new_v4();

    for (id, name, kind) in [
      (client_org, "Client Foods", Some(OrganizationType::CpgIndustry)),
      (cpg_peer_org, "Peer Snacks", Some(OrganizationType::CpgIndustry)),
      (supplier_org, "Box & Co", Some(OrganizationType::Other("Packaging".into()))),
      (outsider_org, "Outsider Ltd", None),
    ] {
      store
        .insert_organization(Organization {
          organization_id:   id,
          name:              name.into(),
          organization_type: kind,
        })
        .await;
    }

    let client_company = Uuid::new_v4();
    let client_sibling_company = Uuid::new_v4();
    let supplier_company = Uuid::new_v4();
    let supplier_sibling_company = Uuid::new_v4();
    let outsider_company = Uuid::new_v4();
    let cpg_peer_company = Uuid::new_v4();

    for (company_id, organization_id) in [
      (client_company, client_org),
      (client_sibling_company, client_org),
      (supplier_company, supplier_org),
      (supplier_sibling_company, supplier_org),
      (outsider_company, outsider_org),
      (cpg_peer_company, cpg_peer_org),
    ] {
      store
        .insert_company(Company {
          company_id,
          organization_id,
          name: format!("company {company_id}"),
        })
        .await;
    }

    store
      .insert_relation(OrganizationRelation {
        company_a: supplier_company,
        company_b: outsider_company,
      })
      .await;

    let client_user = user(client_org, client_company);
    let client_colleague = user(client_org, client_company);
    let client_sibling_user = user(client_org, client_sibling_company);
    let supplier_user = user(supplier_org, supplier_company);
    let supplier_colleague = user(supplier_org, supplier_company);
    let supplier_sibling_user = user(supplier_org, supplier_sibling_company);
    let outsider_user = user(outsider_org, outsider_company);
    let cpg_peer_user = user(cpg_peer_org, cpg_peer_company);
    let admin = Actor {
      user_id:         Uuid::new_v4(),
      organization_id: None,
      company_id:      None,
      role:            Role::Admin,
    };

    for actor in [
      &client_user,
      &client_colleague,
      &client_sibling_user,
      &supplier_user,
      &supplier_colleague,
      &supplier_sibling_user,
      &outsider_user,
      &cpg_peer_user,
      &admin,
    ] {
      store.insert_actor(actor.clone()).await;
    }

    Self {
      store,
      now,
      client_org,
      supplier_org,
      outsider_org,
      cpg_peer_org,
      client_company,
      client_sibling_company,
      supplier_company,
      supplier_sibling_company,
      outsider_company,
      cpg_peer_company,
      client_user,
      client_colleague,
      client_sibling_user,
      supplier_user,
      supplier_colleague,
      supplier_sibling_user,
      outsider_user,
      cpg_peer_user,
      admin,
      packaging: Uuid::new_v4(),
      logistics: Uuid::new_v4(),
      market_eu: Uuid::new_v4(),
    }
  }

  pub fn unaffiliated_actor(&self) -> Actor {
    Actor {
      user_id:         Uuid::new_v4(),
      organization_id: None,
      company_id:      None,
      role:            Role::User,
    }
  }

  /// An open, NDA-free, published brief from `client_user`, created
  /// `age_hours` before `now`. Not inserted.
  pub fn brief(&self, age_hours: i64) -> Brief {
    Brief {
      brief_id:          Uuid::new_v4(),
      client_company_id: self.client_company,
      title:             "Recyclable trays".into(),
      description:       "Looking for recyclable trays".into(),
      privacy_mode:      PrivacyMode::Open,
      nda_requirement:   NdaRequirement::None,
      has_nda:           false,
      is_draft:          false,
      deadline:          Some(self.now + Duration::days(30)),
      categories:        vec![self.packaging],
      markets:           vec![self.market_eu],
      created_by:        self.client_user.user_id,
      created_at:        self.now - Duration::hours(age_hours),
    }
  }

  /// An NDA-gated brief (conditional requirement).
  pub fn nda_brief(&self, age_hours: i64) -> Brief {
    Brief {
      nda_requirement: NdaRequirement::Conditional,
      has_nda: true,
      ..self.brief(age_hours)
    }
  }

  pub async fn insert_brief(&self, brief: &Brief) {
    self.store.insert_brief(brief.clone()).await;
  }

  /// Route `brief` to `company` with the given NDA state and store it.
  pub async fn invite(
    &self,
    brief: &Brief,
    company: Uuid,
    nda_state: NdaState,
  ) -> BriefSupplierInvitation {
    let invitation = BriefSupplierInvitation {
      nda_state,
      signed_nda: nda_state == NdaState::Accepted,
      ..BriefSupplierInvitation::new(brief.brief_id, company)
    };
    self.store.insert_invitation(invitation.clone()).await;
    invitation
  }

  pub async fn add_member(
    &self,
    brief: &Brief,
    actor: &Actor,
    is_admin: bool,
    is_contact: bool,
  ) {
    self
      .store
      .insert_membership(BriefMembership {
        brief_id: brief.brief_id,
        user_id: actor.user_id,
        is_admin,
        is_contact,
      })
      .await;
  }

  /// A published post by `author`, created `age_hours` before `now`, in the
  /// packaging category. Not inserted.
  pub fn post(&self, author: &Actor, tier: PrivacyTier, age_hours: i64) -> Post {
    let company_id = author.company_id.unwrap();
    let organization_id = author.organization_id.unwrap();
    Post {
      post_id: Uuid::new_v4(),
      supplier_company_id: company_id,
      organization_id,
      privacy_tier: tier,
      recipient_company_ids: BTreeSet::new(),
      categories: vec![self.packaging],
      brief_id: None,
      title: "New tray line".into(),
      description: "Our new line of compostable trays".into(),
      is_draft: false,
      created_by: author.user_id,
      created_at: self.now - Duration::hours(age_hours),
    }
  }

  pub async fn interested(&self, actor: &Actor, category_id: Uuid) {
    self
      .store
      .insert_interest(Interest { user_id: actor.user_id, category_id })
      .await;
  }
}
