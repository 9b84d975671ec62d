//! Marketplace entities consulted by the engine.
//!
//! These are read models: the engine never creates or deletes them. The only
//! field it ever writes is the NDA/response state of a
//! [`BriefSupplierInvitation`], through [`crate::nda`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

// ─── Actors ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  #[default]
  User,
  /// Platform administrator. Sees every non-draft item as fully disclosed.
  Admin,
  /// Administers one organization; no platform-wide privileges.
  OrganizationAdmin,
}

/// A user acting on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub user_id:         Uuid,
  pub organization_id: Option<Uuid>,
  pub company_id:      Option<Uuid>,
  pub role:            Role,
}

impl Actor {
  pub fn is_platform_admin(&self) -> bool { self.role == Role::Admin }
}

// ─── Companies and organizations ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
  pub company_id:      Uuid,
  pub organization_id: Uuid,
  pub name:            String,
}

/// External classification of an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "label", rename_all = "snake_case")]
pub enum OrganizationType {
  /// Consumer packaged goods manufacturers. Their potential-client pool
  /// spans every other CPG organization.
  CpgIndustry,
  Other(String),
}

impl OrganizationType {
  const CPG_LABEL: &'static str = "CPG Industry";

  /// Human label as held by the classification source.
  pub fn label(&self) -> &str {
    match self {
      Self::CpgIndustry => Self::CPG_LABEL,
      Self::Other(label) => label,
    }
  }

  pub fn from_label(label: &str) -> Self {
    if label.eq_ignore_ascii_case(Self::CPG_LABEL) {
      Self::CpgIndustry
    } else {
      Self::Other(label.to_owned())
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
  pub organization_id:   Uuid,
  pub name:              String,
  /// `None` when the classification has not been recorded.
  pub organization_type: Option<OrganizationType>,
}

/// Unordered "potential client" pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRelation {
  pub company_a: Uuid,
  pub company_b: Uuid,
}

impl OrganizationRelation {
  /// The other side of the pair, if `company_id` is part of it.
  pub fn partner_of(&self, company_id: Uuid) -> Option<Uuid> {
    if self.company_a == company_id {
      Some(self.company_b)
    } else if self.company_b == company_id {
      Some(self.company_a)
    } else {
      None
    }
  }
}

// ─── Briefs ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PrivacyMode {
  #[default]
  Open,
  MembersOnly,
}

/// How a brief gates its content behind an NDA.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NdaRequirement {
  #[default]
  None,
  Conditional,
  /// Disclosed to every invited supplier whatever their NDA state.
  AlwaysOpen,
}

impl NdaRequirement {
  /// Numeric mode as stored by the persistence layer.
  pub fn code(self) -> u8 {
    match self {
      Self::None => 0,
      Self::Conditional => 1,
      Self::AlwaysOpen => 2,
    }
  }

  pub fn from_code(code: u8) -> Option<Self> {
    match code {
      0 => Some(Self::None),
      1 => Some(Self::Conditional),
      2 => Some(Self::AlwaysOpen),
      _ => None,
    }
  }
}

/// A sourcing request from a client company to one or more suppliers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brief {
  pub brief_id:          Uuid,
  pub client_company_id: Uuid,
  pub title:             String,
  pub description:       String,
  pub privacy_mode:      PrivacyMode,
  pub nda_requirement:   NdaRequirement,
  pub has_nda:           bool,
  pub is_draft:          bool,
  pub deadline:          Option<DateTime<Utc>>,
  pub categories:        Vec<Uuid>,
  pub markets:           Vec<Uuid>,
  pub created_by:        Uuid,
  pub created_at:        DateTime<Utc>,
}

impl Brief {
  pub fn is_members_only(&self) -> bool {
    self.privacy_mode == PrivacyMode::MembersOnly
  }
}

/// A user's role on a specific brief.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefMembership {
  pub brief_id:   Uuid,
  pub user_id:    Uuid,
  /// May edit the brief and decide on supplier NDAs.
  pub is_admin:   bool,
  /// Receives supplier responses and NDA uploads.
  pub is_contact: bool,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NdaState {
  #[default]
  Unset,
  Pending,
  Accepted,
  Declined,
}

/// A brief routed to one supplier company; carries the NDA state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefSupplierInvitation {
  pub brief_id:            Uuid,
  pub supplier_company_id: Uuid,
  /// The supplier's answer to the brief itself; `None` until they respond.
  pub accepted:            Option<bool>,
  pub nda_state:           NdaState,
  pub signed_nda:          bool,
  pub decline_reason:      Option<String>,
  /// Bumped on every write; the compare-and-swap token.
  pub revision:            u64,
}

impl BriefSupplierInvitation {
  pub fn new(brief_id: Uuid, supplier_company_id: Uuid) -> Self {
    Self {
      brief_id,
      supplier_company_id,
      accepted: None,
      nda_state: NdaState::Unset,
      signed_nda: false,
      decline_reason: None,
      revision: 0,
    }
  }
}

// ─── Posts ───────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[strum(serialize_all = "PascalCase")]
pub enum PrivacyTier {
  #[default]
  AllCompanies,
  MyOrganization,
  PotentialClients,
  SelectedCompanies,
}

/// Supplier-authored content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  pub post_id:               Uuid,
  pub supplier_company_id:   Uuid,
  pub organization_id:       Uuid,
  pub privacy_tier:          PrivacyTier,
  /// Only consulted for [`PrivacyTier::SelectedCompanies`].
  pub recipient_company_ids: BTreeSet<Uuid>,
  pub categories:            Vec<Uuid>,
  pub brief_id:              Option<Uuid>,
  pub title:                 String,
  pub description:           String,
  pub is_draft:              bool,
  pub created_by:            Uuid,
  pub created_at:            DateTime<Utc>,
}

/// A rating of a post, requested from `author_id`. The post owner may answer
/// it once it is in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRating {
  pub rating_id: Uuid,
  pub post_id:   Uuid,
  pub author_id: Uuid,
  pub score:     u8,
  pub answer:    Option<String>,
}

/// A user's declared interest in a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interest {
  pub user_id:     Uuid,
  pub category_id: Uuid,
}
