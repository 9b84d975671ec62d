//! Encoding and decoding helpers between briefgate types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings and UUIDs as hyphenated
//! lowercase strings. Id lists and digest items are stored as compact JSON.
//! Enums use their snake_case names, except the NDA requirement, which keeps
//! its numeric code.

use std::{collections::BTreeSet, str::FromStr};

use briefgate_core::{
  model::{
    Actor, Brief, BriefSupplierInvitation, NdaRequirement, Post, PostRating,
  },
  notify::{Channel, Delivery, DigestItem, Notification},
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_ids<'a>(ids: impl IntoIterator<Item = &'a Uuid>) -> Result<String> {
  Ok(serde_json::to_string(&ids.into_iter().collect::<Vec<_>>())?)
}

pub fn decode_ids<C: FromIterator<Uuid>>(s: &str) -> Result<C> {
  let ids: Vec<Uuid> = serde_json::from_str(s)?;
  Ok(ids.into_iter().collect())
}

/// Parse a strum-named enum column.
pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode { column, value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, organization_id, company_id, role";

/// Raw strings read directly from a `users` row.
pub struct RawActor {
  pub user_id:         String,
  pub organization_id: Option<String>,
  pub company_id:      Option<String>,
  pub role:            String,
}

impl RawActor {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:         row.get(0)?,
      organization_id: row.get(1)?,
      company_id:      row.get(2)?,
      role:            row.get(3)?,
    })
  }

  pub fn into_actor(self) -> Result<Actor> {
    Ok(Actor {
      user_id:         decode_uuid(&self.user_id)?,
      organization_id: decode_opt_uuid(self.organization_id)?,
      company_id:      decode_opt_uuid(self.company_id)?,
      role:            decode_enum("users.role", &self.role)?,
    })
  }
}

pub const BRIEF_COLUMNS: &str = "brief_id, client_company_id, title, description, \
  privacy_mode, nda_requirement, has_nda, is_draft, deadline, categories, markets, \
  created_by, created_at";

pub struct RawBrief {
  pub brief_id:          String,
  pub client_company_id: String,
  pub title:             String,
  pub description:       String,
  pub privacy_mode:      String,
  pub nda_requirement:   u8,
  pub has_nda:           bool,
  pub is_draft:          bool,
  pub deadline:          Option<String>,
  pub categories:        String,
  pub markets:           String,
  pub created_by:        String,
  pub created_at:        String,
}

impl RawBrief {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      brief_id:          row.get(0)?,
      client_company_id: row.get(1)?,
      title:             row.get(2)?,
      description:       row.get(3)?,
      privacy_mode:      row.get(4)?,
      nda_requirement:   row.get(5)?,
      has_nda:           row.get(6)?,
      is_draft:          row.get(7)?,
      deadline:          row.get(8)?,
      categories:        row.get(9)?,
      markets:           row.get(10)?,
      created_by:        row.get(11)?,
      created_at:        row.get(12)?,
    })
  }

  pub fn into_brief(self) -> Result<Brief> {
    let nda_requirement = NdaRequirement::from_code(self.nda_requirement).ok_or_else(|| {
      Error::Decode {
        column: "briefs.nda_requirement",
        value:  self.nda_requirement.to_string(),
      }
    })?;
    Ok(Brief {
      brief_id: decode_uuid(&self.brief_id)?,
      client_company_id: decode_uuid(&self.client_company_id)?,
      title: self.title,
      description: self.description,
      privacy_mode: decode_enum("briefs.privacy_mode", &self.privacy_mode)?,
      nda_requirement,
      has_nda: self.has_nda,
      is_draft: self.is_draft,
      deadline: self.deadline.as_deref().map(decode_dt).transpose()?,
      categories: decode_ids(&self.categories)?,
      markets: decode_ids(&self.markets)?,
      created_by: decode_uuid(&self.created_by)?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const INVITATION_COLUMNS: &str = "brief_id, supplier_company_id, accepted, \
  nda_state, signed_nda, decline_reason, revision";

pub struct RawInvitation {
  pub brief_id:            String,
  pub supplier_company_id: String,
  pub accepted:            Option<bool>,
  pub nda_state:           String,
  pub signed_nda:          bool,
  pub decline_reason:      Option<String>,
  pub revision:            u64,
}

impl RawInvitation {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      brief_id:            row.get(0)?,
      supplier_company_id: row.get(1)?,
      accepted:            row.get(2)?,
      nda_state:           row.get(3)?,
      signed_nda:          row.get(4)?,
      decline_reason:      row.get(5)?,
      revision:            row.get(6)?,
    })
  }

  pub fn into_invitation(self) -> Result<BriefSupplierInvitation> {
    Ok(BriefSupplierInvitation {
      brief_id:            decode_uuid(&self.brief_id)?,
      supplier_company_id: decode_uuid(&self.supplier_company_id)?,
      accepted:            self.accepted,
      nda_state:           decode_enum("invitations.nda_state", &self.nda_state)?,
      signed_nda:          self.signed_nda,
      decline_reason:      self.decline_reason,
      revision:            self.revision,
    })
  }
}

pub const POST_COLUMNS: &str = "post_id, supplier_company_id, organization_id, \
  privacy_tier, recipient_company_ids, categories, brief_id, title, description, \
  is_draft, created_by, created_at";

pub struct RawPost {
  pub post_id:               String,
  pub supplier_company_id:   String,
  pub organization_id:       String,
  pub privacy_tier:          String,
  pub recipient_company_ids: String,
  pub categories:            String,
  pub brief_id:              Option<String>,
  pub title:                 String,
  pub description:           String,
  pub is_draft:              bool,
  pub created_by:            String,
  pub created_at:            String,
}

impl RawPost {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      post_id:               row.get(0)?,
      supplier_company_id:   row.get(1)?,
      organization_id:       row.get(2)?,
      privacy_tier:          row.get(3)?,
      recipient_company_ids: row.get(4)?,
      categories:            row.get(5)?,
      brief_id:              row.get(6)?,
      title:                 row.get(7)?,
      description:           row.get(8)?,
      is_draft:              row.get(9)?,
      created_by:            row.get(10)?,
      created_at:            row.get(11)?,
    })
  }

  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      post_id:               decode_uuid(&self.post_id)?,
      supplier_company_id:   decode_uuid(&self.supplier_company_id)?,
      organization_id:       decode_uuid(&self.organization_id)?,
      privacy_tier:          decode_enum("posts.privacy_tier", &self.privacy_tier)?,
      recipient_company_ids: decode_ids::<BTreeSet<Uuid>>(&self.recipient_company_ids)?,
      categories:            decode_ids(&self.categories)?,
      brief_id:              decode_opt_uuid(self.brief_id)?,
      title:                 self.title,
      description:           self.description,
      is_draft:              self.is_draft,
      created_by:            decode_uuid(&self.created_by)?,
      created_at:            decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawRating {
  pub rating_id: String,
  pub post_id:   String,
  pub author_id: String,
  pub score:     u8,
  pub answer:    Option<String>,
}

impl RawRating {
  pub fn into_rating(self) -> Result<PostRating> {
    Ok(PostRating {
      rating_id: decode_uuid(&self.rating_id)?,
      post_id:   decode_uuid(&self.post_id)?,
      author_id: decode_uuid(&self.author_id)?,
      score:     self.score,
      answer:    self.answer,
    })
  }
}

/// An outbox row plus its channels, in delivery order.
pub struct RawDelivery {
  pub notification_id: String,
  pub event_id:        String,
  pub kind:            String,
  pub title:           String,
  pub description:     String,
  pub link:            String,
  pub receiver_id:     String,
  pub created_at:      String,
  pub items:           String,
  pub channels:        Vec<String>,
}

impl RawDelivery {
  pub fn into_delivery(self) -> Result<Delivery> {
    let items: Vec<DigestItem> = serde_json::from_str(&self.items)?;
    let channels = self
      .channels
      .iter()
      .map(|c| decode_enum::<Channel>("deliveries.channel", c))
      .collect::<Result<_>>()?;
    Ok(Delivery {
      notification: Notification {
        notification_id: decode_uuid(&self.notification_id)?,
        event_id: self.event_id,
        kind: self.kind,
        title: self.title,
        description: self.description,
        link: self.link,
        receiver_id: decode_uuid(&self.receiver_id)?,
        created_at: decode_dt(&self.created_at)?,
        items,
      },
      channels,
    })
  }
}
