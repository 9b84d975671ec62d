//! Notification events and the per-recipient records they become.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Which part of a brief changed.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BriefChange {
  Deadline,
  Description,
  Attachments,
}

/// What happened. Ids only; fan-out loads the entities itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
  NewBrief {
    brief_id:             Uuid,
    /// Set when a brief is re-published; the team is only told about its
    /// role the first time.
    #[serde(default)]
    previously_published: bool,
  },
  NewPost {
    post_id: Uuid,
  },
  BriefChanged {
    brief_id: Uuid,
    change:   BriefChange,
  },
  NdaUploaded {
    brief_id:            Uuid,
    supplier_company_id: Uuid,
  },
  BriefAccepted {
    brief_id:            Uuid,
    supplier_company_id: Uuid,
  },
  BriefDeclined {
    brief_id:            Uuid,
    supplier_company_id: Uuid,
    reason:              Option<String>,
  },
  NdaAccepted {
    brief_id:            Uuid,
    supplier_company_id: Uuid,
  },
  NdaDeclined {
    brief_id:            Uuid,
    supplier_company_id: Uuid,
    reason:              String,
  },
  PostRatingCreated {
    rating_id: Uuid,
  },
  PostRatingAnswered {
    rating_id: Uuid,
  },
}

/// Where a notification is delivered.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Channel {
  InApp,
  Email,
  Push,
}

impl EventKind {
  /// Delivery channels for every recipient of this kind of event.
  pub fn channels(&self) -> Vec<Channel> {
    match self {
      Self::NewPost { .. }
      | Self::PostRatingCreated { .. }
      | Self::PostRatingAnswered { .. } => vec![Channel::InApp, Channel::Push],
      _ => vec![Channel::InApp, Channel::Email],
    }
  }
}

/// A content event, as reported by whatever wrote the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
  #[serde(flatten)]
  pub kind:         EventKind,
  /// The user whose action caused the event. Never notified about it.
  pub triggered_by: Uuid,
  pub occurred_at:  DateTime<Utc>,
}

impl NotificationEvent {
  /// A stable identifier for the event: the hex SHA-256 of its kind, payload,
  /// actor and timestamp. Reporting the same event twice yields the same id.
  pub fn fingerprint(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.kind.as_ref().as_bytes());
    // Serializing plain ids and strings cannot fail.
    if let Ok(payload) = serde_json::to_vec(&self.kind) {
      hasher.update(&payload);
    }
    hasher.update(self.triggered_by.as_bytes());
    hasher.update(self.occurred_at.timestamp_micros().to_le_bytes());
    hex::encode(hasher.finalize())
  }
}

/// One entry of a weekly digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestItem {
  pub post_id:         Uuid,
  pub organization_id: Uuid,
  pub title:           String,
  pub description:     String,
  pub created_at:      DateTime<Utc>,
}

/// A per-recipient notification record. The core fills in the semantic
/// fields only; formatting for email or push is the sink's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub event_id:        String,
  /// Snake-case event kind, or `weekly_digest`.
  pub kind:            String,
  pub title:           String,
  pub description:     String,
  pub link:            String,
  pub receiver_id:     Uuid,
  pub created_at:      DateTime<Utc>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub items:           Vec<DigestItem>,
}

/// A notification plus the channels it goes out on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
  pub notification: Notification,
  pub channels:     Vec<Channel>,
}
