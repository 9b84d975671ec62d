//! Recipient resolution: expand one [`NotificationEvent`] into per-recipient
//! [`Delivery`] records.
//!
//! Candidates are gathered in waves. The suppression pipeline then drops the
//! triggering actor and keeps only the first record per receiver, so a user
//! reached by two waves hears about the event once, through the first.
//! Candidates whose company cannot be resolved are logged and skipped.

use std::collections::{BTreeSet, HashSet};

use uuid::Uuid;

use super::event::{Delivery, EventKind, Notification, NotificationEvent};
use crate::{
  Error, Result,
  audience::{Audience, resolve_post_audience},
  model::{Actor, Brief, BriefSupplierInvitation, NdaState, Post},
  nda::is_disclosed,
  store::MarketStore,
  visibility::{Direction, classify_post},
};

/// A receiver together with what to tell them.
#[derive(Debug)]
struct Candidate {
  receiver_id: Uuid,
  title:       String,
  description: String,
  link:        String,
}

impl Candidate {
  fn new(receiver_id: Uuid, title: &str, description: &str, link: String) -> Self {
    Self {
      receiver_id,
      title: title.to_owned(),
      description: description.to_owned(),
      link,
    }
  }
}

// ─── Links ───────────────────────────────────────────────────────────────────

fn brief_link(brief_id: Uuid) -> String { format!("/briefs/{brief_id}") }

fn nda_upload_link(brief_id: Uuid) -> String { format!("/briefs/{brief_id}/nda") }

fn supplier_link(brief_id: Uuid, supplier_company_id: Uuid) -> String {
  format!("/briefs/{brief_id}/suppliers/{supplier_company_id}")
}

fn post_link(post_id: Uuid) -> String { format!("/posts/{post_id}") }

/// Where a supplier should land for `brief`: the NDA upload page while the
/// brief is still gated for them, the brief page otherwise.
fn supplier_landing(brief: &Brief, invitation: &BriefSupplierInvitation) -> String {
  let gated = matches!(
    invitation.nda_state,
    NdaState::Unset | NdaState::Pending | NdaState::Declined
  ) && !is_disclosed(brief, Some(invitation));
  if gated {
    nda_upload_link(brief.brief_id)
  } else {
    brief_link(brief.brief_id)
  }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

async fn load_brief<S: MarketStore>(store: &S, brief_id: Uuid) -> Result<Brief> {
  store
    .get_brief(brief_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("brief {brief_id}")))
}

async fn load_post<S: MarketStore>(store: &S, post_id: Uuid) -> Result<Post> {
  store
    .get_post(post_id)
    .await
    .map_err(Error::store)?
    .ok_or_else(|| Error::NotFound(format!("post {post_id}")))
}

/// Users of `company_id`, or nothing (with a warning) if the company cannot
/// be resolved.
async fn company_users<S: MarketStore>(store: &S, company_id: Uuid) -> Vec<Actor> {
  match store.users_of_company(company_id).await {
    Ok(users) => users,
    Err(e) => {
      let skipped = Error::UnresolvedCandidate { id: company_id, reason: e.to_string() };
      tracing::warn!(error = %skipped, "notification candidate skipped");
      Vec::new()
    }
  }
}

async fn brief_contacts<S: MarketStore>(store: &S, brief_id: Uuid) -> Result<Vec<Uuid>> {
  Ok(
    store
      .memberships_of_brief(brief_id)
      .await
      .map_err(Error::store)?
      .into_iter()
      .filter(|m| m.is_contact)
      .map(|m| m.user_id)
      .collect(),
  )
}

// ─── Candidates per event ────────────────────────────────────────────────────

async fn candidates<S: MarketStore>(
  store: &S,
  event: &NotificationEvent,
) -> Result<Vec<Candidate>> {
  let mut out = Vec::new();

  match &event.kind {
    EventKind::NewBrief { brief_id, previously_published } => {
      let brief = load_brief(store, *brief_id).await?;
      if brief.is_draft {
        return Ok(out);
      }
      let invitations = store
        .invitations_of_brief(brief.brief_id)
        .await
        .map_err(Error::store)?;
      let team = store
        .memberships_of_brief(brief.brief_id)
        .await
        .map_err(Error::store)?;
      // Members-only briefs reach invited users only through a membership row.
      let members: HashSet<Uuid> = team.iter().map(|m| m.user_id).collect();
      for invitation in &invitations {
        let link = supplier_landing(&brief, invitation);
        for user in company_users(store, invitation.supplier_company_id).await {
          if brief.is_members_only() && !members.contains(&user.user_id) {
            continue;
          }
          out.push(Candidate::new(user.user_id, "New brief", &brief.title, link.clone()));
        }
      }

      if !previously_published {
        for member in team.into_iter().filter(|m| m.is_admin || m.is_contact) {
          let role = if member.is_admin { "admin" } else { "contact" };
          out.push(Candidate::new(
            member.user_id,
            &format!("You are the {role} of a brief"),
            &brief.title,
            brief_link(brief.brief_id),
          ));
        }
      }
    }

    EventKind::NewPost { post_id } => {
      let post = load_post(store, *post_id).await?;
      if post.is_draft {
        return Ok(out);
      }
      let audience = resolve_post_audience(store, &post).await?;
      let pool = match &audience {
        Audience::Everyone => store.all_users().await.map_err(Error::store)?,
        Audience::Companies(ids) => {
          let mut users = Vec::new();
          for company_id in ids.iter().copied().collect::<BTreeSet<_>>() {
            users.extend(company_users(store, company_id).await);
          }
          users
        }
      };

      let categories: HashSet<Uuid> = post.categories.iter().copied().collect();
      for user in pool {
        // Receivers are exactly those who would see the post as received.
        if classify_post(&user, &post, &audience).direction != Some(Direction::Received) {
          continue;
        }
        let interests = match store.interests_of_user(user.user_id).await {
          Ok(interests) => interests,
          Err(e) => {
            let skipped =
              Error::UnresolvedCandidate { id: user.user_id, reason: e.to_string() };
            tracing::warn!(error = %skipped, "notification candidate skipped");
            continue;
          }
        };
        if interests.iter().any(|c| categories.contains(c)) {
          out.push(Candidate::new(
            user.user_id,
            "New post",
            &post.title,
            post_link(post.post_id),
          ));
        }
      }
    }

    EventKind::BriefChanged { brief_id, change } => {
      let brief = load_brief(store, *brief_id).await?;
      if brief.is_draft {
        return Ok(out);
      }
      let title = format!("Brief {change} changed");
      let invitations = store
        .invitations_of_brief(brief.brief_id)
        .await
        .map_err(Error::store)?;
      for invitation in invitations.iter().filter(|i| i.accepted == Some(true)) {
        let link = supplier_landing(&brief, invitation);
        for user in company_users(store, invitation.supplier_company_id).await {
          out.push(Candidate::new(user.user_id, &title, &brief.title, link.clone()));
        }
      }
    }

    EventKind::NdaUploaded { brief_id, supplier_company_id }
    | EventKind::BriefAccepted { brief_id, supplier_company_id }
    | EventKind::BriefDeclined { brief_id, supplier_company_id, .. } => {
      let brief = load_brief(store, *brief_id).await?;
      if brief.is_draft {
        return Ok(out);
      }
      let (title, description) = match &event.kind {
        EventKind::NdaUploaded { .. } => ("A supplier uploaded an NDA", brief.title.clone()),
        EventKind::BriefAccepted { .. } => ("A supplier accepted your brief", brief.title.clone()),
        EventKind::BriefDeclined { reason: Some(reason), .. } => {
          ("A supplier declined your brief", reason.clone())
        }
        _ => ("A supplier declined your brief", brief.title.clone()),
      };
      let link = supplier_link(brief.brief_id, *supplier_company_id);
      for contact in brief_contacts(store, brief.brief_id).await? {
        out.push(Candidate::new(contact, title, &description, link.clone()));
      }
    }

    EventKind::NdaAccepted { brief_id, supplier_company_id }
    | EventKind::NdaDeclined { brief_id, supplier_company_id, .. } => {
      let brief = load_brief(store, *brief_id).await?;
      if brief.is_draft {
        return Ok(out);
      }
      let (title, description, link) = match &event.kind {
        EventKind::NdaDeclined { reason, .. } => {
          ("Your NDA was declined", reason.clone(), nda_upload_link(brief.brief_id))
        }
        _ => ("Your NDA was accepted", brief.title.clone(), brief_link(brief.brief_id)),
      };
      for user in company_users(store, *supplier_company_id).await {
        out.push(Candidate::new(user.user_id, title, &description, link.clone()));
      }
    }

    EventKind::PostRatingCreated { rating_id }
    | EventKind::PostRatingAnswered { rating_id } => {
      let rating = store
        .get_rating(*rating_id)
        .await
        .map_err(Error::store)?
        .ok_or_else(|| Error::NotFound(format!("rating {rating_id}")))?;
      let post = load_post(store, rating.post_id).await?;
      if post.is_draft {
        return Ok(out);
      }
      let link = format!("{}/ratings/{}", post_link(post.post_id), rating.rating_id);
      let candidate = match event.kind {
        EventKind::PostRatingCreated { .. } => {
          Candidate::new(rating.author_id, "Please rate a post", &post.title, link)
        }
        _ => Candidate::new(post.created_by, "Your rating was answered", &post.title, link),
      };
      out.push(candidate);
    }
  }

  Ok(out)
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Resolve everyone who must hear about `event`, one [`Delivery`] each.
///
/// The triggering actor is never a receiver and no receiver appears twice.
/// Draft content produces no deliveries.
pub async fn resolve_recipients<S: MarketStore>(
  store: &S,
  event: &NotificationEvent,
) -> Result<Vec<Delivery>> {
  let candidates = candidates(store, event).await?;
  let event_id = event.fingerprint();
  let kind = event.kind.as_ref();
  let channels = event.kind.channels();

  let mut seen = HashSet::new();
  let deliveries: Vec<Delivery> = candidates
    .into_iter()
    .filter(|c| c.receiver_id != event.triggered_by)
    .filter(|c| seen.insert(c.receiver_id))
    .map(|c| Delivery {
      notification: Notification {
        notification_id: Uuid::new_v4(),
        event_id: event_id.clone(),
        kind: kind.to_owned(),
        title: c.title,
        description: c.description,
        link: c.link,
        receiver_id: c.receiver_id,
        created_at: event.occurred_at,
        items: Vec::new(),
      },
      channels: channels.clone(),
    })
    .collect();

  tracing::debug!(%event_id, kind, recipients = deliveries.len(), "recipients resolved");
  Ok(deliveries)
}
