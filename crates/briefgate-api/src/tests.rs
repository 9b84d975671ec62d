use std::{collections::BTreeSet, sync::Arc};

use axum::{
  body::Body,
  http::{Request, StatusCode},
};
use briefgate_core::{
  memory::MemoryStore,
  model::{
    Actor, Brief, BriefMembership, BriefSupplierInvitation, Company, Interest,
    NdaRequirement, Organization, OrganizationType, Post, PostRating,
    PrivacyMode, PrivacyTier, Role,
  },
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{actor::ACTOR_HEADER, api_router, events::FanOutSummary};

/// A client that routed one NDA-gated brief to a supplier, plus a company
/// that has nothing to do with either.
struct Fixture {
  store:        MemoryStore,
  client:       Actor,
  supplier:     Actor,
  outsider:     Actor,
  supplier_org: Uuid,
  client_co:    Uuid,
  supplier_co:  Uuid,
  packaging:    Uuid,
  brief:        Brief,
}

async fn company(
  store: &MemoryStore,
  kind: Option<OrganizationType>,
) -> (Uuid, Uuid, Actor) {
  let organization_id = Uuid::new_v4();
  let company_id = Uuid::new_v4();
  store
    .insert_organization(Organization {
      organization_id,
      name: "org".into(),
      organization_type: kind,
    })
    .await;
  store
    .insert_company(Company { company_id, organization_id, name: "company".into() })
    .await;
  let actor = Actor {
    user_id:         Uuid::new_v4(),
    organization_id: Some(organization_id),
    company_id:      Some(company_id),
    role:            Role::User,
  };
  store.insert_actor(actor.clone()).await;
  (organization_id, company_id, actor)
}

async fn fixture() -> Fixture {
  let store = MemoryStore::new();
  let (_, client_co, client) = company(&store, Some(OrganizationType::CpgIndustry)).await;
  let (supplier_org, supplier_co, supplier) =
    company(&store, Some(OrganizationType::Other("Packaging".into()))).await;
  let (_, _, outsider) = company(&store, None).await;
  let packaging = Uuid::new_v4();

  let brief = Brief {
    brief_id:          Uuid::new_v4(),
    client_company_id: client_co,
    title:             "Recyclable trays".into(),
    description:       "Full details behind the NDA".into(),
    privacy_mode:      PrivacyMode::Open,
    nda_requirement:   NdaRequirement::Conditional,
    has_nda:           true,
    is_draft:          false,
    deadline:          None,
    categories:        vec![packaging],
    markets:           vec![],
    created_by:        client.user_id,
    created_at:        Utc::now() - Duration::hours(1),
  };
  store.insert_brief(brief.clone()).await;
  store
    .insert_membership(BriefMembership {
      brief_id:   brief.brief_id,
      user_id:    client.user_id,
      is_admin:   true,
      is_contact: true,
    })
    .await;
  store
    .insert_invitation(BriefSupplierInvitation::new(brief.brief_id, supplier_co))
    .await;

  Fixture {
    store,
    client,
    supplier,
    outsider,
    supplier_org,
    client_co,
    supplier_co,
    packaging,
    brief,
  }
}

impl Fixture {
  fn post(&self, tier: PrivacyTier) -> Post {
    Post {
      post_id:               Uuid::new_v4(),
      supplier_company_id:   self.supplier_co,
      organization_id:       self.supplier_org,
      privacy_tier:          tier,
      recipient_company_ids: BTreeSet::from([self.client_co]),
      categories:            vec![self.packaging],
      brief_id:              None,
      title:                 "New tray line".into(),
      description:           "Compostable".into(),
      is_draft:              false,
      created_by:            self.supplier.user_id,
      created_at:            Utc::now() - Duration::hours(2),
    }
  }

  async fn call(
    &self,
    method: &str,
    uri: &str,
    actor: Option<&Actor>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(actor) = actor {
      builder = builder.header(ACTOR_HEADER, actor.user_id.to_string());
    }
    let req = match body {
      Some(body) => builder
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp = api_router(Arc::new(self.store.clone()), 4)
      .oneshot(req)
      .await
      .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
  }

  async fn get(&self, uri: &str, actor: &Actor) -> (StatusCode, Value) {
    self.call("GET", uri, Some(actor), None).await
  }
}

// ── Actor header ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn requests_without_a_known_actor_are_unauthorized() {
  let fx = fixture().await;

  let (status, _) = fx.call("GET", "/briefs", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);

  let stranger = Actor { user_id: Uuid::new_v4(), ..fx.client.clone() };
  let (status, _) = fx.get("/briefs", &stranger).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Briefs ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn brief_visibility_depends_on_the_caller() {
  let fx = fixture().await;
  let uri = format!("/briefs/{}/visibility", fx.brief.brief_id);

  let (status, body) = fx.get(&uri, &fx.client).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["direction"], "sent");
  assert_eq!(body["is_public"], true);

  let (status, body) = fx.get(&uri, &fx.supplier).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["direction"], "received");
  assert_eq!(body["is_public"], false);
}

#[tokio::test]
async fn hidden_brief_reads_like_a_missing_one() {
  let fx = fixture().await;
  let hidden = fx.brief.brief_id;
  let missing = Uuid::new_v4();

  let (status, body) = fx.get(&format!("/briefs/{hidden}/visibility"), &fx.outsider).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body, json!({ "error": format!("brief {hidden} not found") }));

  let (status, body) = fx.get(&format!("/briefs/{missing}/visibility"), &fx.outsider).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body, json!({ "error": format!("brief {missing} not found") }));
}

#[tokio::test]
async fn received_listing_and_filters() {
  let fx = fixture().await;

  let (status, body) = fx.get("/briefs?mode=received", &fx.supplier).await;
  assert_eq!(status, StatusCode::OK);
  let items = body.as_array().unwrap();
  assert_eq!(items.len(), 1);
  assert_eq!(items[0]["brief_id"], fx.brief.brief_id.to_string());
  assert_eq!(items[0]["is_public"], false);

  // Filtering by category never surfaces undisclosed briefs.
  let uri = format!("/briefs?mode=received&categories={}", fx.packaging);
  let (status, body) = fx.get(&uri, &fx.supplier).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));

  let (status, body) = fx.get("/briefs", &fx.client).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);
  assert_eq!(body[0]["direction"], "sent");

  let (status, _) = fx.get("/briefs?categories=not-an-id", &fx.client).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = fx.get("/briefs?mode=participating", &fx.client).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn organization_view_lists_routed_briefs() {
  let fx = fixture().await;
  let uri = format!("/organizations/{}/briefs", fx.supplier_org);

  let (status, body) = fx.get(&uri, &fx.supplier).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);

  let (status, body) = fx.get(&uri, &fx.outsider).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));
}

// ── NDA ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn nda_upload_then_accept_notifies_each_side() {
  let fx = fixture().await;
  let uri = format!("/briefs/{}/suppliers/{}/nda", fx.brief.brief_id, fx.supplier_co);

  let (status, body) = fx
    .call("POST", &uri, Some(&fx.supplier), Some(json!({ "action": "upload_nda" })))
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["invitation"]["nda_state"], "pending");
  assert_eq!(body["notification"]["recipients"], 1);

  let (status, body) = fx
    .call("POST", &uri, Some(&fx.client), Some(json!({ "action": "accept" })))
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["invitation"]["nda_state"], "accepted");
  assert_eq!(body["invitation"]["signed_nda"], true);

  let delivered = fx.store.delivered().await;
  let receivers: Vec<Uuid> = delivered.iter().map(|d| d.notification.receiver_id).collect();
  assert_eq!(receivers, vec![fx.client.user_id, fx.supplier.user_id]);

  // Now disclosed to the supplier.
  let (_, body) = fx
    .get(&format!("/briefs/{}/visibility", fx.brief.brief_id), &fx.supplier)
    .await;
  assert_eq!(body["is_public"], true);

  let (status, _) = fx
    .call("POST", &uri, Some(&fx.client), Some(json!({ "action": "accept" })))
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn nda_actions_on_hidden_briefs_are_not_found() {
  let fx = fixture().await;
  let uri = format!("/briefs/{}/suppliers/{}/nda", fx.brief.brief_id, fx.supplier_co);

  let (status, _) = fx
    .call("POST", &uri, Some(&fx.outsider), Some(json!({ "action": "accept" })))
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(fx.store.delivered().await.is_empty());
}

#[tokio::test]
async fn suppliers_cannot_accept_their_own_nda() {
  let fx = fixture().await;
  let uri = format!("/briefs/{}/suppliers/{}/nda", fx.brief.brief_id, fx.supplier_co);
  fx.call("POST", &uri, Some(&fx.supplier), Some(json!({ "action": "upload_nda" })))
    .await;

  let (status, _) = fx
    .call("POST", &uri, Some(&fx.supplier), Some(json!({ "action": "accept" })))
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn nda_document_change_reopens_decided_invitations() {
  let fx = fixture().await;
  let nda = format!("/briefs/{}/suppliers/{}/nda", fx.brief.brief_id, fx.supplier_co);
  fx.call("POST", &nda, Some(&fx.supplier), Some(json!({ "action": "upload_nda" })))
    .await;
  fx.call("POST", &nda, Some(&fx.client), Some(json!({ "action": "accept" })))
    .await;

  let uri = format!("/briefs/{}/nda/document", fx.brief.brief_id);
  let (status, _) = fx.call("POST", &uri, Some(&fx.supplier), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let (status, _) = fx.call("POST", &uri, Some(&fx.outsider), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, body) = fx.call("POST", &uri, Some(&fx.client), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);
  assert_eq!(body[0]["nda_state"], "pending");
  assert_eq!(body[0]["signed_nda"], false);

  // Gated again until the new document is accepted.
  let (_, body) = fx
    .get(&format!("/briefs/{}/visibility", fx.brief.brief_id), &fx.supplier)
    .await;
  assert_eq!(body["is_public"], false);
}

// ── Supplier response ────────────────────────────────────────────────────────

#[tokio::test]
async fn supplier_response_reaches_the_contacts_once() {
  let fx = fixture().await;
  let uri = format!("/briefs/{}/response", fx.brief.brief_id);

  let (status, _) = fx
    .call("POST", &uri, Some(&fx.outsider), Some(json!({ "accept": true })))
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, body) = fx
    .call(
      "POST",
      &uri,
      Some(&fx.supplier),
      Some(json!({ "accept": false, "reason": "capacity" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["invitation"]["accepted"], false);
  assert_eq!(body["notification"]["recipients"], 1);

  let delivered = fx.store.delivered().await;
  assert_eq!(delivered.len(), 1);
  assert_eq!(delivered[0].notification.receiver_id, fx.client.user_id);
  assert_eq!(delivered[0].notification.kind, "brief_declined");
  assert_eq!(delivered[0].notification.description, "capacity");

  let (status, _) = fx
    .call("POST", &uri, Some(&fx.supplier), Some(json!({ "accept": true })))
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
}

// ── Posts and events ─────────────────────────────────────────────────────────

#[tokio::test]
async fn post_feed_and_visibility() {
  let fx = fixture().await;
  let post = fx.post(PrivacyTier::SelectedCompanies);
  fx.store.insert_post(post.clone()).await;

  let (status, body) = fx.get("/posts", &fx.client).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);
  assert_eq!(body[0]["direction"], "received");

  // Never in the author's own feed.
  let (_, body) = fx.get("/posts", &fx.supplier).await;
  assert_eq!(body, json!([]));

  let uri = format!("/posts/{}/visibility", post.post_id);
  let (status, _) = fx.get(&uri, &fx.client).await;
  assert_eq!(status, StatusCode::OK);
  let (status, body) = fx.get(&uri, &fx.outsider).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body, json!({ "error": format!("post {} not found", post.post_id) }));
}

#[tokio::test]
async fn publishing_an_event_fans_out_to_interested_receivers() {
  let fx = fixture().await;
  let post = fx.post(PrivacyTier::AllCompanies);
  fx.store.insert_post(post.clone()).await;
  fx.store
    .insert_interest(Interest { user_id: fx.client.user_id, category_id: fx.packaging })
    .await;

  let (status, body) = fx
    .call(
      "POST",
      "/events",
      Some(&fx.supplier),
      Some(json!({ "type": "new_post", "post_id": post.post_id })),
    )
    .await;
  assert_eq!(status, StatusCode::ACCEPTED);
  let summary: FanOutSummary = serde_json::from_value(body).unwrap();
  assert_eq!(summary.recipients, 1);
  assert_eq!(summary.delivered, 1);
  assert!(summary.failed.is_empty());

  let delivered = fx.store.delivered().await;
  assert_eq!(delivered.len(), 1);
  assert_eq!(delivered[0].notification.receiver_id, fx.client.user_id);
  assert_eq!(delivered[0].notification.event_id, summary.event_id);
}

#[tokio::test]
async fn events_about_unknown_subjects_are_not_found() {
  let fx = fixture().await;
  let (status, _) = fx
    .call(
      "POST",
      "/events",
      Some(&fx.client),
      Some(json!({ "type": "new_brief", "brief_id": Uuid::new_v4() })),
    )
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _) = fx
    .call("POST", "/events", Some(&fx.client), Some(json!({ "type": "unknown" })))
    .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn announcing_a_hidden_brief_reads_like_a_missing_one() {
  let fx = fixture().await;
  let hidden = fx.brief.brief_id;
  let missing = Uuid::new_v4();

  for brief_id in [hidden, missing] {
    let (status, body) = fx
      .call(
        "POST",
        "/events",
        Some(&fx.outsider),
        Some(json!({ "type": "new_brief", "brief_id": brief_id })),
      )
      .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": format!("brief {brief_id} not found") }));
  }
  assert!(fx.store.delivered().await.is_empty());
}

#[tokio::test]
async fn nda_decisions_and_responses_are_not_publishable() {
  let fx = fixture().await;
  let decline = json!({
    "type": "nda_declined",
    "brief_id": fx.brief.brief_id,
    "supplier_company_id": fx.supplier_co,
    "reason": "made up",
  });
  let accepted = json!({
    "type": "brief_accepted",
    "brief_id": fx.brief.brief_id,
    "supplier_company_id": fx.supplier_co,
  });

  for (actor, body) in [(&fx.outsider, decline.clone()), (&fx.client, decline), (&fx.supplier, accepted)] {
    let (status, _) = fx.call("POST", "/events", Some(actor), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }
  assert!(fx.store.delivered().await.is_empty());
}

#[tokio::test]
async fn only_the_client_side_announces_a_brief() {
  let fx = fixture().await;
  let changed = json!({
    "type": "brief_changed",
    "brief_id": fx.brief.brief_id,
    "change": "deadline",
  });

  // Sees the brief, but as its receiver.
  let (status, _) = fx.call("POST", "/events", Some(&fx.supplier), Some(changed.clone())).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) = fx.call("POST", "/events", Some(&fx.client), Some(changed)).await;
  assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn ratings_are_answered_by_their_author() {
  let fx = fixture().await;
  let post = fx.post(PrivacyTier::AllCompanies);
  fx.store.insert_post(post.clone()).await;
  let rating = PostRating {
    rating_id: Uuid::new_v4(),
    post_id:   post.post_id,
    author_id: fx.client.user_id,
    score:     5,
    answer:    None,
  };
  fx.store.insert_rating(rating.clone()).await;
  let answered = json!({ "type": "post_rating_answered", "rating_id": rating.rating_id });

  let (status, _) = fx.call("POST", "/events", Some(&fx.outsider), Some(answered.clone())).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = fx.call("POST", "/events", Some(&fx.client), Some(answered)).await;
  assert_eq!(status, StatusCode::ACCEPTED);
  assert_eq!(body["recipients"], 1);
  assert_eq!(fx.store.delivered().await[0].notification.receiver_id, fx.supplier.user_id);

  let unknown = Uuid::new_v4();
  let (status, body) = fx
    .call(
      "POST",
      "/events",
      Some(&fx.client),
      Some(json!({ "type": "post_rating_created", "rating_id": unknown })),
    )
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body, json!({ "error": format!("rating {unknown} not found") }));
}
