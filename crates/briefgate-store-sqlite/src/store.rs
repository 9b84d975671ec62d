//! [`SqliteStore`]: the SQLite implementation of [`MarketStore`] and
//! [`NotificationSink`].

use std::path::Path;

use briefgate_core::{
  model::{
    Actor, Brief, BriefMembership, BriefSupplierInvitation, Company, Interest,
    Organization, OrganizationRelation, OrganizationType, Post, PostRating,
  },
  notify::{Delivery, NotificationSink},
  query::Predicate,
  store::MarketStore,
};
use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    BRIEF_COLUMNS, INVITATION_COLUMNS, POST_COLUMNS, RawActor, RawBrief,
    RawDelivery, RawInvitation, RawPost, RawRating, USER_COLUMNS, decode_uuid,
    encode_dt, encode_ids, encode_uuid,
  },
  error::Error,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A briefgate store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store; useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a statement that changes rows.
  async fn execute(&self, sql: &'static str, params: Vec<Option<String>>) -> Result<usize> {
    Ok(
      self
        .conn
        .call(move |conn| Ok(conn.execute(sql, rusqlite::params_from_iter(params))?))
        .await?,
    )
  }

  /// Run a query with string parameters and map every row.
  async fn select<T, F>(&self, sql: String, params: Vec<String>, map: F) -> Result<Vec<T>>
  where
    T: Send + 'static,
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    Ok(
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&sql)?;
          let rows = stmt
            .query_map(rusqlite::params_from_iter(params), map)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        })
        .await?,
    )
  }

  async fn select_ids(&self, sql: &'static str, params: Vec<String>) -> Result<Vec<Uuid>> {
    let raw: Vec<String> = self.select(sql.to_owned(), params, |row| row.get(0)).await?;
    raw.iter().map(|s| decode_uuid(s)).collect()
  }

  async fn select_actors(&self, filter: &str, params: Vec<String>) -> Result<Vec<Actor>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users {filter} ORDER BY user_id");
    let raws = self.select(sql, params, RawActor::from_row).await?;
    raws.into_iter().map(RawActor::into_actor).collect()
  }

  async fn select_briefs(&self, filter: &str, params: Vec<String>) -> Result<Vec<Brief>> {
    let sql = format!("SELECT {BRIEF_COLUMNS} FROM briefs {filter}");
    let raws = self.select(sql, params, RawBrief::from_row).await?;
    raws.into_iter().map(RawBrief::into_brief).collect()
  }

  async fn select_invitations(
    &self,
    filter: &str,
    params: Vec<String>,
  ) -> Result<Vec<BriefSupplierInvitation>> {
    let sql = format!(
      "SELECT {INVITATION_COLUMNS} FROM invitations {filter} ORDER BY supplier_company_id"
    );
    let raws = self.select(sql, params, RawInvitation::from_row).await?;
    raws.into_iter().map(RawInvitation::into_invitation).collect()
  }

  async fn select_posts(&self, filter: &str, params: Vec<String>) -> Result<Vec<Post>> {
    let sql = format!("SELECT {POST_COLUMNS} FROM posts {filter}");
    let raws = self.select(sql, params, RawPost::from_row).await?;
    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn select_memberships(
    &self,
    filter: &str,
    params: Vec<String>,
  ) -> Result<Vec<BriefMembership>> {
    let sql = format!(
      "SELECT brief_id, user_id, is_admin, is_contact FROM brief_memberships {filter}"
    );
    let raws: Vec<(String, String, bool, bool)> = self
      .select(sql, params, |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
      .await?;
    raws
      .into_iter()
      .map(|(brief_id, user_id, is_admin, is_contact)| {
        Ok(BriefMembership {
          brief_id: decode_uuid(&brief_id)?,
          user_id: decode_uuid(&user_id)?,
          is_admin,
          is_contact,
        })
      })
      .collect()
  }

  async fn select_organizations(
    &self,
    filter: &str,
    params: Vec<String>,
  ) -> Result<Vec<Organization>> {
    let sql = format!(
      "SELECT organization_id, name, organization_type FROM organizations {filter}"
    );
    let raws: Vec<(String, String, Option<String>)> = self
      .select(sql, params, |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
      .await?;
    raws
      .into_iter()
      .map(|(id, name, kind)| {
        Ok(Organization {
          organization_id: decode_uuid(&id)?,
          name,
          organization_type: kind.as_deref().map(OrganizationType::from_label),
        })
      })
      .collect()
  }

  // ── Seeding ───────────────────────────────────────────────────────────────

  pub async fn insert_organization(&self, organization: &Organization) -> Result<()> {
    self
      .execute(
        "INSERT OR REPLACE INTO organizations (organization_id, name, organization_type)
         VALUES (?1, ?2, ?3)",
        vec![
          Some(encode_uuid(organization.organization_id)),
          Some(organization.name.clone()),
          organization.organization_type.as_ref().map(|t| t.label().to_owned()),
        ],
      )
      .await?;
    Ok(())
  }

  pub async fn insert_company(&self, company: &Company) -> Result<()> {
    self
      .execute(
        "INSERT OR REPLACE INTO companies (company_id, organization_id, name)
         VALUES (?1, ?2, ?3)",
        vec![
          Some(encode_uuid(company.company_id)),
          Some(encode_uuid(company.organization_id)),
          Some(company.name.clone()),
        ],
      )
      .await?;
    Ok(())
  }

  pub async fn insert_actor(&self, actor: &Actor) -> Result<()> {
    self
      .execute(
        "INSERT OR REPLACE INTO users (user_id, organization_id, company_id, role)
         VALUES (?1, ?2, ?3, ?4)",
        vec![
          Some(encode_uuid(actor.user_id)),
          actor.organization_id.map(encode_uuid),
          actor.company_id.map(encode_uuid),
          Some(actor.role.to_string()),
        ],
      )
      .await?;
    Ok(())
  }

  pub async fn insert_relation(&self, relation: OrganizationRelation) -> Result<()> {
    self
      .execute(
        "INSERT OR IGNORE INTO relations (company_a, company_b) VALUES (?1, ?2)",
        vec![
          Some(encode_uuid(relation.company_a)),
          Some(encode_uuid(relation.company_b)),
        ],
      )
      .await?;
    Ok(())
  }

  pub async fn insert_brief(&self, brief: &Brief) -> Result<()> {
    let brief_id = encode_uuid(brief.brief_id);
    let client = encode_uuid(brief.client_company_id);
    let title = brief.title.clone();
    let description = brief.description.clone();
    let privacy_mode = brief.privacy_mode.to_string();
    let nda_requirement = brief.nda_requirement.code();
    let has_nda = brief.has_nda;
    let is_draft = brief.is_draft;
    let deadline = brief.deadline.map(encode_dt);
    let categories = encode_ids(&brief.categories)?;
    let markets = encode_ids(&brief.markets)?;
    let created_by = encode_uuid(brief.created_by);
    let created_at = encode_dt(brief.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO briefs (
             brief_id, client_company_id, title, description, privacy_mode,
             nda_requirement, has_nda, is_draft, deadline, categories, markets,
             created_by, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
           ON CONFLICT (brief_id) DO UPDATE SET
             client_company_id = excluded.client_company_id,
             title = excluded.title,
             description = excluded.description,
             privacy_mode = excluded.privacy_mode,
             nda_requirement = excluded.nda_requirement,
             has_nda = excluded.has_nda,
             is_draft = excluded.is_draft,
             deadline = excluded.deadline,
             categories = excluded.categories,
             markets = excluded.markets,
             created_by = excluded.created_by,
             created_at = excluded.created_at",
          rusqlite::params![
            brief_id,
            client,
            title,
            description,
            privacy_mode,
            nda_requirement,
            has_nda,
            is_draft,
            deadline,
            categories,
            markets,
            created_by,
            created_at,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_membership(&self, membership: BriefMembership) -> Result<()> {
    let brief_id = encode_uuid(membership.brief_id);
    let user_id = encode_uuid(membership.user_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO brief_memberships (brief_id, user_id, is_admin, is_contact)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![brief_id, user_id, membership.is_admin, membership.is_contact],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or overwrite an invitation, revision included. Engine writes go
  /// through [`MarketStore::swap_invitation`] instead.
  pub async fn insert_invitation(&self, invitation: &BriefSupplierInvitation) -> Result<()> {
    let brief_id = encode_uuid(invitation.brief_id);
    let company = encode_uuid(invitation.supplier_company_id);
    let accepted = invitation.accepted;
    let nda_state = invitation.nda_state.to_string();
    let signed = invitation.signed_nda;
    let reason = invitation.decline_reason.clone();
    let revision = invitation.revision;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO invitations (
             brief_id, supplier_company_id, accepted, nda_state, signed_nda,
             decline_reason, revision
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![brief_id, company, accepted, nda_state, signed, reason, revision],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_post(&self, post: &Post) -> Result<()> {
    let post_id = encode_uuid(post.post_id);
    let company = encode_uuid(post.supplier_company_id);
    let organization = encode_uuid(post.organization_id);
    let tier = post.privacy_tier.to_string();
    let recipients = encode_ids(&post.recipient_company_ids)?;
    let categories = encode_ids(&post.categories)?;
    let brief_id = post.brief_id.map(encode_uuid);
    let title = post.title.clone();
    let description = post.description.clone();
    let is_draft = post.is_draft;
    let created_by = encode_uuid(post.created_by);
    let created_at = encode_dt(post.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posts (
             post_id, supplier_company_id, organization_id, privacy_tier,
             recipient_company_ids, categories, brief_id, title, description,
             is_draft, created_by, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
           ON CONFLICT (post_id) DO UPDATE SET
             supplier_company_id = excluded.supplier_company_id,
             organization_id = excluded.organization_id,
             privacy_tier = excluded.privacy_tier,
             recipient_company_ids = excluded.recipient_company_ids,
             categories = excluded.categories,
             brief_id = excluded.brief_id,
             title = excluded.title,
             description = excluded.description,
             is_draft = excluded.is_draft,
             created_by = excluded.created_by,
             created_at = excluded.created_at",
          rusqlite::params![
            post_id,
            company,
            organization,
            tier,
            recipients,
            categories,
            brief_id,
            title,
            description,
            is_draft,
            created_by,
            created_at,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_rating(&self, rating: &PostRating) -> Result<()> {
    let rating_id = encode_uuid(rating.rating_id);
    let post_id = encode_uuid(rating.post_id);
    let author_id = encode_uuid(rating.author_id);
    let score = rating.score;
    let answer = rating.answer.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO post_ratings (rating_id, post_id, author_id, score, answer)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![rating_id, post_id, author_id, score, answer],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn insert_interest(&self, interest: Interest) -> Result<()> {
    self
      .execute(
        "INSERT OR IGNORE INTO interests (user_id, category_id) VALUES (?1, ?2)",
        vec![
          Some(encode_uuid(interest.user_id)),
          Some(encode_uuid(interest.category_id)),
        ],
      )
      .await?;
    Ok(())
  }

  pub async fn record_view(&self, user_id: Uuid, brief_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    self
      .execute(
        "INSERT INTO brief_views (user_id, brief_id, viewed_at) VALUES (?1, ?2, ?3)",
        vec![
          Some(encode_uuid(user_id)),
          Some(encode_uuid(brief_id)),
          Some(encode_dt(at)),
        ],
      )
      .await?;
    Ok(())
  }

  // ── Outbox ────────────────────────────────────────────────────────────────

  /// Every queued delivery, oldest first.
  pub async fn outbox(&self) -> Result<Vec<Delivery>> {
    let raws: Vec<RawDelivery> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT notification_id, event_id, kind, title, description, link,
                  receiver_id, created_at, items
           FROM notifications
           ORDER BY rowid",
        )?;
        let mut channels = conn.prepare(
          "SELECT channel FROM deliveries WHERE notification_id = ?1 ORDER BY position",
        )?;

        let mut rows = stmt
          .query_map([], |row| {
            Ok(RawDelivery {
              notification_id: row.get(0)?,
              event_id:        row.get(1)?,
              kind:            row.get(2)?,
              title:           row.get(3)?,
              description:     row.get(4)?,
              link:            row.get(5)?,
              receiver_id:     row.get(6)?,
              created_at:      row.get(7)?,
              items:           row.get(8)?,
              channels:        Vec::new(),
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        for raw in &mut rows {
          raw.channels = channels
            .query_map(rusqlite::params![raw.notification_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        }
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDelivery::into_delivery).collect()
  }
}

// ─── MarketStore impl ────────────────────────────────────────────────────────

impl MarketStore for SqliteStore {
  type Error = Error;

  // ── Actors ────────────────────────────────────────────────────────────────

  async fn get_actor(&self, user_id: Uuid) -> Result<Option<Actor>> {
    Ok(
      self
        .select_actors("WHERE user_id = ?1", vec![encode_uuid(user_id)])
        .await?
        .pop(),
    )
  }

  async fn users_of_company(&self, company_id: Uuid) -> Result<Vec<Actor>> {
    self
      .select_actors("WHERE company_id = ?1", vec![encode_uuid(company_id)])
      .await
  }

  async fn all_users(&self) -> Result<Vec<Actor>> { self.select_actors("", vec![]).await }

  // ── Companies and organizations ───────────────────────────────────────────

  async fn get_company(&self, company_id: Uuid) -> Result<Option<Company>> {
    let id = encode_uuid(company_id);
    let raw: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT organization_id, name FROM companies WHERE company_id = ?1",
              rusqlite::params![id],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(organization_id, name)| {
        Ok(Company { company_id, organization_id: decode_uuid(&organization_id)?, name })
      })
      .transpose()
  }

  async fn companies_of_organization(&self, organization_id: Uuid) -> Result<Vec<Company>> {
    let raws: Vec<(String, String)> = self
      .select(
        "SELECT company_id, name FROM companies WHERE organization_id = ?1 ORDER BY company_id"
          .to_owned(),
        vec![encode_uuid(organization_id)],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .await?;
    raws
      .into_iter()
      .map(|(id, name)| Ok(Company { company_id: decode_uuid(&id)?, organization_id, name }))
      .collect()
  }

  async fn get_organization(&self, organization_id: Uuid) -> Result<Option<Organization>> {
    Ok(
      self
        .select_organizations("WHERE organization_id = ?1", vec![encode_uuid(organization_id)])
        .await?
        .pop(),
    )
  }

  async fn organizations_of_type<'a>(
    &'a self,
    organization_type: &'a OrganizationType,
  ) -> Result<Vec<Organization>> {
    self
      .select_organizations(
        "WHERE organization_type = ?1 COLLATE NOCASE ORDER BY organization_id",
        vec![organization_type.label().to_owned()],
      )
      .await
  }

  async fn relation_partners(&self, company_id: Uuid) -> Result<Vec<Uuid>> {
    self
      .select_ids(
        "SELECT company_b FROM relations WHERE company_a = ?1
         UNION
         SELECT company_a FROM relations WHERE company_b = ?1",
        vec![encode_uuid(company_id)],
      )
      .await
  }

  // ── Briefs ────────────────────────────────────────────────────────────────

  async fn get_brief(&self, brief_id: Uuid) -> Result<Option<Brief>> {
    Ok(
      self
        .select_briefs("WHERE brief_id = ?1", vec![encode_uuid(brief_id)])
        .await?
        .pop(),
    )
  }

  /// Loads every published brief and evaluates `predicate` in process.
  async fn briefs_matching<'a>(&'a self, predicate: &'a Predicate) -> Result<Vec<Brief>> {
    let mut briefs = self
      .select_briefs("WHERE is_draft = 0 ORDER BY created_at DESC", vec![])
      .await?;
    briefs.retain(|b| predicate.matches(b));
    Ok(briefs)
  }

  async fn get_membership(&self, brief_id: Uuid, user_id: Uuid) -> Result<Option<BriefMembership>> {
    Ok(
      self
        .select_memberships(
          "WHERE brief_id = ?1 AND user_id = ?2",
          vec![encode_uuid(brief_id), encode_uuid(user_id)],
        )
        .await?
        .pop(),
    )
  }

  async fn memberships_of_user(&self, user_id: Uuid) -> Result<Vec<BriefMembership>> {
    self
      .select_memberships("WHERE user_id = ?1", vec![encode_uuid(user_id)])
      .await
  }

  async fn memberships_of_brief(&self, brief_id: Uuid) -> Result<Vec<BriefMembership>> {
    self
      .select_memberships("WHERE brief_id = ?1 ORDER BY user_id", vec![encode_uuid(brief_id)])
      .await
  }

  async fn get_invitation(
    &self,
    brief_id: Uuid,
    supplier_company_id: Uuid,
  ) -> Result<Option<BriefSupplierInvitation>> {
    Ok(
      self
        .select_invitations(
          "WHERE brief_id = ?1 AND supplier_company_id = ?2",
          vec![encode_uuid(brief_id), encode_uuid(supplier_company_id)],
        )
        .await?
        .pop(),
    )
  }

  async fn invitations_of_brief(&self, brief_id: Uuid) -> Result<Vec<BriefSupplierInvitation>> {
    self
      .select_invitations("WHERE brief_id = ?1", vec![encode_uuid(brief_id)])
      .await
  }

  async fn invitations_of_company(
    &self,
    supplier_company_id: Uuid,
  ) -> Result<Vec<BriefSupplierInvitation>> {
    self
      .select_invitations(
        "WHERE supplier_company_id = ?1",
        vec![encode_uuid(supplier_company_id)],
      )
      .await
  }

  async fn swap_invitation(
    &self,
    expected_revision: u64,
    next: BriefSupplierInvitation,
  ) -> Result<bool> {
    let brief_id = encode_uuid(next.brief_id);
    let company = encode_uuid(next.supplier_company_id);
    let nda_state = next.nda_state.to_string();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE invitations
           SET accepted = ?1, nda_state = ?2, signed_nda = ?3,
               decline_reason = ?4, revision = ?5
           WHERE brief_id = ?6 AND supplier_company_id = ?7 AND revision = ?8",
          rusqlite::params![
            next.accepted,
            nda_state,
            next.signed_nda,
            next.decline_reason,
            next.revision,
            brief_id,
            company,
            expected_revision,
          ],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  async fn last_viewed_briefs(&self, user_id: Uuid, limit: usize) -> Result<Vec<Uuid>> {
    self
      .select_ids(
        "SELECT brief_id FROM brief_views WHERE user_id = ?1
         GROUP BY brief_id
         ORDER BY MAX(viewed_at) DESC
         LIMIT CAST(?2 AS INTEGER)",
        vec![encode_uuid(user_id), limit.to_string()],
      )
      .await
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn get_post(&self, post_id: Uuid) -> Result<Option<Post>> {
    Ok(
      self
        .select_posts("WHERE post_id = ?1", vec![encode_uuid(post_id)])
        .await?
        .pop(),
    )
  }

  async fn published_posts(&self, since: Option<DateTime<Utc>>) -> Result<Vec<Post>> {
    match since {
      Some(since) => {
        self
          .select_posts(
            "WHERE is_draft = 0 AND created_at >= ?1 ORDER BY created_at DESC",
            vec![encode_dt(since)],
          )
          .await
      }
      None => {
        self
          .select_posts("WHERE is_draft = 0 ORDER BY created_at DESC", vec![])
          .await
      }
    }
  }

  async fn get_rating(&self, rating_id: Uuid) -> Result<Option<PostRating>> {
    let id = encode_uuid(rating_id);
    let raw: Option<RawRating> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT rating_id, post_id, author_id, score, answer
               FROM post_ratings WHERE rating_id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(RawRating {
                  rating_id: row.get(0)?,
                  post_id:   row.get(1)?,
                  author_id: row.get(2)?,
                  score:     row.get(3)?,
                  answer:    row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawRating::into_rating).transpose()
  }

  async fn interests_of_user(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
    self
      .select_ids(
        "SELECT category_id FROM interests WHERE user_id = ?1",
        vec![encode_uuid(user_id)],
      )
      .await
  }
}

// ─── NotificationSink impl ───────────────────────────────────────────────────

impl NotificationSink for SqliteStore {
  type Error = Error;

  /// Queue the notification and one delivery row per channel. A record for
  /// an (event, receiver) pair already in the outbox is left untouched.
  async fn deliver(&self, delivery: &Delivery) -> Result<()> {
    let n = &delivery.notification;
    let notification_id = encode_uuid(n.notification_id);
    let event_id = n.event_id.clone();
    let kind = n.kind.clone();
    let title = n.title.clone();
    let description = n.description.clone();
    let link = n.link.clone();
    let receiver_id = encode_uuid(n.receiver_id);
    let created_at = encode_dt(n.created_at);
    let items = serde_json::to_string(&n.items)?;
    let channels: Vec<String> = delivery.channels.iter().map(ToString::to_string).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO notifications (
             notification_id, event_id, kind, title, description, link,
             receiver_id, created_at, items
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            notification_id,
            event_id,
            kind,
            title,
            description,
            link,
            receiver_id,
            created_at,
            items,
          ],
        )?;
        if inserted == 1 {
          for (position, channel) in channels.iter().enumerate() {
            tx.execute(
              "INSERT INTO deliveries (notification_id, position, channel) VALUES (?1, ?2, ?3)",
              rusqlite::params![notification_id, position, channel],
            )?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
