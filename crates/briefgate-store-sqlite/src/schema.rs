//! SQL schema for the briefgate SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS organizations (
    organization_id   TEXT PRIMARY KEY,
    name              TEXT NOT NULL,
    organization_type TEXT              -- classification label, NULL if unknown
);

CREATE TABLE IF NOT EXISTS companies (
    company_id      TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    name            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS users (
    user_id         TEXT PRIMARY KEY,
    organization_id TEXT,
    company_id      TEXT,
    role            TEXT NOT NULL DEFAULT 'user'
);

-- Unordered potential-client pairs; looked up from either side.
CREATE TABLE IF NOT EXISTS relations (
    company_a TEXT NOT NULL,
    company_b TEXT NOT NULL,
    PRIMARY KEY (company_a, company_b)
);

CREATE TABLE IF NOT EXISTS briefs (
    brief_id          TEXT PRIMARY KEY,
    client_company_id TEXT NOT NULL,
    title             TEXT NOT NULL,
    description       TEXT NOT NULL,
    privacy_mode      TEXT NOT NULL,    -- 'open' | 'members_only'
    nda_requirement   INTEGER NOT NULL, -- 0 none, 1 conditional, 2 always open
    has_nda           INTEGER NOT NULL,
    is_draft          INTEGER NOT NULL,
    deadline          TEXT,
    categories        TEXT NOT NULL DEFAULT '[]',
    markets           TEXT NOT NULL DEFAULT '[]',
    created_by        TEXT NOT NULL,
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS brief_memberships (
    brief_id   TEXT NOT NULL REFERENCES briefs(brief_id),
    user_id    TEXT NOT NULL,
    is_admin   INTEGER NOT NULL,
    is_contact INTEGER NOT NULL,
    PRIMARY KEY (brief_id, user_id)
);

-- The only table the engine writes outside the outbox. Every UPDATE is
-- conditional on `revision`.
CREATE TABLE IF NOT EXISTS invitations (
    brief_id            TEXT NOT NULL REFERENCES briefs(brief_id),
    supplier_company_id TEXT NOT NULL,
    accepted            INTEGER,
    nda_state           TEXT NOT NULL DEFAULT 'unset',
    signed_nda          INTEGER NOT NULL DEFAULT 0,
    decline_reason      TEXT,
    revision            INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (brief_id, supplier_company_id)
);

CREATE TABLE IF NOT EXISTS brief_views (
    user_id   TEXT NOT NULL,
    brief_id  TEXT NOT NULL,
    viewed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS posts (
    post_id               TEXT PRIMARY KEY,
    supplier_company_id   TEXT NOT NULL,
    organization_id       TEXT NOT NULL,
    privacy_tier          TEXT NOT NULL,
    recipient_company_ids TEXT NOT NULL DEFAULT '[]',
    categories            TEXT NOT NULL DEFAULT '[]',
    brief_id              TEXT,
    title                 TEXT NOT NULL,
    description           TEXT NOT NULL,
    is_draft              INTEGER NOT NULL,
    created_by            TEXT NOT NULL,
    created_at            TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS post_ratings (
    rating_id TEXT PRIMARY KEY,
    post_id   TEXT NOT NULL REFERENCES posts(post_id),
    author_id TEXT NOT NULL,
    score     INTEGER NOT NULL,
    answer    TEXT
);

CREATE TABLE IF NOT EXISTS interests (
    user_id     TEXT NOT NULL,
    category_id TEXT NOT NULL,
    PRIMARY KEY (user_id, category_id)
);

-- Outbox. One record per (event, receiver); a repeated event is ignored.
CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    event_id        TEXT NOT NULL,
    kind            TEXT NOT NULL,
    title           TEXT NOT NULL,
    description     TEXT NOT NULL,
    link            TEXT NOT NULL,
    receiver_id     TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    items           TEXT NOT NULL DEFAULT '[]',
    UNIQUE (event_id, receiver_id)
);

CREATE TABLE IF NOT EXISTS deliveries (
    notification_id TEXT NOT NULL REFERENCES notifications(notification_id),
    position        INTEGER NOT NULL,
    channel         TEXT NOT NULL,  -- 'in_app' | 'email' | 'push'
    status          TEXT NOT NULL DEFAULT 'queued',
    PRIMARY KEY (notification_id, channel)
);

CREATE INDEX IF NOT EXISTS companies_org_idx       ON companies(organization_id);
CREATE INDEX IF NOT EXISTS users_company_idx       ON users(company_id);
CREATE INDEX IF NOT EXISTS memberships_user_idx    ON brief_memberships(user_id);
CREATE INDEX IF NOT EXISTS invitations_company_idx ON invitations(supplier_company_id);
CREATE INDEX IF NOT EXISTS views_user_idx          ON brief_views(user_id, viewed_at);
CREATE INDEX IF NOT EXISTS posts_created_idx       ON posts(created_at);

PRAGMA user_version = 1;
";
