//! v001 -- Initial schema creation.
//!
//! Creates `users`, `reports`, `reviews`, `appeals` and `watchlist`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (local directory of principals seen by this server)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                  TEXT PRIMARY KEY NOT NULL,   -- UUID from the identity provider
    role                TEXT NOT NULL,               -- user | admin
    name                TEXT,
    email               TEXT,
    subscription_status TEXT NOT NULL,               -- active | inactive
    subscription_expiry TEXT,                        -- RFC-3339
    last_seen_at        TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- Reports (one per instrument)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS reports (
    id                  TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    instrument          TEXT NOT NULL UNIQUE,        -- case-sensitive as stored
    instrument_type     TEXT NOT NULL,
    review_count        INTEGER NOT NULL DEFAULT 0,  -- always COUNT(reviews)
    risk_level          TEXT NOT NULL DEFAULT 'low',
    is_public           INTEGER NOT NULL DEFAULT 0,  -- boolean 0/1
    force_public        INTEGER NOT NULL DEFAULT 0,
    suppressed          INTEGER NOT NULL DEFAULT 0,  -- hidden by an approved appeal
    verification_status TEXT NOT NULL DEFAULT 'unverified',
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_reports_public_created
    ON reports(is_public, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_reports_type ON reports(instrument_type);

-- ----------------------------------------------------------------
-- Reviews (owned by a report, append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS reviews (
    id          TEXT PRIMARY KEY NOT NULL,           -- UUID v4
    report_id   TEXT NOT NULL,                       -- FK -> reports(id)
    user_id     TEXT NOT NULL,
    description TEXT NOT NULL,
    aliases     TEXT NOT NULL DEFAULT '[]',          -- JSON array of strings
    created_at  TEXT NOT NULL,

    FOREIGN KEY (report_id) REFERENCES reports(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_reviews_report_user
    ON reviews(report_id, user_id);

-- ----------------------------------------------------------------
-- Appeals (weak reference to reports by instrument)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS appeals (
    id         TEXT PRIMARY KEY NOT NULL,            -- UUID v4
    instrument TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    reason     TEXT NOT NULL,
    evidence   TEXT,
    status     TEXT NOT NULL DEFAULT 'pending',      -- pending | approved | rejected
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_appeals_user_instrument
    ON appeals(user_id, instrument);
CREATE INDEX IF NOT EXISTS idx_appeals_status_created
    ON appeals(status, created_at DESC);

-- ----------------------------------------------------------------
-- Watchlist
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS watchlist (
    id         TEXT PRIMARY KEY NOT NULL,            -- UUID v4
    user_id    TEXT NOT NULL,
    category   TEXT NOT NULL,                        -- instrument type
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_watchlist_user_category
    ON watchlist(user_id, category);
CREATE INDEX IF NOT EXISTS idx_watchlist_category ON watchlist(category);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
