//! SQL migration definitions for the storyfeed database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: topics, tasks, online",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Discovered topics; never mutated once stored
CREATE TABLE IF NOT EXISTS topics (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    url        TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Raw candidate tasks, keyed by answer link
CREATE TABLE IF NOT EXISTS tasks (
    id                TEXT PRIMARY KEY,
    answer_link       TEXT NOT NULL UNIQUE,
    topic             TEXT,
    question_text     TEXT NOT NULL,
    question_link     TEXT NOT NULL,
    upvote_count      INTEGER NOT NULL CHECK (upvote_count >= 0),
    user_link         TEXT NOT NULL,
    user_name         TEXT,
    user_description  TEXT,
    user_avatar_url   TEXT,
    answer_abstract   TEXT,
    content_html      TEXT,
    cover_url         TEXT,
    author_json       TEXT,
    author_avatar_url TEXT,
    status            INTEGER NOT NULL DEFAULT 0 CHECK (status IN (-1, 0, 1)),
    date              TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_status_date ON tasks(status, date);
CREATE INDEX IF NOT EXISTS idx_tasks_upvote_count ON tasks(upvote_count);

-- Published stories, one per approved task
CREATE TABLE IF NOT EXISTS online (
    id                TEXT PRIMARY KEY REFERENCES tasks(id),
    title             TEXT NOT NULL,
    content_html      TEXT NOT NULL,
    cover_url         TEXT,
    author_name       TEXT,
    author_desc       TEXT,
    author_avatar_url TEXT,
    source_url        TEXT NOT NULL UNIQUE,
    published_at      TEXT NOT NULL
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
