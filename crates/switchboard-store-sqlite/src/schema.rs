//! SQL schema for the switchboard SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per open contact <-> thread mapping.
-- Closing a topic deletes its row, so a closed contact can open a new topic
-- and a closed thread id is free to be reused.
CREATE TABLE IF NOT EXISTS topics (
    contact       TEXT PRIMARY KEY,
    display_name  TEXT NOT NULL,
    thread_id     INTEGER NOT NULL UNIQUE,
    status        TEXT NOT NULL DEFAULT 'open' CHECK (status = 'open'),
    opened_at     TEXT NOT NULL    -- RFC 3339 UTC
);

-- Stored (non-superadmin) agents.
CREATE TABLE IF NOT EXISTS agents (
    agent_id  INTEGER PRIMARY KEY,
    initial   TEXT NOT NULL,
    added_at  TEXT NOT NULL
);

PRAGMA user_version = 1;
";
