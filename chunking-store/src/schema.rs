//! Persisted state layout (spec §6). One SQLite database backs the chunk
//! store (C3) and the ACL/session tables owned by the `identity` crate.

use rusqlite::Connection;

use crate::error::StoreError;

pub fn migrate(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL UNIQUE,
            created_by  TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id              TEXT PRIMARY KEY,
            collection_id   INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
            source          TEXT NOT NULL,
            page            INTEGER NOT NULL,
            content         TEXT NOT NULL,
            chunk_size      INTEGER NOT NULL,
            metadata_json   TEXT NOT NULL,
            dense_vector    BLOB NOT NULL,
            created_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chunks_collection ON chunks(collection_id);
        CREATE INDEX IF NOT EXISTS idx_chunks_source ON chunks(collection_id, source);

        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            username        TEXT NOT NULL UNIQUE,
            email           TEXT NOT NULL UNIQUE,
            password_hash   TEXT NOT NULL,
            is_active       INTEGER NOT NULL DEFAULT 1,
            is_admin        INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS groups (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_groups (
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            group_id    TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, group_id)
        );

        CREATE TABLE IF NOT EXISTS collection_permissions (
            collection_id   INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
            group_id        TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            can_read        INTEGER NOT NULL DEFAULT 0,
            can_write       INTEGER NOT NULL DEFAULT 0,
            can_delete      INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (collection_id, group_id)
        );

        CREATE TABLE IF NOT EXISTS sessions (
            session_id  TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL,
            expires_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

        CREATE TABLE IF NOT EXISTS password_reset_tokens (
            token       TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            used        INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS system_message_templates (
            owner_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name            TEXT NOT NULL,
            content         TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            PRIMARY KEY (owner_id, name)
        );

        CREATE TABLE IF NOT EXISTS system_message_selection (
            owner_id        TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            selected_name   TEXT NOT NULL
        );
        "#,
    )?;
    seed_default_groups(conn)?;
    Ok(())
}

/// Conventional id of the administrators group (spec §3: every deployment
/// has a fixed admin group whose members get an implicit read/write grant
/// on every collection).
pub const ADMIN_GROUP_ID: &str = "GRP000001";
/// Conventional id of the default group new registrants are placed into.
pub const DEFAULT_GROUP_ID: &str = "GRP000002";

fn seed_default_groups(conn: &Connection) -> Result<(), StoreError> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR IGNORE INTO groups (id, name, created_at) VALUES (?1, 'admin', ?2)",
        rusqlite::params![ADMIN_GROUP_ID, now],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO groups (id, name, created_at) VALUES (?1, 'default', ?2)",
        rusqlite::params![DEFAULT_GROUP_ID, now],
    )?;
    Ok(())
}
