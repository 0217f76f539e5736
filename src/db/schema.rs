//! SQL DDL for all recollect tables.
//!
//! Defines the `messages` turn log, `tone_rules`, the vector store tables
//! (`vector_collections`, `vector_records`), and `schema_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::{params, Connection};

/// Version of the DDL below. [`open_database`](super::open_database) refuses
/// databases stamped with a higher one.
pub const SCHEMA_VERSION: u32 = 1;

/// All schema DDL statements for recollect's core tables.
const SCHEMA_SQL: &str = r#"
-- Append-only turn log. `seq` breaks timestamp ties in insertion order.
CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    sender TEXT NOT NULL,
    text TEXT NOT NULL,
    media_url TEXT,
    timestamp TEXT NOT NULL,
    direction TEXT NOT NULL CHECK(direction IN ('inbound','outbound','summary','inbound_ignored'))
);

CREATE INDEX IF NOT EXISTS idx_messages_sender_ts ON messages(sender, timestamp);

-- Per-identity persona instructions. The default profile has id 'DEFAULT_UNKNOWN'.
CREATE TABLE IF NOT EXISTS tone_rules (
    id TEXT PRIMARY KEY,
    phone_number TEXT UNIQUE,
    instruction_text TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Vector store namespaces
CREATE TABLE IF NOT EXISTS vector_collections (
    name TEXT PRIMARY KEY,
    dimension INTEGER NOT NULL CHECK(dimension > 0),
    distance TEXT NOT NULL CHECK(distance IN ('cosine','euclid')),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS vector_records (
    collection TEXT NOT NULL REFERENCES vector_collections(name) ON DELETE CASCADE,
    id TEXT NOT NULL,
    identity TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    embedding BLOB NOT NULL,
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_vector_records_identity ON vector_records(collection, identity);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        params![SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}
