//! Key/value metadata kept in `schema_meta`.
//!
//! Two keys matter: `schema_version`, written by [`init_schema`](super::schema::init_schema),
//! and `embedding_model`, stamped the first time a configured model touches
//! the database so later runs can tell when stored vectors stop being
//! comparable with fresh ones.

use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA_VERSION_KEY: &str = "schema_version";
const EMBEDDING_MODEL_KEY: &str = "embedding_model";

fn get(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

/// The stored schema version, or 0 when none was ever written.
pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    Ok(get(conn, SCHEMA_VERSION_KEY)?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0))
}

pub fn embedding_model(conn: &Connection) -> rusqlite::Result<Option<String>> {
    get(conn, EMBEDDING_MODEL_KEY)
}

/// Outcome of comparing the configured embedding model with the stamped one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelCheck {
    /// Nothing was stamped yet; the configured model is now recorded.
    Recorded,
    Matches,
    /// Vectors already stored came from `stored`. The stamp is left alone.
    Mismatch { stored: String },
}

pub fn check_embedding_model(conn: &Connection, configured: &str) -> rusqlite::Result<ModelCheck> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES (?1, ?2)",
        params![EMBEDDING_MODEL_KEY, configured],
    )?;
    if inserted == 1 {
        return Ok(ModelCheck::Recorded);
    }

    match embedding_model(conn)? {
        Some(stored) if stored != configured => Ok(ModelCheck::Mismatch { stored }),
        _ => Ok(ModelCheck::Matches),
    }
}
