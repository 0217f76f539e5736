pub mod meta;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::{Arc, Mutex, Once};

static SQLITE_VEC_INIT: Once = Once::new();

/// A connection shared by every store adapter in the process.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the recollect database at the given path, with all
/// extensions loaded and schema initialized.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL lets the webhook handlers read while another turn is writing
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    let version = meta::schema_version(&conn)?;
    anyhow::ensure!(
        version <= schema::SCHEMA_VERSION,
        "database at {} has schema v{version}, this build supports up to v{}",
        path.display(),
        schema::SCHEMA_VERSION
    );

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Wrap an open connection for sharing across async tasks.
pub fn share(conn: Connection) -> SharedConnection {
    Arc::new(Mutex::new(conn))
}

/// Run a blocking closure against the shared connection on the blocking pool.
pub async fn with_conn<T, F>(db: &SharedConnection, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || {
        let mut conn = db
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        f(&mut conn)
    })
    .await
    .context("db task failed")?
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub turn_count: i64,
    pub summary_count: i64,
    pub tone_rule_count: i64,
    pub vector_record_count: i64,
}

/// Run `PRAGMA integrity_check` and collect row counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .context("integrity check failed to run")?;
    let count = |sql: &str| -> Result<i64> {
        conn.query_row(sql, [], |row| row.get(0))
            .with_context(|| format!("count query failed: {sql}"))
    };

    Ok(HealthReport {
        integrity_ok: integrity_details == "ok",
        integrity_details,
        schema_version: meta::schema_version(conn)?,
        sqlite_vec_version: conn.query_row("SELECT vec_version()", [], |r| r.get(0))?,
        embedding_model: meta::embedding_model(conn)?,
        turn_count: count("SELECT COUNT(*) FROM messages")?,
        summary_count: count("SELECT COUNT(*) FROM messages WHERE direction = 'summary'")?,
        tone_rule_count: count("SELECT COUNT(*) FROM tone_rules")?,
        vector_record_count: count("SELECT COUNT(*) FROM vector_records")?,
    })
}

/// Open an in-memory database for testing.
#[cfg(test)]
pub fn open_memory_database() -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    Ok(conn)
}
