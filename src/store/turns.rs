//! The `messages` turn log.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};

use super::TurnLog;
use crate::db::{self, SharedConnection};
use crate::memory::types::{format_timestamp, parse_timestamp, Direction, Turn};

const TURN_COLUMNS: &str = "id, sender, text, media_url, timestamp, direction";

pub struct SqliteTurnLog {
    db: SharedConnection,
}

impl SqliteTurnLog {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }

    /// Every turn ever logged for `identity`, oldest first, ignored turns included.
    pub async fn full_log(&self, identity: &str) -> Result<Vec<Turn>> {
        let identity = identity.to_string();
        db::with_conn(&self.db, move |conn| select_all(conn, &identity)).await
    }
}

#[async_trait]
impl TurnLog for SqliteTurnLog {
    async fn append(&self, turn: &Turn) -> Result<()> {
        let turn = turn.clone();
        db::with_conn(&self.db, move |conn| insert_turn(conn, &turn)).await
    }

    async fn recent(&self, identity: &str, limit: usize) -> Result<Vec<Turn>> {
        let identity = identity.to_string();
        db::with_conn(&self.db, move |conn| select_recent(conn, &identity, limit)).await
    }
}

pub fn insert_turn(conn: &Connection, turn: &Turn) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, sender, text, media_url, timestamp, direction) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            turn.id,
            turn.identity,
            turn.text,
            turn.media_url,
            format_timestamp(&turn.timestamp),
            turn.direction.as_str(),
        ],
    )
    .with_context(|| format!("failed to append {} turn for {}", turn.direction, turn.identity))?;
    Ok(())
}

fn select_recent(conn: &Connection, identity: &str, limit: usize) -> Result<Vec<Turn>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TURN_COLUMNS} FROM messages \
         WHERE sender = ?1 AND direction != 'inbound_ignored' \
         ORDER BY timestamp DESC, seq DESC LIMIT ?2"
    ))?;
    let rows = stmt
        .query_map(params![identity, limit as i64], raw_turn)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(RawTurn::into_turn).collect()
}

fn select_all(conn: &Connection, identity: &str) -> Result<Vec<Turn>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TURN_COLUMNS} FROM messages WHERE sender = ?1 ORDER BY timestamp, seq"
    ))?;
    let rows = stmt
        .query_map(params![identity], raw_turn)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(RawTurn::into_turn).collect()
}

struct RawTurn {
    id: String,
    sender: String,
    text: String,
    media_url: Option<String>,
    timestamp: String,
    direction: String,
}

fn raw_turn(row: &Row<'_>) -> rusqlite::Result<RawTurn> {
    Ok(RawTurn {
        id: row.get(0)?,
        sender: row.get(1)?,
        text: row.get(2)?,
        media_url: row.get(3)?,
        timestamp: row.get(4)?,
        direction: row.get(5)?,
    })
}

impl RawTurn {
    fn into_turn(self) -> Result<Turn> {
        let direction: Direction = self
            .direction
            .parse()
            .map_err(|e: String| anyhow::anyhow!("turn {}: {e}", self.id))?;
        let timestamp = parse_timestamp(&self.timestamp)
            .with_context(|| format!("turn {} has malformed timestamp", self.id))?;
        Ok(Turn {
            id: self.id,
            identity: self.sender,
            text: self.text,
            media_url: self.media_url,
            timestamp,
            direction,
        })
    }
}
