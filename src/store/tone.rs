//! The `tone_rules` persona table.

use anyhow::Result;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::ToneRules;
use crate::db::{self, SharedConnection};
use crate::memory::types::{ToneProfile, DEFAULT_PROFILE_ID};

pub struct SqliteToneRules {
    db: SharedConnection,
}

impl SqliteToneRules {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }

    /// Set the instructions for one identity, replacing any previous profile.
    pub async fn set_for_identity(&self, identity: &str, instruction_text: &str) -> Result<()> {
        let profile = ToneProfile {
            id: format!("phone:{identity}"),
            phone_number: Some(identity.to_string()),
            instruction_text: instruction_text.to_string(),
        };
        db::with_conn(&self.db, move |conn| upsert_profile(conn, &profile)).await
    }

    /// Set the instructions used for identities without a profile.
    pub async fn set_default(&self, instruction_text: &str) -> Result<()> {
        let profile = ToneProfile {
            id: DEFAULT_PROFILE_ID.to_string(),
            phone_number: None,
            instruction_text: instruction_text.to_string(),
        };
        db::with_conn(&self.db, move |conn| upsert_profile(conn, &profile)).await
    }
}

#[async_trait]
impl ToneRules for SqliteToneRules {
    async fn for_identity(&self, identity: &str) -> Result<Option<ToneProfile>> {
        let identity = identity.to_string();
        db::with_conn(&self.db, move |conn| {
            select_one(
                conn,
                "SELECT id, phone_number, instruction_text FROM tone_rules \
                 WHERE phone_number = ?1 LIMIT 1",
                &identity,
            )
        })
        .await
    }

    async fn default_profile(&self) -> Result<Option<ToneProfile>> {
        db::with_conn(&self.db, |conn| {
            select_one(
                conn,
                "SELECT id, phone_number, instruction_text FROM tone_rules WHERE id = ?1 LIMIT 1",
                DEFAULT_PROFILE_ID,
            )
        })
        .await
    }
}

fn select_one(conn: &Connection, sql: &str, key: &str) -> Result<Option<ToneProfile>> {
    let profile = conn
        .query_row(sql, params![key], |row| {
            Ok(ToneProfile {
                id: row.get(0)?,
                phone_number: row.get(1)?,
                instruction_text: row.get(2)?,
            })
        })
        .optional()?;
    Ok(profile)
}

fn upsert_profile(conn: &Connection, profile: &ToneProfile) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO tone_rules (id, phone_number, instruction_text, updated_at) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(id) DO UPDATE SET instruction_text = excluded.instruction_text, \
         updated_at = excluded.updated_at",
        params![profile.id, profile.phone_number, profile.instruction_text, now],
    )?;
    tracing::info!(profile = %profile.id, "tone profile saved");
    Ok(())
}
