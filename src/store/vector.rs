//! SQLite vector store.
//!
//! Records live in `vector_records` with their embedding as an f32 blob.
//! Search filters by collection and identity in SQL first, then ranks the
//! survivors with sqlite-vec's distance functions, so a record belonging to
//! another identity is never a candidate regardless of how close it is.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{embedding_to_bytes, CollectionSpec, CollectionStatus, Distance, SearchRequest, VectorStore};
use crate::db::{self, SharedConnection};
use crate::memory::types::{format_timestamp, parse_timestamp, MemoryPayload, ScoredRecord, SemanticRecord};

pub struct SqliteVectorStore {
    db: SharedConnection,
}

impl SqliteVectorStore {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }

    /// Number of records stored for `identity` in `collection`.
    pub async fn count(&self, collection: &str, identity: &str) -> Result<usize> {
        let collection = collection.to_string();
        let identity = identity.to_string();
        db::with_conn(&self.db, move |conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM vector_records WHERE collection = ?1 AND identity = ?2",
                params![collection, identity],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
        .await
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn ensure_collection(&self, name: &str, spec: CollectionSpec) -> Result<CollectionStatus> {
        let name = name.to_string();
        db::with_conn(&self.db, move |conn| ensure_collection(conn, &name, spec)).await
    }

    async fn upsert(&self, collection: &str, record: &SemanticRecord) -> Result<()> {
        let collection = collection.to_string();
        let record = record.clone();
        db::with_conn(&self.db, move |conn| upsert_record(conn, &collection, &record)).await
    }

    async fn search(&self, collection: &str, request: SearchRequest<'_>) -> Result<Vec<ScoredRecord>> {
        let collection = collection.to_string();
        let vector = request.vector.to_vec();
        let identity = request.identity.to_string();
        let limit = request.limit;
        db::with_conn(&self.db, move |conn| {
            search_records(conn, &collection, &vector, &identity, limit)
        })
        .await
    }
}

fn load_spec(conn: &Connection, name: &str) -> Result<Option<CollectionSpec>> {
    let row: Option<(i64, String)> = conn
        .query_row(
            "SELECT dimension, distance FROM vector_collections WHERE name = ?1",
            params![name],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    row.map(|(dimension, distance)| -> Result<CollectionSpec> {
        Ok(CollectionSpec {
            dimension: dimension as usize,
            distance: distance.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        })
    })
    .transpose()
}

fn require_spec(conn: &Connection, name: &str) -> Result<CollectionSpec> {
    load_spec(conn, name)?.with_context(|| format!("vector collection not found: {name}"))
}

fn ensure_collection(conn: &Connection, name: &str, spec: CollectionSpec) -> Result<CollectionStatus> {
    if let Some(existing) = load_spec(conn, name)? {
        if existing != spec {
            bail!(
                "collection {name} exists with {}d/{}, requested {}d/{}",
                existing.dimension,
                existing.distance.as_str(),
                spec.dimension,
                spec.distance.as_str()
            );
        }
        tracing::info!(collection = %name, "vector collection already exists");
        return Ok(CollectionStatus::AlreadyExists);
    }

    conn.execute(
        "INSERT INTO vector_collections (name, dimension, distance, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            name,
            spec.dimension as i64,
            spec.distance.as_str(),
            chrono::Utc::now().to_rfc3339()
        ],
    )?;
    tracing::info!(collection = %name, dimension = spec.dimension, distance = spec.distance.as_str(), "vector collection created");
    Ok(CollectionStatus::Created)
}

fn upsert_record(conn: &Connection, collection: &str, record: &SemanticRecord) -> Result<()> {
    let spec = require_spec(conn, collection)?;
    check_dimension(&spec, &record.vector)?;

    conn.execute(
        "INSERT INTO vector_records (collection, id, identity, content, timestamp, embedding) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT(collection, id) DO UPDATE SET identity = excluded.identity, \
         content = excluded.content, timestamp = excluded.timestamp, embedding = excluded.embedding",
        params![
            collection,
            record.id,
            record.payload.identity,
            record.payload.content,
            format_timestamp(&record.payload.timestamp),
            embedding_to_bytes(&record.vector),
        ],
    )?;
    Ok(())
}

fn search_records(
    conn: &Connection,
    collection: &str,
    vector: &[f32],
    identity: &str,
    limit: usize,
) -> Result<Vec<ScoredRecord>> {
    let spec = require_spec(conn, collection)?;
    check_dimension(&spec, vector)?;

    let distance_fn = match spec.distance {
        Distance::Cosine => "vec_distance_cosine",
        Distance::Euclid => "vec_distance_l2",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT id, identity, content, timestamp, {distance_fn}(embedding, ?1) AS distance \
         FROM vector_records WHERE collection = ?2 AND identity = ?3 \
         ORDER BY distance ASC LIMIT ?4"
    ))?;

    let rows = stmt
        .query_map(
            params![embedding_to_bytes(vector), collection, identity, limit as i64],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, identity, content, timestamp, distance)| -> Result<ScoredRecord> {
            let score = match spec.distance {
                Distance::Cosine => 1.0 - distance,
                Distance::Euclid => -distance,
            };
            Ok(ScoredRecord {
                payload: MemoryPayload {
                    content,
                    identity,
                    timestamp: parse_timestamp(&timestamp)
                        .with_context(|| format!("record {id} has malformed timestamp"))?,
                },
                id,
                score,
            })
        })
        .collect()
}

fn check_dimension(spec: &CollectionSpec, vector: &[f32]) -> Result<()> {
    if vector.len() != spec.dimension {
        bail!(
            "vector has {} dimensions, collection expects {}",
            vector.len(),
            spec.dimension
        );
    }
    Ok(())
}
