//! Storage collaborators and their SQLite implementations.
//!
//! The memory components only see the traits below; [`turns`], [`tone`] and
//! [`vector`] implement them on a [`SharedConnection`](crate::db::SharedConnection).

pub mod tone;
pub mod turns;
pub mod vector;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::memory::types::{ScoredRecord, SemanticRecord, ToneProfile, Turn};

/// Document store view of the `messages` collection.
#[async_trait]
pub trait TurnLog: Send + Sync {
    /// Persist a turn. Turns are never updated or removed afterwards.
    async fn append(&self, turn: &Turn) -> Result<()>;

    /// The latest `limit` conversational turns for `identity`, newest first.
    /// `inbound_ignored` turns are excluded.
    async fn recent(&self, identity: &str, limit: usize) -> Result<Vec<Turn>>;
}

/// Document store view of the `tone_rules` collection.
#[async_trait]
pub trait ToneRules: Send + Sync {
    async fn for_identity(&self, identity: &str) -> Result<Option<ToneProfile>>;

    /// The profile stored under [`DEFAULT_PROFILE_ID`](crate::memory::types::DEFAULT_PROFILE_ID).
    async fn default_profile(&self) -> Result<Option<ToneProfile>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    Cosine,
    Euclid,
}

impl Distance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclid => "euclid",
        }
    }
}

impl std::str::FromStr for Distance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "euclid" => Ok(Self::Euclid),
            _ => Err(format!("unknown distance: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub dimension: usize,
    pub distance: Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    Created,
    AlreadyExists,
}

/// A similarity query restricted to one identity.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub vector: &'a [f32],
    pub limit: usize,
    pub identity: &'a str,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create the collection if absent. A no-op when it already exists with
    /// the same spec.
    async fn ensure_collection(&self, name: &str, spec: CollectionSpec) -> Result<CollectionStatus>;

    /// Insert or replace the record with `record.id`.
    async fn upsert(&self, collection: &str, record: &SemanticRecord) -> Result<()>;

    /// Best-first matches whose payload identity equals `request.identity`.
    async fn search(&self, collection: &str, request: SearchRequest<'_>) -> Result<Vec<ScoredRecord>>;
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}
