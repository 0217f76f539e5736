//! Long-term memory of facts, searchable by similarity and scoped per identity.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::embedding::EmbeddingProvider;
use crate::memory::types::{MemoryPayload, SemanticRecord};
use crate::store::{CollectionSpec, CollectionStatus, Distance, SearchRequest, VectorStore};

/// Decides whether an inbound message is worth keeping as a long-term fact.
pub trait RememberPolicy: Send + Sync {
    fn should_remember(&self, text: &str) -> bool;
}

impl<F> RememberPolicy for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn should_remember(&self, text: &str) -> bool {
        self(text)
    }
}

/// Case-insensitive substring match against a keyword list.
#[derive(Debug, Clone)]
pub struct KeywordPolicy {
    keywords: Vec<String>,
}

impl KeywordPolicy {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl Default for KeywordPolicy {
    fn default() -> Self {
        Self::new(["prefer", "always", "remember"])
    }
}

impl RememberPolicy for KeywordPolicy {
    fn should_remember(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

pub struct SemanticMemoryStore {
    embedder: Arc<dyn EmbeddingProvider>,
    vectors: Arc<dyn VectorStore>,
    policy: Arc<dyn RememberPolicy>,
    collection: String,
}

impl SemanticMemoryStore {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vectors: Arc<dyn VectorStore>,
        policy: Arc<dyn RememberPolicy>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            vectors,
            policy,
            collection: collection.into(),
        }
    }

    /// One-time idempotent setup of the cosine collection.
    pub async fn bootstrap(&self) -> Result<CollectionStatus> {
        let spec = CollectionSpec {
            dimension: self.embedder.dimensions(),
            distance: Distance::Cosine,
        };
        self.vectors
            .ensure_collection(&self.collection, spec)
            .await
            .with_context(|| format!("failed to bootstrap collection {}", self.collection))
    }

    /// Embed and store `text` under a fresh id. Returns the id.
    pub async fn store(&self, identity: &str, text: &str) -> Result<String> {
        let id = uuid::Uuid::now_v7().to_string();
        self.store_with_id(&id, identity, text).await?;
        Ok(id)
    }

    /// Embed and upsert under `id`. Retrying with the same id leaves one record.
    pub async fn store_with_id(&self, id: &str, identity: &str, text: &str) -> Result<()> {
        let vector = self.embedder.embed(text).await.context("embedding failed")?;
        let record = SemanticRecord {
            id: id.to_string(),
            vector,
            payload: MemoryPayload {
                content: text.to_string(),
                identity: identity.to_string(),
                timestamp: chrono::Utc::now(),
            },
        };
        self.vectors
            .upsert(&self.collection, &record)
            .await
            .context("vector upsert failed")?;
        tracing::info!(identity = %identity, id = %id, "stored semantic memory");
        Ok(())
    }

    /// Store `text` only when the policy accepts it. Returns the new id, if any.
    pub async fn maybe_store(&self, identity: &str, text: &str) -> Result<Option<String>> {
        if !self.policy.should_remember(text) {
            return Ok(None);
        }
        self.store(identity, text).await.map(Some)
    }

    /// Up to `k` stored facts for `identity`, most similar to `query` first.
    pub async fn retrieve(&self, identity: &str, query: &str, k: usize) -> Result<Vec<String>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(query).await.context("embedding failed")?;
        let hits = self
            .vectors
            .search(
                &self.collection,
                SearchRequest {
                    vector: &vector,
                    limit: k,
                    identity,
                },
            )
            .await
            .context("vector search failed")?;

        let contents: Vec<String> = hits
            .into_iter()
            .filter(|hit| {
                let own = hit.payload.identity == identity;
                if !own {
                    tracing::error!(identity = %identity, record = %hit.id, "vector store returned a foreign record, dropping it");
                }
                own
            })
            .take(k)
            .map(|hit| hit.payload.content)
            .collect();

        tracing::debug!(identity = %identity, hits = contents.len(), "semantic memories retrieved");
        Ok(contents)
    }
}
