use anyhow::Result;
use recollect::config::RecollectConfig;
use recollect::embedding::{self, EmbeddingProvider};
use recollect::memory::semantic::{KeywordPolicy, SemanticMemoryStore};
use recollect::store::vector::SqliteVectorStore;
use std::sync::Arc;

/// Run a semantic lookup from the terminal.
pub async fn recall(config: &RecollectConfig, identity: &str, query: &str) -> Result<()> {
    let db = super::open_shared(config)?;
    let embedder: Arc<dyn EmbeddingProvider> = Arc::from(embedding::create_provider(&config.openai)?);
    let semantic = SemanticMemoryStore::new(
        embedder,
        Arc::new(SqliteVectorStore::new(db)),
        Arc::new(KeywordPolicy::new(&config.memory.keywords)),
        config.memory.collection.clone(),
    );

    let results = semantic.retrieve(identity, query, config.memory.top_k).await?;
    if results.is_empty() {
        println!("No memories found.");
        return Ok(());
    }

    println!("Found {} memorie(s) for {identity}\n", results.len());
    for (i, content) in results.iter().enumerate() {
        println!("  {}. {}", i + 1, content);
    }
    Ok(())
}
