pub mod doctor;
pub mod history;
pub mod persona;
pub mod recall;

use anyhow::Result;
use recollect::config::RecollectConfig;
use recollect::db::meta::ModelCheck;
use recollect::db::{self, SharedConnection};
use recollect::embedding::EMBEDDING_DIM;
use recollect::store::vector::SqliteVectorStore;
use recollect::store::{CollectionSpec, CollectionStatus, Distance, VectorStore};

/// Open the configured database and wrap it for the store adapters.
pub fn open_shared(config: &RecollectConfig) -> Result<SharedConnection> {
    let conn = db::open_database(config.resolved_db_path())?;
    Ok(db::share(conn))
}

/// Create the schema and the memory collection. Safe to run repeatedly.
pub async fn init(config: &RecollectConfig) -> Result<()> {
    let conn = db::open_database(config.resolved_db_path())?;
    match db::meta::check_embedding_model(&conn, &config.openai.embedding_model)? {
        ModelCheck::Recorded => println!("Recorded embedding model {}", config.openai.embedding_model),
        ModelCheck::Matches => {}
        ModelCheck::Mismatch { stored } => println!(
            "WARNING: stored memories were embedded with {stored}, config uses {}",
            config.openai.embedding_model
        ),
    }

    let db = db::share(conn);
    let vectors = SqliteVectorStore::new(db);
    let spec = CollectionSpec {
        dimension: EMBEDDING_DIM,
        distance: Distance::Cosine,
    };

    match vectors.ensure_collection(&config.memory.collection, spec).await? {
        CollectionStatus::Created => println!("Created collection {}", config.memory.collection),
        CollectionStatus::AlreadyExists => {
            println!("Collection {} already exists", config.memory.collection)
        }
    }
    println!("Database ready at {}", config.resolved_db_path().display());
    Ok(())
}
