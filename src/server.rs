//! Inbound webhook gateway.
//!
//! [`serve`] wires the database, model clients and delivery gateway into a
//! [`TurnProcessor`] and exposes it over axum. Payload parsing and sender
//! filtering live here; everything else is the pipeline's job.

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::RecollectConfig;
use crate::db::{self, SharedConnection};
use crate::memory::history::HistoryStore;
use crate::memory::persona::PersonaResolver;
use crate::memory::semantic::{KeywordPolicy, SemanticMemoryStore};
use crate::memory::summarizer::Summarizer;
use crate::pipeline::{InboundMessage, PipelineSettings, TurnOutcome, TurnProcessor};
use crate::store::tone::SqliteToneRules;
use crate::store::turns::SqliteTurnLog;
use crate::store::vector::SqliteVectorStore;
use crate::{delivery, embedding, llm};

/// Identity used by the `/test` probe when none is given.
pub const PROBE_IDENTITY: &str = "+919999999999";

/// Only direct chats are answered; groups and broadcasts use other suffixes.
pub const USER_CHAT_SUFFIX: &str = "@c.us";

#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<TurnProcessor>,
}

/// UltraMsg webhook envelope.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub data: Option<WebhookMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub media: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProbeRequest {
    pub message: Option<String>,
    pub identity: Option<String>,
}

/// Build the processor from config: SQLite stores on `db`, HTTP clients for
/// the model, embeddings and delivery.
pub fn build_processor(config: &RecollectConfig, db: SharedConnection) -> Result<TurnProcessor> {
    let settings = PipelineSettings::from(config);

    let model: Arc<dyn llm::ChatModel> = Arc::from(llm::create_client(&config.openai)?);
    let embedder: Arc<dyn embedding::EmbeddingProvider> =
        Arc::from(embedding::create_provider(&config.openai)?);
    let gateway: Arc<dyn delivery::DeliveryGateway> =
        Arc::from(delivery::create_gateway(&config.delivery)?);

    let persona = PersonaResolver::new(
        Arc::new(SqliteToneRules::new(db.clone())),
        config.persona.fallback_text.clone(),
    );
    let history = HistoryStore::new(
        Arc::new(SqliteTurnLog::new(db.clone())),
        Summarizer::new(model.clone(), settings.call_timeout),
        config.history.limit,
    );
    let semantic = SemanticMemoryStore::new(
        embedder,
        Arc::new(SqliteVectorStore::new(db)),
        Arc::new(KeywordPolicy::new(&config.memory.keywords)),
        config.memory.collection.clone(),
    );

    Ok(TurnProcessor::new(persona, history, semantic, model, gateway, settings))
}

pub fn router(processor: Arc<TurnProcessor>) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/test", post(probe))
        .route("/whatsapp/incoming", post(incoming))
        .with_state(AppState { processor })
}

/// Open the database, bootstrap the memory collection, and serve until Ctrl-C.
pub async fn serve(config: RecollectConfig) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let configured = &config.openai.embedding_model;
    match db::meta::check_embedding_model(&conn, configured)? {
        db::meta::ModelCheck::Recorded => {
            tracing::info!(model = %configured, "recorded embedding model")
        }
        db::meta::ModelCheck::Matches => {}
        db::meta::ModelCheck::Mismatch { stored } => tracing::warn!(
            stored = %stored,
            configured = %configured,
            "embedding model changed, stored memories may not be comparable"
        ),
    }

    let processor = Arc::new(build_processor(&config, db::share(conn))?);
    let status = processor.semantic().bootstrap().await?;
    tracing::info!(collection = %config.memory.collection, status = ?status, "semantic memory ready");

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "webhook server listening");

    axum::serve(listener, router(processor))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down webhook server");
        })
        .await?;

    Ok(())
}

pub async fn health() -> &'static str {
    "recollect agent running"
}

pub async fn probe(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let request: ProbeRequest = if body.is_empty() {
        ProbeRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(r) => r,
            Err(e) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": format!("invalid probe body: {e}")})),
                )
            }
        }
    };
    let identity = request.identity.as_deref().unwrap_or(PROBE_IDENTITY);
    let message = request.message.as_deref().unwrap_or("test message");

    tracing::info!(identity = %identity, "probe triggered");
    let probe = state.processor.probe(identity, message).await;
    (StatusCode::OK, Json(json!(probe)))
}

pub async fn incoming(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> (StatusCode, Json<Value>) {
    let message = match payload.data {
        Some(m) if !m.from_me => m,
        _ => return ignored(),
    };
    let Some(from) = message.from.filter(|f| !f.trim().is_empty()) else {
        tracing::warn!("skipping event without a sender");
        return ignored();
    };
    if !from.ends_with(USER_CHAT_SUFFIX) {
        tracing::warn!(from = %from, "skipping non-user chat id");
        return ignored();
    }

    let inbound = InboundMessage {
        identity: from,
        text: message.body,
        media_url: message.media.filter(|m| !m.trim().is_empty()),
    };

    match state.processor.process(inbound).await {
        Ok(TurnOutcome::Replied(reply)) => (
            StatusCode::OK,
            Json(json!({"status": "sent", "delivered": reply.delivered})),
        ),
        Ok(TurnOutcome::Paused { .. }) => (StatusCode::OK, Json(json!({"status": "paused"}))),
        Err(e) => {
            tracing::error!(error = %e, "processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed"})),
            )
        }
    }
}

fn ignored() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({"status": "ignored"})))
}
