#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use recollect::config::LookupFaultPolicy;
use recollect::db::{self, SharedConnection};
use recollect::delivery::{DeliveryGateway, DeliveryReceipt};
use recollect::embedding::{EmbeddingProvider, EMBEDDING_DIM};
use recollect::llm::{ChatMessage, ChatModel};
use recollect::memory::history::HistoryStore;
use recollect::memory::persona::PersonaResolver;
use recollect::memory::semantic::{KeywordPolicy, SemanticMemoryStore};
use recollect::memory::summarizer::{Summarizer, SUMMARY_INSTRUCTION};
use recollect::memory::types::{Direction, ToneProfile, Turn};
use recollect::pipeline::{PipelineSettings, TurnProcessor};
use recollect::store::tone::SqliteToneRules;
use recollect::store::turns::SqliteTurnLog;
use recollect::store::vector::SqliteVectorStore;
use recollect::store::{ToneRules, TurnLog};
use rusqlite::Connection;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

pub const COLLECTION: &str = "agent_memory";

/// Open a fresh in-memory database with the schema applied.
pub fn test_db() -> SharedConnection {
    db::load_sqlite_vec();
    let conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::share(conn)
}

/// A 1536-dim vector with a spike at `slot`.
pub fn spike(slot: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[slot % EMBEDDING_DIM] = 1.0;
    v
}

/// A vector mostly along `slot` with a little weight on `other`.
pub fn near(slot: usize, other: usize) -> Vec<f32> {
    let mut v = spike(slot);
    v[other % EMBEDDING_DIM] += 0.2;
    v
}

/// Deterministic embedder: fixture vectors for known texts, a hashed
/// bag-of-words vector for everything else. Never returns a zero vector.
#[derive(Default)]
pub struct FixtureEmbedder {
    fixtures: HashMap<String, Vec<f32>>,
    fail: bool,
    pub calls: Mutex<usize>,
}

impl FixtureEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.fixtures.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for FixtureEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            bail!("embedding service unavailable");
        }
        if let Some(v) = self.fixtures.get(text) {
            return Ok(v.clone());
        }
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        // reserved slot keeps every hashed vector non-zero
        v[EMBEDDING_DIM - 1] = 0.1;
        for word in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            let slot = 1000 + (hasher.finish() as usize % 500);
            v[slot] += 1.0;
        }
        Ok(v)
    }
}

/// Chat model that records every call and answers from a script.
pub struct ScriptedChat {
    reply: String,
    summary: String,
    fail_replies: bool,
    fail_summaries: bool,
    summary_barrier: Option<Arc<Barrier>>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            summary: "The user and assistant chatted about their week.".to_string(),
            fail_replies: false,
            fail_summaries: false,
            summary_barrier: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_replies: true,
            ..Self::replying("")
        }
    }

    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = summary.to_string();
        self
    }

    pub fn failing_summaries(mut self) -> Self {
        self.fail_summaries = true;
        self
    }

    /// Hold every summarization call until `barrier` releases.
    pub fn with_summary_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.summary_barrier = Some(barrier);
        self
    }

    /// Calls that were replies, not summarizations.
    pub fn reply_calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| !is_summary_request(m))
            .cloned()
            .collect()
    }

    pub fn summary_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| is_summary_request(m))
            .count()
    }
}

fn is_summary_request(messages: &[ChatMessage]) -> bool {
    messages
        .first()
        .is_some_and(|m| m.content.text() == SUMMARY_INSTRUCTION)
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.lock().unwrap().push(messages.to_vec());
        if is_summary_request(messages) {
            if let Some(barrier) = &self.summary_barrier {
                barrier.wait().await;
            }
            if self.fail_summaries {
                bail!("summary model unavailable");
            }
            return Ok(self.summary.clone());
        }
        if self.fail_replies {
            bail!("model unavailable");
        }
        Ok(self.reply.clone())
    }
}

/// Gateway that records what it was asked to send.
#[derive(Default)]
pub struct RecordingDelivery {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl DeliveryGateway for RecordingDelivery {
    async fn send(&self, identity: &str, text: &str) -> Result<DeliveryReceipt> {
        self.sent
            .lock()
            .unwrap()
            .push((identity.to_string(), text.to_string()));
        Ok(DeliveryReceipt {
            message_id: Some("msg-1".to_string()),
            raw: serde_json::json!({"sent": "true"}),
        })
    }
}

pub struct FailingDelivery;

#[async_trait]
impl DeliveryGateway for FailingDelivery {
    async fn send(&self, _identity: &str, _text: &str) -> Result<DeliveryReceipt> {
        bail!("gateway rejected the message")
    }
}

/// Tone store that is always unreachable.
pub struct FailingToneRules;

#[async_trait]
impl ToneRules for FailingToneRules {
    async fn for_identity(&self, _identity: &str) -> Result<Option<ToneProfile>> {
        bail!("tone store unreachable")
    }

    async fn default_profile(&self) -> Result<Option<ToneProfile>> {
        bail!("tone store unreachable")
    }
}

/// Turn log over SQLite whose reads always fail. Writes fail too when
/// `reject_writes` is set.
pub struct UnreadableTurnLog {
    inner: SqliteTurnLog,
    reject_writes: bool,
}

#[async_trait]
impl TurnLog for UnreadableTurnLog {
    async fn append(&self, turn: &Turn) -> Result<()> {
        if self.reject_writes {
            bail!("history store unreachable");
        }
        self.inner.append(turn).await
    }

    async fn recent(&self, _identity: &str, _limit: usize) -> Result<Vec<Turn>> {
        bail!("history store unreachable")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryFault {
    None,
    Reads,
    ReadsAndWrites,
}

/// Everything a pipeline test needs to inspect after a turn.
pub struct Harness {
    pub db: SharedConnection,
    pub processor: Arc<TurnProcessor>,
    pub chat: Arc<ScriptedChat>,
    pub delivery: Arc<RecordingDelivery>,
    pub log: SqliteTurnLog,
    pub tone: SqliteToneRules,
    pub vectors: SqliteVectorStore,
}

pub struct HarnessBuilder {
    chat: ScriptedChat,
    embedder: FixtureEmbedder,
    tone_rules: Option<Arc<dyn ToneRules>>,
    delivery: Option<Arc<dyn DeliveryGateway>>,
    limit: usize,
    top_k: usize,
    policy: LookupFaultPolicy,
    history_fault: HistoryFault,
}

impl HarnessBuilder {
    pub fn new(chat: ScriptedChat) -> Self {
        Self {
            chat,
            embedder: FixtureEmbedder::new(),
            tone_rules: None,
            delivery: None,
            limit: 15,
            top_k: 3,
            policy: LookupFaultPolicy::Pause,
            history_fault: HistoryFault::None,
        }
    }

    pub fn embedder(mut self, embedder: FixtureEmbedder) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn tone_rules(mut self, rules: Arc<dyn ToneRules>) -> Self {
        self.tone_rules = Some(rules);
        self
    }

    pub fn delivery(mut self, delivery: Arc<dyn DeliveryGateway>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn on_lookup_fault(mut self, policy: LookupFaultPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn history_fault(mut self, fault: HistoryFault) -> Self {
        self.history_fault = fault;
        self
    }

    pub async fn build(self) -> Harness {
        let db = test_db();
        let chat = Arc::new(self.chat);
        let recording = Arc::new(RecordingDelivery::default());
        let delivery = self
            .delivery
            .unwrap_or_else(|| recording.clone() as Arc<dyn DeliveryGateway>);
        let tone_rules = self
            .tone_rules
            .unwrap_or_else(|| Arc::new(SqliteToneRules::new(db.clone())) as Arc<dyn ToneRules>);
        let timeout = Duration::from_secs(30);

        let persona = PersonaResolver::new(tone_rules, "You are a helpful AI assistant.");
        let turn_log: Arc<dyn TurnLog> = match self.history_fault {
            HistoryFault::None => Arc::new(SqliteTurnLog::new(db.clone())),
            fault => Arc::new(UnreadableTurnLog {
                inner: SqliteTurnLog::new(db.clone()),
                reject_writes: fault == HistoryFault::ReadsAndWrites,
            }),
        };
        let history = HistoryStore::new(
            turn_log,
            Summarizer::new(chat.clone(), timeout),
            self.limit,
        );
        let semantic = SemanticMemoryStore::new(
            Arc::new(self.embedder),
            Arc::new(SqliteVectorStore::new(db.clone())),
            Arc::new(KeywordPolicy::default()),
            COLLECTION,
        );
        semantic.bootstrap().await.unwrap();

        let settings = PipelineSettings {
            top_k: self.top_k,
            on_lookup_fault: self.policy,
            call_timeout: timeout,
        };
        let processor = TurnProcessor::new(persona, history, semantic, chat.clone(), delivery, settings);

        Harness {
            processor: Arc::new(processor),
            chat,
            delivery: recording,
            log: SqliteTurnLog::new(db.clone()),
            tone: SqliteToneRules::new(db.clone()),
            vectors: SqliteVectorStore::new(db.clone()),
            db,
        }
    }
}

/// Append `count` alternating inbound/outbound turns, one second apart,
/// ending a minute ago.
pub async fn seed_turns(log: &SqliteTurnLog, identity: &str, count: usize) -> Vec<Turn> {
    let start = chrono::Utc::now() - chrono::Duration::seconds(60 + count as i64);
    let mut turns = Vec::with_capacity(count);
    for i in 0..count {
        let direction = if i % 2 == 0 {
            Direction::Inbound
        } else {
            Direction::Outbound
        };
        let turn = Turn::new(identity, format!("turn {i}"), direction)
            .with_timestamp(start + chrono::Duration::seconds(i as i64));
        log.append(&turn).await.unwrap();
        turns.push(turn);
    }
    turns
}
