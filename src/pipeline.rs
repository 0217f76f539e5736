//! Per-turn control flow.
//!
//! persona → history → (compaction) → semantic recall → assembly → model →
//! persist inbound + outbound → remember → deliver.
//!
//! Every external call is bounded by the configured timeout. Turns for the
//! same identity are not serialized: two turns that both observe a full
//! window each persist a summary (the later one is authoritative on read),
//! and an inbound turn is stamped when it arrives, so a summary written by a
//! concurrent turn while this one waited on the model can hide it from later
//! windows. The log still holds every turn.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::config::{LookupFaultPolicy, RecollectConfig};
use crate::delivery::DeliveryGateway;
use crate::llm::ChatModel;
use crate::memory::assembler::ContextAssembler;
use crate::memory::history::{HistoryStore, Window};
use crate::memory::persona::{PersonaResolver, Resolution};
use crate::memory::semantic::SemanticMemoryStore;
use crate::memory::types::{Direction, Turn};

/// Text used for an inbound message that carried only media.
pub const MEDIA_ONLY_TEXT: &str = "User sent media";

/// Fatal outcomes for a turn. No reply is sent for any of them.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("model completion failed: {0:#}")]
    CompletionFailed(anyhow::Error),
    #[error("failed to persist turn: {0:#}")]
    PersistFailed(anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub identity: String,
    pub text: Option<String>,
    pub media_url: Option<String>,
}

impl InboundMessage {
    pub fn text(identity: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            text: Some(text.into()),
            media_url: None,
        }
    }

    fn body(&self) -> String {
        match self.text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => MEDIA_ONLY_TEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub text: String,
    /// `false` when the gateway failed; the reply is still persisted.
    pub delivered: bool,
    pub compacted: bool,
    pub remembered: bool,
    pub semantic_hits: usize,
}

/// Which store could not be read when a turn paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupFault {
    Persona,
    History,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TurnOutcome {
    Replied(Reply),
    /// A lookup failed under the pause policy. The inbound turn was logged
    /// as ignored when the log accepted the write.
    Paused { fault: LookupFault, reason: String },
}

/// What `/test` reports: persona and recall without side effects.
#[derive(Debug, Clone, Serialize)]
pub struct Probe {
    pub identity: String,
    pub persona: Resolution,
    pub semantic_memories: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub top_k: usize,
    pub on_lookup_fault: LookupFaultPolicy,
    pub call_timeout: Duration,
}

impl From<&RecollectConfig> for PipelineSettings {
    fn from(config: &RecollectConfig) -> Self {
        Self {
            top_k: config.memory.top_k,
            on_lookup_fault: config.persona.on_lookup_fault,
            call_timeout: config.timeouts.external_call(),
        }
    }
}

pub struct TurnProcessor {
    persona: PersonaResolver,
    history: HistoryStore,
    semantic: SemanticMemoryStore,
    assembler: ContextAssembler,
    model: Arc<dyn ChatModel>,
    delivery: Arc<dyn DeliveryGateway>,
    settings: PipelineSettings,
}

impl TurnProcessor {
    pub fn new(
        persona: PersonaResolver,
        history: HistoryStore,
        semantic: SemanticMemoryStore,
        model: Arc<dyn ChatModel>,
        delivery: Arc<dyn DeliveryGateway>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            persona,
            history,
            semantic,
            assembler: ContextAssembler::default(),
            model,
            delivery,
            settings,
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn semantic(&self) -> &SemanticMemoryStore {
        &self.semantic
    }

    pub async fn process(&self, inbound: InboundMessage) -> Result<TurnOutcome, TurnError> {
        let identity = inbound.identity.as_str();
        let text = inbound.body();
        let timeout = self.settings.call_timeout;
        tracing::info!(identity = %identity, has_media = inbound.media_url.is_some(), "processing inbound turn");

        let instruction = match self.resolve_persona(identity).await {
            Resolution::Resolved { instruction, source } => {
                tracing::debug!(identity = %identity, source = ?source, "persona resolved");
                instruction
            }
            Resolution::Unresolved { reason } => match self.settings.on_lookup_fault {
                LookupFaultPolicy::Pause => {
                    return Ok(self.pause(&inbound, text, LookupFault::Persona, reason).await);
                }
                LookupFaultPolicy::Fallback => {
                    tracing::warn!(identity = %identity, reason = %reason, "persona unresolved, using fallback instruction");
                    self.persona.fallback_text().to_string()
                }
            },
        };

        let limit = self.history.limit();
        let mut window = match bounded("history retrieve", timeout, self.history.retrieve(identity, limit)).await {
            Ok(window) => window,
            Err(e) => match self.settings.on_lookup_fault {
                LookupFaultPolicy::Pause => {
                    let reason = format!("{e:#}");
                    return Ok(self.pause(&inbound, text, LookupFault::History, reason).await);
                }
                LookupFaultPolicy::Fallback => {
                    tracing::warn!(identity = %identity, error = %format!("{e:#}"), "history unavailable, answering without short-term context");
                    Window::default()
                }
            },
        };

        let compacted = self.history.should_compact(&window);
        if compacted {
            // one budget for the summary call, one for persisting it
            window = bounded("compaction", timeout * 2, self.history.compact(identity, &window))
                .await
                .map_err(TurnError::PersistFailed)?;
        }

        let hits = match bounded(
            "semantic retrieve",
            timeout,
            self.semantic.retrieve(identity, &text, self.settings.top_k),
        )
        .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(identity = %identity, error = %format!("{e:#}"), "semantic recall failed, continuing without long-term context");
                Vec::new()
            }
        };

        let current = Turn::new(identity, text, Direction::Inbound).with_media(inbound.media_url);
        let messages = self.assembler.assemble(&instruction, &hits, &window, &current);
        tracing::debug!(identity = %identity, messages = messages.len(), window = window.len(), "context assembled");

        let reply = bounded("chat completion", timeout, self.model.complete(&messages))
            .await
            .map_err(TurnError::CompletionFailed)?;

        bounded("append inbound", timeout, self.history.append(&current))
            .await
            .map_err(TurnError::PersistFailed)?;
        let outbound = Turn::new(identity, reply.clone(), Direction::Outbound);
        bounded("append outbound", timeout, self.history.append(&outbound))
            .await
            .map_err(TurnError::PersistFailed)?;

        let remembered = match bounded(
            "semantic store",
            timeout,
            self.semantic.maybe_store(identity, &current.text),
        )
        .await
        {
            Ok(stored) => stored.is_some(),
            Err(e) => {
                tracing::warn!(identity = %identity, error = %format!("{e:#}"), "failed to store semantic memory");
                false
            }
        };

        let delivered = match bounded("delivery", timeout, self.delivery.send(identity, &reply)).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(identity = %identity, error = %format!("{e:#}"), "reply generated but not delivered");
                false
            }
        };

        tracing::info!(identity = %identity, compacted, remembered, delivered, "turn complete");
        Ok(TurnOutcome::Replied(Reply {
            text: reply,
            delivered,
            compacted,
            remembered,
            semantic_hits: hits.len(),
        }))
    }

    /// Resolve persona and recall memories for `text` without calling the
    /// model or writing anything.
    pub async fn probe(&self, identity: &str, text: &str) -> Probe {
        let timeout = self.settings.call_timeout;
        let persona = self.resolve_persona(identity).await;
        let semantic_memories = bounded(
            "semantic retrieve",
            timeout,
            self.semantic.retrieve(identity, text, self.settings.top_k),
        )
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(identity = %identity, error = %format!("{e:#}"), "semantic recall failed during probe");
            Vec::new()
        });
        Probe {
            identity: identity.to_string(),
            persona,
            semantic_memories,
        }
    }

    /// Log the inbound as ignored and stop. The append is best effort.
    async fn pause(
        &self,
        inbound: &InboundMessage,
        text: String,
        fault: LookupFault,
        reason: String,
    ) -> TurnOutcome {
        let identity = inbound.identity.as_str();
        tracing::warn!(identity = %identity, fault = ?fault, reason = %reason, "lookup failed, pausing automation");

        let ignored = Turn::new(identity, text, Direction::InboundIgnored).with_media(inbound.media_url.clone());
        if let Err(e) = bounded("append ignored turn", self.settings.call_timeout, self.history.append(&ignored)).await {
            tracing::warn!(identity = %identity, error = %format!("{e:#}"), "could not log ignored turn");
        }
        TurnOutcome::Paused { fault, reason }
    }

    async fn resolve_persona(&self, identity: &str) -> Resolution {
        let timeout = self.settings.call_timeout;
        match tokio::time::timeout(timeout, self.persona.resolve(identity)).await {
            Ok(resolution) => resolution,
            Err(_) => Resolution::Unresolved {
                reason: format!("persona lookup timed out after {}s", timeout.as_secs()),
            },
        }
    }
}

/// Run `fut` with a deadline, turning expiry into an error naming the call.
async fn bounded<T>(
    what: &str,
    limit: Duration,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("{what} timed out after {}s", limit.as_secs())),
    }
}
