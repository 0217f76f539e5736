//! Bounded conversation windows over the append-only turn log.
//!
//! The log only grows. Compaction appends a `summary` turn; [`Window`] is a
//! view recomputed on every read that starts at the most recent summary, so
//! raw turns older than a compaction point never reappear. When concurrent
//! turns compacted the same window twice, the later summary wins.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::llm::ChatMessage;
use crate::memory::summarizer::Summarizer;
use crate::memory::types::{Direction, Turn};
use crate::store::TurnLog;

/// Prefix marking a summary turn when it is shown to the model.
pub const SUMMARY_MARKER: &str = "Previous conversation summary:";

/// The short-term context for one identity, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Window {
    turns: Vec<Turn>,
}

impl Window {
    /// Build the view from turns returned newest first.
    pub fn from_newest_first(mut turns: Vec<Turn>) -> Self {
        turns.reverse();
        if let Some(pos) = turns.iter().rposition(Turn::is_summary) {
            turns.drain(..pos);
        }
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Chat messages in window order. Summaries become marked system messages.
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .filter_map(|t| match t.direction {
                Direction::Summary => Some(ChatMessage::system(format!("{SUMMARY_MARKER}\n{}", t.text))),
                Direction::Inbound => Some(ChatMessage::user(t.text.clone())),
                Direction::Outbound => Some(ChatMessage::assistant(t.text.clone())),
                Direction::InboundIgnored => None,
            })
            .collect()
    }
}

pub struct HistoryStore {
    log: Arc<dyn TurnLog>,
    summarizer: Summarizer,
    limit: usize,
}

impl HistoryStore {
    /// `limit` is the window size N; values below 1 are raised to 1.
    pub fn new(log: Arc<dyn TurnLog>, summarizer: Summarizer, limit: usize) -> Self {
        Self {
            log,
            summarizer,
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The most recent `limit` turns for `identity`, chronological, cut at the
    /// latest summary.
    pub async fn retrieve(&self, identity: &str, limit: usize) -> Result<Window> {
        let recent = self
            .log
            .recent(identity, limit)
            .await
            .with_context(|| format!("failed to read history for {identity}"))?;
        let window = Window::from_newest_first(recent);
        tracing::debug!(identity = %identity, window = window.len(), "history retrieved");
        Ok(window)
    }

    pub fn should_compact(&self, window: &Window) -> bool {
        window.len() >= self.limit
    }

    /// Summarize `window`, persist the summary turn, and return the
    /// one-element window that replaces it for the current model call.
    pub async fn compact(&self, identity: &str, window: &Window) -> Result<Window> {
        let text = self.summarizer.summarize(window.turns()).await;
        let summary = Turn::new(identity, text, Direction::Summary);
        self.log
            .append(&summary)
            .await
            .with_context(|| format!("failed to persist summary for {identity}"))?;

        tracing::info!(
            identity = %identity,
            compacted = window.len(),
            summary_id = %summary.id,
            "window compacted"
        );
        Ok(Window {
            turns: vec![summary],
        })
    }

    pub async fn append(&self, turn: &Turn) -> Result<()> {
        self.log.append(turn).await
    }
}
