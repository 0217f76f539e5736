//! Collapses a window of turns into one paragraph.
//!
//! Never fails: a model error, a timeout, or an empty reply all produce
//! [`PLACEHOLDER_SUMMARY`], so compaction cannot abort a turn.

use std::sync::Arc;
use std::time::Duration;

use crate::llm::{ChatMessage, ChatModel};
use crate::memory::types::{Direction, Turn};

pub const SUMMARY_INSTRUCTION: &str = "Compress the following conversation into one cohesive \
paragraph. Retain the topic and any open action items. Use a neutral tone.";

pub const PLACEHOLDER_SUMMARY: &str =
    "Earlier conversation topic unknown due to memory limits; continue contextually.";

pub struct Summarizer {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl Summarizer {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub async fn summarize(&self, turns: &[Turn]) -> String {
        let messages = [
            ChatMessage::system(SUMMARY_INSTRUCTION),
            ChatMessage::user(transcript(turns)),
        ];

        match tokio::time::timeout(self.timeout, self.model.complete(&messages)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                tracing::debug!(turns = turns.len(), summary_len = text.len(), "window summarized");
                text.trim().to_string()
            }
            Ok(Ok(_)) => {
                tracing::warn!(turns = turns.len(), "summarizer returned empty text, using placeholder");
                PLACEHOLDER_SUMMARY.to_string()
            }
            Ok(Err(e)) => {
                tracing::warn!(turns = turns.len(), error = %format!("{e:#}"), "summarization failed, using placeholder");
                PLACEHOLDER_SUMMARY.to_string()
            }
            Err(_) => {
                tracing::warn!(turns = turns.len(), timeout_secs = self.timeout.as_secs(), "summarization timed out, using placeholder");
                PLACEHOLDER_SUMMARY.to_string()
            }
        }
    }
}

/// Render turns as a speaker-labelled transcript, oldest first.
pub fn transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|t| {
            let speaker = match t.direction {
                Direction::Inbound | Direction::InboundIgnored => "User",
                Direction::Outbound => "Assistant",
                Direction::Summary => "Earlier summary",
            };
            format!("{speaker}: {}", t.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
