//! Core record definitions.
//!
//! Defines [`Direction`] and [`Turn`] (the append-only conversation log),
//! [`ToneProfile`] (persona instructions), and [`SemanticRecord`] (a long-term
//! fact with its embedding).

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Id of the tone profile used when an identity has no profile of its own.
pub const DEFAULT_PROFILE_ID: &str = "DEFAULT_UNKNOWN";

/// Where a logged turn came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// A message the user sent.
    Inbound,
    /// A reply the model generated.
    Outbound,
    /// A compaction record standing in for every earlier turn.
    Summary,
    /// A message received while automation was paused. Never enters a window.
    InboundIgnored,
}

impl Direction {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
            Self::Summary => "summary",
            Self::InboundIgnored => "inbound_ignored",
        }
    }

    /// Whether turns in this direction are part of the model-visible conversation.
    pub fn is_conversational(&self) -> bool {
        !matches!(self, Self::InboundIgnored)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbound" => Ok(Self::Inbound),
            "outbound" => Ok(Self::Outbound),
            "summary" => Ok(Self::Summary),
            "inbound_ignored" => Ok(Self::InboundIgnored),
            _ => Err(format!("unknown direction: {s}")),
        }
    }
}

/// One logged message. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// UUID v7 primary key.
    pub id: String,
    /// Conversation identity (e.g. `15551234567@c.us`).
    pub identity: String,
    pub text: String,
    /// Image or document URL attached to an inbound message.
    pub media_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
}

impl Turn {
    /// Build a turn stamped with a fresh id and the current time.
    pub fn new(identity: impl Into<String>, text: impl Into<String>, direction: Direction) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            identity: identity.into(),
            text: text.into(),
            media_url: None,
            timestamp: Utc::now().trunc_subsecs(6),
            direction,
        }
    }

    pub fn with_media(mut self, media_url: Option<String>) -> Self {
        self.media_url = media_url;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        // Storage keeps microseconds
        self.timestamp = timestamp.trunc_subsecs(6);
        self
    }

    pub fn is_summary(&self) -> bool {
        self.direction == Direction::Summary
    }
}

/// Persona instructions for one identity, or the default profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToneProfile {
    pub id: String,
    /// `None` for the default profile.
    pub phone_number: Option<String>,
    pub instruction_text: String,
}

impl ToneProfile {
    /// Blank instructions are treated as if no profile existed.
    pub fn usable_instruction(&self) -> Option<&str> {
        let text = self.instruction_text.trim();
        (!text.is_empty()).then_some(text)
    }
}

/// Payload stored alongside each long-term memory vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryPayload {
    pub content: String,
    pub identity: String,
    pub timestamp: DateTime<Utc>,
}

/// A long-term fact, scoped to one identity.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticRecord {
    /// Unique id. Generation order is not guaranteed to be monotonic.
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: MemoryPayload,
}

/// A search hit, best-first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub id: String,
    pub payload: MemoryPayload,
    pub score: f64,
}

/// Canonical timestamp encoding for storage. Fixed precision keeps the text
/// lexicographically ordered.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
