//! Persona resolution with explicit precedence.
//!
//! Identity-specific profile, then the default profile, then a fixed
//! fallback. A store fault is reported as [`Resolution::Unresolved`] so the
//! caller can tell "fell back" apart from "could not look".

use serde::Serialize;
use std::sync::Arc;

use crate::store::ToneRules;

/// Used when neither an identity profile nor a default profile exists.
pub const FALLBACK_INSTRUCTION: &str = "You are a helpful AI assistant.";

/// Which precedence level produced the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaSource {
    Identity,
    Default,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        instruction: String,
        source: PersonaSource,
    },
    /// The tone store could not be read.
    Unresolved { reason: String },
}

impl Resolution {
    pub fn instruction(&self) -> Option<&str> {
        match self {
            Self::Resolved { instruction, .. } => Some(instruction),
            Self::Unresolved { .. } => None,
        }
    }
}

pub struct PersonaResolver {
    rules: Arc<dyn ToneRules>,
    fallback_text: String,
}

impl PersonaResolver {
    /// A blank `fallback_text` is replaced by [`FALLBACK_INSTRUCTION`].
    pub fn new(rules: Arc<dyn ToneRules>, fallback_text: impl Into<String>) -> Self {
        let fallback_text = fallback_text.into();
        let fallback_text = if fallback_text.trim().is_empty() {
            FALLBACK_INSTRUCTION.to_string()
        } else {
            fallback_text
        };
        Self {
            rules,
            fallback_text,
        }
    }

    pub fn fallback_text(&self) -> &str {
        &self.fallback_text
    }

    pub async fn resolve(&self, identity: &str) -> Resolution {
        tracing::debug!(identity = %identity, "looking up persona");

        match self.rules.for_identity(identity).await {
            Ok(Some(profile)) => {
                if let Some(text) = profile.usable_instruction() {
                    tracing::debug!(identity = %identity, profile = %profile.id, "using identity persona");
                    return resolved(text, PersonaSource::Identity);
                }
            }
            Ok(None) => {}
            Err(e) => return unresolved(identity, e),
        }

        match self.rules.default_profile().await {
            Ok(Some(profile)) => {
                if let Some(text) = profile.usable_instruction() {
                    tracing::debug!(identity = %identity, "using default persona");
                    return resolved(text, PersonaSource::Default);
                }
            }
            Ok(None) => {}
            Err(e) => return unresolved(identity, e),
        }

        tracing::warn!(identity = %identity, "no default persona configured, using fallback");
        resolved(&self.fallback_text, PersonaSource::Fallback)
    }
}

fn resolved(text: &str, source: PersonaSource) -> Resolution {
    Resolution::Resolved {
        instruction: text.to_string(),
        source,
    }
}

fn unresolved(identity: &str, error: anyhow::Error) -> Resolution {
    tracing::error!(identity = %identity, error = %format!("{error:#}"), "persona lookup failed");
    Resolution::Unresolved {
        reason: format!("{error:#}"),
    }
}
