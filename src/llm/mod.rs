//! Chat-completion collaborator.
//!
//! [`ChatMessage`] serializes directly into the OpenAI chat wire format, so
//! the assembled context is sent as-is. [`create_client`] builds the HTTP
//! client from configuration.

pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multi-part user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// All text carried by this content, parts joined by newlines.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// A chat-completion model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Return the model's reply to an ordered message sequence.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Create the chat client from config.
pub fn create_client(config: &crate::config::OpenAiConfig) -> Result<Box<dyn ChatModel>> {
    anyhow::ensure!(
        !config.api_key.is_empty(),
        "OpenAI API key is not configured (set OPENAI_API_KEY)"
    );
    Ok(Box::new(openai::OpenAiChatClient::new(config)?))
}
