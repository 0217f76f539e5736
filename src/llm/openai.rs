//! OpenAI-compatible chat-completion client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{ChatMessage, ChatModel};
use crate::config::OpenAiConfig;

pub struct OpenAiChatClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiChatClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .build()
                .context("failed to build HTTP client")?,
            api_key: config.api_key.clone(),
            model: config.chat_model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("chat completion failed with HTTP {status}: {text}");
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .context("failed to decode chat completion response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .context("chat completion returned no content")?;

        tracing::debug!(model = %self.model, reply_len = content.len(), "chat completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_without_choices_has_no_content() {
        let parsed: CompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(parsed.choices.is_empty());
    }

    #[test]
    fn response_content_is_extracted() {
        let parsed: CompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "hola"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hola"));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = OpenAiConfig {
            base_url: "http://localhost:8080/v1/".into(),
            ..OpenAiConfig::default()
        };
        let client = OpenAiChatClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://localhost:8080/v1");
    }
}
