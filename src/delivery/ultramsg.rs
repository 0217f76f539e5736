//! UltraMsg WhatsApp gateway.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::{DeliveryGateway, DeliveryReceipt};
use crate::config::DeliveryConfig;

pub struct UltraMsgGateway {
    client: Client,
    base_url: String,
    instance_id: String,
    token: String,
}

impl UltraMsgGateway {
    pub fn new(config: &DeliveryConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .build()
                .context("failed to build HTTP client")?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            instance_id: config.instance_id.clone(),
            token: config.token.clone(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/{}/messages/chat", self.base_url, self.instance_id)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    token: &'a str,
    to: &'a str,
    body: &'a str,
}

/// UltraMsg answers 200 even for rejected messages; the error sits in the body.
fn receipt_from_body(raw: serde_json::Value) -> Result<DeliveryReceipt> {
    if let Some(error) = raw.get("error") {
        anyhow::bail!("UltraMsg reported error: {error}");
    }
    let message_id = raw.get("id").map(|id| match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    Ok(DeliveryReceipt { message_id, raw })
}

#[async_trait]
impl DeliveryGateway for UltraMsgGateway {
    async fn send(&self, identity: &str, text: &str) -> Result<DeliveryReceipt> {
        anyhow::ensure!(
            !self.instance_id.is_empty() && !self.token.is_empty(),
            "ULTRAMSG_INSTANCE_ID or ULTRAMSG_TOKEN is not configured"
        );

        let url = self.chat_url();
        let response = self
            .client
            .post(&url)
            .json(&ChatRequest {
                token: &self.token,
                to: identity,
                body: text,
            })
            .send()
            .await
            .context("UltraMsg request failed")?;

        let status = response.status();
        anyhow::ensure!(status.is_success(), "UltraMsg returned HTTP {status}");

        let raw: serde_json::Value = response
            .json()
            .await
            .context("failed to decode UltraMsg response")?;
        let receipt = receipt_from_body(raw)?;
        tracing::info!(to = %identity, message_id = ?receipt.message_id, "message queued with UltraMsg");
        Ok(receipt)
    }
}
