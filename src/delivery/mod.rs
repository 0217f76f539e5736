//! Outbound message delivery.
//!
//! Delivery is best-effort and at-most-once: callers log a failed send and
//! move on, nothing is retried and no persisted state is rolled back.

pub mod ultramsg;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// What the gateway reported for an accepted message.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReceipt {
    /// Provider-side message id, when one was returned.
    pub message_id: Option<String>,
    pub raw: serde_json::Value,
}

#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    async fn send(&self, identity: &str, text: &str) -> Result<DeliveryReceipt>;
}

pub fn create_gateway(config: &crate::config::DeliveryConfig) -> Result<Box<dyn DeliveryGateway>> {
    Ok(Box::new(ultramsg::UltraMsgGateway::new(config)?))
}
