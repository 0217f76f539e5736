//! OpenAI-compatible embeddings endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{EmbeddingProvider, EMBEDDING_DIM};
use crate::config::OpenAiConfig;

pub struct OpenAiEmbeddingProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        Ok(Self {
            client: Client::builder()
                .build()
                .context("failed to build HTTP client")?,
            api_key: config.api_key.clone(),
            model: config.embedding_model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Take the first vector from a response and check its width.
fn first_vector(response: EmbeddingResponse) -> Result<Vec<f32>> {
    let vector = response
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .context("embedding response contained no vectors")?;
    anyhow::ensure!(
        vector.len() == EMBEDDING_DIM,
        "embedding has {} dimensions, expected {EMBEDDING_DIM}",
        vector.len()
    );
    Ok(vector)
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("embedding request failed with HTTP {status}: {body}");
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("failed to decode embedding response")?;
        first_vector(parsed)
    }
}
