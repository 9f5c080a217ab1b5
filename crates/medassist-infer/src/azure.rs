//! Azure OpenAI embeddings client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embedder::EmbedderBackend;
use medassist_core::{AzureOpenAiConfig, Error, Result, RetryPolicy, ServiceFailure};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embeddings from an Azure OpenAI deployment.
pub struct AzureEmbedder {
    client: Client,
    config: AzureOpenAiConfig,
    dimension: usize,
    retry: RetryPolicy,
}

impl AzureEmbedder {
    pub fn new(config: AzureOpenAiConfig, dimension: usize, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(retry.timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config, dimension, retry))
    }

    pub fn with_client(
        client: Client,
        config: AzureOpenAiConfig,
        dimension: usize,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            config,
            dimension,
            retry,
        }
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.config.operation_url("embeddings");
        debug!("Requesting embedding ({} chars) from {}", text.len(), self.config.deployment_name);

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.config.api_key)
            .json(&EmbeddingRequest {
                input: text,
                dimensions: self.dimension,
            })
            .send()
            .await
            .map_err(|e| Error::EmbeddingService(ServiceFailure::transport(e.to_string())))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::EmbeddingService(ServiceFailure::http(status, body)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingService(ServiceFailure::malformed(e.to_string())))?;

        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| {
                Error::EmbeddingService(ServiceFailure::malformed("response contained no embedding"))
            })?;

        if embedding.len() != self.dimension {
            return Err(Error::EmbeddingService(ServiceFailure::malformed(format!(
                "expected {} dimensions, got {}",
                self.dimension,
                embedding.len()
            ))));
        }

        Ok(embedding)
    }
}

#[async_trait]
impl EmbedderBackend for AzureEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.retry.run("embedding request", || self.request(text)).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
