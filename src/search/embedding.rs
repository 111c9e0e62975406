use super::EmbeddingProvider;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use recap_core::RecapCoreError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Embedding service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// OpenAI-compatible `/v1/embeddings` URL
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    /// Reuse embeddings stored under the project index directory
    pub cache_enabled: bool,
    /// Texts per request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            endpoint: "http://localhost:1234/v1/embeddings".to_string(),
            api_key: None,
            timeout_seconds: 60,
            cache_enabled: true,
            batch_size: 64,
        }
    }
}

/// Client for an OpenAI-compatible embeddings endpoint
pub struct HttpEmbeddingProvider {
    config: EmbeddingConfig,
    endpoint: Url,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

impl HttpEmbeddingProvider {
    pub fn new(config: EmbeddingConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| anyhow!("Invalid embedding endpoint '{}': {}", config.endpoint, e))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            endpoint,
            client,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        debug!("Requesting {} embeddings from {}", texts.len(), self.endpoint);

        let mut builder = self.client.post(self.endpoint.clone()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RecapCoreError::collaborator("embedding service", e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RecapCoreError::collaborator("embedding service", format!("{}: {}", status, text)).into());
        }

        let mut body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RecapCoreError::collaborator("embedding service", e.to_string()))?;

        if body.data.len() != texts.len() {
            return Err(RecapCoreError::collaborator(
                "embedding service",
                format!("expected {} embeddings, got {}", texts.len(), body.data.len()),
            )
            .into());
        }

        if body.data.iter().all(|d| d.index.is_some()) {
            body.data.sort_by_key(|d| d.index);
        }
        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
