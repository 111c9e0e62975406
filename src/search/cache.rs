//! Content-addressed embedding cache stored as one JSON file per text
use super::EmbeddingProvider;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedEmbedding {
    model: String,
    embedding: Vec<f32>,
}

/// Embeddings keyed by `md5("{model}:{text}")`.
///
/// Entries are immutable once written, so two processes racing on the same
/// key write identical content.
#[derive(Debug, Clone)]
pub struct EmbeddingCache {
    cache_dir: PathBuf,
}

impl EmbeddingCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    pub async fn initialize(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        debug!("Embedding cache directory: {}", self.cache_dir.display());
        Ok(())
    }

    pub fn cache_key(model: &str, text: &str) -> String {
        format!("{:x}", md5::compute(format!("{}:{}", model, text)))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Unreadable or corrupt entries count as misses
    pub async fn load(&self, model: &str, text: &str) -> Option<Vec<f32>> {
        let path = self.path_for(&Self::cache_key(model, text));
        if !path.exists() {
            return None;
        }

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<CachedEmbedding>(&content) {
                Ok(entry) if entry.model == model => Some(entry.embedding),
                Ok(_) => None,
                Err(e) => {
                    warn!("Failed to parse embedding cache file {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                warn!("Failed to read embedding cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn store(&self, model: &str, text: &str, embedding: &[f32]) -> Result<()> {
        let entry = CachedEmbedding {
            model: model.to_string(),
            embedding: embedding.to_vec(),
        };
        let path = self.path_for(&Self::cache_key(model, text));
        tokio::fs::write(&path, serde_json::to_string(&entry)?).await?;
        Ok(())
    }
}

/// Embedding provider that consults an [`EmbeddingCache`] first
pub struct CachedEmbedder<E> {
    inner: E,
    cache: EmbeddingCache,
}

impl<E: EmbeddingProvider> CachedEmbedder<E> {
    pub fn new(inner: E, cache: EmbeddingCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl<E: EmbeddingProvider> EmbeddingProvider for CachedEmbedder<E> {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.inner.model().to_string();
        let mut vectors: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut missing = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            let cached = self.cache.load(&model, text).await;
            if cached.is_none() {
                missing.push(i);
            }
            vectors.push(cached);
        }

        if !missing.is_empty() {
            let pending: Vec<String> = missing.iter().map(|&i| texts[i].clone()).collect();
            let fresh = self.inner.embed(&pending).await?;

            for (&i, embedding) in missing.iter().zip(fresh) {
                if let Err(e) = self.cache.store(&model, &texts[i], &embedding).await {
                    warn!("Failed to cache embedding: {}", e);
                }
                vectors[i] = Some(embedding);
            }
        }

        if texts.len() > 1 {
            info!(
                "📚 Embeddings: {} cached, {} computed",
                texts.len() - missing.len(),
                missing.len()
            );
        }

        vectors
            .into_iter()
            .enumerate()
            .map(|(i, v)| v.ok_or_else(|| anyhow::anyhow!("No embedding returned for text {}", i)))
            .collect()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
