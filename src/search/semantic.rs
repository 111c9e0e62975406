use super::{EmbeddingProvider, SearchHit, SimilaritySearch, VectorStore};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Embeds the query and looks it up in one vector collection
pub struct SemanticSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<VectorStore>,
    collection: String,
}

impl SemanticSearch {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<VectorStore>, collection: impl Into<String>) -> Self {
        Self {
            embedder,
            store,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl SimilaritySearch for SemanticSearch {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let embedding = self
            .embedder
            .embed(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Embedding provider returned no vector for the query"))?;

        let hits: Vec<SearchHit> = self
            .store
            .query(&self.collection, &embedding, k)
            .await?
            .into_iter()
            .map(|(record, distance)| SearchHit {
                segment_id: record.id,
                start_time: record.start_time,
                end_time: record.end_time,
                similarity_score: (1.0 - distance).clamp(0.0, 1.0),
            })
            .collect();

        debug!("Query matched {} of {} requested hits", hits.len(), k);
        Ok(hits)
    }
}
