//! Text embedding and vector similarity search over indexed movie chunks
//!
//! The matching core only sees [`SimilaritySearch`]; the embedding service,
//! cache and vector store sit behind it.

pub mod cache;
pub mod embedding;
pub mod semantic;
pub mod store;

pub use cache::{CachedEmbedder, EmbeddingCache};
pub use embedding::{EmbeddingConfig, HttpEmbeddingProvider};
pub use semantic::SemanticSearch;
pub use store::{cosine_distance, VectorRecord, VectorStore};

use anyhow::Result;
use async_trait::async_trait;
use recap_core::Match;
use serde::{Deserialize, Serialize};

/// Trait for text embedding backends
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input text, in input order
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Model identifier, part of every cache key
    fn model(&self) -> &str;
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub segment_id: String,
    pub start_time: f64,
    pub end_time: f64,
    /// `1 - distance`, clamped to [0, 1]
    pub similarity_score: f64,
}

impl SearchHit {
    pub fn into_match(self, narration_text: impl Into<String>) -> Match {
        Match::new(self.segment_id, self.start_time, self.end_time, self.similarity_score).with_narration_text(narration_text)
    }
}

/// Ranked lookup of indexed segments by query text
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    /// Up to `k` hits, best first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

/// Collection holding one project's indexed movie subtitles
pub fn collection_name(project_id: &str) -> String {
    format!("movie_subtitles_{}", project_id)
}

/// Segment id for the `n`th indexed movie chunk
pub fn segment_id(n: usize) -> String {
    format!("movie_{:06}", n)
}
