use crate::search::EmbeddingProvider;
use crate::subtitles::format_timestamp;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Bag-of-words vectors: every word lands in one of 32 buckets
pub(crate) struct WordBucketEmbedder;

#[async_trait]
impl EmbeddingProvider for WordBucketEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; 32];
                for word in text.split_whitespace() {
                    let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
                    if word.is_empty() {
                        continue;
                    }
                    let bucket = word.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize)) % 32;
                    vector[bucket] += 1.0;
                }
                vector
            })
            .collect())
    }

    fn model(&self) -> &str {
        "word-buckets"
    }
}

pub(crate) async fn write_srt(path: &Path, entries: &[(f64, f64, &str)]) {
    let body: String = entries
        .iter()
        .enumerate()
        .map(|(i, (start, end, text))| {
            format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                format_timestamp(*start),
                format_timestamp(*end),
                text
            )
        })
        .collect();
    tokio::fs::write(path, body).await.unwrap();
}
