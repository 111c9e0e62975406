use super::{load_output, save_output, IngestOutput, Stage, StageContext};
use crate::chunking::chunk_bounded;
use crate::search::{collection_name, segment_id, VectorRecord, VectorStore};
use crate::subtitles::parse_srt_file;
use anyhow::{anyhow, Result};
use recap_core::RecapCoreError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOutput {
    pub collection_name: String,
    pub chunks_indexed: usize,
    /// Sum of chunk durations in seconds
    pub total_duration: f64,
}

/// Chunk the movie subtitles, embed every chunk and replace the project's
/// collection with the result
pub async fn run(ctx: &StageContext) -> Result<IndexOutput> {
    let ingest: IngestOutput = load_output(&ctx.output_path(Stage::Ingest), Stage::Ingest).await?;
    let movie_srt = ingest
        .movie_srt_path
        .ok_or_else(|| RecapCoreError::MissingInput("Movie SRT path not found in ingest output".to_string()))?;

    let entries = parse_srt_file(&movie_srt).await?;
    let chunks = chunk_bounded(&entries, &ctx.config.chunking);
    if chunks.is_empty() {
        warn!("{} produced no chunks", movie_srt);
    }
    info!("🧩 {} subtitle entries grouped into {} chunks", entries.len(), chunks.len());

    let embedder = ctx.embedder().await?;
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed(&texts).await?;
    if embeddings.len() != chunks.len() {
        return Err(anyhow!(
            "Embedding provider returned {} vectors for {} chunks",
            embeddings.len(),
            chunks.len()
        ));
    }

    let records: Vec<VectorRecord> = chunks
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (chunk, embedding))| VectorRecord {
            id: segment_id(i),
            text: chunk.text.clone(),
            start_time: chunk.start,
            end_time: chunk.end,
            embedding,
        })
        .collect();

    let collection = collection_name(ctx.layout.project_id());
    let store = VectorStore::open(ctx.layout.vector_store_dir()).await?;
    store.delete(&collection).await?;
    store.add(&collection, records).await?;

    let output = IndexOutput {
        collection_name: collection,
        chunks_indexed: chunks.len(),
        total_duration: chunks.iter().map(|c| c.duration()).sum(),
    };
    info!(
        "📚 Indexed {} chunks ({:.1}s) with {}",
        output.chunks_indexed,
        output.total_duration,
        embedder.model()
    );
    save_output(&ctx.output_path(Stage::Index), &output).await?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::project::ProjectLayout;
    use crate::stages::testing::{write_srt, WordBucketEmbedder};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_index_replaces_collection() {
        let root = TempDir::new().unwrap();
        let ctx = StageContext::new(Config::default(), ProjectLayout::new(root.path(), "idx"))
            .with_embedder(Arc::new(WordBucketEmbedder));
        ctx.layout.ensure_structure().await.unwrap();
        let movie = ctx.layout.data_dir().join("movie.srt");

        let entries: Vec<(f64, f64, &str)> = (0..12)
            .map(|i| (i as f64 * 5.0, i as f64 * 5.0 + 4.0, "the crew plans the vault job tonight"))
            .collect();
        write_srt(&movie, &entries).await;
        let ingest = IngestOutput {
            movie_srt_path: Some(movie.to_string_lossy().into_owned()),
            validated: true,
            ..IngestOutput::default()
        };
        save_output(&ctx.output_path(Stage::Ingest), &ingest).await.unwrap();

        let first = run(&ctx).await.unwrap();
        assert_eq!(first.collection_name, "movie_subtitles_idx");
        assert!(first.chunks_indexed >= 2);
        assert!(first.total_duration > 0.0);

        // A shorter movie file leaves no stale records behind
        write_srt(&movie, &entries[..3]).await;
        let second = run(&ctx).await.unwrap();
        let store = VectorStore::open(ctx.layout.vector_store_dir()).await.unwrap();
        assert_eq!(store.count(&second.collection_name).await.unwrap(), second.chunks_indexed);
        assert!(second.chunks_indexed < first.chunks_indexed);
    }

    #[tokio::test]
    async fn test_index_requires_ingest() {
        let root = TempDir::new().unwrap();
        let ctx = StageContext::new(Config::default(), ProjectLayout::new(root.path(), "idx"))
            .with_embedder(Arc::new(WordBucketEmbedder));
        let err = run(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("run the ingest stage first"));
    }
}
