use super::{load_output, save_output, IndexOutput, IngestOutput, Stage, StageContext};
use crate::chunking::sliding_window;
use crate::search::{SemanticSearch, SimilaritySearch, VectorStore};
use crate::subtitles::parse_srt_file;
use crate::timeline::NarrationFile;
use anyhow::{Context, Result};
use recap_core::{Match, RecapCoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// One ranked search result for one narration window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    #[serde(flatten)]
    pub candidate: Match,
    /// Position of the window within its narration file
    pub chunk_index: usize,
    /// 0 is the best hit for the window
    pub result_rank: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutput {
    pub matches: Vec<SearchMatch>,
}

impl SearchOutput {
    pub fn into_matches(self) -> Vec<Match> {
        self.matches.into_iter().map(|m| m.candidate).collect()
    }
}

/// Parse narration files in track order; ids are `narration_{n}` from 0
pub async fn load_narration_files(paths: &[String]) -> Result<Vec<NarrationFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for (idx, path) in paths.iter().enumerate() {
        let entries = parse_srt_file(path).await?;
        debug!("{}: {} entries", path, entries.len());
        files.push(NarrationFile {
            file_id: format!("narration_{}", idx),
            entries,
        });
    }
    Ok(files)
}

/// Query `search` with every sliding narration window, keeping up to `k`
/// ranked hits per window
pub async fn collect_matches(
    search: &dyn SimilaritySearch,
    narration: &[NarrationFile],
    k: usize,
) -> Result<Vec<SearchMatch>> {
    let mut matches = Vec::new();

    for file in narration {
        let windows = sliding_window(&file.entries);
        for (chunk_index, chunk) in windows.iter().enumerate() {
            let narration_time = chunk.center_entry().start;
            let hits = search
                .search(&chunk.text, k)
                .await
                .with_context(|| format!("Search failed for {} window {}", file.file_id, chunk_index))?;

            for (result_rank, hit) in hits.into_iter().enumerate() {
                matches.push(SearchMatch {
                    candidate: hit
                        .into_match(chunk.text.clone())
                        .with_narration_time(narration_time)
                        .with_narration_file(file.file_id.clone()),
                    chunk_index,
                    result_rank,
                });
            }
        }
        debug!("{}: {} windows searched", file.file_id, windows.len());
    }

    Ok(matches)
}

/// Search the indexed movie for every narration window
pub async fn run(ctx: &StageContext) -> Result<SearchOutput> {
    let ingest: IngestOutput = load_output(&ctx.output_path(Stage::Ingest), Stage::Ingest).await?;
    let index: IndexOutput = load_output(&ctx.output_path(Stage::Index), Stage::Index).await?;

    let paths = ingest.narration_files();
    if paths.is_empty() {
        return Err(RecapCoreError::MissingInput("No narration SRT files found in ingest output".to_string()).into());
    }
    let narration = load_narration_files(&paths).await?;

    let store = Arc::new(VectorStore::open(ctx.layout.vector_store_dir()).await?);
    let search = SemanticSearch::new(ctx.embedder().await?, store, index.collection_name);
    info!(
        "🔍 Searching {} narration file(s) against {}",
        narration.len(),
        search.collection()
    );

    let matches = collect_matches(&search, &narration, ctx.config.matching.top_k).await?;
    info!("🎯 {} candidate matches collected", matches.len());

    let output = SearchOutput { matches };
    save_output(&ctx.output_path(Stage::Search), &output).await?;
    Ok(output)
}
