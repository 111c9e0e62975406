//! Pipeline stages over one project workspace
//!
//! `ingest → index → search → timeline → render`. Every stage reads the
//! previous stage's JSON from `outputs/` and persists its own before the
//! next one starts.

pub mod index;
pub mod ingest;
pub mod render;
pub mod search;
pub mod timeline;

#[cfg(test)]
pub(crate) mod testing;

pub use index::IndexOutput;
pub use ingest::IngestOutput;
pub use render::RenderOutput;
pub use search::{SearchMatch, SearchOutput};
pub use timeline::TimelineStageOutput;

use crate::config::Config;
use crate::project::{ProjectConfig, ProjectLayout};
use crate::search::{CachedEmbedder, EmbeddingCache, EmbeddingProvider, HttpEmbeddingProvider};
use crate::timeline::PendingWrite;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use recap_core::RecapCoreError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Ingest,
    Index,
    Search,
    Timeline,
    Render,
}

impl Stage {
    pub const ALL: [Stage; 5] = [Stage::Ingest, Stage::Index, Stage::Search, Stage::Timeline, Stage::Render];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::Index => "index",
            Stage::Search => "search",
            Stage::Timeline => "timeline",
            Stage::Render => "render",
        }
    }

    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Ingest => Some(Stage::Index),
            Stage::Index => Some(Stage::Search),
            Stage::Search => Some(Stage::Timeline),
            Stage::Timeline => Some(Stage::Render),
            Stage::Render => None,
        }
    }

    /// File the stage persists under `outputs/`
    pub fn output_file(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest_output.json",
            Stage::Index => "index_output.json",
            Stage::Search => "search_output.json",
            Stage::Timeline => "timeline.json",
            Stage::Render => "render_output.json",
        }
    }

    /// Stages from `from` through `to`, inclusive
    pub fn range(from: Stage, to: Stage) -> Result<Vec<Stage>> {
        let start = Stage::ALL.iter().position(|s| *s == from).unwrap_or(0);
        let end = Stage::ALL.iter().position(|s| *s == to).unwrap_or(Stage::ALL.len() - 1);
        if start > end {
            return Err(anyhow!("Stage {} comes after {}", from, to));
        }
        Ok(Stage::ALL[start..=end].to_vec())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown stage: {} (expected ingest, index, search, timeline or render)", s))
    }
}

/// Everything a stage needs: settings, the workspace and the embedder
pub struct StageContext {
    pub config: Config,
    pub layout: ProjectLayout,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl StageContext {
    pub fn new(config: Config, layout: ProjectLayout) -> Self {
        Self {
            config,
            layout,
            embedder: None,
        }
    }

    /// Use `embedder` instead of the configured HTTP service
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn output_path(&self, stage: Stage) -> PathBuf {
        self.layout.output_path(stage.output_file())
    }

    /// The injected embedder, or the HTTP provider for the project's model
    /// behind the on-disk cache when caching is enabled
    pub async fn embedder(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        if let Some(embedder) = &self.embedder {
            return Ok(Arc::clone(embedder));
        }

        let mut embedding = self.config.embedding.clone();
        if let Some(project) = ProjectConfig::load_or_default(&self.layout).await?.embedding {
            embedding.model = project.model;
        }
        let cache_enabled = embedding.cache_enabled;
        let provider = HttpEmbeddingProvider::new(embedding)?;

        if !cache_enabled {
            return Ok(Arc::new(provider));
        }
        let cache = EmbeddingCache::new(self.layout.embeddings_cache_dir());
        cache.initialize().await?;
        Ok(Arc::new(CachedEmbedder::new(provider, cache)))
    }
}

/// Pretty JSON written to a `.tmp` sibling and renamed into place
pub(crate) async fn save_output<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    stage_output(path, value).await?.commit().await?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Serialize `value` next to `path` without committing it
pub(crate) async fn stage_output<T: Serialize>(path: &Path, value: &T) -> Result<PendingWrite> {
    let json = serde_json::to_string_pretty(value)?;
    PendingWrite::stage(path, json.as_bytes()).await
}

/// Output persisted by `producer`, or a missing-input error naming it
pub(crate) async fn load_output<T: DeserializeOwned>(path: &Path, producer: Stage) -> Result<T> {
    if !path.exists() {
        return Err(RecapCoreError::MissingInput(format!(
            "{} output not found: {} (run the {} stage first)",
            producer,
            path.display(),
            producer
        ))
        .into());
    }
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub output_path: PathBuf,
    pub elapsed_seconds: f64,
    pub completed_at: DateTime<Utc>,
}

pub async fn run_stage(ctx: &StageContext, stage: Stage) -> Result<StageOutcome> {
    info!("▶️ Stage {} for project {}", stage, ctx.layout.project_id());
    let started = Instant::now();

    match stage {
        Stage::Ingest => {
            ingest::run(ctx).await?;
        }
        Stage::Index => {
            index::run(ctx).await?;
        }
        Stage::Search => {
            search::run(ctx).await?;
        }
        Stage::Timeline => {
            timeline::run(ctx).await?;
        }
        Stage::Render => {
            render::run(ctx).await?;
        }
    }

    let outcome = StageOutcome {
        stage,
        output_path: ctx.output_path(stage),
        elapsed_seconds: started.elapsed().as_secs_f64(),
        completed_at: Utc::now(),
    };
    info!("✅ Stage {} finished in {:.2}s", stage, outcome.elapsed_seconds);
    Ok(outcome)
}

/// Run `from..=to` in order, stopping at the first failure
pub async fn run_pipeline(ctx: &StageContext, from: Stage, to: Stage) -> Result<Vec<StageOutcome>> {
    let stages = Stage::range(from, to)?;
    info!(
        "🚀 Running {} stage(s) for project {}: {}",
        stages.len(),
        ctx.layout.project_id(),
        stages.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(" → ")
    );

    let mut outcomes = Vec::with_capacity(stages.len());
    for stage in stages {
        let outcome = run_stage(ctx, stage)
            .await
            .with_context(|| format!("Stage {} failed", stage))?;
        outcomes.push(outcome);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stage_order_and_names() {
        assert_eq!(Stage::Ingest.next(), Some(Stage::Index));
        assert_eq!(Stage::Render.next(), None);
        assert_eq!("timeline".parse::<Stage>().unwrap(), Stage::Timeline);
        assert!("transcode".parse::<Stage>().is_err());
        assert_eq!(Stage::Timeline.output_file(), "timeline.json");
    }

    #[test]
    fn test_stage_range() {
        assert_eq!(
            Stage::range(Stage::Search, Stage::Render).unwrap(),
            vec![Stage::Search, Stage::Timeline, Stage::Render]
        );
        assert_eq!(Stage::range(Stage::Index, Stage::Index).unwrap(), vec![Stage::Index]);
        assert!(Stage::range(Stage::Render, Stage::Ingest).is_err());
    }

    #[tokio::test]
    async fn test_missing_output_names_producer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ingest_output.json");
        let err = load_output::<IngestOutput>(&path, Stage::Ingest).await.unwrap_err();
        assert!(err.to_string().contains("run the ingest stage first"));

        save_output(&path, &serde_json::json!({"movie_srt_path": "m.srt", "validated": true}))
            .await
            .unwrap();
        assert!(!dir.path().join("ingest_output.json.tmp").exists());
        let loaded: IngestOutput = load_output(&path, Stage::Ingest).await.unwrap();
        assert_eq!(loaded.movie_srt_path.as_deref(), Some("m.srt"));
    }
}
