use super::search::load_narration_files;
use super::{load_output, stage_output, IngestOutput, SearchOutput, Stage, StageContext};
use crate::matching::load_spoiler_risks;
use crate::project::ProjectConfig;
use crate::timeline::{
    commit_all, discard_all, stage_timeline, AssemblyOptions, AssemblyReport, PendingWrite, TimelineAssembler,
    TimelineContext,
};
use anyhow::Result;
use recap_core::{RecapCoreError, Timeline, TimelineFormat, TimelineOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

const DEFAULT_INPUT_VIDEO: &str = "films/input/movie.mp4";
const DEFAULT_NARRATION_AUDIO: &str = "films/narration/narration.m4a";
const RENDER_FILE: &str = "final.mp4";
const REPORT_FILE: &str = "timeline_report.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineStageOutput {
    pub timeline_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimal_copy_path: Option<PathBuf>,
    pub segments: usize,
    pub total_duration: f64,
    pub report: AssemblyReport,
}

/// Options written into the timeline metadata
fn recorded_options(options: &AssemblyOptions, project: Option<&ProjectConfig>) -> TimelineOptions {
    let base = project.map(|p| p.timeline_options()).unwrap_or_default();
    TimelineOptions {
        similarity_threshold: Some(options.similarity_threshold),
        overlap_threshold: Some(options.overlap_threshold),
        merge_threshold: options.merge_threshold,
        min_time_gap: Some(options.min_time_gap),
        interval_seconds: Some(options.interval_seconds),
        ..base
    }
}

/// Assemble the timeline from the search results and persist it.
///
/// Nothing is written unless assembly succeeds.
pub async fn run(ctx: &StageContext) -> Result<TimelineStageOutput> {
    let ingest: IngestOutput = load_output(&ctx.output_path(Stage::Ingest), Stage::Ingest).await?;
    let search: SearchOutput = load_output(&ctx.output_path(Stage::Search), Stage::Search).await?;

    let project = if ctx.layout.project_config_path().exists() {
        Some(ProjectConfig::load_or_default(&ctx.layout).await?)
    } else {
        None
    };
    let options = ctx.config.assembly_options(project.as_ref().map(|p| &p.options));

    let paths = ingest.narration_files();
    if paths.is_empty() {
        return Err(RecapCoreError::MissingInput("No narration SRT files found in ingest output".to_string()).into());
    }
    let narration = load_narration_files(&paths).await?;

    let mut assembler = TimelineAssembler::new(options.clone());
    if options.spoiler_risk_threshold.is_some() {
        let risks = load_spoiler_risks(ctx.layout.spoiler_risks_path()).await?;
        if risks.is_empty() {
            warn!("Spoiler-safe mode is on but no spoiler risks were recorded");
        } else {
            info!("🙈 Loaded {} spoiler risk entries", risks.len());
        }
        assembler = assembler.with_spoiler_risks(risks);
    }

    let context = TimelineContext {
        input: ingest
            .movie_video_path
            .clone()
            .unwrap_or_else(|| DEFAULT_INPUT_VIDEO.to_string()),
        narration: ingest
            .narration_audio_path
            .clone()
            .unwrap_or_else(|| DEFAULT_NARRATION_AUDIO.to_string()),
        output: ctx.layout.output_path(RENDER_FILE).to_string_lossy().into_owned(),
        project_id: Some(ctx.layout.project_id().to_string()),
        movie_id: project.as_ref().map(|p| p.movie_id.clone()),
        options: recorded_options(&options, project.as_ref()),
    };

    let assembled = assembler.assemble(&narration, search.into_matches(), context)?;
    let report = assembled.report;
    info!(
        "📊 {} windows, {} without candidates, {} dropped, {} substituted, {} overlaps removed",
        report.windows, report.no_candidates, report.dropped_for_compliance, report.substituted, report.removed_overlaps
    );

    let minimal_copy_path = ctx
        .config
        .output
        .write_minimal_copy
        .then(|| ctx.config.output.root_dir.join("timeline.json"));
    let output = TimelineStageOutput {
        timeline_path: ctx.output_path(Stage::Timeline),
        minimal_copy_path,
        segments: assembled.timeline.segments.len(),
        total_duration: assembled.timeline.total_duration(),
        report,
    };

    // Every file is staged before any is moved into place
    let mut pending = Vec::with_capacity(3);
    if let Err(e) = stage_files(ctx, &assembled.timeline, &output, &mut pending).await {
        discard_all(pending).await;
        return Err(e);
    }
    commit_all(pending).await?;

    info!("💾 Saved timeline to {}", output.timeline_path.display());
    if let Some(path) = &output.minimal_copy_path {
        info!("💾 Saved minimal copy to {}", path.display());
    }
    Ok(output)
}

async fn stage_files(
    ctx: &StageContext,
    timeline: &Timeline,
    output: &TimelineStageOutput,
    pending: &mut Vec<PendingWrite>,
) -> Result<()> {
    pending.push(stage_timeline(timeline, &output.timeline_path, TimelineFormat::Full).await?);
    if let Some(path) = &output.minimal_copy_path {
        pending.push(stage_timeline(timeline, path, TimelineFormat::Minimal).await?);
    }
    pending.push(stage_output(&ctx.layout.output_path(REPORT_FILE), output).await?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigBuilder;
    use crate::project::ProjectLayout;
    use crate::stages::testing::write_srt;
    use crate::stages::{save_output, SearchMatch};
    use crate::timeline::load_timeline;
    use recap_core::Match;
    use tempfile::TempDir;

    fn candidate(start: f64, score: f64, narration_time: f64, rank: usize, chunk: usize) -> SearchMatch {
        SearchMatch {
            candidate: Match::new(format!("movie_{:06}", start as usize), start, start + 8.0, score)
                .with_narration_time(narration_time)
                .with_narration_file("narration_0"),
            chunk_index: chunk,
            result_rank: rank,
        }
    }

    async fn prepare(root: &TempDir, write_minimal_copy: bool) -> StageContext {
        let config = ConfigBuilder::new()
            .with_root_dir(root.path().to_path_buf())
            .write_minimal_copy(write_minimal_copy)
            .build();
        let ctx = StageContext::new(config, ProjectLayout::new(root.path(), "tl"));
        ctx.layout.ensure_structure().await.unwrap();

        let narration = ctx.layout.data_dir().join("narration.srt");
        write_srt(
            &narration,
            &[(0.0, 4.0, "one"), (4.0, 8.0, "two"), (8.0, 12.0, "three")],
        )
        .await;
        let ingest = IngestOutput {
            narration_srt_files: vec![narration.to_string_lossy().into_owned()],
            validated: true,
            ..IngestOutput::default()
        };
        save_output(&ctx.output_path(Stage::Ingest), &ingest).await.unwrap();

        // Window at 4.0 has a primary too close to the first selection
        let search = SearchOutput {
            matches: vec![
                candidate(100.0, 0.9, 0.0, 0, 0),
                candidate(110.0, 0.95, 4.0, 0, 1),
                candidate(400.0, 0.8, 4.0, 1, 1),
                candidate(900.0, 0.85, 8.0, 0, 2),
                candidate(300.0, 0.5, 8.0, 1, 2),
            ],
        };
        save_output(&ctx.output_path(Stage::Search), &search).await.unwrap();
        ctx
    }

    #[tokio::test]
    async fn test_timeline_stage_writes_full_and_minimal() {
        let root = TempDir::new().unwrap();
        let ctx = prepare(&root, true).await;

        let output = run(&ctx).await.unwrap();
        assert_eq!(output.segments, 3);
        assert_eq!(output.report.substituted, 1);

        let timeline = load_timeline(&output.timeline_path).await.unwrap();
        let starts: Vec<f64> = timeline.segments.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![100.0, 400.0, 900.0]);
        assert_eq!(timeline.input, DEFAULT_INPUT_VIDEO);
        assert!(timeline.output.ends_with("final.mp4"));
        let metadata = timeline.metadata.unwrap();
        assert_eq!(metadata.project_id.as_deref(), Some("tl"));
        assert!(metadata.movie_id.is_none());

        let minimal = load_timeline(&output.minimal_copy_path.unwrap()).await.unwrap();
        assert!(minimal.metadata.is_none());
        assert!(minimal.segments.iter().all(|s| s.score.is_none()));
        assert!(ctx.layout.output_path(REPORT_FILE).exists());
    }

    #[tokio::test]
    async fn test_project_options_override_config() {
        let root = TempDir::new().unwrap();
        let ctx = prepare(&root, false).await;
        let mut project = ProjectConfig::new("tt-movie");
        project.options.similarity_threshold = 0.88;
        project.save(&ctx.layout).await.unwrap();

        let output = run(&ctx).await.unwrap();
        // Only 100 and 110 clear 0.88, and 110 sits too close to 100
        assert_eq!(output.segments, 1);
        assert_eq!(output.report.no_candidates, 1);
        assert!(output.report.dropped_for_compliance >= 1);
        assert!(output.minimal_copy_path.is_none());

        let timeline = load_timeline(&output.timeline_path).await.unwrap();
        let metadata = timeline.metadata.unwrap();
        assert_eq!(metadata.movie_id.as_deref(), Some("tt-movie"));
        let options = metadata.options.unwrap();
        assert_eq!(options.similarity_threshold, Some(0.88));
        assert_eq!(options.preset.as_deref(), Some("standard"));
    }

    #[tokio::test]
    async fn test_failed_assembly_writes_nothing() {
        let root = TempDir::new().unwrap();
        let ctx = prepare(&root, false).await;
        let ingest = IngestOutput {
            narration_srt_files: vec![ctx.layout.data_dir().join("missing.srt").to_string_lossy().into_owned()],
            ..IngestOutput::default()
        };
        save_output(&ctx.output_path(Stage::Ingest), &ingest).await.unwrap();

        assert!(run(&ctx).await.is_err());
        assert!(!ctx.output_path(Stage::Timeline).exists());
    }

    #[tokio::test]
    async fn test_failed_minimal_copy_commits_nothing() {
        let root = TempDir::new().unwrap();
        let mut ctx = prepare(&root, true).await;
        // A regular file where the minimal copy's directory should be
        let blocker = root.path().join("not_a_dir");
        tokio::fs::write(&blocker, "x").await.unwrap();
        ctx.config.output.root_dir = blocker;

        assert!(run(&ctx).await.is_err());
        let timeline_path = ctx.output_path(Stage::Timeline);
        assert!(!timeline_path.exists());
        assert!(!timeline_path.with_extension("json.tmp").exists());
        assert!(!ctx.layout.output_path(REPORT_FILE).exists());
    }
}
