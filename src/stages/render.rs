use super::{save_output, Stage, StageContext};
use crate::render::FfmpegRenderer;
use crate::timeline::load_timeline;
use anyhow::Result;
use recap_core::RecapCoreError;
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderOutput {
    pub status: String,
    pub output_file: String,
    pub segments_processed: usize,
    pub footage_seconds: f64,
    pub elapsed_seconds: f64,
}

/// Render `outputs/timeline.json` with ffmpeg
pub async fn run(ctx: &StageContext) -> Result<RenderOutput> {
    let timeline_path = ctx.output_path(Stage::Timeline);
    if !timeline_path.exists() {
        return Err(RecapCoreError::MissingInput(format!(
            "Timeline not found: {} (run the timeline stage first)",
            timeline_path.display()
        ))
        .into());
    }
    let timeline = load_timeline(&timeline_path).await?;

    let renderer = FfmpegRenderer::new(ctx.config.render.clone());
    if !renderer.check_available().await {
        return Err(RecapCoreError::collaborator(
            "ffmpeg",
            format!("{} is not available, install FFmpeg or set render.ffmpeg_path", ctx.config.render.ffmpeg_path),
        )
        .into());
    }

    let summary = renderer.render(&timeline).await?;
    let output = RenderOutput {
        status: "success".to_string(),
        output_file: summary.output,
        segments_processed: summary.segments,
        footage_seconds: summary.footage_seconds,
        elapsed_seconds: summary.elapsed_seconds,
    };
    info!("🎬 {} segments rendered to {}", output.segments_processed, output.output_file);
    save_output(&ctx.output_path(Stage::Render), &output).await?;
    Ok(output)
}
