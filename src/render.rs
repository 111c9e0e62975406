use anyhow::{bail, Result};
use recap_core::{RecapCoreError, Timeline};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Encoder settings for the rendered recap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub ffmpeg_path: String,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub overwrite: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 18,
            audio_codec: "aac".to_string(),
            overwrite: true,
        }
    }
}

/// Result of a successful render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSummary {
    pub output: String,
    pub segments: usize,
    pub footage_seconds: f64,
    pub elapsed_seconds: f64,
}

/// Cuts the timeline's segments out of the movie and lays the narration
/// audio over them
pub struct FfmpegRenderer {
    config: RenderConfig,
}

impl FfmpegRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    /// `trim` every segment from input 0 and concatenate them in timeline order
    pub fn filter_graph(timeline: &Timeline) -> String {
        let mut graph: Vec<String> = timeline
            .segments
            .iter()
            .enumerate()
            .map(|(i, s)| format!("[0:v]trim=start={}:end={},setpts=PTS-STARTPTS[v{}]", s.start, s.end, i))
            .collect();

        let labels: String = (0..timeline.segments.len()).map(|i| format!("[v{}]", i)).collect();
        graph.push(format!("{}concat=n={}:v=1:a=0[outv]", labels, timeline.segments.len()));
        graph.join(";")
    }

    pub fn build_args(&self, timeline: &Timeline) -> Vec<String> {
        vec![
            if self.config.overwrite { "-y" } else { "-n" }.to_string(),
            "-i".to_string(),
            timeline.input.clone(),
            "-i".to_string(),
            timeline.narration.clone(),
            "-filter_complex".to_string(),
            Self::filter_graph(timeline),
            "-map".to_string(),
            "[outv]".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            self.config.video_codec.clone(),
            "-preset".to_string(),
            self.config.preset.clone(),
            "-crf".to_string(),
            self.config.crf.to_string(),
            "-c:a".to_string(),
            self.config.audio_codec.clone(),
            "-shortest".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            timeline.output.clone(),
        ]
    }

    /// FFmpeg answers `-version` successfully
    pub async fn check_available(&self) -> bool {
        match tokio::process::Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
        {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }

    pub async fn render(&self, timeline: &Timeline) -> Result<RenderSummary> {
        if timeline.segments.is_empty() {
            bail!("Timeline has no segments to render");
        }
        timeline.validate()?;

        let args = self.build_args(timeline);
        debug!("{} {}", self.config.ffmpeg_path, args.join(" "));
        info!(
            "🎞️ Rendering {} segments into {}",
            timeline.segments.len(),
            timeline.output
        );

        let started = Instant::now();
        let output = tokio::process::Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .output()
            .await
            .map_err(|e| RecapCoreError::collaborator("ffmpeg", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(RecapCoreError::collaborator("ffmpeg", format!("{} {}", output.status, stderr)).into());
        }

        let summary = RenderSummary {
            output: timeline.output.clone(),
            segments: timeline.segments.len(),
            footage_seconds: timeline.total_duration(),
            elapsed_seconds: started.elapsed().as_secs_f64(),
        };
        info!("✅ Rendered {} in {:.1}s", summary.output, summary.elapsed_seconds);
        Ok(summary)
    }
}
