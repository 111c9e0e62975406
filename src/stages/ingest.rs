use super::{save_output, Stage, StageContext};
use crate::project::ProjectConfig;
use anyhow::Result;
use recap_core::RecapCoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Located project inputs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestOutput {
    #[serde(default)]
    pub movie_srt_path: Option<String>,
    /// First narration subtitle file
    #[serde(default)]
    pub narration_srt_path: Option<String>,
    #[serde(default)]
    pub movie_video_path: Option<String>,
    /// First narration audio file
    #[serde(default)]
    pub narration_audio_path: Option<String>,
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub narration_srt_files: Vec<String>,
    #[serde(default)]
    pub narration_audio_files: Vec<String>,
}

impl IngestOutput {
    /// Narration subtitle files in track order
    pub fn narration_files(&self) -> Vec<String> {
        if !self.narration_srt_files.is_empty() {
            return self.narration_srt_files.clone();
        }
        self.narration_srt_path.iter().cloned().collect()
    }
}

/// Files found directly inside the data directory
#[derive(Debug, Default)]
struct DataFiles {
    movie_srt: Option<PathBuf>,
    movie_video: Option<PathBuf>,
    narration_srts: Vec<PathBuf>,
    narration_audio: Vec<PathBuf>,
}

fn is_srt(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("srt"))
}

fn stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default()
}

/// `narration.srt` first, then `narration_2.srt` before `narration_10.srt`
fn narration_order(path: &Path) -> (u64, String) {
    let stem = stem(path);
    let number = stem
        .trim_start_matches("narration")
        .trim_start_matches(['_', '-'])
        .parse()
        .unwrap_or(0);
    (number, stem.to_string())
}

fn scan_data_dir(data_dir: &Path) -> DataFiles {
    let mut found = DataFiles::default();

    for entry in WalkDir::new(data_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.into_path();
        let stem = stem(&path);

        if stem == "movie" {
            if is_srt(&path) {
                found.movie_srt = Some(path);
            } else if found.movie_video.is_none() {
                found.movie_video = Some(path);
            }
        } else if stem.starts_with("narration") {
            if is_srt(&path) {
                found.narration_srts.push(path);
            } else if stem == "narration" {
                found.narration_audio.push(path);
            }
        } else {
            debug!("Ignoring {}", path.display());
        }
    }

    found.narration_srts.sort_by_key(|p| narration_order(p));
    found.narration_audio.sort();
    found
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Locate the movie subtitles, narration subtitles and media in `data/`
pub async fn run(ctx: &StageContext) -> Result<IngestOutput> {
    ctx.layout.ensure_structure().await?;
    let data_dir = ctx.layout.data_dir();
    info!("📁 Scanning {}", data_dir.display());

    let found = scan_data_dir(&data_dir);

    let movie_srt = found
        .movie_srt
        .ok_or_else(|| RecapCoreError::MissingInput(format!("Movie SRT file not found in {}", data_dir.display())))?;

    let mut narration_srt_files: Vec<String> = found.narration_srts.iter().map(|p| display(p)).collect();

    // An explicit list in project.json wins over the directory scan
    let project = ProjectConfig::load_or_default(&ctx.layout).await?;
    if !project.narration_srt_files.is_empty() {
        for file in &project.narration_srt_files {
            if !Path::new(file).is_file() {
                return Err(RecapCoreError::MissingInput(format!("Narration SRT file not found: {}", file)).into());
            }
        }
        narration_srt_files = project.narration_srt_files.clone();
    }

    if narration_srt_files.is_empty() {
        return Err(
            RecapCoreError::MissingInput(format!("No narration SRT files found in {}", data_dir.display())).into(),
        );
    }

    let movie_video = found
        .movie_video
        .map(|p| display(&p))
        .or_else(|| project.movie_video_path.clone());
    if movie_video.is_none() {
        warn!("No movie video found; the render stage will use the default input path");
    }

    let narration_audio_files: Vec<String> = found.narration_audio.iter().map(|p| display(p)).collect();

    let output = IngestOutput {
        movie_srt_path: Some(display(&movie_srt)),
        narration_srt_path: narration_srt_files.first().cloned(),
        movie_video_path: movie_video,
        narration_audio_path: narration_audio_files.first().cloned(),
        validated: true,
        narration_srt_files,
        narration_audio_files,
    };

    info!(
        "📄 Found movie subtitles and {} narration file(s)",
        output.narration_srt_files.len()
    );
    save_output(&ctx.output_path(Stage::Ingest), &output).await?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::project::ProjectLayout;
    use tempfile::TempDir;

    fn context(root: &Path) -> StageContext {
        StageContext::new(Config::default(), ProjectLayout::new(root, "ingest"))
    }

    #[test]
    fn test_narration_numeric_order() {
        let mut files = vec![
            PathBuf::from("narration_10.srt"),
            PathBuf::from("narration_2.srt"),
            PathBuf::from("narration_1.srt"),
        ];
        files.sort_by_key(|p| narration_order(p));
        assert_eq!(files[0], PathBuf::from("narration_1.srt"));
        assert_eq!(files[2], PathBuf::from("narration_10.srt"));
    }

    #[tokio::test]
    async fn test_ingest_locates_inputs() {
        let root = TempDir::new().unwrap();
        let ctx = context(root.path());
        ctx.layout.ensure_structure().await.unwrap();
        let data = ctx.layout.data_dir();
        for name in ["movie.srt", "movie.mkv", "narration.srt", "narration.m4a", "notes.txt"] {
            tokio::fs::write(data.join(name), "x").await.unwrap();
        }

        let output = run(&ctx).await.unwrap();
        assert!(output.validated);
        assert!(output.movie_srt_path.unwrap().ends_with("movie.srt"));
        assert!(output.movie_video_path.unwrap().ends_with("movie.mkv"));
        assert_eq!(output.narration_srt_files.len(), 1);
        assert!(output.narration_audio_path.unwrap().ends_with("narration.m4a"));
        assert!(ctx.output_path(Stage::Ingest).exists());
    }

    #[tokio::test]
    async fn test_ingest_requires_movie_srt() {
        let root = TempDir::new().unwrap();
        let ctx = context(root.path());
        ctx.layout.ensure_structure().await.unwrap();
        tokio::fs::write(ctx.layout.data_dir().join("narration.srt"), "x")
            .await
            .unwrap();

        let err = run(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("Movie SRT file not found"));
        assert!(!ctx.output_path(Stage::Ingest).exists());
    }

    #[tokio::test]
    async fn test_project_list_must_exist() {
        let root = TempDir::new().unwrap();
        let ctx = context(root.path());
        ctx.layout.ensure_structure().await.unwrap();
        let data = ctx.layout.data_dir();
        tokio::fs::write(data.join("movie.srt"), "x").await.unwrap();
        tokio::fs::write(data.join("narration.srt"), "x").await.unwrap();

        let mut project = ProjectConfig::new("ingest");
        project.narration_srt_files = vec![display(&data.join("narration_9.srt"))];
        project.save(&ctx.layout).await.unwrap();

        let err = run(&ctx).await.unwrap_err();
        assert!(err.to_string().contains("narration_9.srt"));
    }
}
