use anyhow::{anyhow, Context, Result};
use recap_core::{RecapCoreError, TimelineOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Directory layout of one project workspace under `{root}/projects/{id}`
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    project_id: String,
    project_dir: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl AsRef<Path>, project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        let project_dir = root.as_ref().join("projects").join(&project_id);
        Self {
            project_id,
            project_dir,
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn data_dir(&self) -> PathBuf {
        self.project_dir.join("data")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.project_dir.join("outputs")
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.project_dir.join("configs")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.project_dir.join("logs")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.project_dir.join("index")
    }

    pub fn vector_store_dir(&self) -> PathBuf {
        self.index_dir().join("vectors")
    }

    pub fn embeddings_cache_dir(&self) -> PathBuf {
        self.index_dir().join("embeddings_cache")
    }

    pub fn project_config_path(&self) -> PathBuf {
        self.configs_dir().join("project.json")
    }

    pub fn spoiler_risks_path(&self) -> PathBuf {
        self.configs_dir().join("spoiler_risks.json")
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.outputs_dir().join(file_name)
    }

    pub async fn ensure_structure(&self) -> Result<()> {
        for dir in [
            self.data_dir(),
            self.outputs_dir(),
            self.configs_dir(),
            self.logs_dir(),
            self.vector_store_dir(),
        ] {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}

/// Processing preset recorded with the project
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Quick,
    #[default]
    Standard,
    SpoilerSafe,
    HighQuality,
}

impl Preset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Quick => "quick",
            Preset::Standard => "standard",
            Preset::SpoilerSafe => "spoiler_safe",
            Preset::HighQuality => "high_quality",
        }
    }
}

impl std::str::FromStr for Preset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "quick" => Ok(Preset::Quick),
            "standard" => Ok(Preset::Standard),
            "spoiler_safe" => Ok(Preset::SpoilerSafe),
            "high_quality" => Ok(Preset::HighQuality),
            other => Err(anyhow!("Unknown preset: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectOptions {
    #[serde(default)]
    pub spoiler_safe_mode: bool,
    #[serde(default = "default_spoiler_risk_threshold")]
    pub spoiler_risk_threshold: f64,
    /// Recorded in timeline metadata only
    #[serde(default)]
    pub max_duration: Option<f64>,
    /// Recorded in timeline metadata only
    #[serde(default = "default_min_segment_length")]
    pub min_segment_length: f64,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_copyright_min_gap")]
    pub copyright_min_gap: f64,
    #[serde(default)]
    pub preset: Preset,
}

fn default_spoiler_risk_threshold() -> f64 {
    0.3
}

fn default_min_segment_length() -> f64 {
    3.0
}

fn default_similarity_threshold() -> f64 {
    0.75
}

fn default_copyright_min_gap() -> f64 {
    30.0
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            spoiler_safe_mode: false,
            spoiler_risk_threshold: default_spoiler_risk_threshold(),
            max_duration: None,
            min_segment_length: default_min_segment_length(),
            similarity_threshold: default_similarity_threshold(),
            copyright_min_gap: default_copyright_min_gap(),
            preset: Preset::Standard,
        }
    }
}

impl ProjectOptions {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.spoiler_risk_threshold) {
            return Err(anyhow!("spoiler_risk_threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(anyhow!("similarity_threshold must be within [0, 1]"));
        }
        if self.copyright_min_gap < 0.0 {
            return Err(anyhow!("copyright_min_gap must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectEmbedding {
    pub model: String,
}

/// `configs/project.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    pub movie_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie_language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie_video_path: Option<String>,
    #[serde(default)]
    pub narration_srt_files: Vec<String>,
    #[serde(default)]
    pub options: ProjectOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<ProjectEmbedding>,
}

impl ProjectConfig {
    pub fn new(movie_id: impl Into<String>) -> Self {
        Self {
            movie_id: movie_id.into(),
            movie_duration: None,
            movie_language: None,
            movie_video_path: None,
            narration_srt_files: Vec::new(),
            options: ProjectOptions::default(),
            embedding: None,
        }
    }

    /// Missing config means defaults keyed on the project id
    pub async fn load_or_default(layout: &ProjectLayout) -> Result<Self> {
        let path = layout.project_config_path();
        if !path.exists() {
            return Ok(Self::new(layout.project_id()));
        }
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ProjectConfig =
            serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        config.options.validate()?;
        Ok(config)
    }

    pub async fn save(&self, layout: &ProjectLayout) -> Result<()> {
        let path = layout.project_config_path();
        fs::create_dir_all(layout.configs_dir()).await?;
        fs::write(&path, serde_json::to_string_pretty(self)?).await?;
        Ok(())
    }

    /// Options as recorded in timeline metadata
    pub fn timeline_options(&self) -> TimelineOptions {
        TimelineOptions {
            spoiler_safe_mode: self.options.spoiler_safe_mode,
            spoiler_risk_threshold: Some(self.options.spoiler_risk_threshold),
            max_duration: self.options.max_duration,
            min_segment_length: Some(self.options.min_segment_length),
            similarity_threshold: Some(self.options.similarity_threshold),
            min_time_gap: Some(self.options.copyright_min_gap),
            preset: Some(self.options.preset.as_str().to_string()),
            ..TimelineOptions::default()
        }
    }
}

/// Inputs for a new project
#[derive(Debug, Clone)]
pub struct NewProject {
    pub project_id: String,
    pub movie_srt: PathBuf,
    pub narration_srts: Vec<PathBuf>,
    pub movie_video: Option<PathBuf>,
    pub movie_duration: Option<f64>,
    pub movie_language: Option<String>,
    pub similarity_threshold: f64,
    pub copyright_min_gap: f64,
    pub embedding_model: String,
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        return Err(RecapCoreError::MissingInput(format!("{} not found: {}", what, path.display())).into());
    }
    Ok(())
}

/// Copy inputs into a fresh workspace and write `project.json`.
///
/// A single narration file is stored as `narration.srt`; several become
/// `narration_1.srt`, `narration_2.srt`, ...
pub async fn create_project(root: &Path, request: NewProject) -> Result<ProjectLayout> {
    require_file(&request.movie_srt, "Movie SRT file")?;
    if request.narration_srts.is_empty() {
        return Err(RecapCoreError::MissingInput("at least one narration SRT file is required".to_string()).into());
    }
    for narration in &request.narration_srts {
        require_file(narration, "Narration SRT file")?;
    }
    if let Some(video) = &request.movie_video {
        require_file(video, "Movie video file")?;
    }

    let layout = ProjectLayout::new(root, &request.project_id);
    layout.ensure_structure().await?;
    let data_dir = layout.data_dir();

    fs::copy(&request.movie_srt, data_dir.join("movie.srt")).await?;
    info!("📄 Copied movie SRT into {}", data_dir.display());

    let multiple = request.narration_srts.len() > 1;
    let mut narration_files = Vec::with_capacity(request.narration_srts.len());
    for (i, source) in request.narration_srts.iter().enumerate() {
        let name = if multiple {
            format!("narration_{}.srt", i + 1)
        } else {
            "narration.srt".to_string()
        };
        let dest = data_dir.join(name);
        fs::copy(source, &dest).await?;
        narration_files.push(dest.to_string_lossy().into_owned());
    }
    info!("🎙️ Copied {} narration SRT file(s)", narration_files.len());

    let movie_video_path = match &request.movie_video {
        Some(video) => {
            let file_name = video
                .file_name()
                .ok_or_else(|| anyhow!("Movie video path has no file name: {}", video.display()))?;
            let dest = data_dir.join(file_name);
            fs::copy(video, &dest).await?;
            Some(dest.to_string_lossy().into_owned())
        }
        None => None,
    };

    let config = ProjectConfig {
        movie_id: request.project_id.clone(),
        movie_duration: request.movie_duration,
        movie_language: request.movie_language,
        movie_video_path,
        narration_srt_files: narration_files,
        options: ProjectOptions {
            similarity_threshold: request.similarity_threshold,
            copyright_min_gap: request.copyright_min_gap,
            ..ProjectOptions::default()
        },
        embedding: Some(ProjectEmbedding {
            model: request.embedding_model,
        }),
    };
    config.options.validate()?;
    config.save(&layout).await?;

    info!("✅ Project {} created at {}", layout.project_id(), layout.project_dir().display());
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(path: &Path, content: &str) {
        fs::write(path, content).await.unwrap();
    }

    fn request(dir: &Path, narrations: Vec<PathBuf>) -> NewProject {
        NewProject {
            project_id: "tt0133093".to_string(),
            movie_srt: dir.join("movie_in.srt"),
            narration_srts: narrations,
            movie_video: None,
            movie_duration: Some(8160.0),
            movie_language: Some("en".to_string()),
            similarity_threshold: 0.8,
            copyright_min_gap: 45.0,
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_project_with_multiple_narrations() {
        let src = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        write(&src.path().join("movie_in.srt"), "1\n00:00:01,000 --> 00:00:02,000\nhi\n").await;
        write(&src.path().join("a.srt"), "").await;
        write(&src.path().join("b.srt"), "").await;

        let layout = create_project(
            root.path(),
            request(src.path(), vec![src.path().join("a.srt"), src.path().join("b.srt")]),
        )
        .await
        .unwrap();

        assert!(layout.data_dir().join("movie.srt").exists());
        assert!(layout.data_dir().join("narration_1.srt").exists());
        assert!(layout.data_dir().join("narration_2.srt").exists());
        assert!(layout.vector_store_dir().is_dir());

        let config = ProjectConfig::load_or_default(&layout).await.unwrap();
        assert_eq!(config.narration_srt_files.len(), 2);
        assert_eq!(config.options.copyright_min_gap, 45.0);
        assert_eq!(config.options.preset, Preset::Standard);
    }

    #[tokio::test]
    async fn test_single_narration_keeps_plain_name() {
        let src = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        write(&src.path().join("movie_in.srt"), "").await;
        write(&src.path().join("n.srt"), "").await;

        let layout = create_project(root.path(), request(src.path(), vec![src.path().join("n.srt")]))
            .await
            .unwrap();
        assert!(layout.data_dir().join("narration.srt").exists());
    }

    #[tokio::test]
    async fn test_missing_movie_srt_fails_before_creating_anything() {
        let src = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        let err = create_project(root.path(), request(src.path(), vec![src.path().join("n.srt")]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Movie SRT file not found"));
        assert!(!root.path().join("projects").exists());
    }

    #[test]
    fn test_project_json_defaults() {
        let config: ProjectConfig = serde_json::from_str(r#"{"movie_id":"tt1","options":{"preset":"spoiler_safe"}}"#).unwrap();
        assert_eq!(config.options.preset, Preset::SpoilerSafe);
        assert_eq!(config.options.similarity_threshold, 0.75);
        assert_eq!(config.options.spoiler_risk_threshold, 0.3);
        assert!(config.narration_srt_files.is_empty());

        let recorded = config.timeline_options();
        assert_eq!(recorded.min_segment_length, Some(3.0));
        assert_eq!(recorded.min_time_gap, Some(30.0));
        assert_eq!(recorded.preset.as_deref(), Some("spoiler_safe"));
    }

    #[test]
    fn test_preset_from_str() {
        assert_eq!("high_quality".parse::<Preset>().unwrap(), Preset::HighQuality);
        assert!("turbo".parse::<Preset>().is_err());
    }
}
