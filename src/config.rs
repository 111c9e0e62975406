use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::chunking::ChunkBounds;
use crate::project::ProjectOptions;
use crate::render::RenderConfig;
use crate::search::EmbeddingConfig;
use crate::timeline::AssemblyOptions;

/// Configuration for the recap aligner
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Candidate quality and overlap settings
    pub matching: MatchingConfig,

    /// Temporal distribution of selected clips
    pub compliance: ComplianceConfig,

    /// Movie subtitle chunking for the index
    pub chunking: ChunkBounds,

    /// Embedding service settings
    pub embedding: EmbeddingConfig,

    /// FFmpeg settings
    pub render: RenderConfig,

    /// Output and storage settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum similarity score (inclusive)
    pub similarity_threshold: f64,
    /// Overlap ratio at which the weaker of two selections is dropped
    pub overlap_threshold: f64,
    /// Fuse selections closer than this many seconds; off when unset
    pub merge_threshold: Option<f64>,
    /// Ranked candidates requested per narration window
    pub top_k: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            overlap_threshold: 0.7,
            merge_threshold: None,
            top_k: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceConfig {
    /// Minimum movie-time distance between consecutive clip centers
    pub min_time_gap: f64,
    /// Narration walk step in seconds
    pub interval_seconds: f64,
}

impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            min_time_gap: 30.0,
            interval_seconds: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding `projects/`
    pub root_dir: PathBuf,
    pub log_level: String,
    /// Also write a minimal `timeline.json` into `root_dir`
    pub write_minimal_copy: bool,
    /// Mirror logs into `projects/{id}/logs/{stage}.log`
    pub project_log_files: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            log_level: "info".to_string(),
            write_minimal_copy: false,
            project_log_files: true,
        }
    }
}

fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("recap-aligner.toml"),
        PathBuf::from("config/recap-aligner.toml"),
    ];
    if let Ok(home) = std::env::var("HOME") {
        paths.push(PathBuf::from(home).join(".config/recap-aligner/config.toml"));
    }
    paths
}

impl Config {
    /// Load the first readable config file, then apply environment overrides
    pub fn load() -> Result<Self> {
        for path in config_paths() {
            if let Ok(config_str) = std::fs::read_to_string(&path) {
                match toml::from_str::<Config>(&config_str) {
                    Ok(mut config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path.display());
                        config.apply_env();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path.display(), e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load a specific file, then apply environment overrides
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config file {}: {}", path.display(), e))?;
        let mut config: Config =
            toml::from_str(&config_str).map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))?;
        config.apply_env();
        Ok(config)
    }

    /// Defaults with environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_parse("RECAP_ALIGNER_SIMILARITY_THRESHOLD") {
            self.matching.similarity_threshold = v;
        }
        if let Some(v) = env_parse("RECAP_ALIGNER_MIN_TIME_GAP") {
            self.compliance.min_time_gap = v;
        }
        if let Some(v) = env_parse("RECAP_ALIGNER_INTERVAL_SECONDS") {
            self.compliance.interval_seconds = v;
        }
        if let Ok(endpoint) = std::env::var("RECAP_ALIGNER_EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = endpoint;
        }
        if let Ok(model) = std::env::var("RECAP_ALIGNER_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(api_key) = std::env::var("RECAP_ALIGNER_API_KEY") {
            self.embedding.api_key = Some(api_key);
        }
        if let Ok(ffmpeg) = std::env::var("RECAP_ALIGNER_FFMPEG") {
            self.render.ffmpeg_path = ffmpeg;
        }
        if let Ok(root) = std::env::var("RECAP_ALIGNER_ROOT") {
            self.output.root_dir = PathBuf::from(root);
        }
        if let Ok(log_level) = std::env::var("RECAP_ALIGNER_LOG_LEVEL") {
            self.output.log_level = log_level;
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.matching.similarity_threshold) {
            return Err(anyhow!("similarity_threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.matching.overlap_threshold) {
            return Err(anyhow!("overlap_threshold must be within [0, 1]"));
        }
        if self.matching.top_k == 0 {
            return Err(anyhow!("top_k must be greater than 0"));
        }
        if self.compliance.interval_seconds <= 0.0 {
            return Err(anyhow!("interval_seconds must be greater than 0"));
        }
        if self.compliance.min_time_gap < 0.0 {
            return Err(anyhow!("min_time_gap must not be negative"));
        }

        let bounds = &self.chunking;
        if bounds.min_duration > bounds.max_duration || bounds.min_words > bounds.max_words {
            return Err(anyhow!("chunking minimums must not exceed maximums"));
        }
        if bounds.max_duration <= 0.0 {
            return Err(anyhow!("chunking max_duration must be greater than 0"));
        }

        if self.embedding.endpoint.is_empty() {
            return Err(anyhow!("embedding endpoint must be set"));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Project options win over the config file when the project has them
    pub fn assembly_options(&self, project: Option<&ProjectOptions>) -> AssemblyOptions {
        let mut options = AssemblyOptions {
            similarity_threshold: self.matching.similarity_threshold,
            overlap_threshold: self.matching.overlap_threshold,
            merge_threshold: self.matching.merge_threshold,
            min_time_gap: self.compliance.min_time_gap,
            interval_seconds: self.compliance.interval_seconds,
            spoiler_risk_threshold: None,
        };
        if let Some(project) = project {
            options.similarity_threshold = project.similarity_threshold;
            options.min_time_gap = project.copyright_min_gap;
            if project.spoiler_safe_mode {
                options.spoiler_risk_threshold = Some(project.spoiler_risk_threshold);
            }
        }
        options
    }

    pub fn summary(&self) -> String {
        format!(
            "Recap Aligner Configuration:\n\
            - Similarity Threshold: {}\n\
            - Overlap Threshold: {}\n\
            - Merge Threshold: {}\n\
            - Min Time Gap: {}s\n\
            - Interval: {}s\n\
            - Top K: {}\n\
            - Embedding Model: {}\n\
            - Embedding Endpoint: {}\n\
            - Embedding Cache: {}\n\
            - Projects Root: {}",
            self.matching.similarity_threshold,
            self.matching.overlap_threshold,
            self.matching
                .merge_threshold
                .map(|m| format!("{}s", m))
                .unwrap_or_else(|| "off".to_string()),
            self.compliance.min_time_gap,
            self.compliance.interval_seconds,
            self.matching.top_k,
            self.embedding.model,
            self.embedding.endpoint,
            self.embedding.cache_enabled,
            self.output.root_dir.display()
        )
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring {}: cannot parse '{}'", key, raw);
            None
        }
    }
}

/// Configuration builder for programmatic setup
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.config.matching.similarity_threshold = threshold;
        self
    }

    pub fn with_overlap_threshold(mut self, threshold: f64) -> Self {
        self.config.matching.overlap_threshold = threshold;
        self
    }

    pub fn with_merge_threshold(mut self, threshold: Option<f64>) -> Self {
        self.config.matching.merge_threshold = threshold;
        self
    }

    pub fn with_min_time_gap(mut self, gap: f64) -> Self {
        self.config.compliance.min_time_gap = gap;
        self
    }

    pub fn with_interval(mut self, seconds: f64) -> Self {
        self.config.compliance.interval_seconds = seconds;
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.config.matching.top_k = k;
        self
    }

    pub fn with_embedding_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.embedding.endpoint = endpoint.into();
        self
    }

    pub fn with_root_dir(mut self, dir: PathBuf) -> Self {
        self.config.output.root_dir = dir;
        self
    }

    pub fn enable_caching(mut self, enable: bool) -> Self {
        self.config.embedding.cache_enabled = enable;
        self
    }

    pub fn write_minimal_copy(mut self, enable: bool) -> Self {
        self.config.output.write_minimal_copy = enable;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.matching.similarity_threshold, 0.75);
        assert_eq!(config.matching.overlap_threshold, 0.7);
        assert_eq!(config.compliance.min_time_gap, 30.0);
        assert_eq!(config.compliance.interval_seconds, 4.0);
        assert_eq!(config.chunking.max_words, 200);
        assert!(config.matching.merge_threshold.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_similarity_threshold(0.6)
            .with_min_time_gap(45.0)
            .with_top_k(5)
            .enable_caching(false)
            .build();

        assert_eq!(config.matching.similarity_threshold, 0.6);
        assert_eq!(config.compliance.min_time_gap, 45.0);
        assert_eq!(config.matching.top_k, 5);
        assert!(!config.embedding.cache_enabled);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_ok());
        assert!(ConfigBuilder::new().with_interval(0.0).build().validate().is_err());
        assert!(ConfigBuilder::new().with_similarity_threshold(1.5).build().validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [matching]
            similarity_threshold = 0.8
            merge_threshold = 5.0

            [chunking]
            min_duration = 5.0
            max_duration = 15.0
            min_words = 50
            max_words = 120
            "#,
        )
        .unwrap();

        assert_eq!(config.matching.similarity_threshold, 0.8);
        assert_eq!(config.matching.merge_threshold, Some(5.0));
        assert_eq!(config.matching.top_k, 3);
        assert_eq!(config.compliance.min_time_gap, 30.0);
        assert_eq!(config.chunking.max_words, 120);
    }

    #[test]
    fn test_project_options_override_config() {
        let config = ConfigBuilder::new().with_min_time_gap(10.0).build();
        assert_eq!(config.assembly_options(None).min_time_gap, 10.0);

        let project = ProjectOptions {
            copyright_min_gap: 60.0,
            spoiler_safe_mode: true,
            ..ProjectOptions::default()
        };
        let options = config.assembly_options(Some(&project));
        assert_eq!(options.min_time_gap, 60.0);
        assert_eq!(options.spoiler_risk_threshold, Some(0.3));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ConfigBuilder::new().with_merge_threshold(Some(3.0)).build();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.matching.merge_threshold, Some(3.0));
    }
}
