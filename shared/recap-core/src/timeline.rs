//! Timeline document: the ordered list of movie segments handed to the renderer

use crate::{Match, RecapCoreError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema version written into timeline metadata
pub const TIMELINE_VERSION: &str = "1.0";

/// One movie range in the output timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment start time in seconds
    pub start: f64,
    /// Segment end time in seconds
    pub end: f64,
    /// Similarity score of the match that produced this segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Clip priority (1-10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            score: None,
            priority: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

impl From<&Match> for Segment {
    fn from(m: &Match) -> Self {
        Segment::new(m.start_time, m.end_time).with_score(m.similarity_score)
    }
}

/// Options that were in effect when the timeline was generated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimelineOptions {
    #[serde(default)]
    pub spoiler_safe_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spoiler_risk_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_segment_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_time_gap: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
}

/// Provenance of a generated timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimelineMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movie_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<TimelineOptions>,
}

impl TimelineMetadata {
    /// Metadata stamped with the current time and schema version
    pub fn generated_now(project_id: Option<String>, movie_id: Option<String>, options: Option<TimelineOptions>) -> Self {
        Self {
            project_id,
            movie_id,
            generated_at: Some(Utc::now()),
            version: Some(TIMELINE_VERSION.to_string()),
            options,
        }
    }
}

/// Output variants of the timeline document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineFormat {
    /// Every field, including scores and metadata
    Full,
    /// Only paths and `{start, end}` pairs, for older renderers
    Minimal,
}

/// Timeline document consumed by the renderer.
///
/// `segments` are in narration order, which is not necessarily ordered by
/// `start`: consecutive clips may jump around the movie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    /// Path to the input movie
    pub input: String,
    /// Path to the narration audio
    pub narration: String,
    /// Path of the rendered output
    pub output: String,
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TimelineMetadata>,
}

impl Timeline {
    pub fn new(input: impl Into<String>, narration: impl Into<String>, output: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            input: input.into(),
            narration: narration.into(),
            output: output.into(),
            segments,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: TimelineMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sum of all segment durations in seconds
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Copy with every optional field stripped
    pub fn to_minimal(&self) -> Self {
        Self {
            input: self.input.clone(),
            narration: self.narration.clone(),
            output: self.output.clone(),
            segments: self
                .segments
                .iter()
                .map(|s| Segment::new(s.start, s.end))
                .collect(),
            metadata: None,
        }
    }

    /// Check the structural invariants of every segment
    pub fn validate(&self) -> Result<()> {
        for (i, segment) in self.segments.iter().enumerate() {
            if !segment.start.is_finite() || !segment.end.is_finite() {
                return Err(RecapCoreError::InvalidTimeline(format!(
                    "segment {} has a non-finite time",
                    i
                )));
            }
            if segment.start < 0.0 {
                return Err(RecapCoreError::InvalidTimeline(format!(
                    "segment {} starts before zero ({})",
                    i, segment.start
                )));
            }
            if segment.end <= segment.start {
                return Err(RecapCoreError::InvalidTimeline(format!(
                    "segment {} ends at {} which is not after its start {}",
                    i, segment.end, segment.start
                )));
            }
            if let Some(score) = segment.score {
                if !(0.0..=1.0).contains(&score) {
                    return Err(RecapCoreError::InvalidTimeline(format!(
                        "segment {} has score {} outside [0, 1]",
                        i, score
                    )));
                }
            }
            if let Some(priority) = segment.priority {
                if !(1..=10).contains(&priority) {
                    return Err(RecapCoreError::InvalidTimeline(format!(
                        "segment {} has priority {} outside 1-10",
                        i, priority
                    )));
                }
            }
        }
        Ok(())
    }

    /// Serialize to pretty JSON in the requested variant
    pub fn to_json(&self, format: TimelineFormat) -> Result<String> {
        let json = match format {
            TimelineFormat::Full => serde_json::to_string_pretty(self)?,
            TimelineFormat::Minimal => serde_json::to_string_pretty(&self.to_minimal())?,
        };
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
