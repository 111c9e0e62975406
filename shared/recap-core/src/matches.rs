//! Candidate matches between narration windows and movie segments

use serde::{Deserialize, Serialize};

/// A candidate movie segment returned for one narration window.
///
/// Every filtering and assembly step works on this one type; adapters for the
/// search backend and the persisted search output convert at the edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Identifier of the indexed movie chunk
    pub segment_id: String,
    /// Movie segment start (seconds)
    pub start_time: f64,
    /// Movie segment end (seconds)
    pub end_time: f64,
    /// Similarity in [0, 1], higher is better
    pub similarity_score: f64,
    /// Narration text that produced this match
    #[serde(default)]
    pub narration_text: String,
    /// Narration time of the window center entry (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_time: Option<f64>,
    /// Which narration file the window came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration_file_id: Option<String>,
}

impl Match {
    pub fn new(segment_id: impl Into<String>, start_time: f64, end_time: f64, similarity_score: f64) -> Self {
        Self {
            segment_id: segment_id.into(),
            start_time,
            end_time,
            similarity_score,
            narration_text: String::new(),
            narration_time: None,
            narration_file_id: None,
        }
    }

    pub fn with_narration_text(mut self, text: impl Into<String>) -> Self {
        self.narration_text = text.into();
        self
    }

    pub fn with_narration_time(mut self, time: f64) -> Self {
        self.narration_time = Some(time);
        self
    }

    pub fn with_narration_file(mut self, file_id: impl Into<String>) -> Self {
        self.narration_file_id = Some(file_id.into());
        self
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Movie-time center, the unit of temporal-distribution comparison
    pub fn center(&self) -> f64 {
        (self.start_time + self.end_time) / 2.0
    }
}

/// Why a segment is considered a spoiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SpoilerReason {
    PlotTwist,
    Ending,
    CharacterDeath,
    #[default]
    None,
}

/// Spoiler risk assessment for one indexed segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpoilerRisk {
    /// 0 = safe, 1 = severe spoiler
    pub risk: f64,
    #[serde(default)]
    pub reason: SpoilerReason,
    #[serde(default)]
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_and_duration() {
        let m = Match::new("movie_000001", 90.0, 110.0, 0.8);
        assert_eq!(m.center(), 100.0);
        assert_eq!(m.duration(), 20.0);
    }

    #[test]
    fn test_optional_fields_skipped_in_json() {
        let m = Match::new("movie_000001", 0.0, 10.0, 0.9);
        let json = serde_json::to_string(&m).unwrap();
        assert!(!json.contains("narration_time"));
        assert!(!json.contains("narration_file_id"));

        let tagged = m.with_narration_time(12.5).with_narration_file("narration_0");
        let json = serde_json::to_string(&tagged).unwrap();
        assert!(json.contains("\"narration_time\":12.5"));
        assert!(json.contains("\"narration_file_id\":\"narration_0\""));
    }

    #[test]
    fn test_spoiler_reason_snake_case() {
        let risk: SpoilerRisk = serde_json::from_str(r#"{"risk":0.8,"reason":"plot_twist"}"#).unwrap();
        assert_eq!(risk.reason, SpoilerReason::PlotTwist);
        assert_eq!(risk.confidence, 0.0);
    }
}
