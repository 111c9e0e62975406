//! Timed text entries produced by the subtitle parser

use serde::{Deserialize, Serialize};

/// One subtitle block: a span of seconds and the text spoken in it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedEntry {
    /// Sequential number from the subtitle file
    pub index: u32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds (>= start)
    pub end: f64,
    /// Subtitle text, trimmed
    pub text: String,
}

impl TimedEntry {
    /// Create a new entry. An end before the start is clamped to the start.
    pub fn new(index: u32, start: f64, end: f64, text: impl Into<String>) -> Self {
        let text: String = text.into();
        Self {
            index,
            start,
            end: end.max(start),
            text: text.trim().to_string(),
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Whether `instant` falls inside `[start, end)`
    pub fn covers(&self, instant: f64) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Copy of this entry moved by `offset` seconds
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            index: self.index,
            start: self.start + offset,
            end: self.end + offset,
            text: self.text.clone(),
        }
    }
}
