//! Recap Core - Shared data structures for narration-to-movie alignment

pub mod entry;
pub mod matches;
pub mod timeline;

pub use entry::TimedEntry;
pub use matches::{Match, SpoilerReason, SpoilerRisk};
pub use timeline::{Segment, Timeline, TimelineFormat, TimelineMetadata, TimelineOptions, TIMELINE_VERSION};

/// Result type for Recap Core operations
pub type Result<T> = std::result::Result<T, RecapCoreError>;

/// Error types for Recap Core operations
#[derive(thiserror::Error, Debug)]
pub enum RecapCoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Invalid timeline: {0}")]
    InvalidTimeline(String),

    /// An external collaborator (embedding service, vector store, ffmpeg)
    /// failed. `message` is the collaborator's own output, unmodified.
    #[error("{name} failed: {message}")]
    Collaborator { name: String, message: String },
}

impl RecapCoreError {
    pub fn collaborator(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            name: name.into(),
            message: message.into(),
        }
    }
}
