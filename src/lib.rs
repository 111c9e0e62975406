/// Recap Aligner
///
/// Aligns narration subtitles with positions in a movie by semantic
/// similarity and selects an ordered, non-overlapping, temporally spread
/// set of movie segments to render under the narration audio.

pub mod chunking;
pub mod config;
pub mod logging;
pub mod matching;
pub mod project;
pub mod render;
pub mod search;
pub mod stages;
pub mod subtitles;
pub mod timeline;

pub use crate::chunking::{chunk, chunk_bounded, sliding_window, Chunk, ChunkBounds, ChunkStrategy};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::matching::{
    apply_compliance_filter, detect_overlaps, filter_by_threshold, merge_nearby_segments, remove_severe_overlaps,
    ComplianceState, TemporalFilter,
};
pub use crate::project::{create_project, NewProject, ProjectConfig, ProjectLayout};
pub use crate::render::{FfmpegRenderer, RenderConfig};
pub use crate::search::{EmbeddingProvider, SimilaritySearch};
pub use crate::stages::{run_pipeline, run_stage, Stage, StageContext};
pub use crate::timeline::{AssemblyOptions, TimelineAssembler};

pub use recap_core::{Match, RecapCoreError, Segment, SpoilerRisk, TimedEntry, Timeline, TimelineFormat};
