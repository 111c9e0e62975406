//! Timeline assembly and persistence

pub mod assembler;
pub mod writer;

pub use assembler::{
    AssembledTimeline, AssemblyOptions, AssemblyPhase, AssemblyReport, NarrationFile, NarrationTrack, NarrationWindow,
    TimelineAssembler, TimelineContext,
};
pub use writer::{commit_all, discard_all, load_timeline, save_timeline, stage_timeline, PendingWrite};
