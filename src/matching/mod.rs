//! Candidate selection: quality threshold, overlap resolution, temporal
//! distribution and spoiler filtering over ranked matches

pub mod candidates;
pub mod compliance;
pub mod overlap;
pub mod spoilers;

pub use candidates::{filter_by_threshold, group_by_window, rank_candidates, CandidateGroup};
pub use compliance::{apply_compliance_filter, ComplianceState, TemporalFilter, WindowSelection};
pub use overlap::{detect_overlaps, merge_nearby_segments, overlap_losers, remove_severe_overlaps, OverlapPair};
pub use spoilers::{filter_by_spoiler_risk, load_spoiler_risks};
