use std::collections::HashMap;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use recap_core::{Match, Segment, SpoilerRisk, Timeline, TimelineMetadata, TimelineOptions, TimedEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::chunking::sliding_window;
use crate::matching::{
    filter_by_spoiler_risk, filter_by_threshold, group_by_window, merge_nearby_segments, overlap_losers, ComplianceState,
    TemporalFilter, WindowSelection,
};

/// Phases of one assembly run, always visited in declaration order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AssemblyPhase {
    Init,
    /// Narration files become a track of sliding windows
    Chunking,
    /// Threshold, spoiler filter and the interval walk
    CandidateFiltering,
    OverlapResolution,
    /// Whole-sequence compliance pass
    TemporalFiltering,
    Assembled,
}

impl AssemblyPhase {
    pub fn next(&self) -> AssemblyPhase {
        match self {
            AssemblyPhase::Init => AssemblyPhase::Chunking,
            AssemblyPhase::Chunking => AssemblyPhase::CandidateFiltering,
            AssemblyPhase::CandidateFiltering => AssemblyPhase::OverlapResolution,
            AssemblyPhase::OverlapResolution => AssemblyPhase::TemporalFiltering,
            AssemblyPhase::TemporalFiltering => AssemblyPhase::Assembled,
            AssemblyPhase::Assembled => AssemblyPhase::Assembled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyOptions {
    pub similarity_threshold: f64,
    pub overlap_threshold: f64,
    /// Fuse selections closer than this many seconds. Each fused segment
    /// takes the narration position of the earliest selection it absorbed.
    pub merge_threshold: Option<f64>,
    pub min_time_gap: f64,
    pub interval_seconds: f64,
    /// Spoiler filtering is active when set
    pub spoiler_risk_threshold: Option<f64>,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            overlap_threshold: 0.7,
            merge_threshold: None,
            min_time_gap: 30.0,
            interval_seconds: 4.0,
            spoiler_risk_threshold: None,
        }
    }
}

impl AssemblyOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.interval_seconds.is_finite() && self.interval_seconds > 0.0) {
            bail!("interval_seconds must be positive, got {}", self.interval_seconds);
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            bail!("similarity_threshold must be within [0, 1], got {}", self.similarity_threshold);
        }
        if !(0.0..=1.0).contains(&self.overlap_threshold) {
            bail!("overlap_threshold must be within [0, 1], got {}", self.overlap_threshold);
        }
        if !(self.min_time_gap >= 0.0) {
            bail!("min_time_gap must not be negative, got {}", self.min_time_gap);
        }
        if let Some(merge) = self.merge_threshold {
            if !(merge >= 0.0) {
                bail!("merge_threshold must not be negative, got {}", merge);
            }
        }
        Ok(())
    }
}

/// Parsed entries of one narration subtitle file
#[derive(Debug, Clone)]
pub struct NarrationFile {
    /// `narration_{n}`, matching the id recorded on search results
    pub file_id: String,
    pub entries: Vec<TimedEntry>,
}

/// One sliding narration window placed on the combined track
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationWindow {
    pub file_id: String,
    /// Start of the center entry within its own file; the search lookup key
    pub local_time: f64,
    /// Span of the center entry on the combined track
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl NarrationWindow {
    fn covers(&self, instant: f64) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// All narration files laid end to end
#[derive(Debug, Clone, Default)]
pub struct NarrationTrack {
    windows: Vec<NarrationWindow>,
    end: f64,
}

impl NarrationTrack {
    /// Each file is offset by the end of the file before it
    pub fn from_files(files: &[NarrationFile]) -> Self {
        let mut windows = Vec::new();
        let mut offset = 0.0;

        for file in files {
            for chunk in sliding_window(&file.entries) {
                let center = chunk.center_entry().shifted(offset);
                windows.push(NarrationWindow {
                    file_id: file.file_id.clone(),
                    local_time: chunk.center_entry().start,
                    start: center.start,
                    end: center.end,
                    text: chunk.text.clone(),
                });
            }
            if let Some(last) = file.entries.iter().map(|e| e.end).reduce(f64::max) {
                offset += last;
            }
        }

        windows.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal));
        Self { windows, end: offset }
    }

    pub fn windows(&self) -> &[NarrationWindow] {
        &self.windows
    }

    /// End of the combined track in seconds
    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

/// Counters describing how a run went
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub windows: usize,
    /// Interval instants visited by the walk
    pub steps: usize,
    pub candidates_in: usize,
    pub candidates_kept: usize,
    /// Walk instants whose window had no candidates left
    pub no_candidates: usize,
    pub dropped_for_compliance: usize,
    pub substituted: usize,
    pub removed_overlaps: usize,
    pub merged: usize,
    pub selected: usize,
    pub phase_times: HashMap<AssemblyPhase, f64>,
}

/// Paths and provenance written into the timeline
#[derive(Debug, Clone, Default)]
pub struct TimelineContext {
    pub input: String,
    pub narration: String,
    pub output: String,
    pub project_id: Option<String>,
    pub movie_id: Option<String>,
    pub options: TimelineOptions,
}

#[derive(Debug, Clone)]
pub struct AssembledTimeline {
    pub timeline: Timeline,
    /// Selected matches in timeline order
    pub selected: Vec<Match>,
    pub report: AssemblyReport,
}

type WindowKey = (String, u64);

/// Turns ranked search results into a timeline
pub struct TimelineAssembler {
    options: AssemblyOptions,
    spoiler_risks: Option<HashMap<String, SpoilerRisk>>,
    phase: AssemblyPhase,
    phase_started: Instant,
    report: AssemblyReport,
}

impl TimelineAssembler {
    pub fn new(options: AssemblyOptions) -> Self {
        Self {
            options,
            spoiler_risks: None,
            phase: AssemblyPhase::Init,
            phase_started: Instant::now(),
            report: AssemblyReport::default(),
        }
    }

    pub fn with_spoiler_risks(mut self, risks: HashMap<String, SpoilerRisk>) -> Self {
        self.spoiler_risks = Some(risks);
        self
    }

    pub fn phase(&self) -> AssemblyPhase {
        self.phase
    }

    fn advance(&mut self) {
        let elapsed = self.phase_started.elapsed().as_secs_f64();
        self.report.phase_times.insert(self.phase, elapsed);
        self.phase = self.phase.next();
        self.phase_started = Instant::now();
        debug!("Assembly phase: {:?}", self.phase);
    }

    /// Run every phase once. Nothing is returned unless every phase succeeds.
    pub fn assemble(mut self, narration: &[NarrationFile], matches: Vec<Match>, context: TimelineContext) -> Result<AssembledTimeline> {
        if self.phase != AssemblyPhase::Init {
            bail!("assembler already ran (phase {:?})", self.phase);
        }
        self.options.validate().context("Invalid assembly options")?;

        self.advance();
        let track = NarrationTrack::from_files(narration);
        if track.is_empty() {
            bail!("narration track has no entries");
        }
        self.report.windows = track.windows().len();
        info!(
            "🎙️ Narration track: {} windows over {:.1}s",
            track.windows().len(),
            track.end()
        );

        self.advance();
        let candidates = self.filter_candidates(matches);
        let walked = self.walk(&track, &candidates);

        self.advance();
        let resolved = self.resolve_overlaps(walked);

        self.advance();
        let filter = TemporalFilter::new(self.options.min_time_gap);
        let (state, selected) = filter.apply(ComplianceState::default(), &resolved);
        self.report.dropped_for_compliance += state.dropped;
        self.report.substituted += state.substituted;
        self.report.selected = selected.len();

        self.advance();
        let segments: Vec<Segment> = selected.iter().map(Segment::from).collect();
        let metadata = TimelineMetadata::generated_now(context.project_id, context.movie_id, Some(context.options));
        let timeline = Timeline::new(context.input, context.narration, context.output, segments).with_metadata(metadata);
        timeline.validate().context("Assembled timeline failed validation")?;

        // Assembled is terminal; record its time directly
        self.report
            .phase_times
            .insert(AssemblyPhase::Assembled, self.phase_started.elapsed().as_secs_f64());

        info!(
            "🎬 Assembled {} segments ({:.1}s of footage)",
            timeline.segments.len(),
            timeline.total_duration()
        );

        Ok(AssembledTimeline {
            timeline,
            selected,
            report: self.report,
        })
    }

    /// Drop degenerate, weak and spoiler matches, then group them by window
    fn filter_candidates(&mut self, matches: Vec<Match>) -> HashMap<WindowKey, Vec<Match>> {
        self.report.candidates_in = matches.len();

        let usable: Vec<Match> = matches
            .into_iter()
            .filter(|m| m.start_time.is_finite() && m.end_time > m.start_time)
            .collect();
        let mut kept = filter_by_threshold(&usable, self.options.similarity_threshold);

        if let (Some(threshold), Some(risks)) = (self.options.spoiler_risk_threshold, &self.spoiler_risks) {
            kept = filter_by_spoiler_risk(kept, risks, threshold);
        }
        self.report.candidates_kept = kept.len();

        let mut index = HashMap::new();
        for group in group_by_window(kept) {
            let (Some(file_id), Some(time)) = (group.narration_file_id, group.narration_time) else {
                debug!("Ignoring {} candidates without a narration window", group.candidates.len());
                continue;
            };
            index.insert((file_id, time.to_bits()), group.candidates);
        }

        info!(
            "🔍 {} of {} candidates passed filtering ({} windows)",
            self.report.candidates_kept,
            self.report.candidates_in,
            index.len()
        );
        index
    }

    /// Step through the track and select a candidate at every covered instant.
    ///
    /// A window longer than the interval is selected once per instant it
    /// covers, each time against the last accepted center. Returns, per
    /// accepted instant, the chosen match followed by the remaining
    /// candidates in rank order.
    fn walk(&mut self, track: &NarrationTrack, candidates: &HashMap<WindowKey, Vec<Match>>) -> Vec<Vec<Match>> {
        let filter = TemporalFilter::new(self.options.min_time_gap);
        let windows = track.windows();
        let mut state = ComplianceState::default();
        let mut selections = Vec::new();
        let mut cursor = 0;
        let mut step = 0usize;

        loop {
            let instant = step as f64 * self.options.interval_seconds;
            if instant >= track.end() {
                break;
            }
            step += 1;

            while cursor < windows.len() && windows[cursor].end <= instant {
                cursor += 1;
            }
            let Some(window) = windows.get(cursor).filter(|w| w.covers(instant)) else {
                continue;
            };

            let ranked = match candidates.get(&(window.file_id.clone(), window.local_time.to_bits())) {
                Some(ranked) if !ranked.is_empty() => ranked,
                _ => {
                    self.report.no_candidates += 1;
                    continue;
                }
            };

            let (next, selection) = filter.select_window(state, ranked);
            state = next;
            let chosen = match selection {
                WindowSelection::Primary(_) => 0,
                WindowSelection::Alternative { rank, .. } => rank,
                WindowSelection::Dropped | WindowSelection::Empty => continue,
            };

            let mut ordered = Vec::with_capacity(ranked.len());
            ordered.push(ranked[chosen].clone());
            ordered.extend(
                ranked
                    .iter()
                    .enumerate()
                    .filter(|(rank, _)| *rank != chosen)
                    .map(|(_, m)| m.clone()),
            );
            selections.push(ordered);
        }

        self.report.steps = step;
        self.report.dropped_for_compliance += state.dropped;
        self.report.substituted += state.substituted;
        debug!(
            "Interval walk: {} steps, {} selections, {} dropped",
            step,
            selections.len(),
            state.dropped
        );
        selections
    }

    fn resolve_overlaps(&mut self, selections: Vec<Vec<Match>>) -> Vec<Vec<Match>> {
        let chosen: Vec<Match> = selections.iter().map(|s| s[0].clone()).collect();
        let losers = overlap_losers(&chosen, self.options.overlap_threshold);
        self.report.removed_overlaps = losers.iter().filter(|gone| **gone).count();

        let survivors: Vec<Vec<Match>> = selections
            .into_iter()
            .zip(losers)
            .filter(|(_, gone)| !gone)
            .map(|(selection, _)| selection)
            .collect();

        let Some(merge_threshold) = self.options.merge_threshold else {
            return survivors;
        };

        let chosen: Vec<Match> = survivors.iter().map(|s| s[0].clone()).collect();
        let mut merged = merge_nearby_segments(&chosen, merge_threshold);
        self.report.merged = chosen.len() - merged.len();

        // Merged ranges are disjoint, so every survivor lies in exactly one;
        // order them by the first survivor in narration order they contain
        merged.sort_by_cached_key(|m| {
            chosen
                .iter()
                .position(|c| c.start_time >= m.start_time && c.end_time <= m.end_time)
                .unwrap_or(usize::MAX)
        });
        merged.into_iter().map(|m| vec![m]).collect()
    }
}
