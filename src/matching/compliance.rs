//! Temporal distribution of selected clips
//!
//! Consecutive selections must sit at least `min_time_gap` seconds apart in
//! movie time (measured between segment centers). The filter is a greedy
//! single pass over narration order: each window is compared only with the
//! previously accepted selection, so a different narration order can keep a
//! different set. Windows with no compliant candidate are dropped and counted.

use recap_core::Match;
use serde::Serialize;
use tracing::debug;

/// Accumulator threaded through the filter
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ComplianceState {
    /// Center of the last accepted selection
    pub last_movie_time: Option<f64>,
    /// Windows whose primary candidate was accepted
    pub accepted_primary: usize,
    /// Windows served by a ranked alternative
    pub substituted: usize,
    /// Windows dropped because no candidate satisfied the gap
    pub dropped: usize,
}

impl ComplianceState {
    /// State that treats `movie_time` as the previous selection
    pub fn starting_at(movie_time: f64) -> Self {
        Self {
            last_movie_time: Some(movie_time),
            ..Self::default()
        }
    }

    pub fn accepted(&self) -> usize {
        self.accepted_primary + self.substituted
    }
}

/// Outcome for one narration window
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowSelection<'a> {
    Primary(&'a Match),
    /// `rank` is the candidate's position in the window's ranked list
    Alternative { rank: usize, candidate: &'a Match },
    Dropped,
    /// The window had no candidates at all
    Empty,
}

impl<'a> WindowSelection<'a> {
    pub fn selected(&self) -> Option<&'a Match> {
        match *self {
            WindowSelection::Primary(m) => Some(m),
            WindowSelection::Alternative { candidate, .. } => Some(candidate),
            WindowSelection::Dropped | WindowSelection::Empty => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemporalFilter {
    pub min_time_gap: f64,
}

impl TemporalFilter {
    pub fn new(min_time_gap: f64) -> Self {
        Self { min_time_gap }
    }

    fn satisfies(&self, last: Option<f64>, candidate: &Match) -> bool {
        match last {
            None => true,
            Some(last) => (candidate.center() - last).abs() >= self.min_time_gap,
        }
    }

    /// Pick a candidate for one window, best first.
    ///
    /// `candidates[0]` is the primary; the rest are alternatives in rank
    /// order. Returns the advanced state alongside the selection.
    pub fn select_window<'a>(&self, state: ComplianceState, candidates: &'a [Match]) -> (ComplianceState, WindowSelection<'a>) {
        let mut next = state;

        let Some(primary) = candidates.first() else {
            return (next, WindowSelection::Empty);
        };

        if self.satisfies(state.last_movie_time, primary) {
            next.last_movie_time = Some(primary.center());
            next.accepted_primary += 1;
            return (next, WindowSelection::Primary(primary));
        }

        let alternative = candidates
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, c)| self.satisfies(state.last_movie_time, c));

        match alternative {
            Some((rank, candidate)) => {
                debug!(
                    "Substituting rank {} candidate {} for {} (center {:.1} vs last {:?})",
                    rank,
                    candidate.segment_id,
                    primary.segment_id,
                    primary.center(),
                    state.last_movie_time
                );
                next.last_movie_time = Some(candidate.center());
                next.substituted += 1;
                (next, WindowSelection::Alternative { rank, candidate })
            }
            None => {
                debug!(
                    "Dropping window for {}: no candidate at least {}s from {:?}",
                    primary.segment_id, self.min_time_gap, state.last_movie_time
                );
                next.dropped += 1;
                (next, WindowSelection::Dropped)
            }
        }
    }

    /// Fold [`select_window`](Self::select_window) over windows in narration order
    pub fn apply<W>(&self, initial: ComplianceState, windows: &[W]) -> (ComplianceState, Vec<Match>)
    where
        W: AsRef<[Match]>,
    {
        windows
            .iter()
            .fold((initial, Vec::with_capacity(windows.len())), |(state, mut selected), window| {
                let (state, selection) = self.select_window(state, window.as_ref());
                selected.extend(selection.selected().cloned());
                (state, selected)
            })
    }
}

/// Filter narration-ordered windows from a fresh state
pub fn apply_compliance_filter<W>(windows: &[W], min_time_gap: f64) -> (Vec<Match>, ComplianceState)
where
    W: AsRef<[Match]>,
{
    let (state, selected) = TemporalFilter::new(min_time_gap).apply(ComplianceState::default(), windows);
    (selected, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn centered(id: &str, center: f64) -> Match {
        Match::new(id, center - 5.0, center + 5.0, 0.8)
    }

    fn centers(matches: &[Match]) -> Vec<f64> {
        matches.iter().map(Match::center).collect()
    }

    #[test]
    fn test_drops_close_window_without_alternatives() {
        let windows = vec![vec![centered("a", 100.0)], vec![centered("b", 110.0)], vec![centered("c", 500.0)]];
        let (selected, state) = apply_compliance_filter(&windows, 30.0);

        assert_eq!(centers(&selected), vec![100.0, 500.0]);
        assert_eq!(state.dropped, 1);
        assert_eq!(state.accepted(), 2);
        assert_eq!(state.last_movie_time, Some(500.0));
    }

    #[test]
    fn test_first_compliant_alternative_wins() {
        let windows = vec![
            vec![centered("a", 100.0)],
            vec![centered("b", 110.0), centered("b1", 120.0), centered("b2", 200.0), centered("b3", 300.0)],
            vec![centered("c", 215.0), centered("c1", 600.0)],
        ];
        let (selected, state) = apply_compliance_filter(&windows, 30.0);

        let ids: Vec<&str> = selected.iter().map(|m| m.segment_id.as_str()).collect();
        // Gap is checked against the substituted center (200), not the primary
        assert_eq!(ids, vec!["a", "b2", "c1"]);
        assert_eq!(state.substituted, 2);
    }

    #[test]
    fn test_injected_state_applies_to_first_window() {
        let filter = TemporalFilter::new(30.0);
        let candidates = vec![centered("near", 110.0), centered("far", 150.0)];

        let (state, selection) = filter.select_window(ComplianceState::starting_at(100.0), &candidates);
        assert!(matches!(selection, WindowSelection::Alternative { rank: 1, .. }));
        assert_eq!(state.last_movie_time, Some(150.0));

        let (fresh, selection) = filter.select_window(ComplianceState::default(), &candidates);
        assert!(matches!(selection, WindowSelection::Primary(_)));
        assert_eq!(fresh.last_movie_time, Some(110.0));
    }

    #[test]
    fn test_gap_boundary_is_accepted() {
        let windows = vec![vec![centered("a", 100.0)], vec![centered("b", 130.0)]];
        let (selected, _) = apply_compliance_filter(&windows, 30.0);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_empty_window_is_not_counted_as_dropped() {
        let windows: Vec<Vec<Match>> = vec![vec![], vec![centered("a", 10.0)]];
        let (selected, state) = apply_compliance_filter(&windows, 30.0);
        assert_eq!(selected.len(), 1);
        assert_eq!(state.dropped, 0);
    }

    #[test]
    fn test_gap_invariant_holds_for_every_consecutive_pair() {
        let windows: Vec<Vec<Match>> = (0..60)
            .map(|i| {
                (0..3)
                    .map(|rank| centered(&format!("w{}r{}", i, rank), ((i * 17 + rank * 41) % 400) as f64))
                    .collect()
            })
            .collect();
        let (selected, state) = apply_compliance_filter(&windows, 30.0);

        assert_eq!(selected.len() + state.dropped, windows.len());
        for pair in selected.windows(2) {
            assert!((pair[1].center() - pair[0].center()).abs() >= 30.0);
        }
    }

    #[test]
    fn test_reapplying_to_compliant_sequence_is_identity() {
        let windows = vec![vec![centered("a", 0.0)], vec![centered("b", 40.0)], vec![centered("c", 5.0)]];
        let (first, _) = apply_compliance_filter(&windows, 30.0);
        let singles: Vec<Vec<Match>> = first.iter().cloned().map(|m| vec![m]).collect();
        let (second, state) = apply_compliance_filter(&singles, 30.0);
        assert_eq!(first, second);
        assert_eq!(state.dropped, 0);
    }
}
