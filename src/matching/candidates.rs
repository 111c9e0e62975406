use std::cmp::Ordering;
use std::collections::HashMap;

use recap_core::Match;
use tracing::debug;

/// Keep matches whose similarity is at least `threshold`
pub fn filter_by_threshold(matches: &[Match], threshold: f64) -> Vec<Match> {
    matches
        .iter()
        .filter(|m| m.similarity_score >= threshold)
        .cloned()
        .collect()
}

/// Best-first order: score descending, then earliest narration time.
///
/// The sort is stable, so equal candidates keep the order the search
/// backend returned them in.
pub fn rank_candidates(mut matches: Vec<Match>) -> Vec<Match> {
    matches.sort_by(compare_rank);
    matches
}

fn compare_rank(a: &Match, b: &Match) -> Ordering {
    b.similarity_score
        .partial_cmp(&a.similarity_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| match (a.narration_time, b.narration_time) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Ranked candidates for one narration window
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateGroup {
    pub narration_file_id: Option<String>,
    pub narration_time: Option<f64>,
    pub narration_text: String,
    /// Best first
    pub candidates: Vec<Match>,
}

impl CandidateGroup {
    pub fn primary(&self) -> Option<&Match> {
        self.candidates.first()
    }

    pub fn alternatives(&self) -> &[Match] {
        self.candidates.get(1..).unwrap_or(&[])
    }
}

type WindowKey = (Option<String>, Option<u64>);

fn window_key(m: &Match) -> WindowKey {
    (m.narration_file_id.clone(), m.narration_time.map(f64::to_bits))
}

/// Group matches by the narration window that produced them.
///
/// Groups appear in first-seen order. A window whose matches arrive as one
/// contiguous run keeps the backend ranking untouched; a window that receives
/// matches from several runs is re-ranked with [`rank_candidates`].
pub fn group_by_window(matches: Vec<Match>) -> Vec<CandidateGroup> {
    let mut groups: Vec<CandidateGroup> = Vec::new();
    let mut merged: Vec<bool> = Vec::new();
    let mut index: HashMap<WindowKey, usize> = HashMap::new();
    let mut previous: Option<usize> = None;

    for m in matches {
        let key = window_key(&m);
        let slot = match index.get(&key) {
            Some(&slot) => {
                if previous != Some(slot) {
                    merged[slot] = true;
                }
                slot
            }
            None => {
                groups.push(CandidateGroup {
                    narration_file_id: m.narration_file_id.clone(),
                    narration_time: m.narration_time,
                    narration_text: m.narration_text.clone(),
                    candidates: Vec::new(),
                });
                merged.push(false);
                index.insert(key, groups.len() - 1);
                groups.len() - 1
            }
        };
        groups[slot].candidates.push(m);
        previous = Some(slot);
    }

    for (group, was_merged) in groups.iter_mut().zip(merged) {
        if was_merged {
            debug!(
                "Re-ranking {} merged candidates for narration time {:?}",
                group.candidates.len(),
                group.narration_time
            );
            group.candidates = rank_candidates(std::mem::take(&mut group.candidates));
        }
    }

    groups
}
