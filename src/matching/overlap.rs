use recap_core::Match;
use tracing::debug;

/// Two matches whose overlap ratio reached the threshold.
///
/// `first` and `second` index into the slice given to [`detect_overlaps`];
/// `first` starts no later than `second`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapPair {
    pub first: usize,
    pub second: usize,
    pub ratio: f64,
}

/// Shared length of two ranges relative to the shorter one.
///
/// `None` when the ranges do not intersect or the shorter one is empty.
fn overlap_ratio(a: &Match, b: &Match) -> Option<f64> {
    let overlap = a.end_time.min(b.end_time) - a.start_time.max(b.start_time);
    let shorter = a.duration().min(b.duration());
    if overlap <= 0.0 || shorter <= 0.0 {
        return None;
    }
    Some(overlap / shorter)
}

fn start_order(matches: &[Match]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..matches.len()).collect();
    order.sort_by(|&a, &b| {
        matches[a]
            .start_time
            .partial_cmp(&matches[b].start_time)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order
}

/// Every pair with `overlap / min(duration) >= threshold`, in start order
pub fn detect_overlaps(matches: &[Match], threshold: f64) -> Vec<OverlapPair> {
    let order = start_order(matches);
    let mut pairs = Vec::new();

    for (pos, &i) in order.iter().enumerate() {
        for &j in &order[pos + 1..] {
            // Sorted by start: nothing later can intersect i
            if matches[j].start_time >= matches[i].end_time {
                break;
            }
            if let Some(ratio) = overlap_ratio(&matches[i], &matches[j]) {
                if ratio >= threshold {
                    pairs.push(OverlapPair {
                        first: i,
                        second: j,
                        ratio,
                    });
                }
            }
        }
    }

    pairs
}

/// Which matches lose at least one severely overlapping pair.
///
/// Every pair is resolved in start order and its lower-scoring member is
/// marked; on equal scores the later-starting member is marked. A match
/// flagged by several pairs is marked once.
pub fn overlap_losers(matches: &[Match], overlap_threshold: f64) -> Vec<bool> {
    let mut removed = vec![false; matches.len()];

    for pair in detect_overlaps(matches, overlap_threshold) {
        let loser = if matches[pair.first].similarity_score < matches[pair.second].similarity_score {
            pair.first
        } else {
            pair.second
        };
        if !removed[loser] {
            debug!(
                "Removing {} (overlap ratio {:.2} with {})",
                matches[loser].segment_id,
                pair.ratio,
                matches[if loser == pair.first { pair.second } else { pair.first }].segment_id
            );
        }
        removed[loser] = true;
    }

    removed
}

/// Drop the weaker match of every severely overlapping pair.
///
/// Survivors keep their input order.
pub fn remove_severe_overlaps(matches: &[Match], overlap_threshold: f64) -> Vec<Match> {
    matches
        .iter()
        .zip(overlap_losers(matches, overlap_threshold))
        .filter(|(_, gone)| !gone)
        .map(|(m, _)| m.clone())
        .collect()
}

/// Fuse matches separated by at most `merge_threshold` seconds.
///
/// Output is chronological. A merged match spans from the first start to the
/// last end, keeps the best score and joins narration text with a space.
pub fn merge_nearby_segments(matches: &[Match], merge_threshold: f64) -> Vec<Match> {
    let mut merged: Vec<Match> = Vec::with_capacity(matches.len());

    for &i in &start_order(matches) {
        let current = &matches[i];
        match merged.last_mut() {
            Some(previous) if current.start_time - previous.end_time <= merge_threshold => {
                previous.end_time = previous.end_time.max(current.end_time);
                previous.similarity_score = previous.similarity_score.max(current.similarity_score);
                if !current.narration_text.is_empty() {
                    if !previous.narration_text.is_empty() {
                        previous.narration_text.push(' ');
                    }
                    previous.narration_text.push_str(&current.narration_text);
                }
            }
            _ => merged.push(current.clone()),
        }
    }

    merged
}
