//! Context windows over timed subtitle entries
//!
//! Movie subtitles are grouped into duration/word-bounded chunks for indexing;
//! narration is iterated as a sliding three-entry window so every query keeps
//! its neighbouring lines as context.

use recap_core::TimedEntry;
use serde::{Deserialize, Serialize};

/// An ordered, non-empty run of entries from one subtitle track
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub entries: Vec<TimedEntry>,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub word_count: usize,
    /// Position in `entries` of the entry the chunk was built around
    pub center: usize,
}

impl Chunk {
    /// Build a chunk from entries. Returns `None` for an empty slice.
    pub fn from_entries(entries: Vec<TimedEntry>) -> Option<Self> {
        let start = entries.first()?.start;
        let end = entries.last()?.end;
        let text = entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let word_count = entries.iter().map(TimedEntry::word_count).sum();

        Some(Self {
            entries,
            start,
            end,
            text,
            word_count,
            center: 0,
        })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// The entry the chunk was built around: the first entry of a bounded
    /// chunk, the middle entry of a sliding window.
    pub fn center_entry(&self) -> &TimedEntry {
        &self.entries[self.center]
    }
}

/// Limits for duration/word-bounded chunking
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkBounds {
    pub min_duration: f64,
    pub max_duration: f64,
    pub min_words: usize,
    pub max_words: usize,
}

impl Default for ChunkBounds {
    fn default() -> Self {
        Self {
            min_duration: 10.0,
            max_duration: 20.0,
            min_words: 100,
            max_words: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChunkStrategy {
    Bounded(ChunkBounds),
    SlidingWindow,
}

pub fn chunk(entries: &[TimedEntry], strategy: ChunkStrategy) -> Vec<Chunk> {
    match strategy {
        ChunkStrategy::Bounded(bounds) => chunk_bounded(entries, &bounds),
        ChunkStrategy::SlidingWindow => sliding_window(entries),
    }
}

/// Greedy duration/word-bounded chunking.
///
/// Before an entry is added the pending group is closed if it already meets
/// either minimum and the entry would push it past either maximum. After the
/// entry is added the group is force-closed once its accumulated duration
/// reaches `max_duration`. Durations accumulate per entry, so gaps between
/// subtitles do not count.
pub fn chunk_bounded(entries: &[TimedEntry], bounds: &ChunkBounds) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut pending: Vec<TimedEntry> = Vec::new();
    let mut pending_duration = 0.0;
    let mut pending_words = 0usize;

    for entry in entries {
        let entry_duration = entry.duration();
        let entry_words = entry.word_count();

        let meets_minimum = pending_duration >= bounds.min_duration || pending_words >= bounds.min_words;
        let would_exceed = pending_duration + entry_duration > bounds.max_duration
            || pending_words + entry_words > bounds.max_words;

        if meets_minimum && would_exceed && !pending.is_empty() {
            chunks.extend(Chunk::from_entries(std::mem::take(&mut pending)));
            pending_duration = 0.0;
            pending_words = 0;
        }

        pending.push(entry.clone());
        pending_duration += entry_duration;
        pending_words += entry_words;

        if pending_duration >= bounds.max_duration {
            chunks.extend(Chunk::from_entries(std::mem::take(&mut pending)));
            pending_duration = 0.0;
            pending_words = 0;
        }
    }

    chunks.extend(Chunk::from_entries(pending));
    chunks
}

/// One chunk per entry: `{previous?, entry, next?}`
pub fn sliding_window(entries: &[TimedEntry]) -> Vec<Chunk> {
    (0..entries.len())
        .filter_map(|i| {
            let from = i.saturating_sub(1);
            let to = (i + 2).min(entries.len());
            Chunk::from_entries(entries[from..to].to_vec()).map(|mut chunk| {
                chunk.center = i - from;
                chunk
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: u32, start: f64, end: f64, text: &str) -> TimedEntry {
        TimedEntry::new(index, start, end, text)
    }

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_sliding_window_scenario() {
        let entries = vec![entry(0, 0.0, 5.0, "a"), entry(1, 5.0, 10.0, "b"), entry(2, 10.0, 15.0, "c")];
        let chunks = sliding_window(&entries);

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["a b", "a b c", "b c"]);
        assert_eq!(chunks[0].start, 0.0);
        assert_eq!(chunks[0].end, 10.0);
        let centers: Vec<&str> = chunks.iter().map(|c| c.center_entry().text.as_str()).collect();
        assert_eq!(centers, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_sliding_window_sizes() {
        for n in 1..8usize {
            let entries: Vec<TimedEntry> = (0..n)
                .map(|i| entry(i as u32, i as f64, i as f64 + 1.0, "x"))
                .collect();
            let chunks = sliding_window(&entries);
            assert_eq!(chunks.len(), n);

            for (i, c) in chunks.iter().enumerate() {
                let expected = if n == 1 {
                    1
                } else if i == 0 || i == n - 1 {
                    2
                } else {
                    3
                };
                assert_eq!(c.entries.len(), expected, "n={} i={}", n, i);
            }
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_bounded(&[], &ChunkBounds::default()).is_empty());
        assert!(sliding_window(&[]).is_empty());
    }

    #[test]
    fn test_bounded_closes_when_minimum_met_and_next_would_exceed() {
        let bounds = ChunkBounds {
            min_duration: 10.0,
            max_duration: 20.0,
            min_words: 100,
            max_words: 200,
        };
        // 6s each: 6, 12 (min met), 18, adding a fourth would be 24 > 20
        let entries: Vec<TimedEntry> = (0..5)
            .map(|i| entry(i, i as f64 * 6.0, i as f64 * 6.0 + 6.0, "few words here"))
            .collect();
        let chunks = chunk_bounded(&entries, &bounds);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].entries.len(), 3);
        assert_eq!(chunks[1].entries.len(), 2);
        assert_eq!(chunks[0].word_count, 9);
    }

    #[test]
    fn test_bounded_force_closes_at_max_duration() {
        let bounds = ChunkBounds::default();
        let entries = vec![
            entry(0, 0.0, 20.0, "long"),
            entry(1, 20.0, 21.0, "short"),
            entry(2, 21.0, 22.0, "short"),
        ];
        let chunks = chunk_bounded(&entries, &bounds);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].entries.len(), 1);
        // Trailing group below every minimum is still emitted
        assert_eq!(chunks[1].entries.len(), 2);
    }

    #[test]
    fn test_bounded_word_limit() {
        let bounds = ChunkBounds {
            min_duration: 100.0,
            max_duration: 1000.0,
            min_words: 10,
            max_words: 15,
        };
        let entries: Vec<TimedEntry> = (0..4)
            .map(|i| entry(i, i as f64, i as f64 + 1.0, &words(6)))
            .collect();
        let chunks = chunk_bounded(&entries, &bounds);
        // 6, 12 (min met), +6 = 18 > 15 -> close
        assert_eq!(chunks.iter().map(|c| c.entries.len()).collect::<Vec<_>>(), vec![2, 2]);
    }

    #[test]
    fn test_bounded_coverage_keeps_every_entry_once() {
        let entries: Vec<TimedEntry> = (0..40)
            .map(|i| {
                let start = i as f64 * 2.5;
                let len = (i % 4) as f64 * 1.5;
                entry(i, start, start + len, &words((i % 7) as usize * 9))
            })
            .collect();
        let chunks = chunk_bounded(&entries, &ChunkBounds::default());
        let flattened: Vec<TimedEntry> = chunks.into_iter().flat_map(|c| c.entries).collect();
        assert_eq!(flattened, entries);
    }

    #[test]
    fn test_zero_duration_and_zero_word_entries() {
        let entries = vec![entry(0, 3.0, 3.0, ""), entry(1, 3.0, 3.0, ""), entry(2, 3.0, 4.0, "one")];
        let chunks = chunk(&entries, ChunkStrategy::Bounded(ChunkBounds::default()));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].word_count, 1);
        assert_eq!(chunks[0].duration(), 1.0);
        assert_eq!(chunk(&entries, ChunkStrategy::SlidingWindow).len(), 3);
    }
}
