use anyhow::{anyhow, Result};
use recap_core::{RecapCoreError, TimedEntry};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

fn time_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d+:\d{1,2}:\d{1,2}[,.]\d{1,3})\s*-->\s*(\d+:\d{1,2}:\d{1,2}[,.]\d{1,3})")
            .expect("time range pattern is valid")
    })
}

/// Parse an SRT file into timed entries.
///
/// Fails when the file is missing or unreadable. Individual malformed blocks
/// are skipped and parsing continues.
pub async fn parse_srt_file<P: AsRef<Path>>(path: P) -> Result<Vec<TimedEntry>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RecapCoreError::MissingInput(format!("SRT file not found: {}", path.display())).into());
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("Failed to read SRT file {}: {}", path.display(), e))?;

    let entries = parse_srt_str(&content);
    debug!("📄 Parsed {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

/// Parse SRT content. Blocks are separated by blank lines; a block needs an
/// integer index line, a time range line and at least one text line.
pub fn parse_srt_str(content: &str) -> Vec<TimedEntry> {
    let normalized = content.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let mut entries = Vec::new();
    let mut skipped = 0usize;

    for block in normalized.trim().split("\n\n") {
        let lines: Vec<&str> = block.trim().lines().collect();
        if lines.len() < 3 {
            if !block.trim().is_empty() {
                skipped += 1;
            }
            continue;
        }

        match parse_block(&lines) {
            Some(entry) => entries.push(entry),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("Skipped {} malformed SRT blocks", skipped);
    }

    entries
}

fn parse_block(lines: &[&str]) -> Option<TimedEntry> {
    let index: u32 = lines[0].trim().parse().ok()?;
    let captures = time_range_pattern().captures(lines[1])?;
    let start = parse_timestamp(&captures[1]).ok()?;
    let end = parse_timestamp(&captures[2]).ok()?;
    let text = lines[2..].join("\n");

    Some(TimedEntry::new(index, start, end, text))
}

/// Parse a single timestamp (HH:MM:SS,mmm) to seconds
pub fn parse_timestamp(timestamp: &str) -> Result<f64> {
    let (hms, millis) = timestamp
        .trim()
        .split_once([',', '.'])
        .ok_or_else(|| anyhow!("Invalid timestamp format: {}", timestamp))?;

    let hms_parts: Vec<&str> = hms.split(':').collect();
    if hms_parts.len() != 3 {
        return Err(anyhow!("Invalid time format: {}", timestamp));
    }

    let hours: u64 = hms_parts[0].parse()?;
    let minutes: u64 = hms_parts[1].parse()?;
    let seconds: u64 = hms_parts[2].parse()?;
    let milliseconds: u64 = millis.parse()?;

    let total_seconds = hours * 3600 + minutes * 60 + seconds;
    Ok(total_seconds as f64 + milliseconds as f64 / 1000.0)
}

/// Format seconds as an SRT timestamp (HH:MM:SS,mmm)
pub fn format_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
