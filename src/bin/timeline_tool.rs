use anyhow::Result;
use clap::{Parser, Subcommand};
use recap_aligner::logging::init_logging;
use recap_aligner::matching::detect_overlaps;
use recap_aligner::subtitles::format_timestamp;
use recap_aligner::timeline::{load_timeline, save_timeline};
use recap_core::{Match, Timeline, TimelineFormat};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "timeline-tool")]
#[command(about = "Inspect, validate and convert timeline files")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List segments and the total footage duration
    Show {
        timeline: PathBuf,
    },
    /// Check segment bounds and scores, and report overlapping segments
    Validate {
        timeline: PathBuf,
        /// Overlap ratio above which a pair is reported
        #[arg(long, default_value_t = 0.7)]
        overlap_threshold: f64,
    },
    /// Rewrite a timeline in another format
    Convert {
        input: PathBuf,
        output: PathBuf,
        /// Drop scores and metadata
        #[arg(long)]
        minimal: bool,
    },
}

fn as_matches(timeline: &Timeline) -> Vec<Match> {
    timeline
        .segments
        .iter()
        .enumerate()
        .map(|(i, s)| Match::new(format!("segment_{}", i), s.start, s.end, s.score.unwrap_or(1.0)))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, None)?;

    match cli.command {
        Commands::Show { timeline } => {
            let loaded = load_timeline(&timeline).await?;
            info!("🎞️ {} → {}", loaded.input, loaded.output);
            info!("🎙️ Narration: {}", loaded.narration);
            for (i, segment) in loaded.segments.iter().enumerate() {
                let score = segment.score.map(|s| format!("{:.3}", s)).unwrap_or_else(|| "-".to_string());
                info!(
                    "  {:>3}. {} → {} ({:.1}s, score {})",
                    i + 1,
                    format_timestamp(segment.start),
                    format_timestamp(segment.end),
                    segment.duration(),
                    score
                );
            }
            info!(
                "📊 {} segments, {:.1}s of footage",
                loaded.segments.len(),
                loaded.total_duration()
            );
            if let Some(metadata) = &loaded.metadata {
                info!(
                    "  project: {}, generated: {}",
                    metadata.project_id.as_deref().unwrap_or("-"),
                    metadata
                        .generated_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string())
                );
            }
        }

        Commands::Validate {
            timeline,
            overlap_threshold,
        } => {
            let loaded = load_timeline(&timeline).await?;
            loaded.validate()?;
            info!("✅ {} segments have valid bounds and scores", loaded.segments.len());

            let overlaps = detect_overlaps(&as_matches(&loaded), overlap_threshold);
            if overlaps.is_empty() {
                info!("✅ No overlaps above {:.2}", overlap_threshold);
            } else {
                for pair in &overlaps {
                    warn!(
                        "⚠️ Segments {} and {} overlap by {:.0}%",
                        pair.first + 1,
                        pair.second + 1,
                        pair.ratio * 100.0
                    );
                }
                anyhow::bail!("{} overlapping segment pair(s)", overlaps.len());
            }
        }

        Commands::Convert { input, output, minimal } => {
            let loaded = load_timeline(&input).await?;
            let format = if minimal {
                TimelineFormat::Minimal
            } else {
                TimelineFormat::Full
            };
            save_timeline(&loaded, &output, format).await?;
            info!("💾 Converted {} → {}", input.display(), output.display());
        }
    }

    Ok(())
}
