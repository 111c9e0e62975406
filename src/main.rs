use anyhow::Result;
use clap::{Parser, Subcommand};
use recap_aligner::config::Config;
use recap_aligner::logging::init_logging;
use recap_aligner::project::{create_project, NewProject, ProjectLayout};
use recap_aligner::stages::{run_pipeline, run_stage, Stage, StageContext};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "recap-aligner")]
#[command(version)]
#[command(about = "Align narration with movie footage and build a recap timeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the usual search paths)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root containing `projects/`
    #[arg(long, global = true)]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a project workspace from subtitle files
    CreateProject {
        /// Project identifier (e.g. an IMDb id)
        project_id: String,
        /// Movie subtitle file
        #[arg(long)]
        movie_srt: PathBuf,
        /// Narration subtitle file, repeat for several
        #[arg(long = "narration-srt", required = true)]
        narration_srts: Vec<PathBuf>,
        /// Movie video file to copy into the project
        #[arg(long)]
        movie_video: Option<PathBuf>,
        /// Movie duration in seconds
        #[arg(long)]
        movie_duration: Option<f64>,
        #[arg(long)]
        movie_language: Option<String>,
        #[arg(long, default_value_t = 0.75)]
        similarity_threshold: f64,
        /// Minimum movie-time gap between consecutive clips (seconds)
        #[arg(long, default_value_t = 30.0)]
        copyright_min_gap: f64,
        #[arg(long)]
        embedding_model: Option<String>,
    },
    /// Run a single stage
    Stage {
        /// ingest, index, search, timeline or render
        stage: Stage,
        project_id: String,
    },
    /// Run consecutive stages
    Run {
        project_id: String,
        #[arg(long, default_value = "ingest")]
        from: Stage,
        #[arg(long, default_value = "timeline")]
        to: Stage,
    },
    /// Print the effective configuration
    ShowConfig,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    if let Some(root) = &cli.root {
        config.output.root_dir = root.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Per-project log file for the command, when a project is named
fn log_file(cli: &Cli, root: &Path) -> Option<PathBuf> {
    let (project_id, name) = match &cli.command {
        Commands::Stage { stage, project_id } => (project_id, stage.as_str()),
        Commands::Run { project_id, .. } => (project_id, "pipeline"),
        Commands::CreateProject { project_id, .. } => (project_id, "create_project"),
        Commands::ShowConfig => return None,
    };
    Some(ProjectLayout::new(root, project_id).logs_dir().join(format!("{}.log", name)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let root = config.output.root_dir.clone();

    let file = if config.output.project_log_files {
        log_file(&cli, &root)
    } else {
        None
    };
    init_logging(cli.verbose, file.as_deref())?;
    info!("🚀 Recap Aligner starting...");

    match cli.command {
        Commands::CreateProject {
            project_id,
            movie_srt,
            narration_srts,
            movie_video,
            movie_duration,
            movie_language,
            similarity_threshold,
            copyright_min_gap,
            embedding_model,
        } => {
            info!("🆕 Creating project {}", project_id);
            let request = NewProject {
                project_id,
                movie_srt,
                narration_srts,
                movie_video,
                movie_duration,
                movie_language,
                similarity_threshold,
                copyright_min_gap,
                embedding_model: embedding_model.unwrap_or_else(|| config.embedding.model.clone()),
            };
            let layout = create_project(&root, request).await?;
            info!("📂 Workspace: {}", layout.project_dir().display());
        }

        Commands::Stage { stage, project_id } => {
            let ctx = StageContext::new(config, ProjectLayout::new(&root, &project_id));
            let outcome = run_stage(&ctx, stage).await?;
            info!("💾 Output: {}", outcome.output_path.display());
        }

        Commands::Run { project_id, from, to } => {
            let ctx = StageContext::new(config, ProjectLayout::new(&root, &project_id));
            let started = std::time::Instant::now();
            let outcomes = run_pipeline(&ctx, from, to).await?;
            info!(
                "🎉 {} stage(s) completed in {:.2}s",
                outcomes.len(),
                started.elapsed().as_secs_f64()
            );
            for outcome in outcomes {
                info!("  {} → {}", outcome.stage, outcome.output_path.display());
            }
        }

        Commands::ShowConfig => {
            println!("{}", config.summary());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_stage_names() {
        let cli = Cli::try_parse_from(["recap-aligner", "stage", "search", "tt0133093"]).unwrap();
        assert!(matches!(cli.command, Commands::Stage { stage: Stage::Search, .. }));

        let cli = Cli::try_parse_from(["recap-aligner", "run", "p", "--from", "index"]).unwrap();
        match cli.command {
            Commands::Run { from, to, .. } => {
                assert_eq!(from, Stage::Index);
                assert_eq!(to, Stage::Timeline);
            }
            _ => panic!("expected run"),
        }
        assert!(Cli::try_parse_from(["recap-aligner", "stage", "upload", "p"]).is_err());
    }

    #[test]
    fn test_log_file_per_stage() {
        let cli = Cli::try_parse_from(["recap-aligner", "stage", "index", "p1"]).unwrap();
        assert_eq!(
            log_file(&cli, Path::new("/w")),
            Some(PathBuf::from("/w/projects/p1/logs/index.log"))
        );
        let cli = Cli::try_parse_from(["recap-aligner", "show-config"]).unwrap();
        assert_eq!(log_file(&cli, Path::new("/w")), None);
    }
}
