//! Game review CLI
//!
//! Loads a PGN, evaluates every position with a local UCI engine and prints
//! a per-move classification table plus a per-player summary.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use game_review::{
    Classification, ClassificationStore, EngineSession, FileCache, NoCache, ReviewConfig,
    ReviewContext, ReviewSummary, SessionOptions,
};

#[derive(Parser)]
#[command(name = "game-review")]
#[command(about = "Classify every move of a chess game with a UCI engine")]
struct Cli {
    /// PGN file to review
    pgn_file: PathBuf,
    /// Search depth per position
    #[arg(short, long)]
    depth: Option<u32>,
    /// Path to the engine binary
    #[arg(short, long)]
    engine: Option<String>,
    /// Deadline for a single position, in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Directory for cached classifications
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Skip reading and writing the cache
    #[arg(long)]
    no_cache: bool,
    /// Print classifications and summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    classifications: &'a [Classification],
    summary: Option<ReviewSummary>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = ReviewConfig::from_env()?;
    if let Some(depth) = cli.depth {
        config.analysis_depth = depth;
    }
    if let Some(engine) = cli.engine.clone() {
        config.stockfish_path = engine;
    }
    if let Some(secs) = cli.timeout_secs {
        config.eval_timeout = Duration::from_secs(secs);
    }
    if let Some(dir) = cli.cache_dir.clone() {
        config.cache_dir = dir;
    }
    info!(
        stockfish_path = %config.stockfish_path,
        depth = config.analysis_depth,
        "Review config loaded"
    );

    let pgn = std::fs::read_to_string(&cli.pgn_file)
        .with_context(|| format!("Failed to read {}", cli.pgn_file.display()))?;

    let options = SessionOptions::from_config(&config);
    let session = EngineSession::spawn(&config.stockfish_path, options)?;
    session
        .wait_ready()
        .await
        .context("Analysis unavailable: engine did not start")?;
    info!(engine = ?session.engine_name(), "Engine ready");

    if cli.no_cache {
        run(ReviewContext::new(session, NoCache), &pgn, &config, cli.json).await
    } else {
        let cache = FileCache::new(&config.cache_dir);
        run(ReviewContext::new(session, cache), &pgn, &config, cli.json).await
    }
}

async fn run<C: ClassificationStore>(
    mut context: ReviewContext<EngineSession, C>,
    pgn: &str,
    config: &ReviewConfig,
    json: bool,
) -> anyhow::Result<()> {
    context.load_pgn(pgn)?;
    context
        .analyze(config.analysis_depth, |done, total| {
            tracing::debug!(done, total, "Progress");
            if done == total || done % 10 == 0 {
                info!("Evaluated {done}/{total} positions");
            }
        })
        .await?;

    let classifications = context.classifications().unwrap_or_default();
    let summary = context.summary();
    if json {
        let report = JsonReport {
            classifications,
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(classifications);
        if let Some(summary) = &summary {
            print_summary(summary);
        }
    }

    let (session, _) = context.into_parts();
    session.quit().await;
    Ok(())
}

fn print_table(classifications: &[Classification]) {
    println!(
        "{:>4}  {:<8} {:<11} {:>7}  {:<8} {}",
        "ply", "move", "tier", "loss", "best", "tags"
    );
    for c in classifications {
        let tags: Vec<&str> = c.tags.iter().map(|t| t.as_str()).collect();
        let mut line = format!(
            "{:>4}  {:<8} {:<11} {:>7.2}  {:<8} {}",
            c.ply,
            c.san,
            c.tier.as_str(),
            c.cp_loss,
            c.best_move_san.as_deref().unwrap_or("-"),
            tags.join(",")
        );
        if let Some(opening) = &c.opening {
            line.push_str(&format!("  [{}]", opening.name));
        }
        println!("{line}");
    }
}

fn print_summary(summary: &ReviewSummary) {
    println!();
    for (label, player) in [("White", &summary.white), ("Black", &summary.black)] {
        let counts: Vec<String> = game_review::Tier::ALL
            .iter()
            .filter(|tier| player.count(**tier) > 0)
            .map(|tier| format!("{} {}", player.count(*tier), tier.as_str()))
            .collect();
        println!(
            "{label}: accuracy {:.1}%, avg loss {:.2} over {} moves ({})",
            player.accuracy,
            player.average_loss,
            player.moves,
            counts.join(", ")
        );
    }
}
