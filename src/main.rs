use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roster_stats::aggregate::SeasonAggregator;
use roster_stats::calculate::TieBreak;
use roster_stats::config::AppConfig;
use roster_stats::ingest::{IngestBatch, IngestError, MatchContext, StatIngestService};
use roster_stats::models::{PlayerId, SortKey};
use roster_stats::ranking::{rows_for_league, LoadOutcome, RankingView};
use roster_stats::storage::{JsonlStore, StatStore, StorageConfig};
use roster_stats::top_scorer::HighestPointsUpdater;

#[derive(Parser)]
#[command(name = "roster-stats")]
#[command(about = "Player stat ingestion, season aggregates and leaderboards")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Data directory path (overrides the config file)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a match stat sheet from a JSON file
    Ingest {
        /// Batch file: {"matchId", "leagueId", "entries": [...]}
        #[arg(long)]
        file: PathBuf,
    },

    /// Recompute season aggregates for players
    Aggregate {
        #[arg(long)]
        league: String,

        /// Player to recompute (repeatable)
        #[arg(long = "player", required = true)]
        players: Vec<String>,
    },

    /// Show the current stats of a match, one record per player
    Prefill {
        #[arg(long)]
        league: String,

        #[arg(long = "match")]
        match_id: String,

        /// Break timestamp ties by lowest record id instead of store order
        #[arg(long)]
        lowest_id: bool,
    },

    /// Print a league leaderboard
    Rank {
        #[arg(long)]
        league: String,

        /// Sort stat: points, assists, rebounds, steals, blocks, none
        #[arg(long, default_value = "points")]
        sort: String,

        /// Pages to reveal
        #[arg(long, default_value = "1")]
        pages: usize,
    },
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_tracing(&config.log_level, cli.json_logs);
    tracing::info!("Starting roster-stats v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(JsonlStore::new(StorageConfig::new(config.data_dir.clone())));
    let stats = StatStore::new(store);
    tracing::debug!("Using {} document store", stats.backend_name());

    match cli.command {
        Commands::Ingest { file } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {:?}", file))?;
            let batch: IngestBatch =
                serde_json::from_str(&contents).context("Invalid stat batch")?;

            let updater = Arc::new(HighestPointsUpdater::new(stats.clone()));
            let service =
                StatIngestService::new(stats, updater).with_retry_policy(config.retry_policy());

            match service.save_batch(batch).await {
                Ok(report) => {
                    println!("\n=== Ingest Results ===");
                    println!("Match:            {}", report.match_id);
                    println!("Entries written:  {}", report.entries_written);
                    match &report.top_scorer.player_id {
                        Some(player) => println!(
                            "Top scorer:       {} ({} pts)",
                            player, report.top_scorer.points
                        ),
                        None => println!("Top scorer:       -"),
                    }
                    println!("Aggregates:       {}", report.aggregation.updated.len());
                    for failure in &report.aggregation.failures {
                        println!("  FAILED: {}", failure);
                    }
                }
                Err(IngestError::PartialWrite { failed, total }) => {
                    for failure in &failed {
                        eprintln!("  FAILED: {} ({})", failure.id, failure.error);
                    }
                    bail!("{} of {} stat writes failed", failed.len(), total);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Aggregate { league, players } => {
            let players: Vec<PlayerId> = players.into_iter().map(PlayerId::from).collect();
            let report = SeasonAggregator::new(stats)
                .recompute(&league.into(), &players)
                .await;

            println!("\n=== Aggregate Results ===");
            for aggregate in &report.updated {
                println!(
                    "{:<24} {:>3} gp  {:>6.1} pts  {:>5.1} reb  {:>5.1} ast",
                    aggregate.player_id,
                    aggregate.matches,
                    aggregate.average_points,
                    aggregate.average_rebounds,
                    aggregate.average_assists
                );
            }
            for failure in &report.failures {
                println!("  FAILED: {}", failure);
            }
            if !report.is_complete() {
                bail!("{} aggregates failed", report.failures.len());
            }
        }

        Commands::Prefill {
            league,
            match_id,
            lowest_id,
        } => {
            let tie_break = if lowest_id {
                TieBreak::LowestId
            } else {
                TieBreak::LastSeen
            };
            let updater = Arc::new(HighestPointsUpdater::new(stats.clone()));
            let service = StatIngestService::new(stats, updater);
            let context = MatchContext::new(match_id, league);

            let resolved = service.prefill(&context, tie_break).await?;
            if resolved.is_empty() {
                println!("No stats recorded for match {}", context.match_id);
            }
            for entry in resolved.values() {
                let mut line = serde_json::to_value(entry)?;
                line["id"] = entry.id.as_str().into();
                println!("{}", line);
            }
        }

        Commands::Rank {
            league,
            sort,
            pages,
        } => {
            let sort_key = SortKey::parse(&sort).map_err(anyhow::Error::msg)?;
            let rows = rows_for_league(&stats, &league.into()).await?;
            let view = RankingView::new(rows, sort_key, config.ranking.page_size)
                .with_load_delay(config.load_delay());

            for _ in 1..pages {
                if let LoadOutcome::AtEnd = view.load_more().await {
                    break;
                }
            }

            let label = sort_key.map_or("none".to_string(), |k| k.to_string());
            println!(
                "\n=== Leaderboard ({}, {} of {}) ===",
                label,
                view.visible().len(),
                view.total()
            );
            for (rank, row) in view.visible().iter().enumerate() {
                let team = row.team.as_ref().map_or("-", |t| t.name.as_str());
                let value = sort_key.map_or(0.0, |k| row.stat(k));
                println!(
                    "{:>3}. {:<24} {:<20} {:>6.1}",
                    rank + 1,
                    row.player.name,
                    team,
                    value
                );
            }
            if view.has_more() {
                println!("... {} more", view.total() - view.visible().len());
            }
        }
    }

    Ok(())
}
