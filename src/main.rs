use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod aggregate;
mod cache;
mod config;
mod dashboard;
mod db;
mod error;
mod models;
mod query;
mod report;
mod resolver;
mod schema;
mod summary;

use config::{parse_utc_offset, parse_valid_from, DashboardConfig, DEFAULT_DATABASE, DEFAULT_TABLE};
use dashboard::Dashboard;
use db::{PgExecutor, QueryExecutor};
use error::DashboardError;
use models::{Metric, Reduction};
use query::TableRef;
use report::OutputFormat;
use resolver::SnapshotFilter;

#[derive(Parser)]
#[command(name = "fpl-control-room")]
#[command(about = "Premier League live control room over a warehouse ingestion table", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Warehouse database (schema) holding the ingestion table
    #[arg(long, env = "FPL_DATABASE", default_value = DEFAULT_DATABASE, global = true)]
    database: String,

    /// Append-only ingestion table
    #[arg(long, env = "FPL_TABLE", default_value = DEFAULT_TABLE, global = true)]
    table: String,

    /// Ignore ingestions before this RFC 3339 timestamp in history views
    #[arg(long, env = "FPL_VALID_FROM", value_parser = parse_valid_from, global = true)]
    valid_from: Option<DateTime<Utc>>,

    /// UTC offset used to bucket ingestions into calendar days
    #[arg(long, env = "FPL_UTC_OFFSET", default_value = "+00:00", value_parser = parse_utc_offset, global = true)]
    utc_offset: FixedOffset,

    /// Log filter (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Latest stats per player with leaderboards and the injury ward
    Snapshot {
        /// Only include these teams (repeatable)
        #[arg(long)]
        team: Vec<String>,
        /// Only include these players by display name (repeatable)
        #[arg(long)]
        player: Vec<String>,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Re-render every N seconds, reusing cached results until they expire
        #[arg(long)]
        refresh_secs: Option<u64>,
    },
    /// Daily team totals of one metric with a rolling mean
    Trends {
        #[arg(long, default_value = "goals")]
        metric: Metric,
        #[arg(long, value_enum, default_value_t)]
        reduction: Reduction,
        /// Rolling window in days
        #[arg(long, default_value_t = 7)]
        window: usize,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Daily history of one metric for a single player
    History {
        #[arg(long)]
        player_id: i64,
        #[arg(long, default_value = "goals")]
        metric: Metric,
        #[arg(long, value_enum, default_value_t)]
        reduction: Reduction,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let database_url = std::env::var("DATABASE_URL").ok();
    let executor = PgExecutor::connect_lazy(database_url.as_deref(), config::MAX_CONNECTIONS)
        .context("warehouse is unavailable")?;

    let config = DashboardConfig::new(TableRef::new(&cli.database, &cli.table))
        .with_valid_from(cli.valid_from)
        .with_utc_offset(cli.utc_offset);
    info!(table = %config.table, "dashboard ready");
    let mut dashboard = Dashboard::new(executor, config);

    match cli.command {
        Commands::Snapshot {
            team,
            player,
            format,
            out,
            refresh_secs,
        } => {
            let filter = SnapshotFilter {
                teams: team,
                players: player,
            };
            match refresh_secs {
                None => render_snapshot(&mut dashboard, &filter, format, out.as_deref()).await?,
                Some(secs) => loop {
                    if let Err(err) =
                        render_snapshot(&mut dashboard, &filter, format, out.as_deref()).await
                    {
                        match err.downcast_ref::<DashboardError>() {
                            Some(cause) if cause.is_source_unavailable() => {
                                warn!(error = %cause, "snapshot refresh failed, retrying next tick");
                            }
                            _ => return Err(err),
                        }
                    }
                    tokio::time::sleep(Duration::from_secs(secs.max(1))).await;
                    let purged = dashboard.purge_expired();
                    if purged > 0 {
                        info!(purged, "expired cached results");
                    }
                },
            }
        }
        Commands::Trends {
            metric,
            reduction,
            window,
            format,
            out,
        } => {
            let points = dashboard
                .team_trends(metric, reduction, window)
                .await
                .context("failed to build team trends")?;
            let rendered = match format {
                OutputFormat::Markdown => report::build_trends_report(
                    metric,
                    reduction,
                    window,
                    dashboard.config().valid_from,
                    &points,
                ),
                other => report::render_rows(&points, other)?,
            };
            emit(&rendered, out.as_deref())?;
        }
        Commands::History {
            player_id,
            metric,
            reduction,
            format,
            out,
        } => {
            let history = dashboard
                .player_history(player_id, metric, reduction)
                .await
                .with_context(|| format!("failed to load history for player {player_id}"))?;
            let rendered = match format {
                OutputFormat::Markdown => {
                    report::build_history_report(player_id, metric, reduction, &history)
                }
                other => report::render_rows(&history, other)?,
            };
            emit(&rendered, out.as_deref())?;
        }
    }

    Ok(())
}

async fn render_snapshot<E: QueryExecutor>(
    dashboard: &mut Dashboard<E>,
    filter: &SnapshotFilter,
    format: OutputFormat,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let snapshot = dashboard
        .snapshot()
        .await
        .context("failed to load the live snapshot")?;

    if snapshot.is_empty() {
        println!("Data fetched successfully but table is empty.");
        return Ok(());
    }

    let records = resolver::apply_filter(&snapshot, filter);
    if records.is_empty() {
        warn!(teams = ?filter.teams, players = ?filter.players, "filters matched no players");
        println!("No data matches your filters.");
        return Ok(());
    }

    let rendered = match format {
        OutputFormat::Markdown => report::build_snapshot_report(&records, filter),
        other => report::render_rows(&records, other)?,
    };
    emit(&rendered, out)
}

fn emit(rendered: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}.", path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}
