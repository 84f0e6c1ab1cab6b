use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{DailyAggregate, IngestionRecord, Metric, MetricKind, Reduction, TrendPoint};
use crate::resolver::{self, SnapshotFilter};
use crate::summary;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown report
    #[default]
    Markdown,
    /// JSON array of rows
    Json,
    /// CSV with a header row
    Csv,
}

pub fn render_rows<T: Serialize>(rows: &[T], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(rows)?),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            for row in rows {
                writer.serialize(row)?;
            }
            let bytes = writer.into_inner().map_err(|err| err.into_error())?;
            Ok(String::from_utf8(bytes)?)
        }
        OutputFormat::Markdown => anyhow::bail!("markdown output has no row form"),
    }
}

fn filter_label(filter: &SnapshotFilter) -> String {
    if filter.is_empty() {
        return "all teams".to_string();
    }
    let mut parts = Vec::new();
    if !filter.teams.is_empty() {
        parts.push(format!("teams {}", filter.teams.join(", ")));
    }
    if !filter.players.is_empty() {
        parts.push(format!("players {}", filter.players.join(", ")));
    }
    parts.join("; ")
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn leaderboard_table(output: &mut String, rows: &[&IngestionRecord], metric: Metric) {
    if rows.is_empty() {
        let _ = writeln!(output, "No {} data available.", metric.label().to_lowercase());
        return;
    }
    let _ = writeln!(output, "| # | Player | Team | {} |", metric.label());
    let _ = writeln!(output, "|---|---|---|---|");
    for (rank, record) in rows.iter().enumerate() {
        let value = match metric.kind() {
            MetricKind::Count => format!("{}", record.metric(metric) as i64),
            MetricKind::Float => format!("{:.1}", record.metric(metric)),
        };
        let _ = writeln!(
            output,
            "| {} | {} | {} | {} |",
            rank + 1,
            record.display_name,
            record.team,
            value
        );
    }
}

fn section(output: &mut String, title: &str) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## {title}");
}

pub fn build_snapshot_report(records: &[IngestionRecord], filter: &SnapshotFilter) -> String {
    let kpis = summary::kpis(records);
    let mut output = String::new();

    let _ = writeln!(output, "# Premier League Live Control Room");
    let _ = writeln!(output, "Snapshot for {}", filter_label(filter));
    if let Some(updated) = resolver::last_updated(records) {
        let _ = writeln!(output, "**Last Updated:** {}", format_timestamp(updated));
    }
    let teams = resolver::teams(records);
    if !teams.is_empty() {
        let _ = writeln!(output, "Teams: {}", teams.join(", "));
    }

    section(&mut output, "Key Numbers");
    let _ = writeln!(output, "- Total players: {}", kpis.total_players);
    let _ = writeln!(output, "- Total goals: {}", kpis.total_goals);
    let _ = writeln!(output, "- Total assists: {}", kpis.total_assists);
    let _ = writeln!(output, "- Active injuries: {}", kpis.active_injuries);

    section(&mut output, "Attack");
    for (metric, limit) in [(Metric::Goals, 10), (Metric::Assists, 10), (Metric::Threat, 15)] {
        let _ = writeln!(output, "### Top {} by {}", limit, metric.label());
        leaderboard_table(&mut output, &summary::leaderboard(records, metric, limit), metric);
    }

    section(&mut output, "Defense & Discipline");
    for metric in [Metric::Saves, Metric::CleanSheets] {
        let _ = writeln!(output, "### Top 10 by {}", metric.label());
        leaderboard_table(
            &mut output,
            &summary::positive_leaderboard(records, metric, 10),
            metric,
        );
    }
    let _ = writeln!(output, "### Most Played Minutes");
    leaderboard_table(
        &mut output,
        &summary::leaderboard(records, Metric::Minutes, 10),
        Metric::Minutes,
    );

    let _ = writeln!(output, "### Discipline");
    let booked = summary::discipline(records, 10);
    if booked.is_empty() {
        let _ = writeln!(output, "No cards recorded.");
    } else {
        let _ = writeln!(output, "| Player | Team | Yellow | Red |");
        let _ = writeln!(output, "|---|---|---|---|");
        for record in booked {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                record.display_name, record.team, record.yellow_cards, record.red_cards
            );
        }
    }

    section(&mut output, "Creativity & Impact");
    for metric in [Metric::Creativity, Metric::IctIndex] {
        let _ = writeln!(output, "### Top 10 by {}", metric.label());
        leaderboard_table(&mut output, &summary::leaderboard(records, metric, 10), metric);
    }

    section(&mut output, "Injuries");
    let ward = summary::injury_ward(records);
    if ward.is_empty() {
        let _ = writeln!(output, "No active injuries reported.");
    } else {
        let _ = writeln!(output, "| Player | Team | News | Chance | Status |");
        let _ = writeln!(output, "|---|---|---|---|---|");
        for entry in ward {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {}% | {} |",
                entry.display_name,
                entry.team,
                entry.injury_news,
                entry.chance_of_playing,
                entry.availability
            );
        }
    }

    output
}

pub fn build_trends_report(
    metric: Metric,
    reduction: Reduction,
    window: usize,
    valid_from: Option<DateTime<Utc>>,
    points: &[TrendPoint],
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Team Trends: {} ({reduction})", metric.label());
    match valid_from {
        Some(cutoff) => {
            let _ = writeln!(output, "Ingestions since {}", format_timestamp(cutoff));
        }
        None => {
            let _ = writeln!(output, "All ingestions");
        }
    }
    let _ = writeln!(output);

    if points.is_empty() {
        let _ = writeln!(output, "No ingestion history for this window.");
        return output;
    }

    let _ = writeln!(output, "| Date | Team | {} | {window}-day mean |", metric.label());
    let _ = writeln!(output, "|---|---|---|---|");
    for point in points {
        let _ = writeln!(
            output,
            "| {} | {} | {:.1} | {:.2} |",
            point.date, point.group, point.value, point.rolling_mean
        );
    }

    output
}

pub fn build_history_report(
    entity_id: i64,
    metric: Metric,
    reduction: Reduction,
    history: &[DailyAggregate],
) -> String {
    let mut output = String::new();
    let name = history
        .last()
        .map(|daily| daily.label.clone())
        .unwrap_or_else(|| format!("player {entity_id}"));
    let _ = writeln!(output, "# Player History: {name}");
    let _ = writeln!(output, "Daily {reduction} of {}", metric.label());
    let _ = writeln!(output);

    if history.is_empty() {
        let _ = writeln!(output, "No ingestion history for this player.");
        return output;
    }

    let _ = writeln!(output, "| Date | {} | Samples |", metric.label());
    let _ = writeln!(output, "|---|---|---|");
    for daily in history {
        let _ = writeln!(output, "| {} | {:.1} | {} |", daily.date, daily.value, daily.samples);
    }

    output
}
