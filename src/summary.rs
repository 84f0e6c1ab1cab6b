use std::cmp::Ordering;

use crate::models::{Availability, IngestionRecord, InjuryEntry, Kpis, Metric};

pub fn kpis(records: &[IngestionRecord]) -> Kpis {
    Kpis {
        total_players: records.len(),
        total_goals: records.iter().map(|record| record.goals).sum(),
        total_assists: records.iter().map(|record| record.assists).sum(),
        active_injuries: records.iter().filter(|record| record.has_injury()).count(),
    }
}

/// Top `limit` records by `metric`, descending. Equal values keep snapshot order.
pub fn leaderboard(records: &[IngestionRecord], metric: Metric, limit: usize) -> Vec<&IngestionRecord> {
    let mut ranked: Vec<&IngestionRecord> = records.iter().collect();
    ranked.sort_by(|a, b| {
        b.metric(metric)
            .partial_cmp(&a.metric(metric))
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(limit);
    ranked
}

/// Like [`leaderboard`], restricted to records with a positive value.
pub fn positive_leaderboard(
    records: &[IngestionRecord],
    metric: Metric,
    limit: usize,
) -> Vec<&IngestionRecord> {
    let mut ranked = leaderboard(records, metric, records.len());
    ranked.retain(|record| record.metric(metric) > 0.0);
    ranked.truncate(limit);
    ranked
}

pub fn discipline(records: &[IngestionRecord], limit: usize) -> Vec<&IngestionRecord> {
    let mut booked: Vec<&IngestionRecord> = records
        .iter()
        .filter(|record| record.yellow_cards > 0 || record.red_cards > 0)
        .collect();
    booked.sort_by(|a, b| b.yellow_cards.cmp(&a.yellow_cards));
    booked.truncate(limit);
    booked
}

pub fn availability(chance_of_playing: i64) -> Availability {
    match chance_of_playing {
        i64::MIN..=0 => Availability::Out,
        1..=49 => Availability::Doubtful,
        50..=74 => Availability::Questionable,
        _ => Availability::Available,
    }
}

/// Players with injury news, least likely to play first.
pub fn injury_ward(records: &[IngestionRecord]) -> Vec<InjuryEntry> {
    let mut ward: Vec<InjuryEntry> = records
        .iter()
        .filter(|record| record.has_injury())
        .map(|record| {
            let chance = record.chance_of_playing.unwrap_or(0);
            InjuryEntry {
                display_name: record.display_name.clone(),
                team: record.team.clone(),
                injury_news: record.injury_news.clone().unwrap_or_default(),
                chance_of_playing: chance,
                availability: availability(chance),
            }
        })
        .collect();
    ward.sort_by_key(|entry| entry.chance_of_playing);
    ward
}
