use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::models::IngestionRecord;

/// Collapses repeated ingestions into one record per entity.
///
/// The record with the newest `ingested_at` wins. Among records tied on the
/// newest timestamp, the greatest by [`content_order`] wins, so the result
/// does not depend on delivery order. Output is ordered by `entity_id`.
pub fn resolve(records: Vec<IngestionRecord>) -> Vec<IngestionRecord> {
    let mut latest: BTreeMap<i64, IngestionRecord> = BTreeMap::new();

    for record in records {
        match latest.entry(record.entity_id) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if supersedes(&record, slot.get()) {
                    slot.insert(record);
                }
            }
        }
    }

    latest.into_values().collect()
}

fn supersedes(candidate: &IngestionRecord, current: &IngestionRecord) -> bool {
    candidate
        .ingested_at
        .cmp(&current.ingested_at)
        .then_with(|| content_order(candidate, current))
        == Ordering::Greater
}

/// Total order over the non-key fields of two records for the same entity.
fn content_order(a: &IngestionRecord, b: &IngestionRecord) -> Ordering {
    a.display_name
        .cmp(&b.display_name)
        .then_with(|| a.team.cmp(&b.team))
        .then_with(|| a.position_id.cmp(&b.position_id))
        .then_with(|| a.goals.cmp(&b.goals))
        .then_with(|| a.assists.cmp(&b.assists))
        .then_with(|| a.minutes.cmp(&b.minutes))
        .then_with(|| a.yellow_cards.cmp(&b.yellow_cards))
        .then_with(|| a.red_cards.cmp(&b.red_cards))
        .then_with(|| a.saves.cmp(&b.saves))
        .then_with(|| a.clean_sheets.cmp(&b.clean_sheets))
        .then_with(|| a.form.total_cmp(&b.form))
        .then_with(|| a.influence.total_cmp(&b.influence))
        .then_with(|| a.creativity.total_cmp(&b.creativity))
        .then_with(|| a.threat.total_cmp(&b.threat))
        .then_with(|| a.ict_index.total_cmp(&b.ict_index))
        .then_with(|| a.injury_news.cmp(&b.injury_news))
        .then_with(|| a.chance_of_playing.cmp(&b.chance_of_playing))
}

#[derive(Debug, Clone, Default)]
pub struct SnapshotFilter {
    pub teams: Vec<String>,
    pub players: Vec<String>,
}

impl SnapshotFilter {
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty() && self.players.is_empty()
    }

    fn matches(&self, record: &IngestionRecord) -> bool {
        let team_ok = self.teams.is_empty()
            || self
                .teams
                .iter()
                .any(|team| team.eq_ignore_ascii_case(&record.team));
        let player_ok = self.players.is_empty()
            || self
                .players
                .iter()
                .any(|player| player.eq_ignore_ascii_case(&record.display_name));
        team_ok && player_ok
    }
}

pub fn apply_filter(records: &[IngestionRecord], filter: &SnapshotFilter) -> Vec<IngestionRecord> {
    records
        .iter()
        .filter(|record| filter.matches(record))
        .cloned()
        .collect()
}

pub fn last_updated(records: &[IngestionRecord]) -> Option<DateTime<Utc>> {
    records.iter().map(|record| record.ingested_at).max()
}

pub fn teams(records: &[IngestionRecord]) -> Vec<String> {
    let mut teams: Vec<String> = records
        .iter()
        .map(|record| record.team.clone())
        .filter(|team| !team.is_empty())
        .collect();
    teams.sort();
    teams.dedup();
    teams
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(id: i64, ts: &str, goals: i64) -> IngestionRecord {
        IngestionRecord {
            entity_id: id,
            ingested_at: ts.parse().unwrap(),
            display_name: format!("Player {id}"),
            team: "ARS".to_string(),
            position_id: 3,
            goals,
            assists: 0,
            minutes: 0,
            yellow_cards: 0,
            red_cards: 0,
            saves: 0,
            clean_sheets: 0,
            form: 0.0,
            influence: 0.0,
            creativity: 0.0,
            threat: 0.0,
            ict_index: 0.0,
            injury_news: None,
            chance_of_playing: None,
        }
    }

    #[test]
    fn keeps_latest_ingestion_per_entity() {
        let rows = vec![
            record(1, "2026-02-13T10:00:00Z", 1),
            record(1, "2026-02-13T11:00:00Z", 2),
            record(2, "2026-02-13T10:30:00Z", 5),
        ];

        let snapshot = resolve(rows);
        let summary: Vec<(i64, i64)> = snapshot.iter().map(|r| (r.entity_id, r.goals)).collect();
        assert_eq!(summary, vec![(1, 2), (2, 5)]);
    }

    #[test]
    fn newer_row_wins_regardless_of_delivery_order() {
        let rows = vec![
            record(9, "2026-02-14T09:00:00Z", 7),
            record(9, "2026-02-13T09:00:00Z", 3),
        ];
        let snapshot = resolve(rows);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].goals, 7);
    }

    #[test]
    fn timestamp_ties_resolve_by_record_contents() {
        let older = record(4, "2026-02-13T10:00:00Z", 9);
        let low = record(4, "2026-02-13T12:00:00Z", 2);
        let high = record(4, "2026-02-13T12:00:00Z", 3);

        let forward = resolve(vec![older.clone(), low.clone(), high.clone()]);
        let backward = resolve(vec![high, low, older]);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].goals, 3);
        assert_eq!(forward, backward);
    }

    #[test]
    fn float_and_text_fields_break_remaining_ties() {
        let mut calm = record(5, "2026-02-13T12:00:00Z", 1);
        calm.form = 4.5;
        let mut hot = calm.clone();
        hot.form = 7.0;
        assert_eq!(resolve(vec![hot.clone(), calm.clone()])[0].form, 7.0);
        assert_eq!(resolve(vec![calm.clone(), hot])[0].form, 7.0);

        let mut injured = calm.clone();
        injured.injury_news = Some("Knock".to_string());
        assert_eq!(
            resolve(vec![injured.clone(), calm.clone()]),
            resolve(vec![calm, injured])
        );
    }

    #[test]
    fn resolving_twice_changes_nothing() {
        let rows = vec![
            record(3, "2026-02-13T08:00:00Z", 0),
            record(1, "2026-02-13T09:00:00Z", 1),
            record(3, "2026-02-13T10:00:00Z", 4),
            record(1, "2026-02-13T09:00:00Z", 6),
        ];
        let once = resolve(rows);
        let twice = resolve(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_input_resolves_to_empty_snapshot() {
        assert!(resolve(Vec::new()).is_empty());
    }

    #[test]
    fn filter_narrows_by_team_and_player() {
        let mut saka = record(7, "2026-02-13T10:00:00Z", 5);
        saka.display_name = "Saka".to_string();
        let mut palmer = record(20, "2026-02-13T10:00:00Z", 9);
        palmer.display_name = "Palmer".to_string();
        palmer.team = "CHE".to_string();
        let records = vec![saka, palmer];

        let by_team = SnapshotFilter {
            teams: vec!["che".to_string()],
            players: Vec::new(),
        };
        let filtered = apply_filter(&records, &by_team);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].display_name, "Palmer");

        let mismatch = SnapshotFilter {
            teams: vec!["ARS".to_string()],
            players: vec!["Palmer".to_string()],
        };
        assert!(apply_filter(&records, &mismatch).is_empty());
        assert_eq!(apply_filter(&records, &SnapshotFilter::default()).len(), 2);
    }

    #[test]
    fn last_updated_is_newest_ingestion() {
        let records = vec![
            record(1, "2026-02-13T10:00:00Z", 0),
            record(2, "2026-02-13T12:30:00Z", 0),
        ];
        assert_eq!(
            last_updated(&records),
            Some("2026-02-13T12:30:00Z".parse().unwrap())
        );
        assert_eq!(last_updated(&[]), None);
    }

    #[test]
    fn teams_are_sorted_and_unique() {
        let mut other = record(2, "2026-02-13T10:00:00Z", 0);
        other.team = "AVL".to_string();
        let records = vec![record(1, "2026-02-13T10:00:00Z", 0), other, record(3, "2026-02-13T10:00:00Z", 0)];
        assert_eq!(teams(&records), vec!["ARS".to_string(), "AVL".to_string()]);
    }
}
