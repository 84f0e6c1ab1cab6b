use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::db::RawTable;
use crate::error::DashboardError;
use crate::models::{IngestionRecord, Metric, MetricKind};

pub const ID_COLUMN: &str = "id";
pub const INGESTED_AT_COLUMN: &str = "ingested_at";
pub const TEAM_COLUMN: &str = "team";
/// Canonical display-name column, preferred over [`LEGACY_NAME_COLUMN`].
pub const DISPLAY_NAME_COLUMN: &str = "web_name";
pub const LEGACY_NAME_COLUMN: &str = "name";

static NULL: Value = Value::Null;

const NAIVE_TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Typed records plus the column set they were read from.
#[derive(Debug, Clone, Default)]
pub struct IngestionBatch {
    pub columns: BTreeSet<String>,
    pub records: Vec<IngestionRecord>,
}

impl IngestionBatch {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct ColumnMap {
    id: usize,
    ingested_at: usize,
    web_name: Option<usize>,
    name: Option<usize>,
    team: Option<usize>,
    position_id: Option<usize>,
    injury_news: Option<usize>,
    chance_of_playing: Option<usize>,
    metrics: Vec<(Metric, Option<usize>)>,
}

impl ColumnMap {
    fn resolve(table: &RawTable) -> Result<Self, DashboardError> {
        let id = table
            .column_index(ID_COLUMN)
            .ok_or_else(|| DashboardError::schema_mismatch(ID_COLUMN, "entity key"))?;
        let ingested_at = table
            .column_index(INGESTED_AT_COLUMN)
            .ok_or_else(|| DashboardError::schema_mismatch(INGESTED_AT_COLUMN, "ingestion time"))?;

        Ok(Self {
            id,
            ingested_at,
            web_name: table.column_index(DISPLAY_NAME_COLUMN),
            name: table.column_index(LEGACY_NAME_COLUMN),
            team: table.column_index(TEAM_COLUMN),
            position_id: table.column_index("position_id"),
            injury_news: table.column_index("injury_news"),
            chance_of_playing: table.column_index("chance_of_playing"),
            metrics: Metric::ALL
                .into_iter()
                .map(|metric| (metric, table.column_index(metric.column())))
                .collect(),
        })
    }
}

/// Maps a raw result set into typed records in a single pass.
///
/// Key columns (`id`, `ingested_at`) must exist and hold readable values.
/// Metric cells that are missing, null or unparsable become zero.
pub fn normalize(table: &RawTable) -> Result<IngestionBatch, DashboardError> {
    let columns: BTreeSet<String> = table.columns.iter().cloned().collect();
    if table.rows.is_empty() {
        return Ok(IngestionBatch {
            columns,
            records: Vec::new(),
        });
    }

    let map = ColumnMap::resolve(table)?;
    let mut records = Vec::with_capacity(table.rows.len());

    for (index, row) in table.rows.iter().enumerate() {
        let cell = |slot: Option<usize>| slot.and_then(|i| row.get(i)).unwrap_or(&NULL);

        let entity_id = parse_entity_id(cell(Some(map.id))).ok_or_else(|| {
            DashboardError::invalid_row(index, format!("unreadable {ID_COLUMN} value"))
        })?;
        let ingested_at = parse_timestamp(cell(Some(map.ingested_at))).ok_or_else(|| {
            DashboardError::invalid_row(index, format!("unreadable {INGESTED_AT_COLUMN} value"))
        })?;

        let display_name = text(cell(map.web_name))
            .or_else(|| text(cell(map.name)))
            .unwrap_or_else(|| entity_id.to_string());

        let mut record = IngestionRecord {
            entity_id,
            ingested_at,
            display_name,
            team: text(cell(map.team)).unwrap_or_default(),
            position_id: coerce_count(cell(map.position_id)),
            goals: 0,
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
            injury_news: text(cell(map.injury_news)),
            chance_of_playing: parse_count(cell(map.chance_of_playing)),
        };

        for (metric, slot) in &map.metrics {
            let value = cell(*slot);
            match metric.kind() {
                MetricKind::Count => set_count(&mut record, *metric, coerce_count(value)),
                MetricKind::Float => set_float(&mut record, *metric, coerce_float(value)),
            }
        }

        records.push(record);
    }

    Ok(IngestionBatch { columns, records })
}

fn set_count(record: &mut IngestionRecord, metric: Metric, value: i64) {
    match metric {
        Metric::Goals => record.goals = value,
        Metric::Assists => record.assists = value,
        Metric::Minutes => record.minutes = value,
        Metric::YellowCards => record.yellow_cards = value,
        Metric::RedCards => record.red_cards = value,
        Metric::Saves => record.saves = value,
        Metric::CleanSheets => record.clean_sheets = value,
        _ => {}
    }
}

fn set_float(record: &mut IngestionRecord, metric: Metric, value: f64) {
    match metric {
        Metric::Form => record.form = value,
        Metric::Influence => record.influence = value,
        Metric::Creativity => record.creativity = value,
        Metric::Threat => record.threat = value,
        Metric::IctIndex => record.ict_index = value,
        _ => {}
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn parse_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| parse_float(value).map(|v| v.trunc() as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| parse_float(value).map(|v| v.trunc() as i64)),
        _ => None,
    }
}

pub fn coerce_count(value: &Value) -> i64 {
    parse_count(value).unwrap_or(0)
}

pub fn coerce_float(value: &Value) -> f64 {
    parse_float(value).unwrap_or(0.0)
}

fn parse_entity_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|v| v.fract() == 0.0).map(|v| v as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
                return Some(ts.with_timezone(&Utc));
            }
            NAIVE_TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}
