use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::error::DashboardError;
use crate::models::{DailyAggregate, GroupBy, Metric, Reduction, TrendPoint};
use crate::schema::IngestionBatch;

#[derive(Debug, Clone)]
pub struct AggregateRequest {
    pub valid_from: Option<DateTime<Utc>>,
    pub group_by: GroupBy,
    pub metric: Metric,
    pub reduction: Reduction,
    pub utc_offset: FixedOffset,
}

#[derive(Default)]
struct Bucket {
    sum: f64,
    max: f64,
    samples: usize,
}

impl Bucket {
    fn push(&mut self, value: f64) {
        self.max = if self.samples == 0 { value } else { self.max.max(value) };
        self.sum += value;
        self.samples += 1;
    }

    fn reduce(&self, reduction: Reduction) -> f64 {
        match reduction {
            Reduction::Sum => self.sum,
            Reduction::Max => self.max,
            Reduction::Mean => {
                if self.samples == 0 {
                    0.0
                } else {
                    self.sum / self.samples as f64
                }
            }
        }
    }
}

/// Per-day reduction of one metric over the raw ingestion stream.
///
/// Records before `valid_from` are dropped. Days are calendar days in
/// `utc_offset`. Output is ordered by date, then group.
pub fn aggregate(
    batch: &IngestionBatch,
    request: &AggregateRequest,
) -> Result<Vec<DailyAggregate>, DashboardError> {
    if batch.is_empty() {
        return Ok(Vec::new());
    }
    if !batch.has_column(request.group_by.column()) {
        return Err(DashboardError::schema_mismatch(
            request.group_by.column(),
            "aggregation grouping",
        ));
    }
    if !batch.has_column(request.metric.column()) {
        return Err(DashboardError::schema_mismatch(
            request.metric.column(),
            "aggregation metric",
        ));
    }

    let mut buckets: BTreeMap<(NaiveDate, String), Bucket> = BTreeMap::new();
    let mut labels: HashMap<String, (DateTime<Utc>, String)> = HashMap::new();

    for record in &batch.records {
        if request.valid_from.is_some_and(|cutoff| record.ingested_at < cutoff) {
            continue;
        }

        let (key, label) = match request.group_by {
            GroupBy::Entity => (record.entity_id.to_string(), record.display_name.as_str()),
            GroupBy::Team => (record.team.clone(), record.team.as_str()),
        };
        let date = reporting_date(record.ingested_at, request.utc_offset);

        labels
            .entry(key.clone())
            .and_modify(|(seen_at, name)| {
                if record.ingested_at >= *seen_at {
                    *seen_at = record.ingested_at;
                    *name = label.to_string();
                }
            })
            .or_insert_with(|| (record.ingested_at, label.to_string()));

        buckets
            .entry((date, key))
            .or_default()
            .push(record.metric(request.metric));
    }

    Ok(buckets
        .into_iter()
        .map(|((date, group), bucket)| DailyAggregate {
            label: labels
                .get(&group)
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| group.clone()),
            group,
            date,
            metric: request.metric,
            value: bucket.reduce(request.reduction),
            samples: bucket.samples,
        })
        .collect())
}

pub fn reporting_date(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

/// Trailing mean over each group's last `window` daily values.
pub fn rolling_mean(aggregates: &[DailyAggregate], window: usize) -> Vec<TrendPoint> {
    let window = window.max(1);
    let mut recent: HashMap<&str, VecDeque<f64>> = HashMap::new();
    let mut points = Vec::with_capacity(aggregates.len());

    for daily in aggregates {
        let values = recent.entry(daily.group.as_str()).or_default();
        values.push_back(daily.value);
        if values.len() > window {
            values.pop_front();
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;

        points.push(TrendPoint {
            group: daily.group.clone(),
            date: daily.date,
            value: daily.value,
            rolling_mean: mean,
        });
    }

    points
}
