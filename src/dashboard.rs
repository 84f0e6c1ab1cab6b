use std::sync::Arc;

use tracing::{debug, info};

use crate::aggregate::{self, AggregateRequest};
use crate::cache::{Clock, SystemClock, TtlCache};
use crate::config::DashboardConfig;
use crate::db::{QueryExecutor, SqlQuery};
use crate::error::DashboardError;
use crate::models::{DailyAggregate, GroupBy, IngestionRecord, Metric, Reduction, TrendPoint};
use crate::query;
use crate::resolver;
use crate::schema::{self, IngestionBatch};

/// The three dashboard views over one warehouse table.
///
/// Snapshot results are cached for `snapshot_ttl`, raw history batches for
/// `history_ttl`, keyed by the query text and its bound parameters.
pub struct Dashboard<E, C = SystemClock> {
    executor: E,
    config: DashboardConfig,
    snapshots: TtlCache<SqlQuery, Arc<Vec<IngestionRecord>>, C>,
    histories: TtlCache<SqlQuery, Arc<IngestionBatch>, C>,
}

impl<E: QueryExecutor> Dashboard<E> {
    pub fn new(executor: E, config: DashboardConfig) -> Self {
        Self::with_clock(executor, config, SystemClock)
    }
}

impl<E, C> Dashboard<E, C>
where
    E: QueryExecutor,
    C: Clock + Clone,
{
    pub fn with_clock(executor: E, config: DashboardConfig, clock: C) -> Self {
        Self {
            snapshots: TtlCache::with_clock(config.snapshot_ttl, clock.clone()),
            histories: TtlCache::with_clock(config.history_ttl, clock),
            executor,
            config,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Latest record per player.
    pub async fn snapshot(&mut self) -> Result<Arc<Vec<IngestionRecord>>, DashboardError> {
        let query = query::latest_snapshot(&self.config.table);
        if let Some(cached) = self.snapshots.get(&query) {
            debug!(players = cached.len(), "snapshot cache hit");
            return Ok(cached);
        }

        let raw = self.executor.execute(&query).await?;
        if raw.is_empty() {
            info!(table = %self.config.table, "snapshot query returned no rows");
        }
        let batch = schema::normalize(&raw)?;
        let fetched = batch.records.len();
        let resolved = Arc::new(resolver::resolve(batch.records));
        info!(
            executor = self.executor.name(),
            rows = fetched,
            players = resolved.len(),
            "resolved latest snapshot"
        );

        self.snapshots.insert(query, resolved.clone());
        Ok(resolved)
    }

    /// Daily team totals of `metric` with a trailing mean over `window` days.
    pub async fn team_trends(
        &mut self,
        metric: Metric,
        reduction: Reduction,
        window: usize,
    ) -> Result<Vec<TrendPoint>, DashboardError> {
        debug!(%metric, %reduction, window, "building team trends");
        let batch = self.history_batch(None).await?;
        let daily = aggregate::aggregate(&batch, &self.request(GroupBy::Team, metric, reduction))?;
        Ok(aggregate::rolling_mean(&daily, window))
    }

    /// Daily series of `metric` for a single player.
    pub async fn player_history(
        &mut self,
        entity_id: i64,
        metric: Metric,
        reduction: Reduction,
    ) -> Result<Vec<DailyAggregate>, DashboardError> {
        let batch = self.history_batch(Some(entity_id)).await?;
        aggregate::aggregate(&batch, &self.request(GroupBy::Entity, metric, reduction))
    }

    /// Drops expired cache entries, returning how many were removed.
    pub fn purge_expired(&mut self) -> usize {
        let purged = self.snapshots.purge_expired() + self.histories.purge_expired();
        debug!(
            purged,
            remaining = self.snapshots.len() + self.histories.len(),
            "purged result cache"
        );
        purged
    }

    fn request(&self, group_by: GroupBy, metric: Metric, reduction: Reduction) -> AggregateRequest {
        AggregateRequest {
            valid_from: self.config.valid_from,
            group_by,
            metric,
            reduction,
            utc_offset: self.config.utc_offset,
        }
    }

    async fn history_batch(
        &mut self,
        entity_id: Option<i64>,
    ) -> Result<Arc<IngestionBatch>, DashboardError> {
        let query = query::ingestion_history(&self.config.table, entity_id);
        if let Some(cached) = self.histories.get(&query) {
            debug!(rows = cached.records.len(), "history cache hit");
            return Ok(cached);
        }

        let raw = self.executor.execute(&query).await?;
        let batch = Arc::new(schema::normalize(&raw)?);
        info!(
            executor = self.executor.name(),
            rows = batch.records.len(),
            entity_id,
            "loaded ingestion history"
        );

        self.histories.insert(query, batch.clone());
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::cache::tests::ManualClock;
    use crate::db::RawTable;
    use crate::error::SourceError;

    struct FakeWarehouse {
        table: Option<RawTable>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeWarehouse {
        fn serving(table: RawTable) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let fake = Self {
                table: Some(table),
                calls: calls.clone(),
            };
            (fake, calls)
        }

        fn unreachable() -> Self {
            Self {
                table: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl QueryExecutor for FakeWarehouse {
        async fn execute(&self, _query: &SqlQuery) -> Result<RawTable, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.table
                .clone()
                .ok_or_else(|| SourceError::Connection("connection refused".to_string()))
        }

        fn name(&self) -> &'static str {
            "fake"
        }
    }

    fn ingestions() -> RawTable {
        let rows: Vec<Vec<Value>> = vec![
            vec![json!(1), json!("2026-02-13T10:00:00Z"), json!("Haaland"), json!("MCI"), json!(1)],
            vec![json!(1), json!("2026-02-13T11:00:00Z"), json!("Haaland"), json!("MCI"), json!(2)],
            vec![json!(2), json!("2026-02-13T10:30:00Z"), json!("Salah"), json!("LIV"), json!(5)],
        ];
        RawTable::new(
            ["id", "ingested_at", "name", "team", "goals"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            rows,
        )
    }

    #[tokio::test]
    async fn snapshot_resolves_latest_rows() {
        let (warehouse, _) = FakeWarehouse::serving(ingestions());
        let mut dashboard = Dashboard::new(warehouse, DashboardConfig::default());

        let snapshot = dashboard.snapshot().await.unwrap();
        let view: Vec<(i64, &str, i64)> = snapshot
            .iter()
            .map(|r| (r.entity_id, r.display_name.as_str(), r.goals))
            .collect();
        assert_eq!(view, vec![(1, "Haaland", 2), (2, "Salah", 5)]);
    }

    #[tokio::test]
    async fn snapshot_is_cached_until_ttl() {
        let (warehouse, calls) = FakeWarehouse::serving(ingestions());
        let clock = ManualClock::new();
        let mut dashboard = Dashboard::with_clock(warehouse, DashboardConfig::default(), clock.clone());

        dashboard.snapshot().await.unwrap();
        clock.advance(Duration::from_secs(9 * 60));
        dashboard.snapshot().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        clock.advance(Duration::from_secs(60));
        dashboard.snapshot().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unreachable_source_is_not_empty_data() {
        let mut dashboard = Dashboard::new(FakeWarehouse::unreachable(), DashboardConfig::default());
        let err = dashboard.snapshot().await.unwrap_err();
        assert!(err.is_source_unavailable());

        let err = dashboard
            .team_trends(Metric::Goals, Reduction::Sum, 3)
            .await
            .unwrap_err();
        assert!(err.is_source_unavailable());
    }

    #[tokio::test]
    async fn empty_table_is_an_empty_snapshot() {
        let (warehouse, _) = FakeWarehouse::serving(RawTable::default());
        let mut dashboard = Dashboard::new(warehouse, DashboardConfig::default());
        assert!(dashboard.snapshot().await.unwrap().is_empty());
        assert!(dashboard
            .player_history(1, Metric::Goals, Reduction::Sum)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn team_trends_sum_daily_goals() {
        let (warehouse, _) = FakeWarehouse::serving(ingestions());
        let mut dashboard = Dashboard::new(warehouse, DashboardConfig::default());

        let trends = dashboard.team_trends(Metric::Goals, Reduction::Sum, 7).await.unwrap();
        let view: Vec<(&str, f64)> = trends.iter().map(|p| (p.group.as_str(), p.value)).collect();
        assert_eq!(view, vec![("LIV", 5.0), ("MCI", 3.0)]);
    }

    #[tokio::test]
    async fn history_cutoff_is_applied_in_memory() {
        let (warehouse, _) = FakeWarehouse::serving(ingestions());
        let config = DashboardConfig::default()
            .with_valid_from(Some("2026-02-13T10:45:00Z".parse().unwrap()));
        let mut dashboard = Dashboard::new(warehouse, config);

        let history = dashboard
            .player_history(1, Metric::Goals, Reduction::Max)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].value, 2.0);
        assert_eq!(history[0].label, "Haaland");
    }

    #[tokio::test]
    async fn missing_metric_column_surfaces_schema_mismatch() {
        let (warehouse, _) = FakeWarehouse::serving(ingestions());
        let mut dashboard = Dashboard::new(warehouse, DashboardConfig::default());
        let err = dashboard
            .team_trends(Metric::CleanSheets, Reduction::Sum, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn text_and_epoch_timestamps_are_ranked_chronologically() {
        let rows: Vec<Vec<Value>> = vec![
            vec![json!(1), json!("2026-02-13 10:00"), json!("Isak"), json!("NEW"), json!(4)],
            vec![json!(1), json!("2026-02-13T09:00"), json!("Isak"), json!("NEW"), json!(3)],
            vec![json!(2), json!(1_770_976_800_000_i64), json!("Gordon"), json!("NEW"), json!(6)],
            vec![json!(2), json!("2026-02-13T08:00:00Z"), json!("Gordon"), json!("NEW"), json!(1)],
        ];
        let table = RawTable::new(
            ["id", "ingested_at", "name", "team", "goals"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            rows,
        );
        let (warehouse, _) = FakeWarehouse::serving(table);
        let config = DashboardConfig::default()
            .with_valid_from(Some("2026-02-13T09:30:00Z".parse().unwrap()));
        let mut dashboard = Dashboard::new(warehouse, config);

        let snapshot = dashboard.snapshot().await.unwrap();
        let view: Vec<(i64, i64)> = snapshot.iter().map(|r| (r.entity_id, r.goals)).collect();
        assert_eq!(view, vec![(1, 4), (2, 6)]);

        let trends = dashboard.team_trends(Metric::Goals, Reduction::Sum, 7).await.unwrap();
        let view: Vec<(&str, f64)> = trends.iter().map(|p| (p.group.as_str(), p.value)).collect();
        assert_eq!(view, vec![("NEW", 10.0)]);
    }
}
