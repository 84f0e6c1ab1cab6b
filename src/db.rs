use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Decimal;
use sqlx::{Column, PgPool, Row, TypeInfo};
use tracing::{debug, info, warn};

use crate::error::SourceError;

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryParam {
    Int(i64),
}

/// SQL text plus positional parameters (`$1`, `$2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, param: QueryParam) -> Self {
        self.params.push(param);
        self
    }
}

/// Ordered column names and JSON-typed cells, as returned by the warehouse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, query: &SqlQuery) -> Result<RawTable, SourceError>;

    /// Executor name for logging
    fn name(&self) -> &'static str;
}

pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Builds a lazily connecting pool, so connection and credential
    /// failures surface on the first query rather than at startup.
    pub fn connect_lazy(database_url: Option<&str>, max_connections: u32) -> Result<Self, SourceError> {
        let url = database_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| SourceError::CredentialsMissing("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_lazy(url)?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn execute(&self, query: &SqlQuery) -> Result<RawTable, SourceError> {
        let started = Instant::now();
        debug!(sql = %query.sql, params = query.params.len(), "executing warehouse query");

        let mut statement = sqlx::query(&query.sql);
        for param in &query.params {
            statement = match param {
                QueryParam::Int(value) => statement.bind(*value),
            };
        }

        let records = statement.fetch_all(&self.pool).await?;
        let table = rows_to_table(&records)?;

        info!(
            rows = table.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "warehouse query returned"
        );
        Ok(table)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

fn rows_to_table(records: &[PgRow]) -> Result<RawTable, SourceError> {
    let Some(first) = records.first() else {
        return Ok(RawTable::default());
    };

    let columns: Vec<String> = first
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect();
    let mut unsupported: Vec<String> = Vec::new();
    let mut rows = Vec::with_capacity(records.len());

    for record in records {
        let mut cells = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            match decode_cell(record, index)? {
                Some(value) => cells.push(value),
                None => {
                    let type_name = record.columns()[index].type_info().name().to_string();
                    let entry = format!("{} ({type_name})", columns[index]);
                    if !unsupported.contains(&entry) {
                        unsupported.push(entry);
                    }
                    cells.push(Value::Null);
                }
            }
        }
        rows.push(cells);
    }

    if !unsupported.is_empty() {
        warn!(columns = ?unsupported, "unsupported column types read as null");
    }

    Ok(RawTable::new(columns, rows))
}

/// Returns `None` when the column type has no JSON mapping.
fn decode_cell(row: &PgRow, index: usize) -> Result<Option<Value>, SourceError> {
    let type_name = row.columns()[index].type_info().name();

    let value: Option<Value> = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::from),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| Value::from(f64::from(v))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::from),
        "NUMERIC" => row.try_get::<Option<Decimal>, _>(index)?.map(numeric_value),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => {
            row.try_get::<Option<String>, _>(index)?.map(Value::from)
        }
        "TIMESTAMPTZ" => row
            .try_get::<Option<DateTime<Utc>>, _>(index)?
            .map(|ts| Value::from(ts.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<NaiveDateTime>, _>(index)?
            .map(|ts| Value::from(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string())),
        "DATE" => row
            .try_get::<Option<NaiveDate>, _>(index)?
            .map(|date| Value::from(date.to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?,
        _ => return Ok(None),
    };

    Ok(Some(value.unwrap_or(Value::Null)))
}

/// Decimal text keeps the exact value; `schema` parses it like any numeric string.
fn numeric_value(value: Decimal) -> Value {
    Value::from(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_database_url_is_credentials_error() {
        let err = PgExecutor::connect_lazy(None, 5).err().unwrap();
        assert!(matches!(err, SourceError::CredentialsMissing(_)));

        let err = PgExecutor::connect_lazy(Some("  "), 5).err().unwrap();
        assert!(matches!(err, SourceError::CredentialsMissing(_)));
    }

    #[test]
    fn raw_table_finds_columns_by_name() {
        let table = RawTable::new(
            vec!["id".to_string(), "web_name".to_string()],
            vec![vec![Value::from(1), Value::from("Salah")]],
        );
        assert_eq!(table.column_index("web_name"), Some(1));
        assert_eq!(table.column_index("name"), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn queries_collect_params_in_order() {
        let query = SqlQuery::new("SELECT * FROM t WHERE id = $1 OR id = $2")
            .bind(QueryParam::Int(4))
            .bind(QueryParam::Int(9));
        assert_eq!(query.params, vec![QueryParam::Int(4), QueryParam::Int(9)]);
    }

    #[test]
    fn numeric_cells_keep_their_value() {
        assert_eq!(numeric_value(Decimal::new(735, 2)), Value::from("7.35"));
        assert_eq!(numeric_value(Decimal::new(12, 0)), Value::from("12"));
        assert_eq!(numeric_value(Decimal::new(-5, 1)), Value::from("-0.5"));
    }

    #[test]
    fn numeric_metric_columns_are_not_zero_filled() {
        let table = RawTable::new(
            ["id", "ingested_at", "form", "ict_index", "goals"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            vec![vec![
                Value::from(11),
                Value::from("2026-02-13T10:00:00Z"),
                numeric_value(Decimal::new(735, 2)),
                numeric_value(Decimal::new(1204, 1)),
                numeric_value(Decimal::new(3, 0)),
            ]],
        );
        let record = &crate::schema::normalize(&table).unwrap().records[0];
        assert_eq!(record.form, 7.35);
        assert_eq!(record.ict_index, 120.4);
        assert_eq!(record.goals, 3);
    }
}
