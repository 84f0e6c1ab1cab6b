use std::fmt;

use crate::db::{QueryParam, SqlQuery};
use crate::schema::ID_COLUMN;

/// A `"database"."table"` reference with quoted identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}",
            quote_ident(&self.database),
            quote_ident(&self.table)
        )
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Every ingestion, ordered by entity.
///
/// `ingested_at` is not interpreted server-side: the column may hold text or
/// epoch milliseconds, so ranking happens in [`crate::resolver::resolve`]
/// after normalization.
pub fn latest_snapshot(table: &TableRef) -> SqlQuery {
    SqlQuery::new(format!("SELECT * FROM {table} ORDER BY {ID_COLUMN}"))
}

/// Raw ingestion stream, optionally for one entity.
///
/// The valid-from cutoff is applied in memory by the aggregator for the
/// same reason the snapshot is ranked there.
pub fn ingestion_history(table: &TableRef, entity_id: Option<i64>) -> SqlQuery {
    let mut query = SqlQuery::new(format!("SELECT * FROM {table}"));

    if let Some(id) = entity_id {
        query = query.bind(QueryParam::Int(id));
        query
            .sql
            .push_str(&format!(" WHERE {ID_COLUMN} = ${}", query.params.len()));
    }
    query.sql.push_str(&format!(" ORDER BY {ID_COLUMN}"));

    query
}
