use thiserror::Error;

/// Failures reaching or querying the warehouse.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("warehouse credentials not found: {0}")]
    CredentialsMissing(String),

    #[error("warehouse rejected credentials: {0}")]
    CredentialsRejected(String),

    #[error("failed to connect to warehouse: {0}")]
    Connection(String),

    #[error("query execution failed: {0}")]
    Query(String),
}

impl From<sqlx::Error> for SourceError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // SQLSTATE class 28: authorization failures
            sqlx::Error::Database(db) if db.code().is_some_and(|code| code.starts_with("28")) => {
                SourceError::CredentialsRejected(db.message().to_string())
            }
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => SourceError::Connection(err.to_string()),
            _ => SourceError::Query(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum DashboardError {
    /// The executor could not produce a result; never reported as empty data.
    #[error("source unavailable: {0}")]
    SourceUnavailable(#[from] SourceError),

    #[error("column '{column}' required for {context} is missing from the source table")]
    SchemaMismatch {
        column: String,
        context: &'static str,
    },

    #[error("row {index}: {message}")]
    InvalidRow { index: usize, message: String },
}

impl DashboardError {
    pub fn schema_mismatch(column: impl Into<String>, context: &'static str) -> Self {
        Self::SchemaMismatch {
            column: column.into(),
            context,
        }
    }

    pub fn invalid_row(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidRow {
            index,
            message: message.into(),
        }
    }

    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, DashboardError::SourceUnavailable(_))
    }
}
