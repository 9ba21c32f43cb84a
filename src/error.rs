use thiserror::Error;

/// Errors surfaced by a row store while servicing a single call.
#[derive(Debug, Error)]
pub enum RowStoreError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[cfg(feature = "rest")]
    #[error(transparent)]
    HttpError(#[from] reqwest::Error),

    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("no such column `{column}` in table `{table}`")]
    NoSuchColumn { table: String, column: String },

    #[error("row store rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Other row store error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum SqlShimError {
    #[error("Unrecognized statement: {0}")]
    UnrecognizedStatement(String),

    #[error("Syntax error at byte {position}: {message}")]
    SyntaxError { position: usize, message: String },

    #[error("Parameter arity mismatch: {0}")]
    ArityMismatch(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("{operation} on `{table}` failed: {source}")]
    QueryExecution {
        operation: String,
        table: String,
        #[source]
        source: RowStoreError,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SqlShimError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        SqlShimError::SyntaxError {
            position,
            message: message.into(),
        }
    }

    /// The row store error behind a `QueryExecution` failure, if any.
    #[must_use]
    pub fn store_error(&self) -> Option<&RowStoreError> {
        match self {
            SqlShimError::QueryExecution { source, .. } => Some(source),
            _ => None,
        }
    }
}
