use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{Connection, Statement, ToSql};
use tracing::debug;

use super::{RowStore, SelectQuery};
use crate::error::{RowStoreError, SqlShimError};
use crate::results::Row;
use crate::statement::ColumnValues;
use crate::types::Scalar;

/// Options for opening a `SQLite` row store.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// SQL run once after opening, e.g. `CREATE TABLE IF NOT EXISTS ...`.
    pub init_sql: Option<String>,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            init_sql: None,
        }
    }

    #[must_use]
    pub fn with_init_sql(mut self, init_sql: impl Into<String>) -> Self {
        self.init_sql = Some(init_sql.into());
        self
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn init_sql(mut self, init_sql: impl Into<String>) -> Self {
        self.opts.init_sql = Some(init_sql.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Open the database and build the store.
    ///
    /// # Errors
    ///
    /// Returns `SqlShimError::ConfigError` if the database cannot be opened or the init SQL fails.
    pub async fn build(self) -> Result<SqliteRowStore, SqlShimError> {
        SqliteRowStore::open(self.finish()).await
    }
}

/// A row store backed by a single `SQLite` connection.
///
/// `rusqlite` is blocking, so every call hops onto tokio's blocking pool with the connection
/// behind a mutex. Statements are generated with quoted identifiers and numbered `?N`
/// placeholders; values are never spliced into SQL text.
#[derive(Debug, Clone)]
pub struct SqliteRowStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRowStore {
    #[must_use]
    pub fn builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Open (or create) the database at `opts.db_path`. `:memory:` gives a private database.
    ///
    /// # Errors
    /// Returns `SqlShimError::ConfigError` if opening the file or running `init_sql` fails.
    pub async fn open(opts: SqliteOptions) -> Result<Self, SqlShimError> {
        let SqliteOptions { db_path, init_sql } = opts;
        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&db_path)?;
            if db_path != ":memory:" {
                conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            }
            if let Some(init_sql) = init_sql {
                conn.execute_batch(&init_sql)?;
            }
            Ok::<_, rusqlite::Error>(conn)
        })
        .await
        .map_err(|e| SqlShimError::ConfigError(format!("SQLite open task failed: {e}")))?
        .map_err(|e| SqlShimError::ConfigError(format!("Failed to open SQLite database: {e}")))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an already opened connection.
    #[must_use]
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run a batch of SQL (no parameters), e.g. to create tables.
    ///
    /// # Errors
    /// Returns `RowStoreError::SqliteError` if any statement in the batch fails.
    pub async fn execute_batch(&self, sql: impl Into<String>) -> Result<(), RowStoreError> {
        let sql = sql.into();
        self.with_connection(move |conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })
        .await
    }

    /// Run synchronous work against the connection on the blocking pool.
    async fn with_connection<F, R>(&self, func: F) -> Result<R, RowStoreError>
    where
        F: FnOnce(&mut Connection) -> Result<R, RowStoreError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = match conn.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            func(&mut guard)
        })
        .await
        .map_err(|e| RowStoreError::ConnectionError(format!("SQLite worker task failed: {e}")))?
    }
}

/// Convert a single scalar to a rusqlite `Value`.
#[must_use]
pub fn scalar_to_sqlite_value(value: &Scalar) -> Value {
    match value {
        Scalar::Int(i) => Value::Integer(*i),
        Scalar::Float(f) => Value::Real(*f),
        Scalar::Text(s) => Value::Text(s.clone()),
        Scalar::Bool(b) => Value::Integer(i64::from(*b)),
        Scalar::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        Scalar::Null => Value::Null,
    }
}

/// Convert a `SQLite` value back to a scalar. Blobs come back as (lossy) UTF-8 text.
#[must_use]
pub fn sqlite_value_to_scalar(value: Value) -> Scalar {
    match value {
        Value::Null => Scalar::Null,
        Value::Integer(i) => Scalar::Int(i),
        Value::Real(f) => Scalar::Float(f),
        Value::Text(s) => Scalar::Text(s),
        Value::Blob(b) => Scalar::Text(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// Quote an identifier, doubling embedded quotes. Dotted names are quoted per part.
pub(crate) fn quote_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// A generated statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SqlAndParams {
    pub(crate) sql: String,
    pub(crate) params: Vec<Value>,
}

impl SqlAndParams {
    fn new(sql: String) -> Self {
        Self {
            sql,
            params: Vec::new(),
        }
    }

    /// Append `value` as the next `?N` placeholder and return the placeholder text.
    fn bind(&mut self, value: &Scalar) -> String {
        self.params.push(scalar_to_sqlite_value(value));
        format!("?{}", self.params.len())
    }

    fn push_where(&mut self, filters: &ColumnValues) {
        if filters.is_empty() {
            return;
        }
        let mut clauses = Vec::with_capacity(filters.len());
        for (column, value) in filters.iter() {
            let placeholder = self.bind(value);
            clauses.push(format!("{} = {placeholder}", quote_identifier(column)));
        }
        self.sql.push_str(" WHERE ");
        self.sql.push_str(&clauses.join(" AND "));
    }
}

pub(crate) fn build_select(query: &SelectQuery<'_>) -> SqlAndParams {
    let columns = match query.column_list() {
        None => "*".to_string(),
        Some(columns) => columns
            .iter()
            .map(|c| quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", "),
    };
    let mut stmt = SqlAndParams::new(format!(
        "SELECT {columns} FROM {}",
        quote_identifier(query.table)
    ));
    stmt.push_where(query.filters);
    if !query.order_by.is_empty() {
        let keys: Vec<String> = query
            .order_by
            .iter()
            .map(|key| {
                format!(
                    "{} {}",
                    quote_identifier(&key.column),
                    if key.descending { "DESC" } else { "ASC" }
                )
            })
            .collect();
        stmt.sql.push_str(" ORDER BY ");
        stmt.sql.push_str(&keys.join(", "));
    }
    if let Some(limit) = query.limit {
        stmt.sql.push_str(&format!(" LIMIT {limit}"));
    }
    stmt
}

pub(crate) fn build_insert(table: &str, values: &ColumnValues) -> SqlAndParams {
    let table = quote_identifier(table);
    if values.is_empty() {
        return SqlAndParams::new(format!("INSERT INTO {table} DEFAULT VALUES RETURNING *"));
    }
    let mut stmt = SqlAndParams::new(String::new());
    let columns: Vec<String> = values.columns().map(quote_identifier).collect();
    let placeholders: Vec<String> = values.iter().map(|(_, value)| stmt.bind(value)).collect();
    stmt.sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) RETURNING *",
        columns.join(", "),
        placeholders.join(", ")
    );
    stmt
}

pub(crate) fn build_update(
    table: &str,
    values: &ColumnValues,
    filters: &ColumnValues,
) -> SqlAndParams {
    let mut stmt = SqlAndParams::new(String::new());
    let assignments: Vec<String> = values
        .iter()
        .map(|(column, value)| format!("{} = {}", quote_identifier(column), stmt.bind(value)))
        .collect();
    stmt.sql = format!(
        "UPDATE {} SET {}",
        quote_identifier(table),
        assignments.join(", ")
    );
    stmt.push_where(filters);
    stmt
}

pub(crate) fn build_delete(table: &str, filters: &ColumnValues) -> SqlAndParams {
    let mut stmt = SqlAndParams::new(format!("DELETE FROM {}", quote_identifier(table)));
    stmt.push_where(filters);
    stmt
}

/// Run a row-returning statement and collect every row.
///
/// # Errors
/// Returns `RowStoreError::SqliteError` if execution or value extraction fails.
pub fn build_rows(stmt: &mut Statement, params: &[Value]) -> Result<Vec<Row>, RowStoreError> {
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
    let column_names: Arc<Vec<String>> = Arc::new(
        stmt.column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect(),
    );
    let col_count = column_names.len();

    let mut rows_iter = stmt.query(&param_refs[..])?;
    let mut rows = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let value: Value = row.get(i)?;
            values.push(sqlite_value_to_scalar(value));
        }
        rows.push(Row::new(Arc::clone(&column_names), values));
    }
    Ok(rows)
}

#[async_trait]
impl RowStore for SqliteRowStore {
    async fn select_rows(&self, query: SelectQuery<'_>) -> Result<Vec<Row>, RowStoreError> {
        let SqlAndParams { sql, params } = build_select(&query);
        debug!(%sql, "sqlite select");
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            build_rows(&mut stmt, &params)
        })
        .await
    }

    async fn insert_rows(
        &self,
        table: &str,
        values: &ColumnValues,
    ) -> Result<Vec<Row>, RowStoreError> {
        let SqlAndParams { sql, params } = build_insert(table, values);
        debug!(%sql, "sqlite insert");
        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            build_rows(&mut stmt, &params)
        })
        .await
    }

    async fn update_rows(
        &self,
        table: &str,
        values: &ColumnValues,
        filters: &ColumnValues,
    ) -> Result<usize, RowStoreError> {
        if values.is_empty() {
            return Err(RowStoreError::Rejected {
                status: 400,
                message: format!("UPDATE of `{table}` sets no columns"),
            });
        }
        let SqlAndParams { sql, params } = build_update(table, values, filters);
        debug!(%sql, "sqlite update");
        self.with_connection(move |conn| {
            let changed = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
            Ok(changed)
        })
        .await
    }

    async fn delete_rows(
        &self,
        table: &str,
        filters: &ColumnValues,
    ) -> Result<usize, RowStoreError> {
        let SqlAndParams { sql, params } = build_delete(table, filters);
        debug!(%sql, "sqlite delete");
        self.with_connection(move |conn| {
            let removed = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
            Ok(removed)
        })
        .await
    }
}
