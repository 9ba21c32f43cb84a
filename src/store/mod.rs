//! Row stores: the backends the executor issues structured CRUD calls against.

use async_trait::async_trait;

use crate::error::RowStoreError;
use crate::results::Row;
use crate::statement::{ColumnValues, OrderBy, split_column_list};

mod memory;
#[cfg(feature = "rest")]
pub mod rest;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryRowStore;
#[cfg(feature = "rest")]
pub use rest::{RestOptions, RestOptionsBuilder, RestRowStore};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteOptions, SqliteOptionsBuilder, SqliteRowStore};

/// A read against one table.
#[derive(Debug, Clone, Copy)]
pub struct SelectQuery<'a> {
    pub table: &'a str,
    /// Equality filters, combined with AND.
    pub filters: &'a ColumnValues,
    /// Column list as written (`*` for every column).
    pub columns: &'a str,
    pub order_by: &'a [OrderBy],
    pub limit: Option<usize>,
}

impl SelectQuery<'_> {
    /// The requested columns, or `None` for every column.
    #[must_use]
    pub fn column_list(&self) -> Option<Vec<String>> {
        split_column_list(self.columns)
    }
}

/// Table-scoped CRUD primitives.
///
/// Each method is exactly one round trip to the backend. Implementations are shared between
/// tasks, so they take `&self` and must be `Send + Sync`.
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Return the rows of `query.table` matching every filter.
    async fn select_rows(&self, query: SelectQuery<'_>) -> Result<Vec<Row>, RowStoreError>;

    /// Insert one row and return what was stored, including generated columns.
    async fn insert_rows(&self, table: &str, values: &ColumnValues)
    -> Result<Vec<Row>, RowStoreError>;

    /// Apply `values` to every row matching `filters`; returns the number of rows changed.
    async fn update_rows(
        &self,
        table: &str,
        values: &ColumnValues,
        filters: &ColumnValues,
    ) -> Result<usize, RowStoreError>;

    /// Delete every row matching `filters`; returns the number of rows removed.
    async fn delete_rows(&self, table: &str, filters: &ColumnValues)
    -> Result<usize, RowStoreError>;
}

#[async_trait]
impl<S: RowStore + ?Sized> RowStore for std::sync::Arc<S> {
    async fn select_rows(&self, query: SelectQuery<'_>) -> Result<Vec<Row>, RowStoreError> {
        (**self).select_rows(query).await
    }

    async fn insert_rows(
        &self,
        table: &str,
        values: &ColumnValues,
    ) -> Result<Vec<Row>, RowStoreError> {
        (**self).insert_rows(table, values).await
    }

    async fn update_rows(
        &self,
        table: &str,
        values: &ColumnValues,
        filters: &ColumnValues,
    ) -> Result<usize, RowStoreError> {
        (**self).update_rows(table, values, filters).await
    }

    async fn delete_rows(
        &self,
        table: &str,
        filters: &ColumnValues,
    ) -> Result<usize, RowStoreError> {
        (**self).delete_rows(table, filters).await
    }
}
