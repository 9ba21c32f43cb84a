use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use super::{RowStore, SelectQuery};
use crate::error::RowStoreError;
use crate::results::Row;
use crate::statement::ColumnValues;
use crate::types::Scalar;

/// An in-process row store holding tables in memory.
///
/// Tables must be declared with their columns before use. A column named `id` is filled from a
/// per-table counter when an insert leaves it out.
///
/// ```rust
/// use sql_shim::prelude::*;
///
/// let store = MemoryRowStore::new().with_table("products", ["id", "name", "price"]);
/// assert_eq!(store.row_count("products"), Some(0));
/// ```
#[derive(Debug, Default)]
pub struct MemoryRowStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

#[derive(Debug)]
struct MemoryTable {
    columns: Arc<Vec<String>>,
    rows: Vec<Vec<Scalar>>,
    next_id: i64,
}

impl MemoryTable {
    fn column_index(&self, table: &str, column: &str) -> Result<usize, RowStoreError> {
        self.columns
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| RowStoreError::NoSuchColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
    }

    /// Resolve filters to `(index, value)` pairs once, up front.
    fn resolve<'v>(
        &self,
        table: &str,
        values: &'v ColumnValues,
    ) -> Result<Vec<(usize, &'v Scalar)>, RowStoreError> {
        values
            .iter()
            .map(|(column, value)| Ok((self.column_index(table, column)?, value)))
            .collect()
    }
}

fn matches(row: &[Scalar], filters: &[(usize, &Scalar)]) -> bool {
    filters
        .iter()
        .all(|(idx, expected)| row[*idx].loosely_equals(expected))
}

impl MemoryRowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table, replacing any existing table of the same name.
    #[must_use]
    pub fn with_table<I, C>(self, name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.create_table(name, columns);
        self
    }

    /// Declare a table, replacing any existing table of the same name.
    pub fn create_table<I, C>(&self, name: impl Into<String>, columns: I)
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        let table = MemoryTable {
            columns: Arc::new(columns.into_iter().map(Into::into).collect()),
            rows: Vec::new(),
            next_id: 1,
        };
        self.write().insert(name.into(), table);
    }

    /// Number of rows in `table`, or `None` if it was never declared.
    #[must_use]
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.read().get(table).map(|t| t.rows.len())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, MemoryTable>> {
        match self.tables.read() {
            Ok(guard) => guard,
            // Clear the poison and continue with the recovered data
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, MemoryTable>> {
        match self.tables.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn id_after(table: &str, id: i64) -> Result<i64, RowStoreError> {
    id.checked_add(1).ok_or_else(|| RowStoreError::Rejected {
        status: 400,
        message: format!("id space of `{table}` is exhausted"),
    })
}

fn no_such_table(table: &str) -> RowStoreError {
    RowStoreError::NoSuchTable(table.to_string())
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn select_rows(&self, query: SelectQuery<'_>) -> Result<Vec<Row>, RowStoreError> {
        let tables = self.read();
        let table = tables
            .get(query.table)
            .ok_or_else(|| no_such_table(query.table))?;
        let filters = table.resolve(query.table, query.filters)?;

        let (names, projection) = match query.column_list() {
            None => (
                Arc::clone(&table.columns),
                (0..table.columns.len()).collect::<Vec<_>>(),
            ),
            Some(columns) => {
                let projection = columns
                    .iter()
                    .map(|column| table.column_index(query.table, column))
                    .collect::<Result<Vec<_>, _>>()?;
                (Arc::new(columns), projection)
            }
        };
        let order = query
            .order_by
            .iter()
            .map(|key| Ok((table.column_index(query.table, &key.column)?, key.descending)))
            .collect::<Result<Vec<_>, RowStoreError>>()?;

        let mut matched: Vec<&Vec<Scalar>> = table
            .rows
            .iter()
            .filter(|row| matches(row, &filters))
            .collect();
        if !order.is_empty() {
            matched.sort_by(|a, b| {
                order
                    .iter()
                    .map(|(idx, descending)| {
                        let ord = a[*idx].sort_cmp(&b[*idx]);
                        if *descending { ord.reverse() } else { ord }
                    })
                    .find(|ord| ord.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }

        Ok(matched
            .into_iter()
            .map(|row| {
                let values = projection.iter().map(|idx| row[*idx].clone()).collect();
                Row::new(Arc::clone(&names), values)
            })
            .collect())
    }

    async fn insert_rows(
        &self,
        table_name: &str,
        values: &ColumnValues,
    ) -> Result<Vec<Row>, RowStoreError> {
        let mut tables = self.write();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| no_such_table(table_name))?;
        let assignments = table.resolve(table_name, values)?;

        let mut row = vec![Scalar::Null; table.columns.len()];
        for (idx, value) in assignments {
            row[idx] = value.clone();
        }
        if let Some(id_idx) = table.columns.iter().position(|c| c == "id") {
            match row[id_idx].as_int() {
                None if row[id_idx].is_null() => {
                    let id = table.next_id;
                    table.next_id = id_after(table_name, id)?;
                    row[id_idx] = Scalar::Int(id);
                }
                Some(id) if id >= table.next_id => table.next_id = id_after(table_name, id)?,
                _ => {}
            }
        }

        table.rows.push(row.clone());
        Ok(vec![Row::new(Arc::clone(&table.columns), row)])
    }

    async fn update_rows(
        &self,
        table_name: &str,
        values: &ColumnValues,
        filters: &ColumnValues,
    ) -> Result<usize, RowStoreError> {
        if values.is_empty() {
            return Err(RowStoreError::Rejected {
                status: 400,
                message: format!("UPDATE of `{table_name}` sets no columns"),
            });
        }
        let mut tables = self.write();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| no_such_table(table_name))?;
        let assignments: Vec<(usize, Scalar)> = table
            .resolve(table_name, values)?
            .into_iter()
            .map(|(idx, value)| (idx, value.clone()))
            .collect();
        let filters = table.resolve(table_name, filters)?;

        let mut changed = 0;
        for row in table.rows.iter_mut().filter(|row| matches(row, &filters)) {
            for (idx, value) in &assignments {
                row[*idx] = value.clone();
            }
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_rows(
        &self,
        table_name: &str,
        filters: &ColumnValues,
    ) -> Result<usize, RowStoreError> {
        let mut tables = self.write();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| no_such_table(table_name))?;
        let filters = table.resolve(table_name, filters)?;

        let before = table.rows.len();
        table.rows.retain(|row| !matches(row, &filters));
        Ok(before - table.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::OrderBy;

    fn store() -> MemoryRowStore {
        MemoryRowStore::new().with_table("products", ["id", "name", "price"])
    }

    fn values(pairs: &[(&str, Scalar)]) -> ColumnValues {
        pairs.iter().cloned().collect()
    }

    fn all<'a>(table: &'a str, filters: &'a ColumnValues) -> SelectQuery<'a> {
        SelectQuery {
            table,
            filters,
            columns: "*",
            order_by: &[],
            limit: None,
        }
    }

    #[tokio::test]
    async fn insert_assigns_ids() -> Result<(), RowStoreError> {
        let store = store();
        let first = store
            .insert_rows("products", &values(&[("name", "lamp".into())]))
            .await?;
        assert_eq!(first[0].id(), Some(&Scalar::Int(1)));
        let explicit = store
            .insert_rows("products", &values(&[("id", Scalar::Int(10))]))
            .await?;
        assert_eq!(explicit[0].id(), Some(&Scalar::Int(10)));
        let next = store.insert_rows("products", &ColumnValues::new()).await?;
        assert_eq!(next[0].id(), Some(&Scalar::Int(11)));
        assert_eq!(next[0].get("name"), Some(&Scalar::Null));
        Ok(())
    }

    #[tokio::test]
    async fn select_filters_projects_orders_and_limits() -> Result<(), RowStoreError> {
        let store = store();
        for (name, price) in [("a", 3), ("b", 1), ("c", 2), ("d", 1)] {
            store
                .insert_rows(
                    "products",
                    &values(&[("name", name.into()), ("price", Scalar::Int(price))]),
                )
                .await?;
        }
        let filters = values(&[("price", Scalar::Float(1.0))]);
        let rows = store.select_rows(all("products", &filters)).await?;
        assert_eq!(rows.len(), 2);

        let none = ColumnValues::new();
        let order = [OrderBy::desc("price"), OrderBy::asc("name")];
        let rows = store
            .select_rows(SelectQuery {
                table: "products",
                filters: &none,
                columns: "name",
                order_by: &order,
                limit: Some(3),
            })
            .await?;
        let names: Vec<_> = rows.iter().map(|r| r.get("name").cloned()).collect();
        assert_eq!(
            names,
            vec![Some("a".into()), Some("c".into()), Some("b".into())]
        );
        assert_eq!(rows[0].len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn update_and_delete_count_matches() -> Result<(), RowStoreError> {
        let store = store();
        for price in [5, 5, 7] {
            store
                .insert_rows("products", &values(&[("price", Scalar::Int(price))]))
                .await?;
        }
        let changed = store
            .update_rows(
                "products",
                &values(&[("name", "sale".into())]),
                &values(&[("price", Scalar::Int(5))]),
            )
            .await?;
        assert_eq!(changed, 2);
        let removed = store
            .delete_rows("products", &values(&[("name", "sale".into())]))
            .await?;
        assert_eq!(removed, 2);
        assert_eq!(store.row_count("products"), Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_tables_and_columns_fail() {
        let store = store();
        let none = ColumnValues::new();
        let err = store.select_rows(all("nope", &none)).await.unwrap_err();
        assert!(matches!(err, RowStoreError::NoSuchTable(_)));
        let err = store
            .insert_rows("products", &values(&[("colour", "red".into())]))
            .await
            .unwrap_err();
        assert!(matches!(err, RowStoreError::NoSuchColumn { .. }));
        let err = store
            .update_rows("products", &none, &none)
            .await
            .unwrap_err();
        assert!(matches!(err, RowStoreError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn explicit_max_id_exhausts_auto_ids() -> Result<(), RowStoreError> {
        let store = store();
        let err = store
            .insert_rows("products", &values(&[("id", Scalar::Int(i64::MAX))]))
            .await
            .unwrap_err();
        assert!(matches!(err, RowStoreError::Rejected { status: 400, .. }));
        assert_eq!(store.row_count("products"), Some(0));

        let inserted = store
            .insert_rows("products", &values(&[("name", "lamp".into())]))
            .await?;
        assert_eq!(inserted[0].id(), Some(&Scalar::Int(1)));
        Ok(())
    }
}
