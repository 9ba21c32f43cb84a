//! Statement parsing: SQL text plus positional parameters in, [`StatementDescriptor`] out.
//!
//! Two parsers share one tokenizer. [`parse`] keeps the forgiving behavior legacy callers depend
//! on and never fails; [`parse_strict`] accepts only the documented grammar and reports anything
//! else.

use std::fmt;

use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

use crate::types::Scalar;

mod lenient;
mod scanner;
mod strict;

pub use lenient::parse;
pub use strict::parse_strict;

/// The CRUD verb a statement maps onto.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    /// A keyword no row store call exists for, e.g. `MERGE`.
    Other(String),
}

impl Operation {
    /// Match a leading statement keyword, ignoring case.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Self {
        if keyword.eq_ignore_ascii_case("SELECT") {
            Operation::Select
        } else if keyword.eq_ignore_ascii_case("INSERT") {
            Operation::Insert
        } else if keyword.eq_ignore_ascii_case("UPDATE") {
            Operation::Update
        } else if keyword.eq_ignore_ascii_case("DELETE") {
            Operation::Delete
        } else {
            Operation::Other(keyword.to_ascii_uppercase())
        }
    }

    #[must_use]
    pub fn is_query(&self) -> bool {
        matches!(self, Operation::Select)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Select => f.write_str("SELECT"),
            Operation::Insert => f.write_str("INSERT"),
            Operation::Update => f.write_str("UPDATE"),
            Operation::Delete => f.write_str("DELETE"),
            Operation::Other(keyword) => f.write_str(keyword),
        }
    }
}

/// Insertion-ordered `column -> value` bindings.
///
/// Used both for the WHERE equality map and for INSERT/UPDATE values. Inserting a column that
/// is already present replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnValues {
    entries: Vec<(String, Scalar)>,
}

impl ColumnValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Scalar) {
        let column = column.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Scalar> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl Serialize for ColumnValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>> FromIterator<(K, Scalar)> for ColumnValues {
    fn from_iter<I: IntoIterator<Item = (K, Scalar)>>(iter: I) -> Self {
        let mut values = ColumnValues::new();
        for (column, value) in iter {
            values.insert(column, value);
        }
        values
    }
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    #[must_use]
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    #[must_use]
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// Everything the executor needs to issue one row store call.
///
/// Built fresh for every statement and never mutated by the executor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementDescriptor {
    /// Target table; `None` when none could be found.
    pub table: Option<String>,
    pub operation: Operation,
    /// Equality conditions from the WHERE clause (at most one entry from the parsers).
    pub filters: ColumnValues,
    /// Column bindings for INSERT and UPDATE.
    pub values: ColumnValues,
    /// The raw SELECT column list, or `*`.
    pub select: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl StatementDescriptor {
    /// An empty descriptor for `operation`: no table, no bindings, all columns.
    #[must_use]
    pub fn new(operation: Operation) -> Self {
        Self {
            table: None,
            operation,
            filters: ColumnValues::new(),
            values: ColumnValues::new(),
            select: "*".to_string(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    #[must_use]
    pub fn with_filter(mut self, column: impl Into<String>, value: Scalar) -> Self {
        self.filters.insert(column, value);
        self
    }

    #[must_use]
    pub fn with_value(mut self, column: impl Into<String>, value: Scalar) -> Self {
        self.values.insert(column, value);
        self
    }

    #[must_use]
    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = select.into();
        self
    }

    /// The selected columns, or `None` for `*`.
    #[must_use]
    pub fn selected_columns(&self) -> Option<Vec<String>> {
        split_column_list(&self.select)
    }
}

/// Split a SELECT column list on commas, stripping quotes. `*` (or nothing) means every column.
#[must_use]
pub fn split_column_list(select: &str) -> Option<Vec<String>> {
    let columns: Vec<String> = select
        .split(',')
        .map(|column| column.trim().trim_matches(|c| c == '"' || c == '`').trim())
        .filter(|column| !column.is_empty())
        .map(str::to_string)
        .collect();
    if columns.is_empty() || columns.iter().any(|column| column == "*") {
        None
    } else {
        Some(columns)
    }
}
