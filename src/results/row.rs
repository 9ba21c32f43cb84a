use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::types::Scalar;

/// A row returned by a row store.
///
/// Column names are shared across all rows of one result so a large result does not repeat
/// them; values are positional.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// The column names for this row (shared across all rows in a result)
    pub column_names: Arc<Vec<String>>,
    /// The values for this row
    pub values: Vec<Scalar>,
}

impl Row {
    /// Create a new row
    ///
    /// # Arguments
    ///
    /// * `column_names` - The column names
    /// * `values` - The values for this row, in column order
    #[must_use]
    pub fn new(column_names: Arc<Vec<String>>, values: Vec<Scalar>) -> Self {
        Self {
            column_names,
            values,
        }
    }

    /// Build a row from `(column, value)` pairs.
    #[must_use]
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Scalar)>,
        K: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<Scalar>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self::new(Arc::new(names), values)
    }

    /// Build a row from a JSON object, as returned by a REST backend.
    ///
    /// Returns `None` when the value is not an object.
    #[must_use]
    pub fn from_json_object(value: &JsonValue) -> Option<Self> {
        let object = value.as_object()?;
        Some(Self::from_pairs(
            object.iter().map(|(k, v)| (k.clone(), Scalar::from_json(v))),
        ))
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn get_column_index(&self, column_name: &str) -> Option<usize> {
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&Scalar> {
        self.get_column_index(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value from the row by column index
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&Scalar> {
        self.values.get(index)
    }

    /// The non-null `id` column, if the row has one.
    #[must_use]
    pub fn id(&self) -> Option<&Scalar> {
        self.get("id").filter(|value| !value.is_null())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.column_names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Collect into a plain map, dropping column order.
    #[must_use]
    pub fn to_map(&self) -> HashMap<String, Scalar> {
        self.iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut object = JsonMap::with_capacity(self.len());
        for (column, value) in self.iter() {
            object.insert(column.to_string(), value.to_json());
        }
        JsonValue::Object(object)
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
