use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A single parameter or column value.
///
/// The same enum is used for bound parameters, filter values and row cells, so row stores never
/// need to know which side of the translation a value came from:
/// ```rust
/// use sql_shim::prelude::*;
///
/// let params = vec![
///     Scalar::Int(1),
///     Scalar::Text("alice".into()),
///     Scalar::Bool(true),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Integer value (64-bit)
    Int(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Boolean value
    Bool(bool),
    /// Timestamp value
    Timestamp(NaiveDateTime),
    /// NULL value
    Null,
}

impl Scalar {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let Scalar::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Scalar::Float(value) => Some(*value),
            #[allow(clippy::cast_precision_loss)]
            Scalar::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Scalar::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(value) => Some(*value),
            Scalar::Int(1) => Some(true),
            Scalar::Int(0) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        if let Scalar::Timestamp(value) = self {
            return Some(*value);
        } else if let Some(s) = self.as_text() {
            // Try "YYYY-MM-DD HH:MM:SS[.fff]", as SQLite stores them
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                return Some(dt);
            }
            // Try "YYYY-MM-DDTHH:MM:SS.fff"
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(dt);
            }
        }
        None
    }

    /// Convert a JSON value coming back from a row store into a scalar.
    ///
    /// Arrays and objects have no scalar counterpart and are kept as their JSON text.
    #[must_use]
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Scalar::Null,
            JsonValue::Bool(b) => Scalar::Bool(*b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Scalar::Text(s.clone()),
            other => Scalar::Text(other.to_string()),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Scalar::Int(i) => JsonValue::from(*i),
            Scalar::Float(f) => JsonValue::from(*f),
            Scalar::Text(s) => JsonValue::from(s.as_str()),
            Scalar::Bool(b) => JsonValue::from(*b),
            Scalar::Timestamp(dt) => JsonValue::from(format_timestamp(dt)),
            Scalar::Null => JsonValue::Null,
        }
    }

    /// Equality used when a row store applies an equality filter itself.
    ///
    /// Integers and floats compare numerically and booleans match the integers 0 and 1, the
    /// way SQLite and PostgREST coerce them. NULL never matches anything, including NULL.
    #[must_use]
    pub fn loosely_equals(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::Null, _) | (_, Scalar::Null) => false,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Int(_) | Scalar::Float(_), Scalar::Int(_) | Scalar::Float(_)) => {
                self.as_float() == other.as_float()
            }
            (Scalar::Bool(_), Scalar::Int(_)) | (Scalar::Int(_), Scalar::Bool(_)) => {
                self.as_bool().is_some() && self.as_bool() == other.as_bool()
            }
            (Scalar::Timestamp(a), Scalar::Text(_)) => other.as_timestamp() == Some(*a),
            (Scalar::Text(_), Scalar::Timestamp(b)) => self.as_timestamp() == Some(*b),
            _ => self == other,
        }
    }

    /// Total order used for `ORDER BY` in stores that sort in process.
    ///
    /// NULL sorts first, then booleans, numbers, text and timestamps.
    #[must_use]
    pub fn sort_cmp(&self, other: &Scalar) -> Ordering {
        match (self, other) {
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Int(_) | Scalar::Float(_), Scalar::Int(_) | Scalar::Float(_)) => {
                let (a, b) = (self.as_float(), other.as_float());
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Timestamp(a), Scalar::Timestamp(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::Int(_) | Scalar::Float(_) => 2,
            Scalar::Text(_) => 3,
            Scalar::Timestamp(_) => 4,
        }
    }
}

pub(crate) fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string()
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(v) => write!(f, "{v}"),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Timestamp(dt) => f.write_str(&format_timestamp(dt)),
            Scalar::Null => f.write_str("null"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<NaiveDateTime> for Scalar {
    fn from(value: NaiveDateTime) -> Self {
        Scalar::Timestamp(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map_or(Scalar::Null, Into::into)
    }
}

/// The shape of result a caller expects back from executing a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Cardinality {
    /// Mutation summary: changed row count and inserted id.
    Run,
    /// The first matching row, or nothing.
    Get,
    /// Every matching row.
    All,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cardinality::Run => "run",
            Cardinality::Get => "get",
            Cardinality::All => "all",
        })
    }
}
