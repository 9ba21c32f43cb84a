use clap::{Parser, ValueEnum};
use serde_json::Value as JsonValue;
use sql_shim::prelude::*;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum BackendKind {
    Memory,
    Sqlite,
    Rest,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Run one SQL statement against a row store")]
pub(crate) struct Args {
    /// Statement text, e.g. "SELECT * FROM users WHERE id = ?".
    pub(crate) sql: String,
    #[arg(long, value_enum, default_value = "sqlite")]
    pub(crate) backend: BackendKind,
    /// SQLite database file.
    #[arg(long, env = "SQL_SHIM_DB", default_value = ":memory:")]
    pub(crate) db: String,
    #[arg(long, env = "SQL_SHIM_REST_URL")]
    pub(crate) rest_url: Option<String>,
    #[arg(long, env = "SQL_SHIM_REST_KEY", hide_env_values = true)]
    pub(crate) rest_key: Option<String>,
    /// Declare a table for the memory backend, as `name:col,col`.
    #[arg(long = "table", value_parser = parse_table)]
    pub(crate) tables: Vec<TableSpec>,
    #[arg(long, value_enum, default_value = "strict")]
    pub(crate) mode: ParseMode,
    #[arg(long, value_enum, default_value = "all")]
    pub(crate) cardinality: Cardinality,
    /// Positional parameter as JSON (`7`, `"text"`, `true`, `null`); bare words are text.
    #[arg(long = "param", value_parser = parse_param, allow_hyphen_values = true)]
    pub(crate) params: Vec<Scalar>,
    /// Print the parsed descriptor instead of executing.
    #[arg(long)]
    pub(crate) explain: bool,
    #[arg(long, short)]
    pub(crate) verbose: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct TableSpec {
    pub(crate) name: String,
    pub(crate) columns: Vec<String>,
}

fn parse_table(raw: &str) -> Result<TableSpec, String> {
    let (name, columns) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `name:col,col`, got `{raw}`"))?;
    let name = name.trim();
    let columns: Vec<String> = columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if name.is_empty() || columns.is_empty() {
        return Err(format!("table spec `{raw}` needs a name and at least one column"));
    }
    Ok(TableSpec {
        name: name.to_string(),
        columns,
    })
}

fn parse_param(raw: &str) -> Result<Scalar, String> {
    match serde_json::from_str::<JsonValue>(raw) {
        Ok(value @ (JsonValue::Array(_) | JsonValue::Object(_))) => {
            Err(format!("parameters must be scalars, got {value}"))
        }
        Ok(value) => Ok(Scalar::from_json(&value)),
        Err(_) => Ok(Scalar::Text(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_json_scalars() {
        assert_eq!(parse_param("7"), Ok(Scalar::Int(7)));
        assert_eq!(parse_param("\"7\""), Ok(Scalar::Text("7".into())));
        assert_eq!(parse_param("null"), Ok(Scalar::Null));
        assert_eq!(parse_param("lamp"), Ok(Scalar::Text("lamp".into())));
        assert!(parse_param("[1]").is_err());
    }

    #[test]
    fn table_specs() {
        let spec = parse_table("users: id, name").expect("valid");
        assert_eq!(spec.name, "users");
        assert_eq!(spec.columns, vec!["id", "name"]);
        assert!(parse_table("users").is_err());
        assert!(parse_table("users:").is_err());
    }
}
