use std::borrow::Cow;
use std::sync::Arc;

use crate::config::{ParseMode, ShimOptions};
use crate::error::SqlShimError;
use crate::executor::execute;
use crate::results::{Row, RunSummary, StatementOutput};
use crate::statement::StatementDescriptor;
use crate::store::RowStore;
use crate::types::{Cardinality, Scalar};

/// Entry point: SQL text in, row-store calls out.
///
/// Cheap to clone and safe to share between tasks; clones use the same store.
///
/// ```rust,no_run
/// use sql_shim::prelude::*;
///
/// # async fn demo() -> Result<(), SqlShimError> {
/// let shim = SqlShim::new(MemoryRowStore::new().with_table("products", ["id", "name"]));
/// shim.prepare("INSERT INTO products (name) VALUES (?)")
///     .params(&["lamp".into()])
///     .run()
///     .await?;
/// let lamp = shim
///     .prepare("SELECT name FROM products WHERE id = ?")
///     .params(&[Scalar::Int(1)])
///     .get()
///     .await?;
/// assert!(lamp.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SqlShim<S: RowStore + ?Sized> {
    store: Arc<S>,
    options: ShimOptions,
}

impl<S: RowStore + ?Sized> Clone for SqlShim<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            options: self.options,
        }
    }
}

impl<S: RowStore> SqlShim<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }
}

impl<S: RowStore + ?Sized> SqlShim<S> {
    /// Wrap a store that is already shared, e.g. `Arc<dyn RowStore>`.
    #[must_use]
    pub fn from_arc(store: Arc<S>) -> Self {
        Self {
            store,
            options: ShimOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: ShimOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn options(&self) -> ShimOptions {
        self.options
    }

    /// Start a statement.
    pub fn prepare<'a>(&'a self, sql: &'a str) -> StatementBuilder<'a, S> {
        StatementBuilder {
            shim: self,
            sql,
            params: Cow::Borrowed(&[]),
            parse_mode: self.options.parse_mode,
        }
    }
}

/// One statement plus its parameters, ready to run.
pub struct StatementBuilder<'a, S: RowStore + ?Sized> {
    shim: &'a SqlShim<S>,
    sql: &'a str,
    params: Cow<'a, [Scalar]>,
    parse_mode: ParseMode,
}

impl<'a, S: RowStore + ?Sized> StatementBuilder<'a, S> {
    /// Provide positional parameters.
    #[must_use]
    pub fn params(mut self, params: &'a [Scalar]) -> Self {
        self.params = Cow::Borrowed(params);
        self
    }

    /// Provide owned parameters.
    #[must_use]
    pub fn params_owned(mut self, params: Vec<Scalar>) -> Self {
        self.params = Cow::Owned(params);
        self
    }

    /// Override the parse mode for this statement only.
    #[must_use]
    pub fn parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    /// Parse without executing.
    ///
    /// # Errors
    /// Strict-mode parse errors.
    pub fn describe(&self) -> Result<StatementDescriptor, SqlShimError> {
        self.parse_mode.parse(self.sql, &self.params)
    }

    /// Parse and run with an explicit cardinality.
    ///
    /// # Errors
    /// Parse errors, dispatch errors, or the row store's failure wrapped in `QueryExecution`.
    pub async fn execute(self, cardinality: Cardinality) -> Result<StatementOutput, SqlShimError> {
        let descriptor = self.describe()?;
        execute(self.shim.store.as_ref(), &descriptor, cardinality).await
    }

    /// Run for side effects and return the mutation summary.
    ///
    /// # Errors
    /// See [`execute`](Self::execute).
    pub async fn run(self) -> Result<RunSummary, SqlShimError> {
        Ok(self.execute(Cardinality::Run).await?.into_summary())
    }

    /// Fetch the first matching row. Only valid for SELECT.
    ///
    /// # Errors
    /// `UnsupportedOperation` for anything but SELECT; otherwise see [`execute`](Self::execute).
    pub async fn get(self) -> Result<Option<Row>, SqlShimError> {
        let descriptor = self.describe_query()?;
        Ok(execute(self.shim.store.as_ref(), &descriptor, Cardinality::Get)
            .await?
            .into_row())
    }

    /// Fetch every matching row. Only valid for SELECT.
    ///
    /// # Errors
    /// `UnsupportedOperation` for anything but SELECT; otherwise see [`execute`](Self::execute).
    pub async fn all(self) -> Result<Vec<Row>, SqlShimError> {
        let descriptor = self.describe_query()?;
        Ok(execute(self.shim.store.as_ref(), &descriptor, Cardinality::All)
            .await?
            .into_rows())
    }

    fn describe_query(&self) -> Result<StatementDescriptor, SqlShimError> {
        let descriptor = self.describe()?;
        if descriptor.operation.is_query() {
            Ok(descriptor)
        } else {
            Err(SqlShimError::UnsupportedOperation(format!(
                "{} does not return rows; use run()",
                descriptor.operation
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRowStore;

    fn shim() -> SqlShim<MemoryRowStore> {
        SqlShim::new(MemoryRowStore::new().with_table("users", ["id", "name", "age"]))
    }

    #[tokio::test]
    async fn crud_round() -> Result<(), SqlShimError> {
        let shim = shim();
        let summary = shim
            .prepare("INSERT INTO users (name, age) VALUES (?, ?)")
            .params(&["ana".into(), Scalar::Int(31)])
            .run()
            .await?;
        assert_eq!(summary.inserted_id, Some(Scalar::Int(1)));

        let row = shim
            .prepare("SELECT name FROM users WHERE id = ?")
            .params(&[Scalar::Int(1)])
            .get()
            .await?
            .expect("row");
        assert_eq!(row.get("name"), Some(&Scalar::from("ana")));

        let changed = shim
            .prepare("UPDATE users SET age = 32 WHERE name = ?")
            .params_owned(vec!["ana".into()])
            .run()
            .await?;
        assert_eq!(changed.changes, 1);

        let removed = shim
            .prepare("DELETE FROM users WHERE id = ?")
            .params(&[Scalar::Int(1)])
            .run()
            .await?;
        assert_eq!(removed.changes, 1);
        assert!(shim.prepare("SELECT * FROM users").all().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn get_and_all_reject_mutations() {
        let shim = shim();
        let err = shim
            .prepare("DELETE FROM users WHERE id = ?")
            .params(&[Scalar::Int(1)])
            .all()
            .await
            .unwrap_err();
        assert!(matches!(err, SqlShimError::UnsupportedOperation(_)));
        assert_eq!(shim.store().row_count("users"), Some(0));
    }

    #[tokio::test]
    async fn per_statement_parse_mode_override() -> Result<(), SqlShimError> {
        let shim = shim();
        let strict = shim.prepare("SELECT * FROM users WHERE id = ? AND age = ?");
        assert!(strict.describe().is_err());

        let rows = shim
            .prepare("SELECT * FROM users WHERE id = ? AND age = ?")
            .params(&[Scalar::Int(1), Scalar::Int(2)])
            .parse_mode(ParseMode::Lenient)
            .all()
            .await?;
        assert!(rows.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn clones_share_the_store() -> Result<(), SqlShimError> {
        let shim = shim();
        let clone = shim.clone();
        clone
            .prepare("INSERT INTO users (name) VALUES ('bo')")
            .run()
            .await?;
        assert_eq!(shim.store().row_count("users"), Some(1));
        Ok(())
    }
}
