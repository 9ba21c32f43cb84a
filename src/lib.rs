//! Run a small SQL dialect against table-oriented row stores.
//!
//! Statement text is parsed into a [`StatementDescriptor`] (table, operation, equality filters,
//! assigned values, column list) and executed as exactly one structured call on a [`RowStore`]:
//! an in-memory store, `SQLite` (feature `sqlite`), or a PostgREST-style HTTP API (feature
//! `rest`).
//!
//! ```rust,no_run
//! use sql_shim::prelude::*;
//!
//! # async fn demo() -> Result<(), SqlShimError> {
//! let shim = SqlShim::new(MemoryRowStore::new().with_table("users", ["id", "name"]));
//! shim.prepare("INSERT INTO users (name) VALUES (?)")
//!     .params(&["ana".into()])
//!     .run()
//!     .await?;
//! let users = shim.prepare("SELECT * FROM users").all().await?;
//! assert_eq!(users.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod prelude;

pub mod config;
pub mod error;
pub mod executor;
pub mod results;
pub mod shim;
pub mod statement;
pub mod store;
pub mod types;

pub use config::{ParseMode, ShimOptions, ShimOptionsBuilder};
pub use error::{RowStoreError, SqlShimError};
pub use executor::execute;
pub use results::{Row, RunSummary, StatementOutput};
pub use shim::{SqlShim, StatementBuilder};
pub use statement::{ColumnValues, Operation, OrderBy, StatementDescriptor, parse, parse_strict};
pub use store::{MemoryRowStore, RowStore, SelectQuery};
pub use types::{Cardinality, Scalar};

#[cfg(feature = "rest")]
pub use store::{RestOptions, RestOptionsBuilder, RestRowStore};
#[cfg(feature = "sqlite")]
pub use store::{SqliteOptions, SqliteOptionsBuilder, SqliteRowStore};
