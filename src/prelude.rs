//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::config::{ParseMode, ShimOptions, ShimOptionsBuilder};
pub use crate::error::{RowStoreError, SqlShimError};
pub use crate::executor::execute;
pub use crate::results::{Row, RunSummary, StatementOutput};
pub use crate::shim::{SqlShim, StatementBuilder};
pub use crate::statement::{
    ColumnValues, Operation, OrderBy, StatementDescriptor, parse, parse_strict,
};
pub use crate::store::{MemoryRowStore, RowStore, SelectQuery};
pub use crate::types::{Cardinality, Scalar};

#[cfg(feature = "rest")]
pub use crate::store::{RestOptions, RestOptionsBuilder, RestRowStore};
#[cfg(feature = "sqlite")]
pub use crate::store::{SqliteOptions, SqliteOptionsBuilder, SqliteRowStore};
