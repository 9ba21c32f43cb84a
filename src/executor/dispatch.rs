use tracing::{debug, warn};

use crate::error::{RowStoreError, SqlShimError};
use crate::results::{Row, RunSummary, StatementOutput};
use crate::statement::{Operation, StatementDescriptor};
use crate::store::{RowStore, SelectQuery};
use crate::types::Cardinality;

/// Run a parsed statement against a row store.
///
/// The operation picks exactly one store call; the cardinality only shapes what comes back.
/// Statements that cannot be dispatched (unknown operation, no table) fail before the store is
/// touched.
///
/// # Errors
/// - `UnsupportedOperation` for `Operation::Other` or a descriptor without a table.
/// - `QueryExecution` wrapping whatever the store reported.
pub async fn execute<S: RowStore + ?Sized>(
    store: &S,
    descriptor: &StatementDescriptor,
    cardinality: Cardinality,
) -> Result<StatementOutput, SqlShimError> {
    let table = dispatch_table(descriptor)?;
    debug!(
        operation = %descriptor.operation,
        table,
        %cardinality,
        "dispatching statement"
    );

    let outcome = match &descriptor.operation {
        Operation::Select => {
            let query = SelectQuery {
                table,
                filters: &descriptor.filters,
                columns: &descriptor.select,
                order_by: &descriptor.order_by,
                limit: descriptor.limit,
            };
            store
                .select_rows(query)
                .await
                .map(|rows| shape_rows(rows, cardinality))
        }
        Operation::Insert => store
            .insert_rows(table, &descriptor.values)
            .await
            .map(|inserted| StatementOutput::Run(insert_summary(&inserted))),
        Operation::Update => store
            .update_rows(table, &descriptor.values, &descriptor.filters)
            .await
            .map(changes_summary),
        Operation::Delete => store
            .delete_rows(table, &descriptor.filters)
            .await
            .map(changes_summary),
        Operation::Other(keyword) => return Err(unsupported(keyword)),
    };

    outcome.map_err(|source| wrap_store_error(descriptor, table, source))
}

fn dispatch_table(descriptor: &StatementDescriptor) -> Result<&str, SqlShimError> {
    if let Operation::Other(keyword) = &descriptor.operation {
        return Err(unsupported(keyword));
    }
    match descriptor.table.as_deref() {
        Some(table) if !table.trim().is_empty() => Ok(table),
        _ => Err(SqlShimError::UnsupportedOperation(format!(
            "{} statement names no table",
            descriptor.operation
        ))),
    }
}

fn unsupported(keyword: &str) -> SqlShimError {
    SqlShimError::UnsupportedOperation(keyword.to_string())
}

fn shape_rows(rows: Vec<Row>, cardinality: Cardinality) -> StatementOutput {
    match cardinality {
        Cardinality::Get => StatementOutput::Row(rows.into_iter().next()),
        Cardinality::All => StatementOutput::Rows(rows),
        Cardinality::Run => StatementOutput::Run(RunSummary::default()),
    }
}

fn insert_summary(inserted: &[Row]) -> RunSummary {
    RunSummary {
        changes: inserted.len(),
        inserted_id: inserted.first().and_then(Row::id).cloned(),
    }
}

fn changes_summary(changes: usize) -> StatementOutput {
    StatementOutput::Run(RunSummary {
        changes,
        inserted_id: None,
    })
}

fn wrap_store_error(
    descriptor: &StatementDescriptor,
    table: &str,
    source: RowStoreError,
) -> SqlShimError {
    warn!(
        operation = %descriptor.operation,
        table,
        error = %source,
        "row store call failed"
    );
    SqlShimError::QueryExecution {
        operation: descriptor.operation.to_string(),
        table: table.to_string(),
        source,
    }
}
