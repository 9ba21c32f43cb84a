mod row;

pub use row::Row;

use serde::Serialize;

use crate::types::Scalar;

/// Outcome of a mutation, or of a query run for its side effects only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Rows inserted, updated or deleted.
    pub changes: usize,
    /// The `id` of the first inserted row, when the store reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inserted_id: Option<Scalar>,
}

/// A shaped execution result.
///
/// Exactly one shape is produced per call; which one is decided by the statement and the
/// requested cardinality, never by how many rows came back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatementOutput {
    /// `Get` on a query: the first row, if any.
    Row(Option<Row>),
    /// `All` on a query: every row, possibly none.
    Rows(Vec<Row>),
    /// Mutation summary.
    Run(RunSummary),
}

impl StatementOutput {
    /// Consume as a single optional row.
    #[must_use]
    pub fn into_row(self) -> Option<Row> {
        match self {
            StatementOutput::Row(row) => row,
            StatementOutput::Rows(rows) => rows.into_iter().next(),
            StatementOutput::Run(_) => None,
        }
    }

    /// Consume as a row list.
    #[must_use]
    pub fn into_rows(self) -> Vec<Row> {
        match self {
            StatementOutput::Row(row) => row.into_iter().collect(),
            StatementOutput::Rows(rows) => rows,
            StatementOutput::Run(_) => Vec::new(),
        }
    }

    /// Consume as a mutation summary. Query shapes report zero changes.
    #[must_use]
    pub fn into_summary(self) -> RunSummary {
        match self {
            StatementOutput::Run(summary) => summary,
            StatementOutput::Row(_) | StatementOutput::Rows(_) => RunSummary::default(),
        }
    }
}
