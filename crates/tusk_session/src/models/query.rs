//! Query state scoped to the selected database and table.
//!
//! Query execution lives outside this crate. The session only owns the
//! state so it can reset it whenever the database or table changes.

use serde::{Deserialize, Serialize};

/// Column metadata from query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Human-readable type name
    pub type_name: String,
}

/// Rendered results of the last query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutcome {
    /// Column metadata
    pub columns: Vec<ColumnInfo>,
    /// Result rows as display text (`None` is SQL NULL)
    pub rows: Vec<Vec<Option<String>>>,
    /// Rows affected (for INSERT/UPDATE/DELETE)
    pub rows_affected: Option<u64>,
    /// Time to execute in milliseconds
    pub execution_time_ms: u64,
}

impl QueryOutcome {
    /// Get the number of rows returned.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Query editor and result state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryState {
    /// Editor contents
    pub sql: String,
    /// Last successful result
    pub result: Option<QueryOutcome>,
    /// Last error message
    pub error: Option<String>,
    /// A query is running
    pub is_executing: bool,
}

impl QueryState {
    /// Check if there is nothing to show.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Clear everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
