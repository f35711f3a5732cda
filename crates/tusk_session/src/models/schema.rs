//! Database and table snapshots returned by the driver.

use serde::{Deserialize, Serialize};

/// A database on the connected server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Server-assigned identifier (the `pg_database` oid).
    pub id: u32,
    /// Database name, unique per server.
    pub name: String,
}

impl DatabaseInfo {
    /// Create a database snapshot.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self { id, name: name.into() }
    }
}

/// A table in the selected database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableInfo {
    /// Schema name containing this table.
    pub schema: String,
    /// Table name.
    pub name: String,
}

impl TableInfo {
    /// Create a table snapshot.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self { schema: schema.into(), name: name.into() }
    }

    /// Schema-qualified name, e.g. `public.users`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}
