//! Interface to the PostgreSQL driver.
//!
//! The session drives one live connection through a [`DriverClient`]. The
//! production implementation is [`PostgresDriver`](super::PostgresDriver).

use async_trait::async_trait;

use crate::error::SessionError;
use crate::models::{ConnectParams, DatabaseInfo, TableInfo};

/// Network I/O and introspection for a single live session.
///
/// `connect` replaces any previous connection. Every other call except
/// `test_connection` works against the connection opened last.
#[async_trait]
pub trait DriverClient: Send + Sync {
    /// Open a session, closing the previous one.
    async fn connect(&self, params: &ConnectParams) -> Result<(), SessionError>;

    /// Close the session.
    async fn disconnect(&self) -> Result<(), SessionError>;

    /// Databases on the server, ordered by name.
    async fn fetch_databases(&self) -> Result<Vec<DatabaseInfo>, SessionError>;

    /// Tables in `database`, ordered by schema and name.
    async fn fetch_tables(&self, database: &str) -> Result<Vec<TableInfo>, SessionError>;

    /// Create a database.
    async fn create_database(&self, name: &str) -> Result<(), SessionError>;

    /// Drop a database.
    async fn delete_database(&self, name: &str) -> Result<(), SessionError>;

    /// Connect and immediately disconnect, leaving the live session alone.
    async fn test_connection(&self, params: &ConnectParams) -> Result<bool, SessionError>;
}
