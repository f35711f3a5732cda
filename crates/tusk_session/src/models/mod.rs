//! Data models for the session subsystem.
//!
//! - `connection` - ConnectionProfile, SslMode, ConnectionStatus, ConnectParams, ConnectionDraft
//! - `schema` - DatabaseInfo and TableInfo snapshots
//! - `query` - Query state owned by the session for invalidation

pub mod connection;
pub mod query;
pub mod schema;

pub use connection::{
    ConnectParams, ConnectionDraft, ConnectionProfile, ConnectionStatus, DriverOptions, ProfileId,
    SslMode,
};
pub use query::{ColumnInfo, QueryOutcome, QueryState};
pub use schema::{DatabaseInfo, TableInfo};
