//! Connection configuration and session lifecycle for Tusk.
//!
//! This crate owns the single PostgreSQL session of the client:
//!
//! - **connection_string**: Parse and build `postgres://` connection strings
//! - **models**: Profiles, SSL modes, connection status, schema snapshots
//! - **services**: Credential resolution, profile and preference storage, the driver
//! - **state**: The observable session state
//! - **session**: The lifecycle state machine that drives it all
//! - **logging**: Structured logging setup

pub mod connection_string;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use connection_string::ParsedConnectionString;
pub use error::{ConnectionStringError, CredentialStoreError, ErrorInfo, SessionError};
pub use models::{
    ConnectParams, ConnectionDraft, ConnectionProfile, ConnectionStatus, DatabaseInfo,
    DriverOptions, ProfileId, QueryState, SslMode, TableInfo,
};
pub use services::{
    CredentialResolver, CredentialStore, DriverClient, LocalStorage, PostgresDriver,
    PreferenceStore, ProfileRepository,
};
pub use session::{SessionConfig, SessionLifecycle, SessionLifecycleBuilder};
pub use state::SessionState;
