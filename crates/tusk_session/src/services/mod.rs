//! Collaborators of the session lifecycle.
//!
//! - `credentials` - Credential stores and the password resolution policy
//! - `preferences` - Key/value preferences for last-used restoration
//! - `profiles` - Connection profile repository
//! - `storage` - SQLite-backed profile repository and preference store
//! - `driver` - Interface to the PostgreSQL driver
//! - `postgres` - deadpool-postgres implementation of the driver

pub mod credentials;
pub mod driver;
pub mod postgres;
pub mod preferences;
pub mod profiles;
pub mod storage;

pub use credentials::{
    CredentialResolver, CredentialStore, FileCredentialStore, KeychainCredentialStore,
    SessionCredentialStore,
};
pub use driver::DriverClient;
pub use postgres::PostgresDriver;
pub use preferences::{MemoryPreferenceStore, PreferenceStore};
pub use profiles::{MemoryProfileRepository, ProfileRepository};
pub use storage::LocalStorage;
