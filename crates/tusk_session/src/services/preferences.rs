//! Persisted user preferences used to restore the last session.

use crate::error::SessionError;

use parking_lot::RwLock;
use std::collections::HashMap;

/// Preference key holding the id of the last connected profile.
pub const LAST_CONNECTION_ID: &str = "lastConnectionId";

/// Preference key holding the name of the last selected database.
pub const LAST_DATABASE_NAME: &str = "lastDatabaseName";

/// Opaque string key/value store.
pub trait PreferenceStore: Send + Sync {
    /// Get a value, `None` if unset.
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Set a value.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Remove a value. Clearing an unset key succeeds.
    fn clear(&self, key: &str) -> Result<(), SessionError>;
}

/// In-memory preferences, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.values.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.values.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), SessionError> {
        self.values.write().remove(key);
        Ok(())
    }
}
