//! Credential storage and password resolution.
//!
//! Passwords live only in a [`CredentialStore`], keyed by profile id.
//!
//! ## Store Selection
//!
//! - **Debug builds**: JSON file at `~/.config/tusk/dev_credentials.json`
//!   - Avoids keychain prompts for unsigned development builds
//!   - Override with `TUSK_USE_KEYCHAIN=1` to force keychain usage
//! - **Release builds**: OS keychain (macOS Keychain, Windows Credential Manager, Linux Secret Service)
//!
//! [`CredentialResolver`] sits on top: reads are soft (a failed lookup yields
//! an empty password), writes are hard (failures propagate).

use crate::error::{CredentialStoreError, SessionError};
use crate::models::ProfileId;

use keyring::Entry;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Service name used for keychain entries.
const KEYRING_SERVICE: &str = "dev.tusk.Tusk";

/// Environment variable to force keychain usage in debug builds.
const FORCE_KEYCHAIN_ENV: &str = "TUSK_USE_KEYCHAIN";

/// Key under which a profile's password is stored.
fn password_key(id: ProfileId) -> String {
    format!("db:{id}")
}

// ============================================================================
// CredentialStore Trait
// ============================================================================

/// Secure get/set/delete of secrets keyed by profile id.
pub trait CredentialStore: Send + Sync {
    /// Get the stored password. Missing entries fail with `NotFound`.
    fn get(&self, id: ProfileId) -> Result<String, CredentialStoreError>;

    /// Insert or replace the stored password.
    fn set(&self, id: ProfileId, secret: &str) -> Result<(), CredentialStoreError>;

    /// Remove the stored password. Missing entries fail with `NotFound`.
    fn delete(&self, id: ProfileId) -> Result<(), CredentialStoreError>;

    /// Store name for logging.
    fn name(&self) -> &'static str;
}

// ============================================================================
// FileCredentialStore
// ============================================================================

/// File-based credential storage for development builds.
#[derive(Debug)]
pub struct FileCredentialStore {
    /// Path to the credentials file.
    file_path: PathBuf,
    /// In-memory copy of the file.
    cache: RwLock<HashMap<String, String>>,
}

/// Credentials file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CredentialsFile {
    credentials: HashMap<String, String>,
}

impl FileCredentialStore {
    /// Open the default development credentials file.
    pub fn new() -> Result<Self, SessionError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SessionError::storage("Could not determine config directory", None))?
            .join("tusk");

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                SessionError::storage(
                    format!("Failed to create config directory: {e}"),
                    Some("Check permissions for ~/.config/tusk"),
                )
            })?;
        }

        Self::with_path(config_dir.join("dev_credentials.json"))
    }

    /// Open a credentials file at a custom path.
    pub fn with_path(file_path: PathBuf) -> Result<Self, SessionError> {
        let store = Self { file_path, cache: RwLock::new(HashMap::new()) };
        store.load_from_file()?;
        Ok(store)
    }

    fn load_from_file(&self) -> Result<(), SessionError> {
        if !self.file_path.exists() {
            return Ok(());
        }

        let contents = fs::read_to_string(&self.file_path)?;
        if contents.trim().is_empty() {
            return Ok(());
        }

        let creds_file: CredentialsFile = serde_json::from_str(&contents)?;
        *self.cache.write() = creds_file.credentials;
        Ok(())
    }

    /// Write `credentials` to disk, owner read/write only on Unix.
    fn save_to_file(
        &self,
        credentials: &HashMap<String, String>,
    ) -> Result<(), CredentialStoreError> {
        let creds_file = CredentialsFile { credentials: credentials.clone() };
        let json = serde_json::to_string_pretty(&creds_file).map_err(|e| {
            CredentialStoreError::store(format!("Failed to serialize credentials: {e}"), None)
        })?;

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        options
            .open(&self.file_path)
            .and_then(|mut file| file.write_all(json.as_bytes()))
            .map_err(|e| {
                CredentialStoreError::store(format!("Failed to write credentials file: {e}"), None)
            })
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, id: ProfileId) -> Result<String, CredentialStoreError> {
        self.cache
            .read()
            .get(&password_key(id))
            .cloned()
            .ok_or(CredentialStoreError::NotFound { id })
    }

    fn set(&self, id: ProfileId, secret: &str) -> Result<(), CredentialStoreError> {
        // The cache only changes once the file has the new contents.
        let mut cache = self.cache.write();
        let mut updated = cache.clone();
        updated.insert(password_key(id), secret.to_string());
        self.save_to_file(&updated)?;
        *cache = updated;
        tracing::debug!(profile_id = %id, "Credential stored in file");
        Ok(())
    }

    fn delete(&self, id: ProfileId) -> Result<(), CredentialStoreError> {
        let mut cache = self.cache.write();
        let mut updated = cache.clone();
        if updated.remove(&password_key(id)).is_none() {
            return Err(CredentialStoreError::NotFound { id });
        }
        self.save_to_file(&updated)?;
        *cache = updated;
        tracing::debug!(profile_id = %id, "Credential deleted from file");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "FileCredentialStore"
    }
}

// ============================================================================
// KeychainCredentialStore
// ============================================================================

/// OS keychain storage for release builds.
#[derive(Debug)]
pub struct KeychainCredentialStore {
    /// Service name for keychain entries.
    service: String,
}

impl Default for KeychainCredentialStore {
    fn default() -> Self {
        Self { service: KEYRING_SERVICE.to_string() }
    }
}

impl KeychainCredentialStore {
    /// Create a keychain store under the Tusk service name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a custom service name.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self { service: service.into() }
    }

    fn entry(&self, id: ProfileId) -> Result<Entry, CredentialStoreError> {
        Ok(Entry::new(&self.service, &password_key(id))?)
    }
}

impl CredentialStore for KeychainCredentialStore {
    fn get(&self, id: ProfileId) -> Result<String, CredentialStoreError> {
        match self.entry(id)?.get_password() {
            Ok(password) => Ok(password),
            Err(keyring::Error::NoEntry) => Err(CredentialStoreError::NotFound { id }),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, id: ProfileId, secret: &str) -> Result<(), CredentialStoreError> {
        self.entry(id)?.set_password(secret)?;
        tracing::debug!(profile_id = %id, "Credential stored in keychain");
        Ok(())
    }

    fn delete(&self, id: ProfileId) -> Result<(), CredentialStoreError> {
        match self.entry(id)?.delete_credential() {
            Ok(()) => {
                tracing::debug!(profile_id = %id, "Credential deleted from keychain");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Err(CredentialStoreError::NotFound { id }),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "KeychainCredentialStore"
    }
}

// ============================================================================
// SessionCredentialStore (Fallback)
// ============================================================================

/// In-memory storage for when neither file nor keychain is available.
///
/// Credentials are lost when the application exits.
#[derive(Debug, Default)]
pub struct SessionCredentialStore {
    secrets: RwLock<HashMap<ProfileId, String>>,
}

impl SessionCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for SessionCredentialStore {
    fn get(&self, id: ProfileId) -> Result<String, CredentialStoreError> {
        self.secrets.read().get(&id).cloned().ok_or(CredentialStoreError::NotFound { id })
    }

    fn set(&self, id: ProfileId, secret: &str) -> Result<(), CredentialStoreError> {
        self.secrets.write().insert(id, secret.to_string());
        tracing::debug!(profile_id = %id, "Credential stored in session");
        Ok(())
    }

    fn delete(&self, id: ProfileId) -> Result<(), CredentialStoreError> {
        self.secrets
            .write()
            .remove(&id)
            .map(|_| ())
            .ok_or(CredentialStoreError::NotFound { id })
    }

    fn name(&self) -> &'static str {
        "SessionCredentialStore"
    }
}

/// Select the credential store for this build.
pub fn default_store() -> Arc<dyn CredentialStore> {
    let force_keychain = std::env::var(FORCE_KEYCHAIN_ENV).map(|v| v == "1").unwrap_or(false);

    #[cfg(debug_assertions)]
    {
        if force_keychain {
            tracing::debug!(store = "KeychainCredentialStore", reason = "TUSK_USE_KEYCHAIN=1", "Using keychain");
            return Arc::new(KeychainCredentialStore::new());
        }

        match FileCredentialStore::new() {
            Ok(store) => {
                tracing::debug!(store = "FileCredentialStore", reason = "debug build", "Using file-based credential storage");
                Arc::new(store)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open credentials file, falling back to session storage");
                Arc::new(SessionCredentialStore::new())
            }
        }
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = force_keychain;
        tracing::debug!(store = "KeychainCredentialStore", reason = "release build", "Using keychain credential storage");
        Arc::new(KeychainCredentialStore::new())
    }
}

// ============================================================================
// CredentialResolver
// ============================================================================

/// Decides which password to use and when to write one back.
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
}

impl CredentialResolver {
    /// Wrap a credential store.
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Pick the password for a connect or test.
    ///
    /// A non-empty `explicit` password always wins. Otherwise the stored
    /// password of `editing` is used; a failed lookup yields an empty string.
    /// New profiles (`editing == None`) never consult the store.
    pub fn resolve(&self, explicit: &str, editing: Option<ProfileId>) -> String {
        if !explicit.is_empty() {
            return explicit.to_string();
        }

        let Some(id) = editing else {
            return String::new();
        };

        match self.store.get(id) {
            Ok(password) => password,
            Err(CredentialStoreError::NotFound { .. }) => {
                tracing::debug!(profile_id = %id, "No stored password");
                String::new()
            }
            Err(e) => {
                tracing::warn!(profile_id = %id, error = %e, "Failed to read stored password");
                String::new()
            }
        }
    }

    /// Store `password` for a profile. An empty password leaves the stored one untouched.
    pub fn persist(&self, id: ProfileId, password: &str) -> Result<(), SessionError> {
        if password.is_empty() {
            return Ok(());
        }
        self.store.set(id, password)?;
        tracing::debug!(profile_id = %id, "Password stored");
        Ok(())
    }

    /// Delete the stored password. A missing entry is not an error.
    pub fn forget(&self, id: ProfileId) -> Result<(), SessionError> {
        match self.store.delete(id) {
            Ok(()) | Err(CredentialStoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Name of the underlying store.
    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver").field("store", &self.store.name()).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
