//! Local SQLite storage for connection profiles and preferences.
//!
//! Passwords are NOT stored here. They go through the credential store.
//!
//! # Data Directory Locations
//!
//! - **macOS**: `~/Library/Application Support/dev.tusk.Tusk`
//! - **Windows**: `%APPDATA%\tusk\Tusk`
//! - **Linux**: `~/.local/share/tusk`
//! - **Debug builds**: `./tusk_data` in current directory

use crate::error::SessionError;
use crate::models::{ConnectionProfile, ProfileId, SslMode};
use crate::services::preferences::PreferenceStore;
use crate::services::profiles::ProfileRepository;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use uuid::Uuid;

/// Get the default data directory for the application.
pub fn default_data_dir() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        PathBuf::from("./tusk_data")
    }

    #[cfg(not(debug_assertions))]
    {
        dirs::data_dir()
            .map(|d| {
                #[cfg(target_os = "macos")]
                {
                    d.join("dev.tusk.Tusk")
                }
                #[cfg(target_os = "windows")]
                {
                    d.join("tusk").join("Tusk")
                }
                #[cfg(not(any(target_os = "macos", target_os = "windows")))]
                {
                    d.join("tusk")
                }
            })
            .unwrap_or_else(|| PathBuf::from("./tusk_data"))
    }
}

/// Initialize the data directory, creating it if needed.
pub fn init_data_dir(path: &Path) -> Result<(), SessionError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(SessionError::storage(
                format!("Data path exists but is not a directory: {}", path.display()),
                Some("Select a different location or remove the existing file"),
            ));
        }
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|e| {
        SessionError::storage(
            format!("Failed to create data directory '{}': {}", path.display(), e),
            Some("Check permissions or select a different location"),
        )
    })?;

    tracing::info!(path = %path.display(), "Created data directory");
    Ok(())
}

/// SQLite-backed profile repository and preference store.
///
/// Thread-safe via internal Mutex. Uses WAL mode for concurrent reads.
pub struct LocalStorage {
    /// Thread-safe SQLite connection
    connection: Mutex<Connection>,
    /// Data directory path
    data_dir: PathBuf,
    /// Bumped after every profile write
    revision: watch::Sender<u64>,
}

impl LocalStorage {
    /// Open or create local storage in the given data directory.
    pub fn open(data_dir: PathBuf) -> Result<Self, SessionError> {
        init_data_dir(&data_dir)?;
        let db_path = data_dir.join("tusk.db");
        Self::open_with_path(db_path, data_dir)
    }

    /// Open storage with a specific database path.
    pub fn open_with_path(db_path: PathBuf, data_dir: PathBuf) -> Result<Self, SessionError> {
        let connection = Connection::open(&db_path).map_err(|e| {
            SessionError::storage(
                format!("Failed to open database '{}': {}", db_path.display(), e),
                Some("The database file may be corrupted. Try deleting it to start fresh."),
            )
        })?;

        Self::configure_connection(&connection)?;

        let storage = Self {
            connection: Mutex::new(connection),
            data_dir,
            revision: watch::Sender::new(0),
        };
        storage.run_migrations()?;

        tracing::info!(path = %db_path.display(), "Local storage opened");
        Ok(storage)
    }

    fn configure_connection(conn: &Connection) -> Result<(), SessionError> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            PRAGMA foreign_keys = ON;
            ",
        )
        .map_err(|e| SessionError::storage(format!("Failed to configure database: {e}"), None))
    }

    fn run_migrations(&self) -> Result<(), SessionError> {
        const DOMAIN: &str = "session";
        let conn = self.connection.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS migrations (
                domain TEXT NOT NULL,
                step INTEGER NOT NULL,
                migration TEXT NOT NULL,
                PRIMARY KEY(domain, step)
            ) STRICT",
            [],
        )
        .map_err(|e| SessionError::storage(format!("Failed to create migrations table: {e}"), None))?;

        let current_step: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(step), 0) FROM migrations WHERE domain = ?",
                [DOMAIN],
                |row| row.get(0),
            )
            .unwrap_or(0);

        if current_step < 1 {
            conn.execute_batch(
                "
                -- Saved Connections (credentials in the credential store, NOT here)
                CREATE TABLE connections (
                    connection_id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    host TEXT NOT NULL,
                    port INTEGER NOT NULL DEFAULT 5432,
                    username TEXT NOT NULL,
                    database_name TEXT NOT NULL,
                    ssl_mode TEXT NOT NULL DEFAULT 'prefer',
                    is_favorite INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                ) STRICT;

                CREATE TABLE preferences (
                    key TEXT PRIMARY KEY,
                    value_json TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                ) STRICT;

                CREATE INDEX idx_connections_name ON connections(name COLLATE NOCASE);
                ",
            )
            .map_err(|e| SessionError::storage(format!("Migration 1 failed: {e}"), None))?;

            conn.execute(
                "INSERT INTO migrations (domain, step, migration) VALUES (?, 1, 'initial_schema')",
                [DOMAIN],
            )
            .map_err(|e| SessionError::storage(format!("Failed to record migration: {e}"), None))?;

            tracing::info!("Applied migration 1: initial_schema");
        }

        Ok(())
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<(String, ConnectionProfile)> {
        let id: String = row.get(0)?;
        let ssl_mode: String = row.get(6)?;
        Ok((
            id,
            ConnectionProfile {
                id: Uuid::nil(),
                name: row.get(1)?,
                host: row.get(2)?,
                port: row.get(3)?,
                username: row.get(4)?,
                database: row.get(5)?,
                ssl_mode: SslMode::from_param(&ssl_mode).unwrap_or_default(),
                is_favorite: row.get(7)?,
            },
        ))
    }
}

impl ProfileRepository for LocalStorage {
    fn list(&self) -> Result<Vec<ConnectionProfile>, SessionError> {
        let conn = self.connection.lock();
        let mut stmt = conn.prepare(
            "SELECT connection_id, name, host, port, username, database_name, ssl_mode, is_favorite
             FROM connections
             ORDER BY name COLLATE NOCASE, connection_id",
        )?;

        let rows = stmt
            .query_map([], Self::row_to_profile)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| SessionError::storage(format!("Failed to read connections: {e}"), None))?;

        rows.into_iter()
            .map(|(id, mut profile)| {
                profile.id = Uuid::parse_str(&id).map_err(|e| {
                    SessionError::storage(format!("Invalid connection ID: {e}"), None)
                })?;
                Ok(profile)
            })
            .collect()
    }

    fn get(&self, id: ProfileId) -> Result<Option<ConnectionProfile>, SessionError> {
        let conn = self.connection.lock();
        let row = conn
            .query_row(
                "SELECT connection_id, name, host, port, username, database_name, ssl_mode, is_favorite
                 FROM connections WHERE connection_id = ?",
                [id.to_string()],
                Self::row_to_profile,
            )
            .optional()?;

        Ok(row.map(|(_, mut profile)| {
            profile.id = id;
            profile
        }))
    }

    fn insert(&self, profile: &ConnectionProfile) -> Result<(), SessionError> {
        {
            let conn = self.connection.lock();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO connections (
                    connection_id, name, host, port, username, database_name,
                    ssl_mode, is_favorite, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    profile.id.to_string(),
                    profile.name,
                    profile.host,
                    profile.port,
                    profile.username,
                    profile.database,
                    profile.ssl_mode.as_str(),
                    profile.is_favorite,
                    now,
                ],
            )
            .map_err(|e| SessionError::storage(format!("Failed to save connection: {e}"), None))?;
        }

        tracing::debug!(profile_id = %profile.id, name = %profile.name, "Connection saved");
        self.notify();
        Ok(())
    }

    fn update(&self, profile: &ConnectionProfile) -> Result<(), SessionError> {
        let changed = {
            let conn = self.connection.lock();
            conn.execute(
                "UPDATE connections SET
                    name = ?2, host = ?3, port = ?4, username = ?5, database_name = ?6,
                    ssl_mode = ?7, is_favorite = ?8, updated_at = ?9
                 WHERE connection_id = ?1",
                params![
                    profile.id.to_string(),
                    profile.name,
                    profile.host,
                    profile.port,
                    profile.username,
                    profile.database,
                    profile.ssl_mode.as_str(),
                    profile.is_favorite,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| SessionError::storage(format!("Failed to update connection: {e}"), None))?
        };

        if changed == 0 {
            return Err(SessionError::storage(format!("Connection {} not found", profile.id), None));
        }

        tracing::debug!(profile_id = %profile.id, "Connection updated");
        self.notify();
        Ok(())
    }

    fn delete(&self, id: ProfileId) -> Result<(), SessionError> {
        let changed = {
            let conn = self.connection.lock();
            conn.execute("DELETE FROM connections WHERE connection_id = ?", [id.to_string()])
                .map_err(|e| {
                    SessionError::storage(format!("Failed to delete connection: {e}"), None)
                })?
        };

        if changed > 0 {
            tracing::debug!(profile_id = %id, "Connection deleted");
            self.notify();
        }
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

impl PreferenceStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let conn = self.connection.lock();
        let stored: Option<String> = conn
            .query_row("SELECT value_json FROM preferences WHERE key = ?", [key], |row| row.get(0))
            .optional()
            .map_err(|e| SessionError::storage(format!("Failed to load preference: {e}"), None))?;

        match stored {
            Some(json) => match serde_json::from_str::<serde_json::Value>(&json)? {
                serde_json::Value::String(value) => Ok(Some(value)),
                other => Ok(Some(other.to_string())),
            },
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let json = serde_json::to_string(value)?;
        let conn = self.connection.lock();
        conn.execute(
            "INSERT INTO preferences (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = excluded.updated_at",
            params![key, json, Utc::now().to_rfc3339()],
        )
        .map_err(|e| SessionError::storage(format!("Failed to save preference: {e}"), None))?;
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), SessionError> {
        let conn = self.connection.lock();
        conn.execute("DELETE FROM preferences WHERE key = ?", [key])
            .map_err(|e| SessionError::storage(format!("Failed to delete preference: {e}"), None))?;
        Ok(())
    }
}

impl std::fmt::Debug for LocalStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStorage").field("data_dir", &self.data_dir).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::preferences::{LAST_CONNECTION_ID, LAST_DATABASE_NAME};
    use tempfile::tempdir;

    fn open_temp() -> (tempfile::TempDir, LocalStorage) {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::open(dir.path().to_path_buf()).unwrap();
        (dir, storage)
    }

    #[test]
    fn test_profile_crud() {
        let (_dir, storage) = open_temp();
        let mut profile = ConnectionProfile::new("Local", "localhost", "postgres", "app")
            .with_port(6543)
            .with_ssl_mode(SslMode::VerifyCa);

        ProfileRepository::insert(&storage, &profile).unwrap();
        let loaded = ProfileRepository::get(&storage, profile.id).unwrap().unwrap();
        assert_eq!(loaded, profile);

        profile.is_favorite = true;
        profile.name = "Renamed".to_string();
        storage.update(&profile).unwrap();
        assert_eq!(storage.list().unwrap(), vec![profile.clone()]);

        ProfileRepository::delete(&storage, profile.id).unwrap();
        assert!(storage.list().unwrap().is_empty());
    }

    #[test]
    fn test_profiles_ordered_by_name() {
        let (_dir, storage) = open_temp();
        for name in ["zeta", "Alpha", "beta"] {
            storage.insert(&ConnectionProfile::new(name, "h", "u", "d")).unwrap();
        }

        let names: Vec<_> = storage.list().unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Alpha", "beta", "zeta"]);
    }

    #[test]
    fn test_update_unknown_profile_fails() {
        let (_dir, storage) = open_temp();
        let profile = ConnectionProfile::new("Local", "localhost", "postgres", "app");
        assert!(storage.update(&profile).is_err());
    }

    #[test]
    fn test_profile_writes_are_announced() {
        let (_dir, storage) = open_temp();
        let rx = storage.subscribe();
        storage.insert(&ConnectionProfile::new("Local", "h", "u", "d")).unwrap();
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_preferences() {
        let (_dir, storage) = open_temp();
        let id = Uuid::new_v4().to_string();

        PreferenceStore::set(&storage, LAST_CONNECTION_ID, &id).unwrap();
        PreferenceStore::set(&storage, LAST_DATABASE_NAME, "shop").unwrap();
        PreferenceStore::set(&storage, LAST_DATABASE_NAME, "orders").unwrap();

        assert_eq!(PreferenceStore::get(&storage, LAST_CONNECTION_ID).unwrap(), Some(id));
        assert_eq!(
            PreferenceStore::get(&storage, LAST_DATABASE_NAME).unwrap().as_deref(),
            Some("orders")
        );

        storage.clear(LAST_DATABASE_NAME).unwrap();
        assert_eq!(PreferenceStore::get(&storage, LAST_DATABASE_NAME).unwrap(), None);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let profile = ConnectionProfile::new("Local", "localhost", "postgres", "app");
        {
            let storage = LocalStorage::open(dir.path().to_path_buf()).unwrap();
            storage.insert(&profile).unwrap();
            PreferenceStore::set(&storage, LAST_DATABASE_NAME, "app").unwrap();
        }

        let storage = LocalStorage::open(dir.path().to_path_buf()).unwrap();
        assert_eq!(storage.list().unwrap(), vec![profile]);
        assert_eq!(
            PreferenceStore::get(&storage, LAST_DATABASE_NAME).unwrap().as_deref(),
            Some("app")
        );
    }
}
