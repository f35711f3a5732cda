//! Scripted collaborators for unit tests.

use crate::error::{CredentialStoreError, SessionError};
use crate::models::{ConnectParams, ConnectionProfile, DatabaseInfo, ProfileId, TableInfo};
use crate::services::credentials::{CredentialResolver, CredentialStore, SessionCredentialStore};
use crate::services::driver::DriverClient;
use crate::services::preferences::{MemoryPreferenceStore, PreferenceStore};
use crate::services::profiles::MemoryProfileRepository;
use crate::session::{SessionConfig, SessionLifecycle};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Credential store whose every call fails.
#[derive(Debug, Default)]
pub(crate) struct FailingCredentialStore {
    reads: AtomicUsize,
}

impl FailingCredentialStore {
    /// Number of `get` calls seen.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl CredentialStore for FailingCredentialStore {
    fn get(&self, _id: ProfileId) -> Result<String, CredentialStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(CredentialStoreError::store("keychain locked", None))
    }

    fn set(&self, _id: ProfileId, _secret: &str) -> Result<(), CredentialStoreError> {
        Err(CredentialStoreError::store("keychain locked", None))
    }

    fn delete(&self, _id: ProfileId) -> Result<(), CredentialStoreError> {
        Err(CredentialStoreError::store("keychain locked", None))
    }

    fn name(&self) -> &'static str {
        "FailingCredentialStore"
    }
}

/// Preference store whose every call fails.
#[derive(Debug, Default)]
pub(crate) struct FailingPreferenceStore;

impl PreferenceStore for FailingPreferenceStore {
    fn get(&self, _key: &str) -> Result<Option<String>, SessionError> {
        Err(SessionError::storage("disk full", None))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), SessionError> {
        Err(SessionError::storage("disk full", None))
    }

    fn clear(&self, _key: &str) -> Result<(), SessionError> {
        Err(SessionError::storage("disk full", None))
    }
}

/// A driver call, as recorded by [`FakeDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DriverCall {
    Connect { host: String, database: String, password: String },
    Disconnect,
    FetchDatabases,
    FetchTables(String),
    CreateDatabase(String),
    DeleteDatabase(String),
    TestConnection { host: String, password: String },
}

/// Where a held call parks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HoldPoint {
    /// `connect` to this host
    Connect(String),
    /// `fetch_tables` for this database
    FetchTables(String),
}

/// One-shot pause inside a driver call.
#[derive(Debug, Default)]
pub(crate) struct Hold {
    entered: Notify,
    release: Notify,
}

impl Hold {
    /// Wait until the driver reaches the hold point.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call continue.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Debug, Default)]
struct Script {
    databases: Vec<DatabaseInfo>,
    tables: HashMap<String, Vec<TableInfo>>,
    failing_hosts: HashSet<String>,
    failing_tables: HashSet<String>,
    fail_fetch_databases: bool,
    fail_disconnect: bool,
    holds: HashMap<HoldPoint, Arc<Hold>>,
}

/// In-memory [`DriverClient`] with scripted answers.
#[derive(Debug, Default)]
pub(crate) struct FakeDriver {
    script: Mutex<Script>,
    calls: Mutex<Vec<DriverCall>>,
    connected_to: Mutex<Option<String>>,
}

impl FakeDriver {
    pub fn with_databases(names: &[&str]) -> Self {
        let driver = Self::default();
        driver.script.lock().databases = names
            .iter()
            .enumerate()
            .map(|(i, name)| DatabaseInfo::new(16384 + i as u32, *name))
            .collect();
        driver
    }

    pub fn set_tables(&self, database: &str, tables: &[(&str, &str)]) {
        self.script.lock().tables.insert(
            database.to_string(),
            tables.iter().map(|(schema, name)| TableInfo::new(*schema, *name)).collect(),
        );
    }

    pub fn fail_connect_to(&self, host: &str) {
        self.script.lock().failing_hosts.insert(host.to_string());
    }

    pub fn fail_tables_for(&self, database: &str) {
        self.script.lock().failing_tables.insert(database.to_string());
    }

    pub fn fail_fetch_databases(&self, fail: bool) {
        self.script.lock().fail_fetch_databases = fail;
    }

    pub fn fail_disconnect(&self) {
        self.script.lock().fail_disconnect = true;
    }

    /// Park the next call reaching `point` until released.
    pub fn hold(&self, point: HoldPoint) -> Arc<Hold> {
        let hold = Arc::new(Hold::default());
        self.script.lock().holds.insert(point, hold.clone());
        hold
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().clone()
    }

    pub fn connected_to(&self) -> Option<String> {
        self.connected_to.lock().clone()
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().push(call);
    }

    async fn pause_at(&self, point: HoldPoint) {
        let hold = self.script.lock().holds.remove(&point);
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }
    }

    fn require_connection(&self) -> Result<(), SessionError> {
        if self.connected_to.lock().is_none() {
            return Err(SessionError::NotConnected);
        }
        Ok(())
    }
}

#[async_trait]
impl DriverClient for FakeDriver {
    async fn connect(&self, params: &ConnectParams) -> Result<(), SessionError> {
        self.record(DriverCall::Connect {
            host: params.host.clone(),
            database: params.database.clone(),
            password: params.password.clone(),
        });
        self.pause_at(HoldPoint::Connect(params.host.clone())).await;

        if self.script.lock().failing_hosts.contains(&params.host) {
            return Err(SessionError::connection(format!(
                "could not connect to server at \"{}\"",
                params.host
            )));
        }
        *self.connected_to.lock() = Some(params.database.clone());
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        self.record(DriverCall::Disconnect);
        *self.connected_to.lock() = None;
        if self.script.lock().fail_disconnect {
            return Err(SessionError::driver("socket already closed"));
        }
        Ok(())
    }

    async fn fetch_databases(&self) -> Result<Vec<DatabaseInfo>, SessionError> {
        self.record(DriverCall::FetchDatabases);
        self.require_connection()?;
        let script = self.script.lock();
        if script.fail_fetch_databases {
            return Err(SessionError::driver("permission denied for table pg_database"));
        }
        Ok(script.databases.clone())
    }

    async fn fetch_tables(&self, database: &str) -> Result<Vec<TableInfo>, SessionError> {
        self.record(DriverCall::FetchTables(database.to_string()));
        self.pause_at(HoldPoint::FetchTables(database.to_string())).await;
        self.require_connection()?;

        let script = self.script.lock();
        if script.failing_tables.contains(database) {
            return Err(SessionError::driver(format!("permission denied for database {database}")));
        }
        Ok(script.tables.get(database).cloned().unwrap_or_default())
    }

    async fn create_database(&self, name: &str) -> Result<(), SessionError> {
        self.record(DriverCall::CreateDatabase(name.to_string()));
        self.require_connection()?;

        let mut script = self.script.lock();
        if script.databases.iter().any(|db| db.name == name) {
            return Err(SessionError::driver(format!("database \"{name}\" already exists")));
        }
        let id = script.databases.iter().map(|db| db.id).max().unwrap_or(16383) + 1;
        script.databases.push(DatabaseInfo::new(id, name));
        script.databases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(())
    }

    async fn delete_database(&self, name: &str) -> Result<(), SessionError> {
        self.record(DriverCall::DeleteDatabase(name.to_string()));
        self.require_connection()?;
        if self.connected_to.lock().as_deref() == Some(name) {
            return Err(SessionError::Driver {
                message: "cannot drop the currently open database".to_string(),
                code: Some("55006".to_string()),
                source: None,
            });
        }

        let mut script = self.script.lock();
        let before = script.databases.len();
        script.databases.retain(|db| db.name != name);
        if script.databases.len() == before {
            return Err(SessionError::driver(format!("database \"{name}\" does not exist")));
        }
        Ok(())
    }

    async fn test_connection(&self, params: &ConnectParams) -> Result<bool, SessionError> {
        self.record(DriverCall::TestConnection {
            host: params.host.clone(),
            password: params.password.clone(),
        });
        if self.script.lock().failing_hosts.contains(&params.host) {
            return Err(SessionError::connection("connection refused"));
        }
        Ok(true)
    }
}

/// A lifecycle wired to fakes, with handles on every collaborator.
pub(crate) struct Harness {
    pub session: SessionLifecycle,
    pub driver: Arc<FakeDriver>,
    pub profiles: Arc<MemoryProfileRepository>,
    pub preferences: Arc<MemoryPreferenceStore>,
    pub credentials: Arc<SessionCredentialStore>,
}

impl Harness {
    /// Build on the current runtime.
    pub fn new(driver: FakeDriver) -> Self {
        Self::with_profiles(driver, Vec::new())
    }

    pub fn with_profiles(driver: FakeDriver, profiles: Vec<ConnectionProfile>) -> Self {
        let driver = Arc::new(driver);
        let profiles = Arc::new(MemoryProfileRepository::with_profiles(profiles));
        let preferences = Arc::new(MemoryPreferenceStore::new());
        let credentials = Arc::new(SessionCredentialStore::new());

        let session = SessionLifecycle::builder()
            .driver(driver.clone())
            .profiles(profiles.clone())
            .preferences(preferences.clone())
            .credentials(CredentialResolver::new(credentials.clone()))
            .config(SessionConfig::default())
            .build()
            .expect("session builds on the test runtime");

        Self { session, driver, profiles, preferences, credentials }
    }
}

/// A profile pointing at `host`.
pub(crate) fn profile(name: &str, host: &str) -> ConnectionProfile {
    ConnectionProfile::new(name, host, "postgres", "postgres")
}
