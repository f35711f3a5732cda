//! Session lifecycle state machine.
//!
//! [`SessionLifecycle`] owns the single [`SessionState`] of the process and is
//! its only writer. Every driver call runs behind one async gate and every
//! result is checked against a generation counter before it is applied, so a
//! late answer for a superseded connect or database selection is dropped.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──ok──▶ Connected
//!      ▲                        │                  │
//!      │                        └──err──▶ Failed   │
//!      └────────────────disconnect─────────────────┘
//! ```

use crate::error::SessionError;
use crate::models::{
    ConnectParams, ConnectionDraft, ConnectionProfile, ConnectionStatus, DatabaseInfo,
    DriverOptions, ProfileId, QueryState, TableInfo,
};
use crate::services::credentials::{self, CredentialResolver};
use crate::services::driver::DriverClient;
use crate::services::postgres::PostgresDriver;
use crate::services::preferences::{
    MemoryPreferenceStore, PreferenceStore, LAST_CONNECTION_ID, LAST_DATABASE_NAME,
};
use crate::services::profiles::{MemoryProfileRepository, ProfileRepository};
use crate::state::SessionState;

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Environment variable overriding the restore grace period, in milliseconds.
pub const RESTORE_GRACE_ENV: &str = "TUSK_RESTORE_GRACE_MS";

const DEFAULT_RESTORE_GRACE: Duration = Duration::from_millis(500);

/// Session tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long startup restoration waits for profiles to appear
    pub restore_grace_period: Duration,
    /// Options for the default PostgreSQL driver
    pub driver: DriverOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { restore_grace_period: DEFAULT_RESTORE_GRACE, driver: DriverOptions::default() }
    }
}

impl SessionConfig {
    /// Defaults, with the grace period taken from `TUSK_RESTORE_GRACE_MS` if set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(RESTORE_GRACE_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.restore_grace_period = Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!(value = %raw, "Ignoring invalid {RESTORE_GRACE_ENV}");
                }
            }
        }
        config
    }
}

/// Builder for [`SessionLifecycle`].
///
/// Collaborators left unset fall back to the PostgreSQL driver, in-memory
/// profiles and preferences, and the platform credential store.
#[derive(Default)]
pub struct SessionLifecycleBuilder {
    driver: Option<Arc<dyn DriverClient>>,
    profiles: Option<Arc<dyn ProfileRepository>>,
    preferences: Option<Arc<dyn PreferenceStore>>,
    credentials: Option<CredentialResolver>,
    config: SessionConfig,
    runtime: Option<Handle>,
}

impl SessionLifecycleBuilder {
    pub fn driver(mut self, driver: Arc<dyn DriverClient>) -> Self {
        self.driver = Some(driver);
        self
    }

    pub fn profiles(mut self, profiles: Arc<dyn ProfileRepository>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn preferences(mut self, preferences: Arc<dyn PreferenceStore>) -> Self {
        self.preferences = Some(preferences);
        self
    }

    pub fn credentials(mut self, credentials: CredentialResolver) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Runtime that background table loads are spawned on.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Build the lifecycle.
    ///
    /// Fails if no runtime was given and none is current.
    pub fn build(self) -> Result<SessionLifecycle, SessionError> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                SessionError::internal(format!("No tokio runtime for session: {e}"))
            })?,
        };

        let driver = self
            .driver
            .unwrap_or_else(|| Arc::new(PostgresDriver::new(self.config.driver.clone())));
        let profiles = self.profiles.unwrap_or_else(|| Arc::new(MemoryProfileRepository::new()));
        let preferences =
            self.preferences.unwrap_or_else(|| Arc::new(MemoryPreferenceStore::new()));
        let credentials =
            self.credentials.unwrap_or_else(|| CredentialResolver::new(credentials::default_store()));

        tracing::debug!(credential_store = credentials.store_name(), "Session lifecycle created");

        let (state_tx, _) = watch::channel(SessionState::default());
        let connect_token = CancellationToken::new();
        let table_token = connect_token.child_token();

        Ok(SessionLifecycle {
            inner: Arc::new(Inner {
                driver,
                profiles,
                preferences,
                credentials,
                config: self.config,
                runtime,
                gate: tokio::sync::Mutex::new(()),
                shared: Mutex::new(Shared {
                    state: SessionState::default(),
                    connect_generation: 0,
                    table_generation: 0,
                    active: None,
                    connect_token,
                    table_token,
                    revision: 0,
                }),
                state_tx,
                published_revision: AtomicU64::new(0),
                table_load: Mutex::new(None),
            }),
        })
    }
}

/// Profile and password of the live connection, reused for database switches.
#[derive(Clone)]
struct ActiveConnection {
    profile: ConnectionProfile,
    password: String,
}

/// Everything guarded by the state lock.
struct Shared {
    state: SessionState,
    /// Bumped by every connect and disconnect
    connect_generation: u64,
    /// Bumped by every database selection change
    table_generation: u64,
    active: Option<ActiveConnection>,
    connect_token: CancellationToken,
    /// Child of `connect_token`
    table_token: CancellationToken,
    /// Bumped by every mutation
    revision: u64,
}

impl Shared {
    /// Invalidate any in-flight table load.
    fn abandon_table_load(&mut self) {
        self.table_generation += 1;
        self.table_token.cancel();
    }

    /// Invalidate the current connection and everything running under it.
    fn abandon_connection(&mut self) {
        self.connect_generation += 1;
        self.abandon_table_load();
        self.connect_token.cancel();
        self.connect_token = CancellationToken::new();
        self.table_token = self.connect_token.child_token();
        self.active = None;
    }
}

/// A background table load captured at selection time.
struct TableLoad {
    connect_generation: u64,
    table_generation: u64,
    token: CancellationToken,
    params: ConnectParams,
}

struct Inner {
    driver: Arc<dyn DriverClient>,
    profiles: Arc<dyn ProfileRepository>,
    preferences: Arc<dyn PreferenceStore>,
    credentials: CredentialResolver,
    config: SessionConfig,
    runtime: Handle,
    /// Serializes driver calls that touch the live session
    gate: tokio::sync::Mutex<()>,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<SessionState>,
    /// Revision of the state last handed to `state_tx`
    published_revision: AtomicU64,
    table_load: Mutex<Option<JoinHandle<()>>>,
}

/// The single session of the process.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct SessionLifecycle {
    inner: Arc<Inner>,
}

impl SessionLifecycle {
    pub fn builder() -> SessionLifecycleBuilder {
        SessionLifecycleBuilder::default()
    }

    // ========== Observation ==========

    /// Receiver that sees every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state_tx.subscribe()
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.shared.lock().state.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Profile repository the session reads from.
    pub fn profiles(&self) -> &Arc<dyn ProfileRepository> {
        &self.inner.profiles
    }

    /// Apply a change under the state lock, then publish the result.
    ///
    /// Publishing happens after the state lock is released, so a subscriber
    /// may call [`snapshot`](Self::snapshot) while holding a watch borrow. A
    /// slower publisher never overwrites a newer revision.
    fn mutate<R>(&self, f: impl FnOnce(&mut Shared) -> R) -> R {
        let (result, revision, state) = {
            let mut shared = self.inner.shared.lock();
            let result = f(&mut shared);
            shared.revision += 1;
            (result, shared.revision, shared.state.clone())
        };

        self.inner.state_tx.send_if_modified(|published| {
            // Runs under the watch write lock, which orders publishers.
            if revision <= self.inner.published_revision.load(Ordering::Acquire) {
                return false;
            }
            self.inner.published_revision.store(revision, Ordering::Release);
            if *published == state {
                return false;
            }
            *published = state;
            true
        });
        result
    }

    /// Run a driver call behind the gate, giving up when `token` is cancelled.
    async fn gated<T, F>(&self, token: &CancellationToken, call: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, SessionError>>,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(SessionError::Superseded),
            result = async {
                let _gate = self.inner.gate.lock().await;
                call.await
            } => result,
        }
    }

    fn current_profile(&self) -> Option<ProfileId> {
        self.inner.shared.lock().state.current_profile
    }

    /// Generation and token of the live connection.
    fn require_connected(&self) -> Result<(u64, CancellationToken), SessionError> {
        let shared = self.inner.shared.lock();
        if !shared.state.is_connected() {
            return Err(SessionError::NotConnected);
        }
        Ok((shared.connect_generation, shared.connect_token.clone()))
    }

    // ========== Preferences ==========

    fn preference(&self, key: &str) -> Option<String> {
        match self.inner.preferences.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read preference");
                None
            }
        }
    }

    fn remember(&self, key: &str, value: &str) {
        if let Err(e) = self.inner.preferences.set(key, value) {
            tracing::warn!(key, error = %e, "Failed to save preference");
        }
    }

    fn forget_preference(&self, key: &str) {
        if let Err(e) = self.inner.preferences.clear(key) {
            tracing::warn!(key, error = %e, "Failed to clear preference");
        }
    }

    // ========== Connection ==========

    /// Make `profile` current and connect to it with its stored password.
    pub async fn select_profile(&self, profile: &ConnectionProfile) -> Result<(), SessionError> {
        self.connect(profile, None).await
    }

    /// Connect to `profile`, superseding any connection or attempt in progress.
    ///
    /// `override_password`, when non-empty, wins over the stored password. On
    /// success the profile is remembered as the last connection and the
    /// database list is fetched; a failed fetch is returned while the status
    /// stays `Connected`. Returns [`SessionError::Superseded`] if a newer
    /// connect or a disconnect arrived first.
    pub async fn connect(
        &self,
        profile: &ConnectionProfile,
        override_password: Option<&str>,
    ) -> Result<(), SessionError> {
        let (generation, token) = self.mutate(|shared| {
            shared.abandon_connection();
            shared.state.reset_connection_scope();
            shared.state.current_profile = Some(profile.id);
            shared.state.status = ConnectionStatus::Connecting;
            (shared.connect_generation, shared.connect_token.clone())
        });

        let password =
            self.inner.credentials.resolve(override_password.unwrap_or(""), Some(profile.id));
        let params = ConnectParams::from_profile(profile, password.clone());

        tracing::info!(
            profile_id = %profile.id,
            host = %profile.host,
            port = profile.port,
            attempt = generation,
            "Connecting"
        );

        let result = self.gated(&token, self.inner.driver.connect(&params)).await;

        let applied = self.mutate(|shared| {
            if shared.connect_generation != generation {
                return false;
            }
            match &result {
                Ok(()) => {
                    shared.state.status = ConnectionStatus::Connected;
                    shared.active =
                        Some(ActiveConnection { profile: profile.clone(), password });
                }
                Err(e) => {
                    shared.state.status = ConnectionStatus::failed(e.to_string());
                    shared.state.current_profile = None;
                    shared.active = None;
                }
            }
            true
        });

        if !applied {
            tracing::debug!(profile_id = %profile.id, attempt = generation, "Discarding superseded connect");
            return Err(SessionError::Superseded);
        }

        if let Err(e) = result {
            tracing::warn!(profile_id = %profile.id, error = %e, "Connection failed");
            return Err(e);
        }

        tracing::info!(profile_id = %profile.id, "Connected");
        self.remember(LAST_CONNECTION_ID, &profile.id.to_string());
        self.refresh_databases().await
    }

    /// Close the session. Never fails; driver errors are only logged.
    ///
    /// The last-connection preference is kept.
    pub async fn disconnect(&self) {
        let (generation, previous) = self.mutate(|shared| {
            let previous = shared.state.current_profile;
            shared.abandon_connection();
            shared.state.reset_connection_scope();
            shared.state.current_profile = None;
            shared.state.status = ConnectionStatus::Disconnected;
            (shared.connect_generation, previous)
        });

        let _gate = self.inner.gate.lock().await;
        let superseded = self.inner.shared.lock().connect_generation != generation;
        if superseded {
            tracing::debug!("Skipping driver disconnect, a newer connect took over");
            return;
        }
        if let Err(e) = self.inner.driver.disconnect().await {
            tracing::warn!(error = %e, "Driver disconnect failed");
        }

        if let Some(id) = previous {
            tracing::info!(profile_id = %id, "Disconnected");
        }
    }

    /// Reconnect to the last used profile on startup.
    ///
    /// Does nothing if a profile is already current. If the repository is
    /// still empty, waits once for it to change, bounded by the configured
    /// grace period. A remembered id with no matching profile is cleared.
    /// Returns the id of the restored profile.
    pub async fn restore_last_connection(&self) -> Result<Option<ProfileId>, SessionError> {
        if self.current_profile().is_some() {
            return Ok(None);
        }

        let mut profiles = self.inner.profiles.list()?;
        if profiles.is_empty() {
            let mut changes = self.inner.profiles.subscribe();
            profiles = self.inner.profiles.list()?;
            if profiles.is_empty() {
                let grace = self.inner.config.restore_grace_period;
                if tokio::time::timeout(grace, changes.changed()).await.is_err() {
                    tracing::debug!(grace_ms = grace.as_millis() as u64, "No profiles before grace period ended");
                }
                profiles = self.inner.profiles.list()?;
            }
        }
        if profiles.is_empty() {
            return Ok(None);
        }

        let Some(raw_id) = self.preference(LAST_CONNECTION_ID) else {
            return Ok(None);
        };

        let profile = Uuid::parse_str(&raw_id)
            .ok()
            .and_then(|id| profiles.into_iter().find(|profile| profile.id == id));
        let Some(profile) = profile else {
            tracing::info!(last_connection_id = %raw_id, "Clearing unknown last connection");
            self.forget_preference(LAST_CONNECTION_ID);
            return Ok(None);
        };

        if self.current_profile().is_some() {
            return Ok(None);
        }

        tracing::info!(profile_id = %profile.id, name = %profile.name, "Restoring last connection");
        self.connect(&profile, None).await?;
        Ok(Some(profile.id))
    }

    // ========== Databases ==========

    /// Reload the database list, then try to restore the last database.
    ///
    /// On failure the previous list is kept and the connection stays up.
    pub async fn refresh_databases(&self) -> Result<(), SessionError> {
        let (generation, token) = self.require_connected()?;

        let databases = match self.gated(&token, self.inner.driver.fetch_databases()).await {
            Ok(databases) => databases,
            Err(e) => {
                if !e.is_superseded() {
                    tracing::warn!(error = %e, "Failed to fetch databases");
                }
                return Err(e);
            }
        };

        let applied = self.mutate(|shared| {
            if shared.connect_generation != generation {
                return false;
            }
            let selection_gone = shared
                .state
                .selected_database
                .as_ref()
                .is_some_and(|selected| !databases.contains(selected));
            shared.state.databases = databases;
            if selection_gone {
                shared.abandon_table_load();
                shared.state.reset_database_scope();
            }
            true
        });
        if !applied {
            return Err(SessionError::Superseded);
        }

        tracing::debug!(count = self.snapshot().databases.len(), "Databases refreshed");
        self.restore_last_database();
        Ok(())
    }

    /// Select the remembered database if nothing is selected yet.
    ///
    /// Returns the database that was selected.
    pub fn restore_last_database(&self) -> Option<DatabaseInfo> {
        {
            let shared = self.inner.shared.lock();
            if shared.state.selected_database.is_some() || shared.state.databases.is_empty() {
                return None;
            }
        }

        let name = self.preference(LAST_DATABASE_NAME)?;
        let database = self.inner.shared.lock().state.database_named(&name).cloned()?;

        match self.select_database(Some(database.id)) {
            Ok(()) => {
                tracing::debug!(database = %database.name, "Restored last database");
                Some(database)
            }
            Err(e) => {
                tracing::warn!(database = %database.name, error = %e, "Failed to restore last database");
                None
            }
        }
    }

    /// Select a database by id, or clear the selection with `None`.
    ///
    /// Tables, the selected table and query state are cleared before this
    /// returns. Tables are then loaded in the background over a connection
    /// scoped to the new database; a failed load leaves an empty list.
    pub fn select_database(&self, id: Option<u32>) -> Result<(), SessionError> {
        let Some(id) = id else {
            self.mutate(|shared| {
                shared.abandon_table_load();
                shared.state.reset_database_scope();
            });
            self.forget_preference(LAST_DATABASE_NAME);
            return Ok(());
        };

        let (database, load) = self.mutate(|shared| {
            let database =
                shared.state.database(id).cloned().ok_or(SessionError::UnknownDatabase { id })?;
            let active = shared.active.clone().ok_or(SessionError::NotConnected)?;

            shared.abandon_table_load();
            shared.table_token = shared.connect_token.child_token();
            shared.state.reset_table_scope();
            shared.state.selected_database = Some(database.clone());
            shared.state.is_loading_tables = true;

            let load = TableLoad {
                connect_generation: shared.connect_generation,
                table_generation: shared.table_generation,
                token: shared.table_token.clone(),
                params: ConnectParams::from_profile(&active.profile, active.password)
                    .for_database(database.name.clone()),
            };
            Ok::<_, SessionError>((database, load))
        })?;

        tracing::debug!(database = %database.name, "Database selected");
        self.remember(LAST_DATABASE_NAME, &database.name);

        let session = self.clone();
        let handle = self.inner.runtime.spawn(async move { session.load_tables(load).await });
        *self.inner.table_load.lock() = Some(handle);
        Ok(())
    }

    async fn load_tables(&self, load: TableLoad) {
        let TableLoad { connect_generation, table_generation, token, params } = load;
        let database = params.database.clone();

        let result = self
            .gated(&token, async {
                self.inner.driver.connect(&params).await?;
                self.inner.driver.fetch_tables(&params.database).await
            })
            .await;

        self.mutate(|shared| {
            if shared.connect_generation != connect_generation
                || shared.table_generation != table_generation
            {
                tracing::debug!(database = %database, "Discarding stale table load");
                return;
            }
            shared.state.is_loading_tables = false;
            match result {
                Ok(tables) => {
                    tracing::debug!(database = %database, count = tables.len(), "Tables loaded");
                    shared.state.tables = tables;
                }
                Err(e) => {
                    tracing::warn!(database = %database, error = %e, "Failed to load tables");
                    shared.state.tables = Vec::new();
                }
            }
        });
    }

    /// Wait for the most recent background table load to finish.
    pub async fn wait_for_tables(&self) {
        let handle = self.inner.table_load.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Table load task failed");
            }
        }
    }

    /// Create a database and reload the list.
    pub async fn create_database(&self, name: &str) -> Result<(), SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }

        let (_, token) = self.require_connected()?;
        self.gated(&token, self.inner.driver.create_database(name)).await?;
        tracing::info!(database = name, "Database created");

        self.refresh_databases().await
    }

    /// Drop a database. Dropping the selected one clears the selection.
    ///
    /// If the driver is attached to the database being dropped, it first
    /// reconnects to the profile's default database, or to `postgres` when
    /// that is the one going away. A failed drop leaves the state unchanged.
    pub async fn delete_database(&self, database: &DatabaseInfo) -> Result<(), SessionError> {
        let (generation, token) = self.require_connected()?;
        let rebind = self.rebind_before_drop(&database.name)?;

        self.gated(&token, async {
            if let Some(params) = &rebind {
                tracing::debug!(
                    database = %database.name,
                    rebind = %params.database,
                    "Leaving database to drop it"
                );
                self.inner.driver.connect(params).await?;
            }
            self.inner.driver.delete_database(&database.name).await
        })
        .await?;
        tracing::info!(database = %database.name, "Database dropped");

        let was_selected = self.mutate(|shared| {
            if shared.connect_generation != generation {
                return None;
            }
            shared.state.databases.retain(|db| db.id != database.id);
            Some(
                shared
                    .state
                    .selected_database
                    .as_ref()
                    .is_some_and(|selected| selected.id == database.id),
            )
        });

        match was_selected {
            None => Err(SessionError::Superseded),
            Some(true) => self.select_database(None),
            Some(false) => Ok(()),
        }
    }

    /// Where the driver must move before `name` can be dropped, if it is attached to it.
    fn rebind_before_drop(&self, name: &str) -> Result<Option<ConnectParams>, SessionError> {
        let shared = self.inner.shared.lock();
        let active = shared.active.as_ref().ok_or(SessionError::NotConnected)?;
        let bound = match &shared.state.selected_database {
            Some(selected) => selected.name.as_str(),
            None => active.profile.database.as_str(),
        };
        if bound != name {
            return Ok(None);
        }
        let params = ConnectParams::from_profile(&active.profile, active.password.clone());
        Ok(Some(params.maintenance(name)))
    }

    // ========== Tables and query ==========

    /// Select a table from the current list, or clear the selection.
    ///
    /// Changing the selection resets query state.
    pub fn select_table(&self, table: Option<TableInfo>) -> Result<(), SessionError> {
        self.mutate(|shared| {
            if let Some(table) = &table {
                if !shared.state.tables.contains(table) {
                    return Err(SessionError::UnknownTable {
                        schema: table.schema.clone(),
                        name: table.name.clone(),
                    });
                }
            }
            if shared.state.selected_table != table {
                shared.state.selected_table = table;
                shared.state.query.reset();
            }
            Ok(())
        })
    }

    /// Change query state through the session.
    pub fn update_query(&self, f: impl FnOnce(&mut QueryState)) {
        self.mutate(|shared| f(&mut shared.state.query));
    }

    // ========== Profiles ==========

    /// Store the password, then insert or update the profile.
    ///
    /// An empty password keeps the stored one. A credential write failure
    /// aborts before the profile is touched.
    pub fn save_profile(
        &self,
        profile: &ConnectionProfile,
        password: &str,
        is_new: bool,
    ) -> Result<(), SessionError> {
        profile.validate()?;
        self.inner.credentials.persist(profile.id, password)?;
        if is_new {
            self.inner.profiles.insert(profile)?;
        } else {
            self.inner.profiles.update(profile)?;
        }
        tracing::info!(profile_id = %profile.id, name = %profile.name, is_new, "Profile saved");
        Ok(())
    }

    /// Save a form and connect to the result.
    ///
    /// `existing` is the profile being edited, if any. The draft password is
    /// used for this connect even when it is not stored.
    pub async fn save_and_connect(
        &self,
        draft: ConnectionDraft,
        existing: Option<&ConnectionProfile>,
    ) -> Result<ConnectionProfile, SessionError> {
        let password = draft.password.clone();
        let profile = draft.into_profile(existing)?;
        self.save_profile(&profile, &password, existing.is_none())?;
        self.connect(&profile, Some(&password)).await?;
        Ok(profile)
    }

    /// Delete a profile and its stored password.
    ///
    /// Disconnects first if it is the current profile.
    pub async fn delete_profile(&self, id: ProfileId) -> Result<(), SessionError> {
        if self.current_profile() == Some(id) {
            self.disconnect().await;
        }

        self.inner.credentials.forget(id)?;
        self.inner.profiles.delete(id)?;

        if self.preference(LAST_CONNECTION_ID).as_deref() == Some(id.to_string().as_str()) {
            self.forget_preference(LAST_CONNECTION_ID);
        }
        tracing::info!(profile_id = %id, "Profile deleted");
        Ok(())
    }

    /// Probe a connection without touching the session.
    ///
    /// `editing` is the id of the profile being edited; its stored password
    /// is used when `password` is empty.
    pub async fn test_connection(
        &self,
        profile: &ConnectionProfile,
        password: &str,
        editing: Option<ProfileId>,
    ) -> Result<bool, SessionError> {
        let password = self.inner.credentials.resolve(password, editing);
        let params = ConnectParams::from_profile(profile, password);
        self.inner.driver.test_connection(&params).await
    }
}

impl std::fmt::Debug for SessionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.inner.shared.lock();
        f.debug_struct("SessionLifecycle")
            .field("status", &shared.state.status)
            .field("current_profile", &shared.state.current_profile)
            .field("connect_generation", &shared.connect_generation)
            .field("table_generation", &shared.table_generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.restore_grace_period, Duration::from_millis(500));
        assert_eq!(config.driver, DriverOptions::default());
    }

    #[test]
    fn test_build_without_runtime_fails() {
        let result = SessionLifecycle::builder().build();
        assert!(matches!(result, Err(SessionError::Internal { .. })));
    }
}
