//! Connection profiles, status, and driver parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::connection_string::{self, DEFAULT_PORT};
use crate::error::{ConnectionStringError, SessionError};

/// Stable identifier of a connection profile. Also keys its stored password.
pub type ProfileId = Uuid;

/// Current state of the session's connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No active connection
    #[default]
    Disconnected,
    /// Connection in progress
    Connecting,
    /// Active, healthy connection
    Connected,
    /// The last connect attempt failed
    Failed {
        /// Human-readable error message
        message: String,
    },
}

impl ConnectionStatus {
    /// Create a failed status.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into() }
    }

    /// Check if the connection is active.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Check if the connection is connecting.
    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting)
    }

    /// Check if the last attempt failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Check if the connection is disconnected.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    /// Get the error message if in failed state.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// SSL negotiation policy, as named by libpq's `sslmode` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    /// No SSL
    Disable,
    /// Try plain first, then SSL
    Allow,
    /// Use SSL if available (default)
    #[default]
    Prefer,
    /// Require SSL, accept any certificate
    Require,
    /// Require SSL, verify CA
    VerifyCa,
    /// Require SSL, verify CA and hostname
    VerifyFull,
}

impl SslMode {
    /// All modes in libpq order.
    pub const ALL: [SslMode; 6] = [
        SslMode::Disable,
        SslMode::Allow,
        SslMode::Prefer,
        SslMode::Require,
        SslMode::VerifyCa,
        SslMode::VerifyFull,
    ];

    /// Convert to the `sslmode` parameter value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Allow => "allow",
            Self::Prefer => "prefer",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
        }
    }

    /// Parse an `sslmode` value. Names are matched exactly, as libpq does.
    pub fn from_param(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == value)
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A saved set of non-secret connection parameters.
///
/// The password is never part of a profile. It lives in the credential
/// store under the profile's `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Unique identifier, stable across edits
    pub id: ProfileId,
    /// Display name (not unique)
    pub name: String,
    /// Server hostname or IP
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login username
    pub username: String,
    /// Default database name (may be empty)
    pub database: String,
    /// SSL configuration
    pub ssl_mode: SslMode,
    /// Pinned in the connection list
    pub is_favorite: bool,
}

impl ConnectionProfile {
    /// Create a new profile with a fresh id and default port.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        username: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            database: database.into(),
            ssl_mode: SslMode::default(),
            is_favorite: false,
        }
    }

    /// Set the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the SSL mode.
    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    /// Validate the profile.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.name.trim().is_empty() {
            return Err(SessionError::validation("Name is required"));
        }
        if self.host.trim().is_empty() {
            return Err(SessionError::validation("Host is required"));
        }
        if self.port == 0 {
            return Err(SessionError::validation("Port must be between 1 and 65535"));
        }
        Ok(())
    }

    /// Get the display connection string (without password).
    pub fn display_url(&self) -> String {
        connection_string::build(
            Some(&self.username),
            None,
            &self.host,
            self.port,
            Some(&self.database),
            self.ssl_mode,
        )
    }
}

/// Everything the driver needs to open a session.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Server hostname or IP
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login username
    pub username: String,
    /// Login password (never logged)
    pub password: String,
    /// Target database (empty means the server default)
    pub database: String,
    /// SSL configuration
    pub ssl_mode: SslMode,
}

impl ConnectParams {
    /// Build parameters from a profile and a resolved password.
    pub fn from_profile(profile: &ConnectionProfile, password: impl Into<String>) -> Self {
        Self {
            host: profile.host.clone(),
            port: profile.port,
            username: profile.username.clone(),
            password: password.into(),
            database: profile.database.clone(),
            ssl_mode: profile.ssl_mode,
        }
    }

    /// Same server and credentials, scoped to another database.
    pub fn for_database(&self, database: impl Into<String>) -> Self {
        Self { database: database.into(), ..self.clone() }
    }

    /// Parameters for a database to stay on while `dropping` is dropped.
    ///
    /// PostgreSQL refuses to drop the database a session is attached to, so
    /// this keeps `self.database` unless it is the one going away, then falls
    /// back to `postgres` (or `template1` when `postgres` itself is dropped).
    pub fn maintenance(&self, dropping: &str) -> Self {
        if !self.database.is_empty() && self.database != dropping {
            return self.clone();
        }
        if dropping == MAINTENANCE_DATABASE {
            return self.for_database("template1");
        }
        self.for_database(MAINTENANCE_DATABASE)
    }
}

/// Database that exists on every PostgreSQL server.
const MAINTENANCE_DATABASE: &str = "postgres";

impl fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"****")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Tuning for the PostgreSQL driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverOptions {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u32,
    /// Application name sent to PostgreSQL
    pub application_name: String,
    /// Maximum pooled connections per session
    pub pool_size: usize,
    /// How long to wait for a pooled connection
    pub pool_wait_timeout_secs: u32,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            application_name: "Tusk".to_string(),
            pool_size: 4,
            pool_wait_timeout_secs: 30,
        }
    }
}

/// Contents of the connection form, in either field or connection-string mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDraft {
    /// Display name
    pub name: String,
    /// Server hostname or IP
    pub host: String,
    /// Server port
    pub port: u16,
    /// Login username
    pub username: String,
    /// Password as typed (empty means "leave unchanged" when editing)
    pub password: String,
    /// Default database
    pub database: String,
    /// SSL configuration
    pub ssl_mode: SslMode,
}

impl ConnectionDraft {
    /// Fill the form from a connection string.
    ///
    /// Returns the draft plus the names of parameters that will be ignored.
    pub fn from_connection_string(
        input: &str,
    ) -> Result<(Self, Vec<String>), ConnectionStringError> {
        let parsed = connection_string::parse(input)?;
        let warnings = parsed.unsupported_parameters();
        let draft = Self {
            name: String::new(),
            host: parsed.host,
            port: parsed.port,
            username: parsed.username.unwrap_or_default(),
            password: parsed.password.unwrap_or_default(),
            database: parsed.database.unwrap_or_default(),
            ssl_mode: parsed.ssl_mode,
        };
        Ok((draft, warnings))
    }

    /// Load an existing profile into the form. The password stays blank.
    pub fn from_profile(profile: &ConnectionProfile) -> Self {
        Self {
            name: profile.name.clone(),
            host: profile.host.clone(),
            port: profile.port,
            username: profile.username.clone(),
            password: String::new(),
            database: profile.database.clone(),
            ssl_mode: profile.ssl_mode,
        }
    }

    /// Render the form as a connection string, password included.
    pub fn to_connection_string(&self) -> String {
        connection_string::build(
            Some(&self.username),
            Some(&self.password),
            &self.host,
            self.port,
            Some(&self.database),
            self.ssl_mode,
        )
    }

    /// Validate and convert into a profile.
    ///
    /// `existing` keeps the id of the profile being edited; otherwise a new id
    /// is generated. A blank name falls back to the host.
    pub fn into_profile(
        self,
        existing: Option<&ConnectionProfile>,
    ) -> Result<ConnectionProfile, SessionError> {
        let host = self.host.trim().to_string();
        if host.is_empty() {
            return Err(SessionError::validation("Host is required"));
        }
        if self.port == 0 {
            return Err(SessionError::validation("Port must be between 1 and 65535"));
        }
        let name = match self.name.trim() {
            "" => host.clone(),
            name => name.to_string(),
        };

        Ok(ConnectionProfile {
            id: existing.map(|p| p.id).unwrap_or_else(Uuid::new_v4),
            name,
            host,
            port: self.port,
            username: self.username.trim().to_string(),
            database: self.database.trim().to_string(),
            ssl_mode: self.ssl_mode,
            is_favorite: existing.map(|p| p.is_favorite).unwrap_or(false),
        })
    }
}
