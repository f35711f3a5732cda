//! PostgreSQL driver built on deadpool-postgres.
//!
//! Each `connect` builds a fresh pool for the target database and validates
//! it with `SELECT 1` before swapping it in. TLS is not negotiated; `sslmode`
//! values that demand it make the connect fail.

use crate::error::SessionError;
use crate::models::{ConnectParams, DatabaseInfo, DriverOptions, SslMode, TableInfo};
use crate::services::driver::DriverClient;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use parking_lot::RwLock;
use std::time::Duration;
use tokio_postgres::NoTls;

/// A pool bound to one database.
struct ActivePool {
    pool: Pool,
    params: ConnectParams,
}

/// [`DriverClient`] backed by a deadpool-postgres pool.
pub struct PostgresDriver {
    options: DriverOptions,
    active: RwLock<Option<ActivePool>>,
}

impl PostgresDriver {
    /// Create a disconnected driver.
    pub fn new(options: DriverOptions) -> Self {
        Self { options, active: RwLock::new(None) }
    }

    /// Build and validate a pool for `params`.
    async fn open_pool(&self, params: &ConnectParams) -> Result<Pool, SessionError> {
        let connect_timeout = Duration::from_secs(self.options.connect_timeout_secs as u64);

        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&params.host);
        pg_config.port(params.port);
        if !params.username.is_empty() {
            pg_config.user(&params.username);
        }
        if !params.password.is_empty() {
            pg_config.password(&params.password);
        }
        if !params.database.is_empty() {
            pg_config.dbname(&params.database);
        }
        pg_config.ssl_mode(pg_ssl_mode(params.ssl_mode));
        pg_config.application_name(&self.options.application_name);
        pg_config.connect_timeout(connect_timeout);
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(60));

        let manager = Manager::from_config(
            pg_config,
            NoTls,
            ManagerConfig { recycling_method: RecyclingMethod::Fast },
        );

        let pool = Pool::builder(manager)
            .max_size(self.options.pool_size)
            .wait_timeout(Some(Duration::from_secs(self.options.pool_wait_timeout_secs as u64)))
            .create_timeout(Some(connect_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| SessionError::connection(format!("Failed to create pool: {e}")))?;

        let client = pool.get().await.map_err(SessionError::from_pool_connect)?;
        client.execute("SELECT 1", &[]).await.map_err(SessionError::from_connect)?;

        Ok(pool)
    }

    fn pool(&self) -> Result<Pool, SessionError> {
        self.active
            .read()
            .as_ref()
            .map(|active| active.pool.clone())
            .ok_or(SessionError::NotConnected)
    }

    /// Database the live pool is bound to.
    pub fn current_database(&self) -> Option<String> {
        self.active.read().as_ref().map(|active| active.params.database.clone())
    }
}

#[async_trait]
impl DriverClient for PostgresDriver {
    async fn connect(&self, params: &ConnectParams) -> Result<(), SessionError> {
        let pool = self.open_pool(params).await?;

        let previous = self
            .active
            .write()
            .replace(ActivePool { pool, params: params.clone() });
        if let Some(previous) = previous {
            previous.pool.close();
        }

        tracing::info!(
            host = %params.host,
            port = params.port,
            database = %params.database,
            "Connected"
        );
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        if let Some(active) = self.active.write().take() {
            active.pool.close();
            tracing::info!(database = %active.params.database, "Connection pool closed");
        }
        Ok(())
    }

    async fn fetch_databases(&self) -> Result<Vec<DatabaseInfo>, SessionError> {
        let client = self.pool()?.get().await?;
        let rows = client
            .query(
                r#"
                SELECT oid, datname
                FROM pg_catalog.pg_database
                WHERE NOT datistemplate
                  AND datallowconn
                ORDER BY datname
                "#,
                &[],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| DatabaseInfo { id: row.get("oid"), name: row.get("datname") })
            .collect())
    }

    async fn fetch_tables(&self, database: &str) -> Result<Vec<TableInfo>, SessionError> {
        if self.current_database().as_deref() != Some(database) {
            tracing::warn!(database, "Fetching tables from a pool bound to another database");
        }

        let client = self.pool()?.get().await?;
        let rows = client
            .query(
                r#"
                SELECT
                    n.nspname AS schema,
                    c.relname AS name
                FROM pg_catalog.pg_class c
                JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace
                WHERE c.relkind IN ('r', 'p')
                  AND n.nspname NOT LIKE 'pg_%'
                  AND n.nspname != 'information_schema'
                ORDER BY n.nspname, c.relname
                "#,
                &[],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| TableInfo { schema: row.get("schema"), name: row.get("name") })
            .collect())
    }

    async fn create_database(&self, name: &str) -> Result<(), SessionError> {
        let client = self.pool()?.get().await?;
        client.batch_execute(&format!("CREATE DATABASE {}", quote_ident(name))).await?;
        tracing::info!(database = name, "Database created");
        Ok(())
    }

    async fn delete_database(&self, name: &str) -> Result<(), SessionError> {
        let bound = self.active.read().as_ref().map(|active| active.params.clone());
        if let Some(params) = bound.filter(|params| params.database == name) {
            // Move every pooled session off the database before dropping it.
            let maintenance = params.maintenance(name);
            tracing::debug!(
                database = name,
                rebind = %maintenance.database,
                "Leaving database to drop it"
            );
            self.connect(&maintenance).await?;
        }

        let client = self.pool()?.get().await?;
        client.batch_execute(&format!("DROP DATABASE {}", quote_ident(name))).await?;
        tracing::info!(database = name, "Database dropped");
        Ok(())
    }

    async fn test_connection(&self, params: &ConnectParams) -> Result<bool, SessionError> {
        let pool = self.open_pool(params).await?;
        pool.close();
        tracing::debug!(host = %params.host, "Test connection succeeded");
        Ok(true)
    }
}

impl std::fmt::Debug for PostgresDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDriver")
            .field("options", &self.options)
            .field("database", &self.current_database())
            .finish()
    }
}

/// Map to the subset of modes tokio-postgres understands.
fn pg_ssl_mode(mode: SslMode) -> tokio_postgres::config::SslMode {
    match mode {
        SslMode::Disable => tokio_postgres::config::SslMode::Disable,
        SslMode::Allow | SslMode::Prefer => tokio_postgres::config::SslMode::Prefer,
        SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => {
            tokio_postgres::config::SslMode::Require
        }
    }
}

/// Quote an identifier for use in DDL.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
