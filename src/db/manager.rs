//! Registry of named databases.
//!
//! `DatabaseManager` maps database names to connection pools and hands out
//! [`SessionFactory`] handles for them. Registering a name that already
//! exists replaces the old pool. The manager also counts sessions that are
//! currently open across every database.

use crate::config::DEFAULT_DATABASE_URL;
use crate::db::DEFAULT_DATABASE;
use crate::db::context::DbContext;
use crate::db::pool::DbPool;
use crate::db::schema::Schema;
use crate::db::session::Session;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionConfig, ConnectionConfigError, DatabaseType};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Registered database information (no secrets exposed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSummary {
    pub name: String,
    pub db_type: DatabaseType,
    /// Connection URL with the password masked.
    pub url: String,
}

/// Opens sessions against one registered database.
#[derive(Debug, Clone)]
pub struct SessionFactory {
    database: String,
    pool: DbPool,
    tracker: Arc<AtomicUsize>,
}

impl SessionFactory {
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn db_type(&self) -> DatabaseType {
        self.pool.db_type()
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Open a new session with a transaction already begun.
    pub async fn open(&self) -> DbResult<Session> {
        Session::open(
            self.database.clone(),
            self.pool.clone(),
            Arc::clone(&self.tracker),
        )
        .await
    }
}

#[derive(Debug)]
struct Registration {
    config: ConnectionConfig,
    pool: DbPool,
}

#[derive(Debug, Clone)]
pub struct DatabaseManager {
    registry: Arc<RwLock<HashMap<String, Registration>>>,
    open_sessions: Arc<AtomicUsize>,
}

impl DatabaseManager {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            open_sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Connect to `connection_string` and register the pool under `name`.
    ///
    /// An existing registration with the same name is replaced. Its pool is
    /// closed in the background once every session on it has been released.
    pub async fn register(&self, name: &str, connection_string: &str) -> DbResult<ConnectionSummary> {
        let config = ConnectionConfig::parse(name, connection_string).map_err(|e| match e {
            ConnectionConfigError::InvalidName(_) => DbError::configuration(e.to_string()),
            other => DbError::connection(
                other.to_string(),
                "Use a postgres://, mysql:// or sqlite: URL",
            ),
        })?;

        info!(
            database = %name,
            db_type = %config.db_type,
            url = %config.masked_connection_string(),
            "Registering database"
        );

        let pool = DbPool::connect(&config).await?;
        let server_version = pool.server_version().await;

        let summary = ConnectionSummary {
            name: name.to_string(),
            db_type: config.db_type,
            url: config.masked_connection_string(),
        };

        let replaced = {
            let mut registry = self.registry.write().await;
            registry.insert(name.to_string(), Registration { config, pool })
        }; // Lock released here

        if let Some(old) = replaced {
            // Closing waits for checked-out connections, so sessions still
            // open on the old pool must not block the caller.
            let database = name.to_string();
            tokio::spawn(async move {
                old.pool.close().await;
                debug!(database = %database, "Replaced pool closed");
            });
            info!(database = %name, "Replaced existing registration");
        }

        info!(
            database = %name,
            server_version = ?server_version,
            "Database registered"
        );
        Ok(summary)
    }

    /// Register every database in `databases`, making sure `default` exists.
    ///
    /// When the map has no `default` entry, `default_url` is used, falling back
    /// to the local SQLite file `app.db`. With a schema, tables are created in
    /// every registered database; failures there are logged, not returned.
    pub async fn initialize(
        &self,
        databases: &BTreeMap<String, String>,
        default_url: Option<&str>,
        schema: Option<&Schema>,
    ) -> DbResult<()> {
        let mut targets = databases.clone();
        if !targets.contains_key(DEFAULT_DATABASE) {
            let url = default_url.unwrap_or_else(|| {
                warn!(
                    url = DEFAULT_DATABASE_URL,
                    "No default database configured, using local SQLite file"
                );
                DEFAULT_DATABASE_URL
            });
            targets.insert(DEFAULT_DATABASE.to_string(), url.to_string());
        }

        for (name, url) in &targets {
            self.register(name, url).await?;
        }

        if let Some(schema) = schema {
            for name in targets.keys() {
                if let Err(e) = self.create_tables(name, schema).await {
                    error!(database = %name, error = %e, "Failed to create tables");
                }
            }
        }

        info!(databases = targets.len(), "Database manager initialized");
        Ok(())
    }

    /// Get the session factory for a registered name.
    pub async fn resolve(&self, name: &str) -> DbResult<SessionFactory> {
        let registry = self.registry.read().await;
        let entry = registry
            .get(name)
            .ok_or_else(|| DbError::unregistered(name))?;
        Ok(SessionFactory {
            database: name.to_string(),
            pool: entry.pool.clone(),
            tracker: Arc::clone(&self.open_sessions),
        })
    }

    /// Open a session on a registered database.
    pub async fn session(&self, name: &str) -> DbResult<Session> {
        self.resolve(name).await?.open().await
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.registry.read().await.contains_key(name)
    }

    /// Registered names, sorted.
    pub async fn names(&self) -> Vec<String> {
        let registry = self.registry.read().await;
        let mut names: Vec<String> = registry.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered databases with masked URLs, sorted by name.
    pub async fn list(&self) -> Vec<ConnectionSummary> {
        let registry = self.registry.read().await;
        let mut summaries: Vec<ConnectionSummary> = registry
            .iter()
            .map(|(name, entry)| ConnectionSummary {
                name: name.clone(),
                db_type: entry.config.db_type,
                url: entry.config.masked_connection_string(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub async fn count(&self) -> usize {
        self.registry.read().await.len()
    }

    /// Number of sessions currently open across every database.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::Acquire)
    }

    /// Create the schema's tables in one registered database.
    pub async fn create_tables(&self, name: &str, schema: &Schema) -> DbResult<()> {
        let factory = self.resolve(name).await?;
        schema.create_all(factory.pool()).await?;
        info!(database = %name, "Tables created");
        Ok(())
    }

    /// Drop the schema's tables from one registered database.
    pub async fn drop_tables(&self, name: &str, schema: &Schema) -> DbResult<()> {
        let factory = self.resolve(name).await?;
        schema.drop_all(factory.pool()).await?;
        info!(database = %name, "Tables dropped");
        Ok(())
    }

    /// Close all pools and clear the registry.
    pub async fn close_all(&self) {
        let drained: Vec<(String, Registration)> = {
            let mut registry = self.registry.write().await;
            registry.drain().collect()
        };
        for (name, entry) in drained {
            info!(database = %name, "Closing database");
            entry.pool.close().await;
        }
        info!("All databases closed");
    }

    /// A fresh context whose current database is `default`.
    pub fn context(self: &Arc<Self>) -> DbContext {
        DbContext::new(Arc::clone(self))
    }
}

impl Default for DatabaseManager {
    fn default() -> Self {
        Self::new()
    }
}
