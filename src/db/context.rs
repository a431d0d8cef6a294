//! Current-database selection.
//!
//! A `DbContext` carries the name of the "current" database for one logical
//! call path. Contexts are plain values: cloning one for a spawned task gives
//! that task its own selection, so concurrent tasks never see each other's
//! `set_current`.

use crate::db::DEFAULT_DATABASE;
use crate::db::manager::{DatabaseManager, SessionFactory};
use crate::db::session::Session;
use crate::error::{DbError, DbResult};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DbContext {
    manager: Arc<DatabaseManager>,
    current: Option<String>,
}

impl DbContext {
    pub fn new(manager: Arc<DatabaseManager>) -> Self {
        Self {
            manager,
            current: None,
        }
    }

    pub fn manager(&self) -> &Arc<DatabaseManager> {
        &self.manager
    }

    /// The current database name; `default` until something else is set.
    pub fn current(&self) -> &str {
        self.current.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    /// Make `name` the current database. Fails if it is not registered,
    /// leaving the current selection unchanged.
    pub async fn set_current(&mut self, name: &str) -> DbResult<()> {
        if !self.manager.is_registered(name).await {
            return Err(DbError::unregistered(name));
        }
        debug!(from = %self.current(), to = %name, "Switching current database");
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Session factory for `name`, or for the current database when `None`.
    pub async fn resolve(&self, name: Option<&str>) -> DbResult<SessionFactory> {
        self.manager.resolve(name.unwrap_or(self.current())).await
    }

    /// Open a session on `name`, or on the current database when `None`.
    pub async fn session(&self, name: Option<&str>) -> DbResult<Session> {
        self.resolve(name).await?.open().await
    }
}
