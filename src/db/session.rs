//! Database sessions.
//!
//! A `Session` is a unit of work against one registered database. It holds a
//! dedicated pooled connection inside an open transaction. `commit` makes the
//! pending work durable, `rollback` discards it, and `close` returns the
//! connection to the pool (rolling back anything still pending).
//!
//! After a commit or rollback the next statement transparently begins a new
//! transaction, so one session can run several units of work in a row.

use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::pool::DbPool;
use crate::db::sql::Statement;
use crate::db::types::{JsonRow, RowToJson};
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use futures_util::TryStreamExt;
use sqlx::{MySql, Postgres, Row, Sqlite, Transaction};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Database-specific transaction wrapper.
#[derive(Debug)]
pub enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    SQLite(Transaction<'static, Sqlite>),
}

/// Result of a write statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    /// Generated key reported by MySQL and SQLite. PostgreSQL uses `RETURNING`.
    pub last_insert_id: Option<i64>,
}

impl DbTransaction {
    pub async fn commit(self) -> DbResult<()> {
        impl_db_dispatch!(DbTransaction, self, {
            MySql(tx) => tx.commit().await.map_err(DbError::from),
            Postgres(tx) => tx.commit().await.map_err(DbError::from),
            SQLite(tx) => tx.commit().await.map_err(DbError::from),
        })
    }

    pub async fn rollback(self) -> DbResult<()> {
        impl_db_dispatch!(DbTransaction, self, {
            MySql(tx) => tx.rollback().await.map_err(DbError::from),
            Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            SQLite(tx) => tx.rollback().await.map_err(DbError::from),
        })
    }

    async fn execute(&mut self, stmt: &Statement) -> DbResult<ExecOutcome> {
        let outcome = match self {
            DbTransaction::MySql(tx) => {
                let mut query = sqlx::query(stmt.sql());
                for param in stmt.params() {
                    query = bind_mysql_param(query, param);
                }
                let result = query.execute(&mut **tx).await?;
                ExecOutcome {
                    rows_affected: result.rows_affected(),
                    last_insert_id: i64::try_from(result.last_insert_id()).ok(),
                }
            }
            DbTransaction::Postgres(tx) => {
                let mut query = sqlx::query(stmt.sql());
                for param in stmt.params() {
                    query = bind_postgres_param(query, param);
                }
                let result = query.execute(&mut **tx).await?;
                ExecOutcome {
                    rows_affected: result.rows_affected(),
                    last_insert_id: None,
                }
            }
            DbTransaction::SQLite(tx) => {
                let mut query = sqlx::query(stmt.sql());
                for param in stmt.params() {
                    query = bind_sqlite_param(query, param);
                }
                let result = query.execute(&mut **tx).await?;
                ExecOutcome {
                    rows_affected: result.rows_affected(),
                    last_insert_id: Some(result.last_insert_rowid()),
                }
            }
        };
        Ok(outcome)
    }

    async fn fetch_all(&mut self, stmt: &Statement) -> DbResult<Vec<JsonRow>> {
        let rows = match self {
            DbTransaction::MySql(tx) => {
                let mut query = sqlx::query(stmt.sql());
                for param in stmt.params() {
                    query = bind_mysql_param(query, param);
                }
                let rows: Vec<sqlx::mysql::MySqlRow> = query.fetch(&mut **tx).try_collect().await?;
                rows.iter().map(|r| r.to_json_map()).collect()
            }
            DbTransaction::Postgres(tx) => {
                let mut query = sqlx::query(stmt.sql());
                for param in stmt.params() {
                    query = bind_postgres_param(query, param);
                }
                let rows: Vec<sqlx::postgres::PgRow> = query.fetch(&mut **tx).try_collect().await?;
                rows.iter().map(|r| r.to_json_map()).collect()
            }
            DbTransaction::SQLite(tx) => {
                let mut query = sqlx::query(stmt.sql());
                for param in stmt.params() {
                    query = bind_sqlite_param(query, param);
                }
                let rows: Vec<sqlx::sqlite::SqliteRow> =
                    query.fetch(&mut **tx).try_collect().await?;
                rows.iter().map(|r| r.to_json_map()).collect()
            }
        };
        Ok(rows)
    }

    async fn fetch_scalar(&mut self, stmt: &Statement) -> DbResult<Option<i64>> {
        let row = match self {
            DbTransaction::MySql(tx) => {
                let mut query = sqlx::query(stmt.sql());
                for param in stmt.params() {
                    query = bind_mysql_param(query, param);
                }
                query
                    .fetch_optional(&mut **tx)
                    .await?
                    .map(|row| row.try_get::<i64, _>(0))
            }
            DbTransaction::Postgres(tx) => {
                let mut query = sqlx::query(stmt.sql());
                for param in stmt.params() {
                    query = bind_postgres_param(query, param);
                }
                query
                    .fetch_optional(&mut **tx)
                    .await?
                    .map(|row| row.try_get::<i64, _>(0))
            }
            DbTransaction::SQLite(tx) => {
                let mut query = sqlx::query(stmt.sql());
                for param in stmt.params() {
                    query = bind_sqlite_param(query, param);
                }
                query
                    .fetch_optional(&mut **tx)
                    .await?
                    .map(|row| row.try_get::<i64, _>(0))
            }
        };
        Ok(row.transpose()?)
    }
}

/// A unit of work bound to one registered database.
pub struct Session {
    id: String,
    database: String,
    pool: DbPool,
    tx: Option<DbTransaction>,
    tracker: Arc<AtomicUsize>,
    released: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("database", &self.database)
            .field("db_type", &self.pool.db_type())
            .field("in_transaction", &self.tx.is_some())
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session and begin its first transaction.
    pub(crate) async fn open(
        database: String,
        pool: DbPool,
        tracker: Arc<AtomicUsize>,
    ) -> DbResult<Self> {
        let tx = pool.begin().await?;
        tracker.fetch_add(1, Ordering::AcqRel);
        let id = generate_session_id();
        debug!(session_id = %id, database = %database, "Session opened");
        Ok(Self {
            id,
            database,
            pool,
            tx: Some(tx),
            tracker,
            released: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the registered database this session is bound to.
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn db_type(&self) -> DatabaseType {
        self.pool.db_type()
    }

    /// Whether uncommitted work may be pending.
    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    async fn transaction(&mut self) -> DbResult<&mut DbTransaction> {
        if self.tx.is_none() {
            self.tx = Some(self.pool.begin().await?);
            debug!(session_id = %self.id, "Transaction started");
        }
        self.tx
            .as_mut()
            .ok_or_else(|| DbError::internal("session transaction missing after begin"))
    }

    /// Execute a write statement inside the current transaction.
    pub async fn execute(&mut self, stmt: &Statement) -> DbResult<ExecOutcome> {
        let outcome = self.transaction().await?.execute(stmt).await?;
        debug!(
            session_id = %self.id,
            sql = %stmt.sql(),
            rows_affected = outcome.rows_affected,
            "Executed in session"
        );
        Ok(outcome)
    }

    /// Run a query and decode every row.
    pub async fn fetch_all(&mut self, stmt: &Statement) -> DbResult<Vec<JsonRow>> {
        let rows = self.transaction().await?.fetch_all(stmt).await?;
        debug!(
            session_id = %self.id,
            sql = %stmt.sql(),
            row_count = rows.len(),
            "Queried in session"
        );
        Ok(rows)
    }

    /// Run a query returning a single integer column (counts, generated keys).
    pub async fn fetch_scalar(&mut self, stmt: &Statement) -> DbResult<Option<i64>> {
        self.transaction().await?.fetch_scalar(stmt).await
    }

    /// Make pending work durable. A no-op when nothing is pending.
    pub async fn commit(&mut self) -> DbResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
            debug!(session_id = %self.id, database = %self.database, "Session committed");
        }
        Ok(())
    }

    /// Discard pending work. A no-op when nothing is pending.
    pub async fn rollback(&mut self) -> DbResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await?;
            debug!(session_id = %self.id, database = %self.database, "Session rolled back");
        }
        Ok(())
    }

    /// Release the session. Uncommitted work is rolled back.
    pub async fn close(mut self) -> DbResult<()> {
        let result = match self.tx.take() {
            Some(tx) => tx.rollback().await,
            None => Ok(()),
        };
        self.release();
        result
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.tracker.fetch_sub(1, Ordering::AcqRel);
        debug!(session_id = %self.id, database = %self.database, "Session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // The pending transaction is rolled back by sqlx when dropped.
        let pending = self.tx.is_some();
        self.release();
        warn!(
            session_id = %self.id,
            database = %self.database,
            pending_work = pending,
            "Session released via Drop - consider using explicit close()"
        );
    }
}

fn generate_session_id() -> String {
    format!("sess_{}", uuid::Uuid::new_v4().simple())
}
