//! Scoped session helpers.
//!
//! All three helpers hand the caller's closure a `&mut Session` and return a
//! boxed future borrowing it, the same shape `sqlx::Connection::transaction`
//! uses:
//!
//! ```ignore
//! let user = ctx
//!     .transactional(Some("analytics"), None, |session| {
//!         Box::pin(async move { User::create(session, fields).await })
//!     })
//!     .await?;
//! ```
//!
//! Values captured by the closure must be moved in; the future may not borrow
//! from the enclosing scope.

use crate::db::context::DbContext;
use crate::db::session::Session;
use crate::error::DbError;
use futures_util::future::BoxFuture;
use tracing::warn;

impl DbContext {
    /// Run `f` with a fresh session on `database` (or the current database).
    ///
    /// On `Ok` nothing is committed here; on `Err` pending work is rolled
    /// back. The session is closed exactly once either way, and released via
    /// `Drop` if `f` panics. The current database is not changed.
    pub async fn session_scope<T, E, F>(&self, database: Option<&str>, f: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, E>>,
        E: From<DbError>,
    {
        let mut session = self.session(database).await?;
        let result = f(&mut session).await;
        if result.is_err() {
            rollback_quietly(&mut session).await;
        }
        close_quietly(session).await;
        result
    }

    /// Run `f` as one transaction.
    ///
    /// When `database` is given it becomes the current database first, and
    /// stays current afterwards. With `session: None` a session is opened on
    /// the current database and closed afterwards; a supplied session is left
    /// open. `Ok` commits; `Err` rolls back and is returned unchanged.
    pub async fn transactional<T, E, F>(
        &mut self,
        database: Option<&str>,
        session: Option<&mut Session>,
        f: F,
    ) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, E>>,
        E: From<DbError>,
    {
        if let Some(name) = database {
            self.set_current(name).await?;
        }

        match session {
            Some(session) => run_in_transaction(session, f).await,
            None => {
                let mut session = self.session(None).await?;
                let result = run_in_transaction(&mut session, f).await;
                close_quietly(session).await;
                result
            }
        }
    }

    /// Run `f` with a fresh session without committing or rolling back.
    ///
    /// Like [`transactional`](Self::transactional), a given `database` becomes
    /// the current one. Work `f` does not commit itself is discarded when the
    /// session is closed.
    pub async fn with_db_session<T, E, F>(&mut self, database: Option<&str>, f: F) -> Result<T, E>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, E>>,
        E: From<DbError>,
    {
        if let Some(name) = database {
            self.set_current(name).await?;
        }

        let mut session = self.session(None).await?;
        let result = f(&mut session).await;
        close_quietly(session).await;
        result
    }
}

/// Commit on `Ok`, roll back on `Err`.
///
/// A failed commit is returned as the error. A failed rollback is logged and
/// the original error is returned.
pub async fn run_in_transaction<T, E, F>(session: &mut Session, f: F) -> Result<T, E>
where
    F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T, E>>,
    E: From<DbError>,
{
    match f(session).await {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(e) => {
            rollback_quietly(session).await;
            Err(e)
        }
    }
}

async fn rollback_quietly(session: &mut Session) {
    if let Err(e) = session.rollback().await {
        warn!(session_id = %session.id(), error = %e, "Rollback failed");
    }
}

async fn close_quietly(session: Session) {
    let id = session.id().to_string();
    if let Err(e) = session.close().await {
        warn!(session_id = %id, error = %e, "Session close failed");
    }
}
