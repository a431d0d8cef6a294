//! Database abstraction layer.
//!
//! This module provides:
//! - A registry of named connection pools (`DatabaseManager`)
//! - An explicit per-call-path "current database" (`DbContext`)
//! - Sessions with begin/commit/rollback/close lifecycle
//! - Scoped session helpers (`session_scope`, `transactional`, `with_db_session`)
//! - Generic CRUD over declared entities and schema creation
//! - Database dispatch macros for reducing code duplication

#[macro_use]
pub mod macros;
pub mod context;
pub mod crud;
pub mod manager;
pub mod params;
pub mod pool;
pub mod schema;
pub mod scope;
pub mod session;
pub mod sql;
pub mod types;

pub use context::DbContext;
pub use crud::{Crud, DEFAULT_LIMIT, DEFAULT_SKIP, Entity, Fields};
pub use manager::{ConnectionSummary, DatabaseManager, SessionFactory};
pub use params::FieldValue;
pub use pool::DbPool;
pub use schema::{Column, ColumnType, Schema, TableDef};
pub use session::{ExecOutcome, Session};
pub use sql::Statement;

/// Name of the database every manager must have after initialization.
pub const DEFAULT_DATABASE: &str = "default";
