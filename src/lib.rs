//! dbscope library
//!
//! Named connection pools for several SQL databases (SQLite, PostgreSQL,
//! MySQL), an explicit current-database context, scoped sessions with
//! commit/rollback discipline and generic CRUD over declared entities.

pub mod cli;
pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;

pub use config::Config;
pub use db::{Crud, DatabaseManager, DbContext, Entity, Fields, Session};
pub use error::{DbError, DbResult};
