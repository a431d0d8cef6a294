//! Database dispatch macros for reducing code duplication.
//!
//! This module provides declarative macros that generate database-specific
//! implementations while maintaining linear readability. The macros expand
//! at compile time with zero runtime overhead.

/// Macro for generating database dispatch match arms.
///
/// This macro generates match arms for the per-backend enums (`DbPool`,
/// `DbTransaction`), reducing the need to manually write repetitive match
/// statements.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(DbPool, pool, {
///     MySql(p) => p.close().await,
///     Postgres(p) => p.close().await,
///     SQLite(p) => p.close().await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($kind:ident, $value:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $kind::$variant($p) => $body,
            )+
        }
    };
}

/// Build a [`Fields`](crate::db::Fields) list from `name => value` pairs.
///
/// ```ignore
/// let fields = fields! { "name" => "Alice", "age" => 25 };
/// ```
#[macro_export]
macro_rules! fields {
    () => {
        $crate::db::Fields::new()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::db::Fields::new()$(.set($name, $value))+
    };
}

pub use fields;
pub use impl_db_dispatch;
