//! Connection-related data models.
//!
//! This module defines types for database connection configuration.

use crate::config::{ConfigError, PoolOptions, validate_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for one named database.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub name: String,
    pub db_type: DatabaseType,
    /// Driver connection string with pool options removed.
    /// Contains sensitive data - never log
    pub connection_string: String,
    pub pool_options: PoolOptions,
}

impl ConnectionConfig {
    /// Build a connection configuration from a name and a database URL.
    ///
    /// Pool options (`max_connections`, `min_connections`, `idle_timeout`,
    /// `acquire_timeout`) are taken out of the query string; every other
    /// parameter is left for the driver.
    pub fn parse(
        name: impl Into<String>,
        connection_string: &str,
    ) -> Result<Self, ConnectionConfigError> {
        let name = name.into();
        validate_name(&name).map_err(|_| ConnectionConfigError::InvalidName(name.clone()))?;

        let db_type = DatabaseType::from_connection_string(connection_string).ok_or_else(|| {
            ConnectionConfigError::UnknownDatabaseType(mask_password(connection_string))
        })?;

        let (connection_string, pool_options) = split_pool_options(connection_string)?;
        pool_options.validate()?;

        Ok(Self {
            name,
            db_type,
            connection_string,
            pool_options,
        })
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        mask_password(&self.connection_string)
    }
}

/// Replace the password component of a URL with `****`.
pub fn mask_password(connection_string: &str) -> String {
    let Some(scheme_end) = connection_string.find("://").map(|p| p + 3) else {
        return connection_string.to_string();
    };
    let rest = &connection_string[scheme_end..];
    if let Some(at_pos) = rest.find('@') {
        if let Some(colon_pos) = rest[..at_pos].find(':') {
            return format!(
                "{}{}:****{}",
                &connection_string[..scheme_end],
                &rest[..colon_pos],
                &rest[at_pos..]
            );
        }
    }
    connection_string.to_string()
}

/// Extract pool options from URL query params, keeping others for the driver.
fn split_pool_options(
    connection_string: &str,
) -> Result<(String, PoolOptions), ConnectionConfigError> {
    if !connection_string.contains('?') {
        return Ok((connection_string.to_string(), PoolOptions::default()));
    }

    let mut url = Url::parse(connection_string)
        .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", mask_password(connection_string), e)))?;

    let mut opts = BTreeMap::new();
    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter_map(|(k, v)| {
            let key_lower = k.to_ascii_lowercase();
            if PoolOptions::KEYS.contains(&key_lower.as_str()) {
                opts.insert(key_lower, v.into_owned());
                None
            } else {
                Some((k.into_owned(), v.into_owned()))
            }
        })
        .collect();

    if opts.is_empty() {
        return Ok((connection_string.to_string(), PoolOptions::default()));
    }

    if remaining.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(remaining);
    }

    Ok((url.to_string(), PoolOptions::from_query(&mut opts)))
}

/// Errors that can occur when creating a connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    /// Name is empty or contains invalid characters
    #[error("Database name is empty or contains invalid characters: '{0}'")]
    InvalidName(String),

    /// Could not determine database type from connection string
    #[error("Unknown database type in connection string: {0}")]
    UnknownDatabaseType(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
