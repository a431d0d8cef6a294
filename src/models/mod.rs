//! Data models for dbscope.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod entities;
pub mod validation;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType, mask_password};
pub use entities::{Product, User, example_schema};
pub use validation::{ProcessedUserData, UserData, ValidationError};
