//! Row decoding into JSON maps.
//!
//! `TypeCategory` classifies the reported column type, then the value is
//! decoded as the first Rust type of that category the backend accepts.
//! Non-finite floats become `null`.
//!
//! Entities are rebuilt from the decoded maps with `serde_json::from_value`,
//! so every backend yields the same shape for the same declared column.

use crate::models::DatabaseType;
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo};

/// A decoded row keyed by column name.
pub type JsonRow = serde_json::Map<String, JsonValue>;

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Boolean,
    Binary,
    Text,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // SQLite's NUMERIC affinity behaves like a float
    if db == DatabaseType::SQLite && lower == "numeric" {
        return TypeCategory::Float;
    }

    // Boolean before integer: MySQL reports BOOLEAN columns as TINYINT(1)
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower.contains("serial") {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    // varchar, text, char and the timestamp text columns
    TypeCategory::Text
}

/// Encode binary data as base64 text.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> JsonRow;
}

/// The column as the first listed Rust type it decodes to, if any.
macro_rules! decode_first {
    ($row:expr, $idx:expr, $($ty:ty),+) => {
        Option::<JsonValue>::None
            $(.or_else(|| $row.try_get::<Option<$ty>, _>($idx).ok().flatten().map(JsonValue::from)))+
    };
}

/// Backends differ in which integer and float widths they will decode a
/// column as, so each lists its own candidates, widest first.
macro_rules! impl_row_to_json {
    ($row:ty, $dialect:expr, integers: [$($int:ty),+], floats: [$($float:ty),+]) => {
        impl RowToJson for $row {
            fn to_json_map(&self) -> JsonRow {
                self.columns()
                    .iter()
                    .map(|col| {
                        let idx = col.ordinal();
                        let value = match categorize_type(col.type_info().name(), $dialect) {
                            TypeCategory::Integer => decode_first!(self, idx, $($int),+),
                            TypeCategory::Float => decode_first!(self, idx, $($float),+),
                            TypeCategory::Boolean => decode_first!(self, idx, bool),
                            TypeCategory::Text => decode_first!(self, idx, String),
                            TypeCategory::Binary => self
                                .try_get::<Option<Vec<u8>>, _>(idx)
                                .ok()
                                .flatten()
                                .map(|v| decode_binary_value(&v)),
                        };
                        (col.name().to_string(), value.unwrap_or(JsonValue::Null))
                    })
                    .collect()
            }
        }
    };
}

impl_row_to_json!(MySqlRow, DatabaseType::MySQL, integers: [i64, u64], floats: [f64, f32]);
impl_row_to_json!(PgRow, DatabaseType::PostgreSQL, integers: [i64, i32, i16], floats: [f64, f32]);
impl_row_to_json!(SqliteRow, DatabaseType::SQLite, integers: [i64], floats: [f64]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INT8", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INTEGER", DatabaseType::SQLite),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_boolean_and_float() {
        assert_eq!(
            categorize_type("BOOLEAN", DatabaseType::SQLite),
            TypeCategory::Boolean
        );
        assert_eq!(
            categorize_type("BOOL", DatabaseType::PostgreSQL),
            TypeCategory::Boolean
        );
        assert_eq!(
            categorize_type("FLOAT8", DatabaseType::PostgreSQL),
            TypeCategory::Float
        );
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_text_columns() {
        assert_eq!(
            categorize_type("VARCHAR(100)", DatabaseType::SQLite),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("TEXT", DatabaseType::PostgreSQL),
            TypeCategory::Text
        );
    }

    #[test]
    fn test_decode_binary_value() {
        assert_eq!(
            decode_binary_value(b"hello world"),
            JsonValue::String("aGVsbG8gd29ybGQ=".to_string())
        );
        assert_eq!(decode_binary_value(&[]), JsonValue::String(String::new()));
    }
}
