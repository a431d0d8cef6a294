//! Example entities.

use crate::db::{Column, ColumnType, Entity, Schema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [Column] = &[
        Column::new("name", ColumnType::Varchar(50)).not_null().indexed(),
        Column::new("age", ColumnType::Integer),
        Column::new("email", ColumnType::Varchar(100)).unique(),
    ];

    fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) => write!(
                f,
                "<User(id={}, name='{}', email='{}')>",
                self.id, self.name, email
            ),
            None => write!(f, "<User(id={}, name='{}', email=None)>", self.id, self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Price in cents.
    pub price: i64,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Product {
    const TABLE: &'static str = "products";
    const COLUMNS: &'static [Column] = &[
        Column::new("name", ColumnType::Varchar(100)).not_null().indexed(),
        Column::new("price", ColumnType::Integer).not_null(),
        Column::new("description", ColumnType::Varchar(500)),
    ];

    fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<Product(id={}, name='{}', price={})>",
            self.id, self.name, self.price
        )
    }
}

/// Tables for the example entities.
pub fn example_schema() -> Schema {
    Schema::new().table::<User>().table::<Product>()
}
