//! Table declarations and DDL.
//!
//! Entities declare their columns as `&'static [Column]`. Every table also
//! gets an integer primary key `id`, a `created_at` timestamp and (unless the
//! entity opts out) an `updated_at` timestamp. Timestamps are stored as
//! RFC 3339 text so the three backends round-trip them identically.

use crate::db::crud::Entity;
use crate::db::pool::DbPool;
use crate::db::sql::quote_ident;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use tracing::{debug, info};

pub const ID_COLUMN: &str = "id";
pub const CREATED_AT_COLUMN: &str = "created_at";
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Logical column type, mapped to a concrete SQL type per dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
    Varchar(u32),
    Blob,
}

impl ColumnType {
    pub fn sql_type(self, dialect: DatabaseType) -> String {
        match (self, dialect) {
            (Self::Integer, DatabaseType::SQLite) => "INTEGER".to_string(),
            (Self::Integer, _) => "BIGINT".to_string(),
            (Self::Float, DatabaseType::SQLite) => "REAL".to_string(),
            (Self::Float, DatabaseType::PostgreSQL) => "DOUBLE PRECISION".to_string(),
            (Self::Float, DatabaseType::MySQL) => "DOUBLE".to_string(),
            (Self::Boolean, _) => "BOOLEAN".to_string(),
            (Self::Text, _) => "TEXT".to_string(),
            (Self::Varchar(len), _) => format!("VARCHAR({})", len),
            (Self::Blob, DatabaseType::PostgreSQL) => "BYTEA".to_string(),
            (Self::Blob, _) => "BLOB".to_string(),
        }
    }
}

/// A declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub unique: bool,
    pub indexed: bool,
}

impl Column {
    /// A nullable, non-unique, unindexed column.
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
            unique: false,
            indexed: false,
        }
    }

    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    fn definition(&self, dialect: DatabaseType) -> String {
        let mut def = format!(
            "{} {}",
            quote_ident(self.name, dialect),
            self.ty.sql_type(dialect)
        );
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if self.unique {
            def.push_str(" UNIQUE");
        }
        def
    }
}

/// Everything needed to create or drop one entity's table.
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub tracks_updated_at: bool,
}

impl TableDef {
    pub fn of<E: Entity>() -> Self {
        Self {
            name: E::TABLE,
            columns: E::COLUMNS,
            tracks_updated_at: E::TRACKS_UPDATED_AT,
        }
    }

    fn index_name(&self, column: &Column) -> String {
        format!("ix_{}_{}", self.name, column.name)
    }

    /// `CREATE TABLE` followed by any `CREATE INDEX` statements.
    ///
    /// MySQL has no `CREATE INDEX IF NOT EXISTS`, so its indexes are declared
    /// inline in the table definition.
    pub fn create_statements(&self, dialect: DatabaseType) -> Vec<String> {
        let timestamp_type = match dialect {
            DatabaseType::MySQL => "VARCHAR(40)",
            _ => "TEXT",
        };
        let id_definition = match dialect {
            DatabaseType::SQLite => "INTEGER PRIMARY KEY AUTOINCREMENT",
            DatabaseType::PostgreSQL => "BIGSERIAL PRIMARY KEY",
            DatabaseType::MySQL => "BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY",
        };

        let mut definitions = vec![format!(
            "{} {}",
            quote_ident(ID_COLUMN, dialect),
            id_definition
        )];
        definitions.extend(self.columns.iter().map(|c| c.definition(dialect)));
        definitions.push(format!(
            "{} {} NOT NULL",
            quote_ident(CREATED_AT_COLUMN, dialect),
            timestamp_type
        ));
        if self.tracks_updated_at {
            definitions.push(format!(
                "{} {}",
                quote_ident(UPDATED_AT_COLUMN, dialect),
                timestamp_type
            ));
        }

        let indexed = self.columns.iter().filter(|c| c.indexed && !c.unique);
        if dialect == DatabaseType::MySQL {
            definitions.extend(indexed.clone().map(|c| {
                format!(
                    "INDEX {} ({})",
                    quote_ident(&self.index_name(c), dialect),
                    quote_ident(c.name, dialect)
                )
            }));
        }

        let mut statements = vec![format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(self.name, dialect),
            definitions.join(", ")
        )];

        if dialect != DatabaseType::MySQL {
            statements.extend(indexed.map(|c| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                    quote_ident(&self.index_name(c), dialect),
                    quote_ident(self.name, dialect),
                    quote_ident(c.name, dialect)
                )
            }));
        }

        statements
    }

    pub fn drop_statement(&self, dialect: DatabaseType) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(self.name, dialect))
    }
}

/// An ordered set of tables that are created and dropped together.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: Vec<TableDef>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity's table. Tables are created in insertion order.
    pub fn table<E: Entity>(mut self) -> Self {
        self.tables.push(TableDef::of::<E>());
        self
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Create every table that does not exist yet.
    pub async fn create_all(&self, pool: &DbPool) -> DbResult<()> {
        let dialect = pool.db_type();
        for table in &self.tables {
            for sql in table.create_statements(dialect) {
                pool.execute_raw(&sql)
                    .await
                    .map_err(|e| DbError::schema(e.to_string(), table.name))?;
            }
            debug!(table = %table.name, "Table ensured");
        }
        info!(tables = self.tables.len(), db_type = %dialect, "Schema created");
        Ok(())
    }

    /// Drop every table, in reverse creation order.
    pub async fn drop_all(&self, pool: &DbPool) -> DbResult<()> {
        let dialect = pool.db_type();
        for table in self.tables.iter().rev() {
            pool.execute_raw(&table.drop_statement(dialect))
                .await
                .map_err(|e| DbError::schema(e.to_string(), table.name))?;
        }
        info!(tables = self.tables.len(), db_type = %dialect, "Schema dropped");
        Ok(())
    }
}

/// Check whether a table exists in the pool's current database or schema.
pub async fn table_exists(pool: &DbPool, table: &str) -> DbResult<bool> {
    let count = match pool {
        DbPool::SQLite(p) => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(p)
            .await?
        }
        DbPool::Postgres(p) => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = current_schema() AND table_name = $1",
            )
            .bind(table)
            .fetch_one(p)
            .await?
        }
        DbPool::MySql(p) => {
            sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = DATABASE() AND table_name = ?",
            )
            .bind(table)
            .fetch_one(p)
            .await?
        }
    };
    Ok(count > 0)
}
