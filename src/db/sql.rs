//! Dialect-aware SQL statement building.
//!
//! Identifiers written through [`Statement::push_ident`] come from entity
//! declarations only; caller-supplied values always go through placeholders.

use crate::db::params::FieldValue;
use crate::models::DatabaseType;

/// Quote an identifier for the given dialect.
pub fn quote_ident(ident: &str, dialect: DatabaseType) -> String {
    match dialect {
        DatabaseType::MySQL => format!("`{}`", ident.replace('`', "``")),
        DatabaseType::PostgreSQL | DatabaseType::SQLite => {
            format!("\"{}\"", ident.replace('"', "\"\""))
        }
    }
}

/// A SQL string plus its positional parameters.
#[derive(Debug, Clone)]
pub struct Statement {
    dialect: DatabaseType,
    sql: String,
    params: Vec<FieldValue>,
}

impl Statement {
    pub fn new(dialect: DatabaseType) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Start a statement from a raw SQL fragment.
    pub fn raw(dialect: DatabaseType, sql: impl Into<String>) -> Self {
        Self {
            dialect,
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append raw SQL.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a quoted identifier.
    pub fn push_ident(&mut self, ident: &str) -> &mut Self {
        let quoted = quote_ident(ident, self.dialect);
        self.sql.push_str(&quoted);
        self
    }

    /// Append a comma-separated list of quoted identifiers.
    pub fn push_idents<'a>(&mut self, idents: impl IntoIterator<Item = &'a str>) -> &mut Self {
        for (i, ident) in idents.into_iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.push_ident(ident);
        }
        self
    }

    /// Append a value. `Null` is written inline, anything else as a placeholder.
    pub fn push_value(&mut self, value: FieldValue) -> &mut Self {
        if value.is_null() {
            self.sql.push_str("NULL");
            return self;
        }
        self.params.push(value);
        match self.dialect {
            DatabaseType::PostgreSQL => {
                let placeholder = format!("${}", self.params.len());
                self.sql.push_str(&placeholder);
            }
            DatabaseType::MySQL | DatabaseType::SQLite => self.sql.push('?'),
        }
        self
    }

    /// Append `ident = value` or `ident IS NULL` for use in a WHERE clause.
    pub fn push_condition(&mut self, ident: &str, value: FieldValue) -> &mut Self {
        self.push_ident(ident);
        if value.is_null() {
            self.push(" IS NULL")
        } else {
            self.push(" = ").push_value(value)
        }
    }

    pub fn dialect(&self) -> DatabaseType {
        self.dialect
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[FieldValue] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident_per_dialect() {
        assert_eq!(quote_ident("users", DatabaseType::SQLite), "\"users\"");
        assert_eq!(quote_ident("users", DatabaseType::PostgreSQL), "\"users\"");
        assert_eq!(quote_ident("users", DatabaseType::MySQL), "`users`");
        assert_eq!(quote_ident("a\"b", DatabaseType::SQLite), "\"a\"\"b\"");
    }

    #[test]
    fn test_postgres_placeholders_are_numbered() {
        let mut stmt = Statement::new(DatabaseType::PostgreSQL);
        stmt.push("UPDATE ")
            .push_ident("users")
            .push(" SET ")
            .push_ident("name")
            .push(" = ")
            .push_value("Bob".into())
            .push(" WHERE ")
            .push_condition("id", 7.into());
        assert_eq!(
            stmt.sql(),
            "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2"
        );
        assert_eq!(stmt.params().len(), 2);
    }

    #[test]
    fn test_null_is_inlined() {
        let mut stmt = Statement::new(DatabaseType::SQLite);
        stmt.push_condition("email", FieldValue::Null)
            .push(" AND ")
            .push_condition("age", 30.into());
        assert_eq!(stmt.sql(), "\"email\" IS NULL AND \"age\" = ?");
        assert_eq!(stmt.params(), &[FieldValue::Int(30)]);
    }

    #[test]
    fn test_push_idents() {
        let mut stmt = Statement::new(DatabaseType::MySQL);
        stmt.push_idents(["id", "name"]);
        assert_eq!(stmt.sql(), "`id`, `name`");
    }
}
