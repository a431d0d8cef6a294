//! Generic CRUD over declared entities.
//!
//! An [`Entity`] declares its table and columns; [`Crud`] is implemented for
//! every entity and provides create, read, update, delete, filter and count
//! through an open [`Session`]. Nothing here commits: the caller's scope
//! decides whether the work becomes durable.

use crate::db::params::FieldValue;
use crate::db::schema::{CREATED_AT_COLUMN, Column, ID_COLUMN, UPDATED_AT_COLUMN};
use crate::db::session::Session;
use crate::db::sql::Statement;
use crate::db::types::JsonRow;
use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::future::Future;
use tracing::debug;

pub const DEFAULT_SKIP: u64 = 0;
pub const DEFAULT_LIMIT: u64 = 100;

/// A persisted record type.
///
/// Rows are decoded by deserializing a JSON object keyed by column name, so
/// field names must match column names.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    /// Columns besides `id`, `created_at` and `updated_at`.
    const COLUMNS: &'static [Column];
    const TRACKS_UPDATED_AT: bool = true;

    fn id(&self) -> i64;

    /// Column name to value mapping.
    fn to_dict(&self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// Ordered column assignments or filter conditions.
///
/// Setting a name twice keeps the first position and the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Fields {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (name, value) in iter {
            fields.insert(name, value);
        }
        fields
    }
}

/// CRUD operations available on every [`Entity`].
pub trait Crud: Entity {
    /// Insert a row. Unknown field names are rejected.
    fn create(session: &mut Session, fields: Fields)
    -> impl Future<Output = DbResult<Self>> + Send;

    fn get_by_id(
        session: &mut Session,
        id: i64,
    ) -> impl Future<Output = DbResult<Option<Self>>> + Send;

    /// Rows ordered by id, skipping `skip` and returning at most `limit`.
    fn get_all(
        session: &mut Session,
        skip: u64,
        limit: u64,
    ) -> impl Future<Output = DbResult<Vec<Self>>> + Send;

    fn get_all_default(session: &mut Session) -> impl Future<Output = DbResult<Vec<Self>>> + Send {
        Self::get_all(session, DEFAULT_SKIP, DEFAULT_LIMIT)
    }

    /// Apply known fields to an existing row; unknown names are ignored.
    /// Returns `None` when no row has this id.
    fn update(
        session: &mut Session,
        id: i64,
        fields: Fields,
    ) -> impl Future<Output = DbResult<Option<Self>>> + Send;

    /// Returns whether a row was deleted.
    fn delete(session: &mut Session, id: i64) -> impl Future<Output = DbResult<bool>> + Send;

    /// Rows matching every known condition; unknown names are ignored.
    fn filter(
        session: &mut Session,
        conditions: Fields,
    ) -> impl Future<Output = DbResult<Vec<Self>>> + Send;

    fn count(session: &mut Session) -> impl Future<Output = DbResult<u64>> + Send;
}

impl<E: Entity> Crud for E {
    fn create(
        session: &mut Session,
        fields: Fields,
    ) -> impl Future<Output = DbResult<Self>> + Send {
        create::<E>(session, fields)
    }

    fn get_by_id(
        session: &mut Session,
        id: i64,
    ) -> impl Future<Output = DbResult<Option<Self>>> + Send {
        get_by_id::<E>(session, id)
    }

    fn get_all(
        session: &mut Session,
        skip: u64,
        limit: u64,
    ) -> impl Future<Output = DbResult<Vec<Self>>> + Send {
        get_all::<E>(session, skip, limit)
    }

    fn update(
        session: &mut Session,
        id: i64,
        fields: Fields,
    ) -> impl Future<Output = DbResult<Option<Self>>> + Send {
        update::<E>(session, id, fields)
    }

    fn delete(session: &mut Session, id: i64) -> impl Future<Output = DbResult<bool>> + Send {
        delete::<E>(session, id)
    }

    fn filter(
        session: &mut Session,
        conditions: Fields,
    ) -> impl Future<Output = DbResult<Vec<Self>>> + Send {
        filter::<E>(session, conditions)
    }

    fn count(session: &mut Session) -> impl Future<Output = DbResult<u64>> + Send {
        count::<E>(session)
    }
}

fn is_declared<E: Entity>(name: &str) -> bool {
    E::COLUMNS.iter().any(|c| c.name == name)
}

fn is_known_column<E: Entity>(name: &str) -> bool {
    name == ID_COLUMN
        || name == CREATED_AT_COLUMN
        || (E::TRACKS_UPDATED_AT && name == UPDATED_AT_COLUMN)
        || is_declared::<E>(name)
}

fn all_columns<E: Entity>() -> Vec<&'static str> {
    let mut columns = vec![ID_COLUMN];
    columns.extend(E::COLUMNS.iter().map(|c| c.name));
    columns.push(CREATED_AT_COLUMN);
    if E::TRACKS_UPDATED_AT {
        columns.push(UPDATED_AT_COLUMN);
    }
    columns
}

fn select<E: Entity>(dialect: DatabaseType) -> Statement {
    let mut stmt = Statement::new(dialect);
    stmt.push("SELECT ")
        .push_idents(all_columns::<E>())
        .push(" FROM ")
        .push_ident(E::TABLE);
    stmt
}

fn decode<E: Entity>(row: JsonRow) -> DbResult<E> {
    serde_json::from_value(JsonValue::Object(row))
        .map_err(|e| DbError::internal(format!("Failed to decode {} row: {}", E::TABLE, e)))
}

async fn create<E: Entity>(session: &mut Session, fields: Fields) -> DbResult<E> {
    let unknown: Vec<&str> = fields
        .iter()
        .map(|(name, _)| name)
        .filter(|name| !is_known_column::<E>(name))
        .collect();
    if !unknown.is_empty() {
        return Err(DbError::invalid_input(format!(
            "{} has no column(s): {}",
            E::TABLE,
            unknown.join(", ")
        )));
    }

    let now = FieldValue::timestamp(Utc::now());
    let mut values = fields;
    if !values.contains(CREATED_AT_COLUMN) {
        values.insert(CREATED_AT_COLUMN, now.clone());
    }
    if E::TRACKS_UPDATED_AT && !values.contains(UPDATED_AT_COLUMN) {
        values.insert(UPDATED_AT_COLUMN, now);
    }
    let explicit_id = match values.get(ID_COLUMN) {
        Some(FieldValue::Int(id)) => Some(*id),
        _ => None,
    };

    let dialect = session.db_type();
    let mut stmt = Statement::new(dialect);
    stmt.push("INSERT INTO ")
        .push_ident(E::TABLE)
        .push(" (")
        .push_idents(values.iter().map(|(name, _)| name))
        .push(") VALUES (");
    for (i, (_, value)) in values.into_iter().enumerate() {
        if i > 0 {
            stmt.push(", ");
        }
        stmt.push_value(value);
    }
    stmt.push(")");

    let generated = if dialect == DatabaseType::PostgreSQL {
        stmt.push(" RETURNING ").push_ident(ID_COLUMN);
        session.fetch_scalar(&stmt).await?
    } else {
        let outcome = session.execute(&stmt).await?;
        outcome.last_insert_id.filter(|id| *id > 0)
    };

    let id = explicit_id.or(generated).ok_or_else(|| {
        DbError::internal(format!("No id generated for new {} row", E::TABLE))
    })?;
    debug!(table = E::TABLE, id = id, session_id = %session.id(), "Row created");

    get_by_id::<E>(session, id).await?.ok_or_else(|| {
        DbError::internal(format!("Created {} row {} could not be read back", E::TABLE, id))
    })
}

async fn get_by_id<E: Entity>(session: &mut Session, id: i64) -> DbResult<Option<E>> {
    let mut stmt = select::<E>(session.db_type());
    stmt.push(" WHERE ").push_condition(ID_COLUMN, id.into());
    let rows = session.fetch_all(&stmt).await?;
    rows.into_iter().next().map(decode::<E>).transpose()
}

async fn get_all<E: Entity>(session: &mut Session, skip: u64, limit: u64) -> DbResult<Vec<E>> {
    // Databases reject LIMIT/OFFSET values outside the signed 64-bit range.
    let max = i64::MAX as u64;
    let mut stmt = select::<E>(session.db_type());
    stmt.push(" ORDER BY ")
        .push_ident(ID_COLUMN)
        .push(&format!(" LIMIT {} OFFSET {}", limit.min(max), skip.min(max)));
    let rows = session.fetch_all(&stmt).await?;
    rows.into_iter().map(decode::<E>).collect()
}

async fn update<E: Entity>(session: &mut Session, id: i64, fields: Fields) -> DbResult<Option<E>> {
    let Some(existing) = get_by_id::<E>(session, id).await? else {
        return Ok(None);
    };

    let mut assignments: Vec<(String, FieldValue)> = fields
        .into_iter()
        .filter(|(name, _)| {
            let updatable = is_declared::<E>(name) || name == CREATED_AT_COLUMN;
            if !updatable {
                debug!(table = E::TABLE, field = %name, "Ignoring unknown field in update");
            }
            updatable
        })
        .collect();
    if E::TRACKS_UPDATED_AT {
        assignments.push((
            UPDATED_AT_COLUMN.to_string(),
            FieldValue::timestamp(Utc::now()),
        ));
    }
    if assignments.is_empty() {
        return Ok(Some(existing));
    }

    let mut stmt = Statement::new(session.db_type());
    stmt.push("UPDATE ").push_ident(E::TABLE).push(" SET ");
    for (i, (name, value)) in assignments.into_iter().enumerate() {
        if i > 0 {
            stmt.push(", ");
        }
        stmt.push_ident(&name).push(" = ").push_value(value);
    }
    stmt.push(" WHERE ").push_condition(ID_COLUMN, id.into());
    session.execute(&stmt).await?;
    debug!(table = E::TABLE, id = id, session_id = %session.id(), "Row updated");

    get_by_id::<E>(session, id).await
}

async fn delete<E: Entity>(session: &mut Session, id: i64) -> DbResult<bool> {
    let mut stmt = Statement::new(session.db_type());
    stmt.push("DELETE FROM ")
        .push_ident(E::TABLE)
        .push(" WHERE ")
        .push_condition(ID_COLUMN, id.into());
    let outcome = session.execute(&stmt).await?;
    let deleted = outcome.rows_affected > 0;
    debug!(table = E::TABLE, id = id, deleted = deleted, "Row delete");
    Ok(deleted)
}

async fn filter<E: Entity>(session: &mut Session, conditions: Fields) -> DbResult<Vec<E>> {
    let mut stmt = select::<E>(session.db_type());
    let mut applied = 0;
    for (name, value) in conditions {
        if !is_known_column::<E>(&name) {
            debug!(table = E::TABLE, field = %name, "Ignoring unknown filter field");
            continue;
        }
        stmt.push(if applied == 0 { " WHERE " } else { " AND " });
        stmt.push_condition(&name, value);
        applied += 1;
    }
    stmt.push(" ORDER BY ").push_ident(ID_COLUMN);
    let rows = session.fetch_all(&stmt).await?;
    rows.into_iter().map(decode::<E>).collect()
}

async fn count<E: Entity>(session: &mut Session) -> DbResult<u64> {
    let mut stmt = Statement::new(session.db_type());
    stmt.push("SELECT COUNT(*) FROM ").push_ident(E::TABLE);
    let count = session.fetch_scalar(&stmt).await?.unwrap_or(0);
    Ok(u64::try_from(count).unwrap_or(0))
}
