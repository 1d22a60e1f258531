//! Storage adapter over the embedded SQL engine.
//!
//! The adapter owns the dynamic-SQL surface (`get_all` / `get_by_id` / `add` /
//! `update` / `remove`), normalizes the engine's result encodings into flat
//! row objects, and recovers engine-assigned primary keys after inserts. It
//! never fabricates an id.

pub mod shape;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{AppError, AppResult};
use shape::{JsonMap, RawQueryResult};

/// Tables the dynamic surface may address.
pub const TABLES: &[&str] = &[
    "users",
    "activities",
    "meetings",
    "sponsors",
    "sponsees",
    "sponsor_contacts",
    "sponsee_contacts",
    "action_items",
];

/// Columns persisted as JSON text and decoded back into structured values on
/// the way out.
const JSON_COLUMNS: &[&str] = &[
    "days",
    "schedule",
    "coordinates",
    "types",
    "homeGroups",
    "privacySettings",
    "preferences",
];

fn ensure_table(table: &str) -> AppResult<()> {
    if TABLES.contains(&table) {
        Ok(())
    } else {
        Err(AppError::new("DB/INVALID_TABLE", "invalid table").with_context("table", table))
    }
}

fn ensure_column(column: &str) -> AppResult<()> {
    let mut chars = column.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(AppError::new("DB/INVALID_COLUMN", "invalid column name").with_context("column", column))
    }
}

/// Render a field value as a SQL literal.
///
/// The engine bridge accepts only statement strings, so values are inlined:
/// strings quote-escaped, objects and arrays JSON-encoded then escaped,
/// booleans as 0/1, null as the literal NULL.
fn sql_literal(value: &Value) -> String {
    fn quote(s: &str) -> String {
        format!("'{}'", s.replace('\'', "''"))
    }
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(_) | Value::Object(_) => quote(&value.to_string()),
    }
}

/// Seam for the embedded-SQL bridge.
///
/// The production engine speaks to SQLite through sqlx. Result payloads come
/// back as raw JSON values because the encoding differs per platform; the
/// adapter normalizes them before anything else sees them.
pub trait Engine: Send + Sync {
    fn query<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, AppResult<Vec<Value>>>;
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, AppResult<u64>>;
}

pub struct SqliteEngine {
    pool: SqlitePool,
}

impl SqliteEngine {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_value(row: SqliteRow) -> Value {
    let mut map = JsonMap::new();
    for col in row.columns() {
        let idx = col.ordinal();
        let v = row.try_get_raw(idx).ok();
        let val = match v {
            Some(raw) => {
                if raw.is_null() {
                    Value::Null
                } else {
                    match raw.type_info().name() {
                        "INTEGER" => row
                            .try_get::<i64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        "REAL" => row
                            .try_get::<f64, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                        _ => row
                            .try_get::<String, _>(idx)
                            .map(Value::from)
                            .unwrap_or(Value::Null),
                    }
                }
            }
            None => Value::Null,
        };
        map.insert(col.name().to_string(), val);
    }
    Value::Object(map)
}

impl Engine for SqliteEngine {
    fn query<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, AppResult<Vec<Value>>> {
        Box::pin(async move {
            let rows = sqlx::query(sql)
                .fetch_all(&self.pool)
                .await
                .map_err(AppError::from)?;
            Ok(rows.into_iter().map(row_to_value).collect())
        })
    }

    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, AppResult<u64>> {
        Box::pin(async move {
            let res = sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(AppError::from)?;
            Ok(res.rows_affected())
        })
    }
}

pub struct StorageAdapter {
    engine: Arc<dyn Engine>,
    /// One mutex per table, held across insert-then-requery so two writers
    /// cannot misattribute a generated id.
    writers: HashMap<&'static str, Mutex<()>>,
}

impl StorageAdapter {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            writers: TABLES.iter().map(|t| (*t, Mutex::new(()))).collect(),
        }
    }

    pub fn sqlite(pool: SqlitePool) -> Self {
        Self::new(Arc::new(SqliteEngine::new(pool)))
    }

    async fn lock_writer(&self, table: &str) -> tokio::sync::MutexGuard<'_, ()> {
        self.writers
            .get(table)
            .expect("table checked before lock")
            .lock()
            .await
    }

    /// All rows of a table, in one flat row-object encoding regardless of
    /// what the engine produced. Malformed payloads degrade to an empty
    /// result so read-only consumers stay usable.
    pub async fn get_all(&self, table: &str) -> AppResult<Vec<JsonMap>> {
        ensure_table(table)?;
        let values = self.engine.query(&format!("SELECT * FROM {table}")).await?;
        let rows = match RawQueryResult::from_values(values) {
            Ok(raw) => raw.normalize(),
            Err(err) => {
                warn!(
                    target = "stillwater",
                    event = "result_shape_malformed",
                    table = %table,
                    error = %err
                );
                return Ok(Vec::new());
            }
        };
        Ok(rows.into_iter().map(decode_json_columns).collect())
    }

    pub async fn get_by_id(&self, table: &str, id: i64) -> AppResult<Option<JsonMap>> {
        ensure_table(table)?;
        let values = self
            .engine
            .query(&format!("SELECT * FROM {table} WHERE id = {id}"))
            .await?;
        let rows = match RawQueryResult::from_values(values) {
            Ok(raw) => raw.normalize(),
            Err(err) => {
                warn!(
                    target = "stillwater",
                    event = "result_shape_malformed",
                    table = %table,
                    error = %err
                );
                return Ok(None);
            }
        };
        Ok(rows.into_iter().next().map(decode_json_columns))
    }

    /// Insert a row and return it with the engine-assigned id.
    ///
    /// The execute acknowledgment does not carry the generated key on every
    /// platform, so the id is recovered with a follow-up
    /// `SELECT id ... ORDER BY id DESC LIMIT 1` under the table's write lock.
    pub async fn add(&self, table: &str, fields: &JsonMap) -> AppResult<JsonMap> {
        ensure_table(table)?;
        if fields.is_empty() {
            return Err(
                AppError::new("DB/INVALID_COLUMN", "insert requires at least one column")
                    .with_context("table", table),
            );
        }
        for column in fields.keys() {
            ensure_column(column)?;
        }

        let _guard = self.lock_writer(table).await;

        let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
        let values: Vec<String> = fields.values().map(sql_literal).collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            values.join(", ")
        );
        let changes = self.engine.execute(&sql).await.map_err(|err| {
            AppError::new("DB/WRITE_FAILED", "insert was not applied")
                .with_context("table", table)
                .with_cause(err)
        })?;
        if changes == 0 {
            return Err(AppError::new("DB/WRITE_FAILED", "insert reported no changes")
                .with_context("table", table));
        }

        let id = self.last_assigned_id(table).await?;
        match self.get_by_id(table, id).await? {
            Some(row) => Ok(row),
            None => Err(
                AppError::new("DB/WRITE_FAILED", "inserted row could not be re-read")
                    .with_context("table", table)
                    .with_context("id", id.to_string()),
            ),
        }
    }

    async fn last_assigned_id(&self, table: &str) -> AppResult<i64> {
        let values = self
            .engine
            .query(&format!("SELECT id FROM {table} ORDER BY id DESC LIMIT 1"))
            .await?;
        RawQueryResult::from_values(values)
            .map_err(AppError::from)?
            .normalize()
            .into_iter()
            .next()
            .and_then(|row| row.get("id").and_then(Value::as_i64))
            .ok_or_else(|| {
                AppError::new("DB/WRITE_FAILED", "engine did not yield a generated id")
                    .with_context("table", table)
            })
    }

    /// Apply a partial update. `Ok(None)` means the id was not found; the
    /// caller decides whether that is an error.
    pub async fn update(
        &self,
        table: &str,
        id: i64,
        fields: &JsonMap,
    ) -> AppResult<Option<JsonMap>> {
        ensure_table(table)?;
        if fields.is_empty() {
            return Err(
                AppError::new("DB/INVALID_COLUMN", "update requires at least one column")
                    .with_context("table", table),
            );
        }
        for column in fields.keys() {
            ensure_column(column)?;
        }

        let _guard = self.lock_writer(table).await;

        let assignments: Vec<String> = fields
            .iter()
            .map(|(column, value)| format!("{column} = {}", sql_literal(value)))
            .collect();
        let sql = format!(
            "UPDATE {table} SET {} WHERE id = {id}",
            assignments.join(", ")
        );
        let changes = self.engine.execute(&sql).await?;
        if changes == 0 {
            return Ok(None);
        }
        self.get_by_id(table, id).await
    }

    pub async fn remove(&self, table: &str, id: i64) -> AppResult<bool> {
        ensure_table(table)?;
        let _guard = self.lock_writer(table).await;
        let changes = self
            .engine
            .execute(&format!("DELETE FROM {table} WHERE id = {id}"))
            .await?;
        Ok(changes > 0)
    }
}

fn decode_json_columns(mut row: JsonMap) -> JsonMap {
    for column in JSON_COLUMNS {
        let Some(Value::String(raw)) = row.get(*column) else {
            continue;
        };
        let trimmed = raw.trim_start();
        if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
            continue;
        }
        // Keep the string as-is when it does not parse.
        if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
            row.insert((*column).to_string(), parsed);
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literals_escape_quotes_and_encode_objects() {
        assert_eq!(sql_literal(&json!("o'clock")), "'o''clock'");
        assert_eq!(sql_literal(&Value::Null), "NULL");
        assert_eq!(sql_literal(&json!(true)), "1");
        assert_eq!(sql_literal(&json!(42)), "42");
        assert_eq!(sql_literal(&json!({"a": 1})), "'{\"a\":1}'");
    }

    #[test]
    fn table_guard_rejects_unknown_tables() {
        assert!(ensure_table("activities").is_ok());
        let err = ensure_table("activities; DROP TABLE users").unwrap_err();
        assert_eq!(err.code(), "DB/INVALID_TABLE");
    }

    #[test]
    fn column_guard_rejects_non_identifiers() {
        assert!(ensure_column("sponsorContactId").is_ok());
        assert!(ensure_column("sponsor_contact_id").is_ok());
        assert!(ensure_column("1leading").is_err());
        assert!(ensure_column("name = 'x', evil").is_err());
        assert!(ensure_column("").is_err());
    }

    #[test]
    fn json_columns_decode_on_the_way_out() {
        let mut row = JsonMap::new();
        row.insert("homeGroups".into(), json!("[\"Tuesday Night\"]"));
        row.insert("notes".into(), json!("[not json"));
        let decoded = decode_json_columns(row);
        assert_eq!(decoded.get("homeGroups"), Some(&json!(["Tuesday Night"])));
        // Non-JSON columns are untouched even when they look bracket-ish.
        assert_eq!(decoded.get("notes"), Some(&json!("[not json")));
    }
}
