//! Schema bring-up for the embedded store.
//!
//! Everything here is idempotent: base tables are created with
//! `CREATE TABLE IF NOT EXISTS` and later column additions are ad hoc
//! `ALTER TABLE ... ADD COLUMN` statements guarded by `pragma_table_info`.
//! There is no versioned migration ledger.

use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

static SCHEMA_SQL: &str = include_str!("schema.sql");

/// Columns the schema grew after first release. Applied one by one so a
/// database created by any earlier build converges on the same layout.
static COLUMN_ADDITIONS: &[(&str, &str, &str)] = &[
    ("sponsor_contacts", "topic", "TEXT"),
    ("sponsor_contacts", "duration", "INTEGER"),
    ("sponsor_contacts", "sponsorId", "INTEGER"),
    ("sponsee_contacts", "topic", "TEXT"),
    ("sponsee_contacts", "duration", "INTEGER"),
    ("action_items", "contactId", "INTEGER"),
    ("action_items", "sponsorName", "TEXT"),
    ("action_items", "sponsorId", "INTEGER"),
];

pub async fn ensure_schema(pool: &SqlitePool) -> anyhow::Result<()> {
    for stmt in SCHEMA_SQL.split(';') {
        let cleaned: String = stmt
            .lines()
            .filter(|line| {
                let t = line.trim_start();
                !(t.is_empty() || t.starts_with("--"))
            })
            .collect::<Vec<_>>()
            .join("\n");
        if cleaned.trim().is_empty() {
            continue;
        }
        sqlx::query(&cleaned).execute(pool).await?;
    }

    for (table, column, column_type) in COLUMN_ADDITIONS {
        add_column_if_missing(pool, table, column, column_type).await?;
    }

    info!(target = "stillwater", event = "schema_ready");
    Ok(())
}

async fn add_column_if_missing(
    pool: &SqlitePool,
    table: &str,
    column: &str,
    column_type: &str,
) -> anyhow::Result<()> {
    let present: Option<i64> = sqlx::query_scalar(&format!(
        "SELECT 1 FROM pragma_table_info('{table}') WHERE name = ?"
    ))
    .bind(column)
    .fetch_optional(pool)
    .await?;
    if present.is_some() {
        return Ok(());
    }

    sqlx::query(&format!("ALTER TABLE {table} ADD COLUMN {column} {column_type}"))
        .execute(pool)
        .await?;
    info!(
        target = "stillwater",
        event = "schema_column_added",
        table = %table,
        column = %column
    );
    Ok(())
}

/// Best-effort removal of rows that cannot be interpreted downstream.
///
/// Runs once during bring-up. A failure here must not block readiness, so
/// each statement logs and continues.
pub async fn cleanup_invalid_rows(pool: &SqlitePool) {
    const CLEANUPS: &[(&str, &str)] = &[
        (
            "activities",
            "DELETE FROM activities WHERE type IS NULL OR TRIM(type) = '' \
             OR date IS NULL OR TRIM(date) = ''",
        ),
        (
            "action_items",
            "DELETE FROM action_items WHERE title IS NULL OR TRIM(title) = ''",
        ),
        (
            "sponsor_contacts",
            "DELETE FROM sponsor_contacts WHERE type IS NULL OR TRIM(type) = '' \
             OR date IS NULL OR TRIM(date) = ''",
        ),
        (
            "sponsee_contacts",
            "DELETE FROM sponsee_contacts WHERE type IS NULL OR TRIM(type) = '' \
             OR date IS NULL OR TRIM(date) = ''",
        ),
    ];

    for (table, sql) in CLEANUPS {
        match sqlx::query(sql).execute(pool).await {
            Ok(res) if res.rows_affected() > 0 => {
                info!(
                    target = "stillwater",
                    event = "cleanup_removed_rows",
                    table = %table,
                    rows = res.rows_affected()
                );
            }
            Ok(_) => {}
            Err(e) => {
                warn!(
                    target = "stillwater",
                    event = "cleanup_failed",
                    table = %table,
                    error = %e
                );
            }
        }
    }
}

/// Drop every user table and rebuild the schema from scratch.
///
/// Discovers table names from `sqlite_master` so stray tables created by
/// older builds are removed as well.
pub async fn reset_database(pool: &SqlitePool) -> anyhow::Result<()> {
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
    )
    .fetch_all(pool)
    .await?;

    for row in rows {
        let name: String = row.try_get("name")?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {name}"))
            .execute(pool)
            .await?;
        info!(target = "stillwater", event = "reset_dropped_table", table = %name);
    }

    ensure_schema(pool).await?;
    info!(target = "stillwater", event = "reset_complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect sqlite::memory:")
    }

    #[tokio::test]
    async fn schema_is_idempotent() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();

        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='activities'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn ad_hoc_columns_are_applied_once() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();

        let n: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('action_items') WHERE name='contactId'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(n, 1);

        // Second pass must not try to add the column again.
        ensure_schema(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn cleanup_removes_structurally_invalid_rows() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();

        sqlx::query("INSERT INTO activities (type, date) VALUES ('meeting', '2025-01-01')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO activities (type, date) VALUES ('  ', '2025-01-02')")
            .execute(&pool)
            .await
            .unwrap();

        cleanup_invalid_rows(&pool).await;

        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn reset_drops_and_recreates() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();
        sqlx::query("INSERT INTO activities (type, date) VALUES ('meeting', '2025-01-01')")
            .execute(&pool)
            .await
            .unwrap();

        reset_database(&pool).await.unwrap();

        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activities")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }
}
