#![allow(clippy::unwrap_used, clippy::expect_used)]
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use stillwater::{ActivityFeed, Lifecycle, StorageAdapter};

pub async fn temp_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:")
}

/// Pool with the full schema applied, outside any lifecycle.
pub async fn schema_pool() -> SqlitePool {
    let pool = temp_pool().await;
    stillwater::schema::ensure_schema(&pool)
        .await
        .expect("apply schema");
    pool
}

pub async fn ready_adapter() -> StorageAdapter {
    StorageAdapter::sqlite(schema_pool().await)
}

pub async fn ready_lifecycle() -> Arc<Lifecycle> {
    let lifecycle = Arc::new(Lifecycle::with_pool(temp_pool().await));
    lifecycle.initialize().await.expect("initialize lifecycle");
    lifecycle
}

pub async fn ready_feed() -> ActivityFeed {
    let feed = ActivityFeed::new(Arc::new(Lifecycle::with_pool(temp_pool().await)));
    feed.initialize().await.expect("initialize feed");
    feed
}

/// Calendar-day string `days` days before now, in the stored format.
pub fn days_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days))
        .format("%Y-%m-%d")
        .to_string()
}
