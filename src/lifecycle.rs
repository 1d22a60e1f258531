//! Lifecycle service for the storage layer.
//!
//! Owns the status state machine (`initializing -> ready | error | fallback`),
//! performs one-time database bring-up, and buffers operations issued before
//! readiness so callers never have to poll. Constructed explicitly and passed
//! around by the embedding application; tests instantiate independent
//! instances.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::sync::oneshot;
use tracing::{error, info};

use crate::db;
use crate::error::{AppError, AppResult};
use crate::schema;
use crate::storage::StorageAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Initializing,
    Ready,
    Error,
    /// Reserved for platforms without native storage. Nothing transitions
    /// into it in this configuration: a database error is fatal, there is no
    /// implicit degrade-to-memory path.
    Fallback,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Initializing => "initializing",
            Status::Ready => "ready",
            Status::Error => "error",
            Status::Fallback => "fallback",
        }
    }
}

enum Source {
    Path(PathBuf),
    Pool(SqlitePool),
}

type QueuedOp = Box<dyn FnOnce(AppResult<Arc<StorageAdapter>>) -> BoxFuture<'static, ()> + Send>;
type StatusCallback = Arc<dyn Fn(Status) + Send + Sync>;
type CallbackMap = Mutex<HashMap<u64, StatusCallback>>;

pub struct Lifecycle {
    source: Source,
    status: Mutex<Status>,
    init_error: Mutex<Option<AppError>>,
    adapter: Mutex<Option<Arc<StorageAdapter>>>,
    pool: Mutex<Option<SqlitePool>>,
    queue: Mutex<VecDeque<QueuedOp>>,
    callbacks: Arc<CallbackMap>,
    next_subscription: AtomicU64,
    init_lock: tokio::sync::Mutex<()>,
    drain_lock: tokio::sync::Mutex<()>,
}

impl Lifecycle {
    /// Lifecycle for the database file at `path` (created if absent).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_source(Source::Path(path.into()))
    }

    /// Lifecycle over an already-open pool. Used by tests and by embedders
    /// that manage the connection themselves.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self::with_source(Source::Pool(pool))
    }

    fn with_source(source: Source) -> Self {
        Self {
            source,
            status: Mutex::new(Status::Initializing),
            init_error: Mutex::new(None),
            adapter: Mutex::new(None),
            pool: Mutex::new(None),
            queue: Mutex::new(VecDeque::new()),
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            next_subscription: AtomicU64::new(0),
            init_lock: tokio::sync::Mutex::new(()),
            drain_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn status(&self) -> Status {
        *self.status.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.status(), Status::Ready | Status::Fallback)
    }

    /// Bring the storage layer up. Idempotent: concurrent callers await the
    /// same bring-up, later callers observe the recorded outcome.
    pub async fn initialize(&self) -> AppResult<()> {
        let _guard = self.init_lock.lock().await;
        match self.status() {
            Status::Ready | Status::Fallback => return Ok(()),
            Status::Error => return Err(self.recorded_error()),
            Status::Initializing => {}
        }

        info!(target = "stillwater", event = "db_init_begin");
        match self.bring_up().await {
            Ok(adapter) => {
                *self.adapter.lock().unwrap_or_else(|e| e.into_inner()) = Some(adapter);
                self.set_status(Status::Ready);
                info!(target = "stillwater", event = "db_init_ready");
                self.drain_queue().await;
                Ok(())
            }
            Err(cause) => {
                let err = AppError::new("DB/INIT_FAILED", "database bring-up failed")
                    .with_cause(cause);
                *self.init_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(err.clone());
                self.set_status(Status::Error);
                error!(target = "stillwater", event = "db_init_failed", error = %err);
                // Leaving queued operations pending forever would strand
                // their callers; reject them all instead.
                self.drain_queue().await;
                Err(err)
            }
        }
    }

    async fn bring_up(&self) -> AppResult<Arc<StorageAdapter>> {
        let pool = match &self.source {
            Source::Path(path) => db::open_pool(path).await.map_err(AppError::from)?,
            Source::Pool(pool) => pool.clone(),
        };
        schema::ensure_schema(&pool).await.map_err(AppError::from)?;
        schema::cleanup_invalid_rows(&pool).await;
        *self.pool.lock().unwrap_or_else(|e| e.into_inner()) = Some(pool.clone());
        Ok(Arc::new(StorageAdapter::sqlite(pool)))
    }

    /// Drop every user table and rebuild the schema. Destructive; callers
    /// confirm with the user before reaching this.
    pub async fn reset_database(&self) -> AppResult<()> {
        let pool = self
            .pool
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| self.unavailable_error())?;
        schema::reset_database(&pool).await.map_err(AppError::from)
    }

    /// Execute `op` against the adapter, queueing it when the storage layer
    /// is not ready yet. Queued operations replay strictly in arrival order
    /// once status reaches `ready`; if bring-up fails they are rejected.
    pub async fn run<T, F, Fut>(&self, op: F) -> AppResult<T>
    where
        F: FnOnce(Arc<StorageAdapter>) -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        match self.status() {
            Status::Ready | Status::Fallback => {
                let adapter = self.current_adapter()?;
                return op(adapter).await;
            }
            Status::Error => return Err(self.unavailable_error()),
            Status::Initializing => {}
        }

        let (tx, rx) = oneshot::channel::<AppResult<T>>();
        let entry: QueuedOp = Box::new(move |outcome| {
            Box::pin(async move {
                let result = match outcome {
                    Ok(adapter) => op(adapter).await,
                    Err(err) => Err(err),
                };
                let _ = tx.send(result);
            })
        });
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(entry);

        // Status may have flipped while the entry was being enqueued.
        if self.status() != Status::Initializing {
            self.drain_queue().await;
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(AppError::new(
                "DB/QUEUE_CLOSED",
                "queued operation was dropped before completion",
            )),
        }
    }

    async fn drain_queue(&self) {
        let _serial = self.drain_lock.lock().await;
        let pending = self.queue.lock().unwrap_or_else(|e| e.into_inner()).len();
        if pending > 0 {
            info!(
                target = "stillwater",
                event = "queue_drain",
                status = self.status().as_str(),
                pending
            );
        }
        loop {
            let entry = self
                .queue
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_front();
            let Some(entry) = entry else { break };
            let outcome = match self.status() {
                Status::Ready | Status::Fallback => self.current_adapter(),
                Status::Error => Err(self.unavailable_error()),
                Status::Initializing => {
                    self.queue
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .push_front(entry);
                    break;
                }
            };
            // Each operation runs to completion before the next starts.
            entry(outcome).await;
        }
    }

    /// Subscribe to status transitions. The callback fires once immediately
    /// with the current status, then on every transition until the returned
    /// subscription is dropped.
    pub fn on_status_change<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(Status) + Send + Sync + 'static,
    {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        let callback: StatusCallback = Arc::new(callback);
        self.callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, callback.clone());
        callback(self.status());
        StatusSubscription {
            id,
            callbacks: Arc::downgrade(&self.callbacks),
        }
    }

    /// Return a terminal instance to `initializing` so `initialize` can be
    /// attempted again (used after an explicit database reset).
    pub async fn reset(&self) {
        let _guard = self.init_lock.lock().await;
        *self.adapter.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.pool.lock().unwrap_or_else(|e| e.into_inner()) = None;
        *self.init_error.lock().unwrap_or_else(|e| e.into_inner()) = None;
        self.set_status(Status::Initializing);
        info!(target = "stillwater", event = "lifecycle_reset");
    }

    fn set_status(&self, status: Status) {
        *self.status.lock().unwrap_or_else(|e| e.into_inner()) = status;
        let snapshot: Vec<StatusCallback> = self
            .callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect();
        for callback in snapshot {
            callback(status);
        }
    }

    fn current_adapter(&self) -> AppResult<Arc<StorageAdapter>> {
        self.adapter
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| self.unavailable_error())
    }

    fn recorded_error(&self) -> AppError {
        self.init_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .unwrap_or_else(|| AppError::new("DB/INIT_FAILED", "database bring-up failed"))
    }

    fn unavailable_error(&self) -> AppError {
        let err = AppError::new("DB/UNAVAILABLE", "database is not available");
        match self
            .init_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            Some(cause) => err.with_cause(cause),
            None => err,
        }
    }
}

/// Handle for a status subscription; dropping it unsubscribes.
pub struct StatusSubscription {
    id: u64,
    callbacks: Weak<CallbackMap>,
}

impl StatusSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        if let Some(callbacks) = self.callbacks.upgrade() {
            callbacks
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_names_are_stable() {
        assert_eq!(Status::Initializing.as_str(), "initializing");
        assert_eq!(Status::Ready.as_str(), "ready");
        assert_eq!(Status::Error.as_str(), "error");
        assert_eq!(Status::Fallback.as_str(), "fallback");
    }

    #[tokio::test]
    async fn subscription_drop_unsubscribes() {
        let lifecycle = Lifecycle::new("unused.sqlite3");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = seen.clone();
        let sub = lifecycle.on_status_change(move |status| {
            seen_cb.lock().unwrap().push(status);
        });
        assert_eq!(seen.lock().unwrap().as_slice(), &[Status::Initializing]);

        sub.unsubscribe();
        lifecycle.set_status(Status::Ready);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
