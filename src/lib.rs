//! Local-first data layer for a personal recovery tracker.
//!
//! Durable state lives in a single embedded SQLite file. The crate is built
//! from four pieces, leaves first:
//!
//! - [`storage`] — adapter over the embedded engine: dynamic CRUD, result
//!   shape normalization, generated-key recovery.
//! - [`lifecycle`] — status state machine plus an operation queue, so
//!   callers can issue work before the store finishes bring-up.
//! - [`feed`] — joins five tables into one credit-classified activity feed
//!   under a 180-day base cache and an on-demand extended cache.
//! - [`score`] — pure derivation of the fitness metric from a feed slice.
//!
//! The presentation layer sits on top of [`ActivityFeed`] and
//! [`Lifecycle::on_status_change`]; there is no network, CLI, or file
//! surface here.
//!
//! ```no_run
//! # async fn demo() -> stillwater::AppResult<()> {
//! use std::sync::Arc;
//! use stillwater::{ActivityFeed, Lifecycle, NewActivity};
//!
//! let lifecycle = Arc::new(Lifecycle::new(stillwater::db::default_db_path()));
//! let feed = ActivityFeed::new(lifecycle.clone());
//! feed.initialize().await?;
//! feed.add_activity(NewActivity::new("meeting", "2025-06-15")).await?;
//! println!("fitness: {}", feed.score());
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod error;
pub mod feed;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod schema;
pub mod score;
pub mod storage;
pub mod time;

pub use error::{AppError, AppResult};
pub use feed::{ActivityFeed, BASE_WINDOW_DAYS, DEFAULT_TIMEFRAME_DAYS};
pub use lifecycle::{Lifecycle, Status, StatusSubscription};
pub use model::{
    classify_action_item, ActionItem, Activity, Meeting, NewActionItem, NewActivity, NewMeeting,
    NewSponsee, NewSponseeContact, NewSponsor, NewSponsorContact, Sponsee, SponseeContact, Sponsor,
    SponsorContact, User, TYPE_ACTION_ITEM, TYPE_SPONSEE_ACTION_ITEM, TYPE_SPONSOR_ACTION_ITEM,
};
pub use score::{
    fitness_breakdown, fitness_breakdown_at, fitness_score, fitness_score_at, sobriety_days,
    sobriety_days_at, sobriety_years, sobriety_years_at, ScoreBreakdown,
};
pub use storage::{shape::JsonMap, Engine, SqliteEngine, StorageAdapter};
