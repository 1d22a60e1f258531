//! Enrichment and cache layer.
//!
//! Joins raw rows from five tables into one de-duplicated, classification-
//! correct activity feed and serves it under two cache horizons: a 180-day
//! base window kept fully materialized, and an on-demand extended cache for
//! longer timeframes. Mutations write through the lifecycle's operation
//! queue and re-derive whatever the write invalidates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::lifecycle::Lifecycle;
use crate::model::{
    classify_action_item, fields_of, ActionItem, Activity, Meeting, NewActionItem, NewActivity,
    NewMeeting, NewSponsee, NewSponseeContact, NewSponsor, NewSponsorContact, Sponsee,
    SponseeContact, Sponsor, SponsorContact, User, TYPE_SPONSOR_ACTION_ITEM,
};
use crate::score::{fitness_breakdown_at, ScoreBreakdown};
use crate::storage::shape::JsonMap;
use crate::storage::StorageAdapter;
use crate::time::{now_ms, parse_date_ms};

/// Width of the eagerly maintained base cache.
pub const BASE_WINDOW_DAYS: u32 = 180;
pub const DEFAULT_TIMEFRAME_DAYS: u32 = 30;

const MS_PER_DAY: i64 = 86_400_000;

struct ExtendedEntry {
    generation: u64,
    activities: Vec<Activity>,
}

struct FeedState {
    /// Enriched, credit-filtered feed restricted to the base window.
    base: Vec<Activity>,
    /// Memoized windows wider than the base cache, keyed by exact length.
    extended: HashMap<u32, ExtendedEntry>,
    /// Bumped on every mutation; extended entries from an older generation
    /// are recomputed instead of served.
    generation: u64,
    timeframe_days: u32,
    breakdown: ScoreBreakdown,
}

/// Everything the enrichment pass reads, fetched in one sweep.
struct Snapshot {
    activities: Vec<Activity>,
    action_items: Vec<ActionItem>,
    sponsor_contacts: Vec<SponsorContact>,
    sponsors: Vec<Sponsor>,
    sponsee_contacts: Vec<SponseeContact>,
}

pub struct ActivityFeed {
    lifecycle: Arc<Lifecycle>,
    state: Mutex<FeedState>,
}

impl ActivityFeed {
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            lifecycle,
            state: Mutex::new(FeedState {
                base: Vec::new(),
                extended: HashMap::new(),
                generation: 0,
                timeframe_days: DEFAULT_TIMEFRAME_DAYS,
                breakdown: fitness_breakdown_at(&[], DEFAULT_TIMEFRAME_DAYS, Utc::now()),
            }),
        }
    }

    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Bring the storage layer up and materialize the base cache.
    pub async fn initialize(&self) -> AppResult<()> {
        self.lifecycle.initialize().await?;
        self.load_activities().await
    }

    // -----------------------------------------------------------------
    // Feed derivation
    // -----------------------------------------------------------------

    /// Rebuild the feed from the raw tables and refresh the base cache and
    /// the fitness score for the current timeframe.
    pub async fn load_activities(&self) -> AppResult<()> {
        let feed = self.build_feed().await?;
        let now = Utc::now();
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.base = window_filter(&feed, BASE_WINDOW_DAYS, now.timestamp_millis());
        let breakdown = if state.timeframe_days <= BASE_WINDOW_DAYS {
            fitness_breakdown_at(&state.base, state.timeframe_days, now)
        } else {
            fitness_breakdown_at(&feed, state.timeframe_days, now)
        };
        state.breakdown = breakdown;
        info!(
            target = "stillwater",
            event = "activities_loaded",
            base = state.base.len(),
            score = state.breakdown.total_score
        );
        Ok(())
    }

    async fn build_feed(&self) -> AppResult<Vec<Activity>> {
        let snapshot = self
            .lifecycle
            .run(|adapter| async move { fetch_snapshot(adapter).await })
            .await?;
        debug!(
            target = "stillwater",
            event = "feed_snapshot",
            activities = snapshot.activities.len(),
            action_items = snapshot.action_items.len(),
            sponsor_contacts = snapshot.sponsor_contacts.len(),
            sponsors = snapshot.sponsors.len(),
            sponsee_contacts = snapshot.sponsee_contacts.len()
        );
        let enriched = enrich(
            snapshot.activities,
            &snapshot.action_items,
            &snapshot.sponsors,
        );
        Ok(credit_filter(enriched))
    }

    /// The enriched feed for a window of `days`.
    ///
    /// Windows inside the base cache are served from memory with no I/O.
    /// Wider windows are memoized per exact length; entries whose mutation
    /// generation is stale get recomputed.
    pub async fn activities_for_timeframe(&self, days: u32) -> AppResult<Vec<Activity>> {
        let now = now_ms();
        if days <= BASE_WINDOW_DAYS {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            return Ok(window_filter(&state.base, days, now));
        }

        {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = state.extended.get(&days) {
                if entry.generation == state.generation {
                    return Ok(entry.activities.clone());
                }
            }
        }

        let feed = self.build_feed().await?;
        let windowed = window_filter(&feed, days, now);
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let generation = state.generation;
        state.extended.insert(
            days,
            ExtendedEntry {
                generation,
                activities: windowed.clone(),
            },
        );
        debug!(target = "stillwater", event = "extended_cache_store", days);
        Ok(windowed)
    }

    /// Current base-cache contents (the UI feed).
    pub fn activities(&self) -> Vec<Activity> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .base
            .clone()
    }

    pub fn score(&self) -> f64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .breakdown
            .total_score
    }

    pub fn score_breakdown(&self) -> ScoreBreakdown {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .breakdown
            .clone()
    }

    pub fn timeframe(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .timeframe_days
    }

    /// Switch the scoring timeframe and recompute.
    pub async fn set_timeframe(&self, days: u32) -> AppResult<f64> {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.timeframe_days = days;
        }
        let activities = self.activities_for_timeframe(days).await?;
        let breakdown = fitness_breakdown_at(&activities, days, Utc::now());
        let total = breakdown.total_score;
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .breakdown = breakdown;
        Ok(total)
    }

    fn bump_generation(&self) {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .generation += 1;
    }

    // -----------------------------------------------------------------
    // Activities
    // -----------------------------------------------------------------

    pub async fn add_activity(&self, input: NewActivity) -> AppResult<Activity> {
        let fields = fields_of(&input);
        let row = self
            .lifecycle
            .run(move |adapter| async move { adapter.add("activities", &fields).await })
            .await?;
        let activity: Activity = row_to(row)?;
        self.bump_generation();

        // Action-item-flavoured entries need the cross-table joins; anything
        // else can be patched into the base cache directly.
        let needs_rederivation = activity.action_item_id.is_some()
            || activity.kind == TYPE_SPONSOR_ACTION_ITEM
            || !activity.is_credit_bearing()
            || self.timeframe() > BASE_WINDOW_DAYS;
        if needs_rederivation {
            self.load_activities().await?;
        } else {
            let now = Utc::now();
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let in_window = parse_date_ms(&activity.date)
                .is_some_and(|ms| ms >= now.timestamp_millis() - BASE_WINDOW_DAYS as i64 * MS_PER_DAY);
            if in_window {
                state.base.push(activity.clone());
            }
            let breakdown = fitness_breakdown_at(&state.base, state.timeframe_days, now);
            state.breakdown = breakdown;
        }
        Ok(activity)
    }

    pub async fn update_activity(
        &self,
        id: i64,
        updates: JsonMap,
    ) -> AppResult<Option<Activity>> {
        let updated = self
            .lifecycle
            .run(move |adapter| async move { adapter.update("activities", id, &updates).await })
            .await?;
        let Some(row) = updated else {
            return Ok(None);
        };
        self.bump_generation();
        self.load_activities().await?;
        Ok(Some(row_to(row)?))
    }

    pub async fn delete_activity(&self, id: i64) -> AppResult<bool> {
        let removed = self
            .lifecycle
            .run(move |adapter| async move { adapter.remove("activities", id).await })
            .await?;
        if removed {
            self.bump_generation();
            let now = Utc::now();
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.base.retain(|a| a.id != id);
            let breakdown = fitness_breakdown_at(&state.base, state.timeframe_days, now);
            state.breakdown = breakdown;
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------
    // Action items. Classification and sponsor-name enrichment depend on
    // cross-table joins, so every mutation re-derives the whole feed.
    // -----------------------------------------------------------------

    pub async fn add_action_item(&self, input: NewActionItem) -> AppResult<ActionItem> {
        let fields = fields_of(&input);
        let row = self
            .lifecycle
            .run(move |adapter| async move { adapter.add("action_items", &fields).await })
            .await?;
        let item: ActionItem = row_to(row)?;
        debug!(
            target = "stillwater",
            event = "action_item_added",
            id = item.id,
            classification = classify_action_item(&item)
        );
        self.bump_generation();
        self.load_activities().await?;
        Ok(item)
    }

    pub async fn update_action_item(
        &self,
        id: i64,
        updates: JsonMap,
    ) -> AppResult<Option<ActionItem>> {
        let updated = self
            .lifecycle
            .run(move |adapter| async move { adapter.update("action_items", id, &updates).await })
            .await?;
        let Some(row) = updated else {
            return Ok(None);
        };
        self.bump_generation();
        self.load_activities().await?;
        Ok(Some(row_to(row)?))
    }

    /// Soft delete: the row stays for audit, downstream views drop it.
    pub async fn delete_action_item(&self, id: i64) -> AppResult<bool> {
        let mut updates = JsonMap::new();
        updates.insert("deleted".into(), json!(1));
        let updated = self
            .lifecycle
            .run(move |adapter| async move { adapter.update("action_items", id, &updates).await })
            .await?;
        let deleted = updated.is_some();
        if deleted {
            self.bump_generation();
            self.load_activities().await?;
        }
        Ok(deleted)
    }

    // -----------------------------------------------------------------
    // Sponsors, sponsees, contacts. Sponsor names flow into enrichment,
    // so these also re-derive.
    // -----------------------------------------------------------------

    pub async fn add_sponsor(&self, input: NewSponsor) -> AppResult<Sponsor> {
        let row = self.add("sponsors", fields_of(&input)).await?;
        self.bump_generation();
        self.load_activities().await?;
        row_to(row)
    }

    pub async fn update_sponsor(&self, id: i64, updates: JsonMap) -> AppResult<Option<Sponsor>> {
        let Some(row) = self.update("sponsors", id, updates).await? else {
            return Ok(None);
        };
        self.bump_generation();
        self.load_activities().await?;
        Ok(Some(row_to(row)?))
    }

    pub async fn delete_sponsor(&self, id: i64) -> AppResult<bool> {
        let removed = self.remove("sponsors", id).await?;
        if removed {
            self.bump_generation();
            self.load_activities().await?;
        }
        Ok(removed)
    }

    pub async fn add_sponsee(&self, input: NewSponsee) -> AppResult<Sponsee> {
        let row = self.add("sponsees", fields_of(&input)).await?;
        self.bump_generation();
        self.load_activities().await?;
        row_to(row)
    }

    pub async fn update_sponsee(&self, id: i64, updates: JsonMap) -> AppResult<Option<Sponsee>> {
        let Some(row) = self.update("sponsees", id, updates).await? else {
            return Ok(None);
        };
        self.bump_generation();
        self.load_activities().await?;
        Ok(Some(row_to(row)?))
    }

    pub async fn delete_sponsee(&self, id: i64) -> AppResult<bool> {
        let removed = self.remove("sponsees", id).await?;
        if removed {
            self.bump_generation();
            self.load_activities().await?;
        }
        Ok(removed)
    }

    pub async fn add_sponsor_contact(&self, input: NewSponsorContact) -> AppResult<SponsorContact> {
        let row = self.add("sponsor_contacts", fields_of(&input)).await?;
        self.bump_generation();
        self.load_activities().await?;
        row_to(row)
    }

    pub async fn update_sponsor_contact(
        &self,
        id: i64,
        updates: JsonMap,
    ) -> AppResult<Option<SponsorContact>> {
        let Some(row) = self.update("sponsor_contacts", id, updates).await? else {
            return Ok(None);
        };
        self.bump_generation();
        self.load_activities().await?;
        Ok(Some(row_to(row)?))
    }

    pub async fn delete_sponsor_contact(&self, id: i64) -> AppResult<bool> {
        let removed = self.remove("sponsor_contacts", id).await?;
        if removed {
            self.bump_generation();
            self.load_activities().await?;
        }
        Ok(removed)
    }

    pub async fn add_sponsee_contact(&self, input: NewSponseeContact) -> AppResult<SponseeContact> {
        let row = self.add("sponsee_contacts", fields_of(&input)).await?;
        self.bump_generation();
        self.load_activities().await?;
        row_to(row)
    }

    pub async fn update_sponsee_contact(
        &self,
        id: i64,
        updates: JsonMap,
    ) -> AppResult<Option<SponseeContact>> {
        let Some(row) = self.update("sponsee_contacts", id, updates).await? else {
            return Ok(None);
        };
        self.bump_generation();
        self.load_activities().await?;
        Ok(Some(row_to(row)?))
    }

    pub async fn delete_sponsee_contact(&self, id: i64) -> AppResult<bool> {
        let removed = self.remove("sponsee_contacts", id).await?;
        if removed {
            self.bump_generation();
            self.load_activities().await?;
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------
    // Meetings. Address-book data; no feed impact.
    // -----------------------------------------------------------------

    pub async fn meetings(&self) -> AppResult<Vec<Meeting>> {
        let rows = self
            .lifecycle
            .run(|adapter| async move { adapter.get_all("meetings").await })
            .await?;
        Ok(rows_to("meetings", rows))
    }

    pub async fn add_meeting(&self, input: NewMeeting) -> AppResult<Meeting> {
        let row = self.add("meetings", fields_of(&input)).await?;
        row_to(row)
    }

    pub async fn update_meeting(&self, id: i64, updates: JsonMap) -> AppResult<Option<Meeting>> {
        match self.update("meetings", id, updates).await? {
            Some(row) => Ok(Some(row_to(row)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_meeting(&self, id: i64) -> AppResult<bool> {
        self.remove("meetings", id).await
    }

    pub async fn sponsors(&self) -> AppResult<Vec<Sponsor>> {
        let rows = self
            .lifecycle
            .run(|adapter| async move { adapter.get_all("sponsors").await })
            .await?;
        Ok(rows_to("sponsors", rows))
    }

    /// Sponsor contacts, newest first.
    pub async fn sponsor_contacts(&self) -> AppResult<Vec<SponsorContact>> {
        let rows = self
            .lifecycle
            .run(|adapter| async move { adapter.get_all("sponsor_contacts").await })
            .await?;
        let mut contacts: Vec<SponsorContact> = rows_to("sponsor_contacts", rows);
        contacts.sort_by_key(|c| {
            std::cmp::Reverse(
                parse_date_ms(&c.date)
                    .or_else(|| c.created_at.as_deref().and_then(parse_date_ms))
                    .unwrap_or(0),
            )
        });
        Ok(contacts)
    }

    /// Action items, newest first. Soft-deleted rows are retained for audit
    /// but never surfaced.
    pub async fn action_items(&self) -> AppResult<Vec<ActionItem>> {
        let rows = self
            .lifecycle
            .run(|adapter| async move { adapter.get_all("action_items").await })
            .await?;
        let mut items: Vec<ActionItem> = rows_to("action_items", rows);
        items.retain(|i| i.deleted == 0);
        items.sort_by_key(|i| {
            std::cmp::Reverse(i.created_at.as_deref().and_then(parse_date_ms).unwrap_or(0))
        });
        Ok(items)
    }

    // -----------------------------------------------------------------
    // User profile
    // -----------------------------------------------------------------

    /// Load the install's profile, creating the default row on first run.
    /// When multiple rows exist (older builds could leave duplicates), the
    /// first one with user-entered data wins.
    pub async fn load_user(&self) -> AppResult<User> {
        let rows = self
            .lifecycle
            .run(|adapter| async move { adapter.get_all("users").await })
            .await?;
        let users: Vec<User> = rows_to("users", rows);
        if let Some(user) = users.iter().find(|u| u.has_meaningful_data()) {
            return Ok(user.clone());
        }
        if let Some(user) = users.into_iter().next() {
            return Ok(user);
        }

        let mut fields = JsonMap::new();
        fields.insert("name".into(), json!(""));
        fields.insert("lastName".into(), json!(""));
        fields.insert("phoneNumber".into(), json!(""));
        fields.insert("email".into(), json!(""));
        fields.insert("sobrietyDate".into(), json!(""));
        fields.insert("homeGroups".into(), json!([]));
        let row = self.add("users", fields).await?;
        info!(target = "stillwater", event = "default_user_created");
        row_to(row)
    }

    /// Merge `updates` onto the stored profile, preserving everything not
    /// named, and stamp `updatedAt`.
    pub async fn update_user(&self, id: i64, updates: JsonMap) -> AppResult<User> {
        let current = self
            .lifecycle
            .run(move |adapter| async move { adapter.get_by_id("users", id).await })
            .await?
            .ok_or_else(|| {
                AppError::new("DB/ROW_NOT_FOUND", "user not found").with_context("id", id.to_string())
            })?;

        let mut merged = current;
        for (key, value) in updates {
            merged.insert(key, value);
        }
        merged.remove("id");
        merged.remove("createdAt");
        merged.insert("updatedAt".into(), json!(Utc::now().to_rfc3339()));

        let updated = self
            .lifecycle
            .run(move |adapter| async move { adapter.update("users", id, &merged).await })
            .await?
            .ok_or_else(|| {
                AppError::new("DB/ROW_NOT_FOUND", "user vanished during update")
                    .with_context("id", id.to_string())
            })?;
        row_to(updated)
    }

    /// New-install detection: true when no table holds user-entered data.
    pub async fn is_database_empty(&self) -> AppResult<bool> {
        let snapshot = self
            .lifecycle
            .run(|adapter| async move { fetch_snapshot(adapter).await })
            .await?;
        let users = self
            .lifecycle
            .run(|adapter| async move { adapter.get_all("users").await })
            .await?;
        let meetings = self
            .lifecycle
            .run(|adapter| async move { adapter.get_all("meetings").await })
            .await?;

        let users: Vec<User> = rows_to("users", users);
        let has_user_data = users.iter().any(|u| u.has_meaningful_data());
        let records = usize::from(has_user_data)
            + snapshot.activities.len()
            + meetings.len()
            + snapshot.sponsor_contacts.len()
            + snapshot.action_items.len();
        Ok(records == 0)
    }

    /// Drop all data and reset caches. The lifecycle keeps its `ready`
    /// status: tables are recreated in place.
    pub async fn reset_all_data(&self) -> AppResult<()> {
        self.lifecycle.reset_database().await?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.base.clear();
        state.extended.clear();
        state.generation += 1;
        state.timeframe_days = DEFAULT_TIMEFRAME_DAYS;
        state.breakdown = fitness_breakdown_at(&[], DEFAULT_TIMEFRAME_DAYS, Utc::now());
        info!(target = "stillwater", event = "all_data_reset");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Generic surface. Same primitives the typed wrappers build on, all
    // routed through the operation queue. Generic writes do not touch the
    // caches; callers mutating feed-relevant tables this way should follow
    // up with `load_activities`.
    // -----------------------------------------------------------------

    pub async fn get_all(&self, table: &str) -> AppResult<Vec<JsonMap>> {
        let table = table.to_string();
        self.lifecycle
            .run(move |adapter| async move { adapter.get_all(&table).await })
            .await
    }

    pub async fn get_by_id(&self, table: &str, id: i64) -> AppResult<Option<JsonMap>> {
        let table = table.to_string();
        self.lifecycle
            .run(move |adapter| async move { adapter.get_by_id(&table, id).await })
            .await
    }

    pub async fn add(&self, table: &str, fields: JsonMap) -> AppResult<JsonMap> {
        let table = table.to_string();
        self.lifecycle
            .run(move |adapter| async move { adapter.add(&table, &fields).await })
            .await
    }

    pub async fn update(&self, table: &str, id: i64, updates: JsonMap) -> AppResult<Option<JsonMap>> {
        let table = table.to_string();
        self.lifecycle
            .run(move |adapter| async move { adapter.update(&table, id, &updates).await })
            .await
    }

    pub async fn remove(&self, table: &str, id: i64) -> AppResult<bool> {
        let table = table.to_string();
        self.lifecycle
            .run(move |adapter| async move { adapter.remove(&table, id).await })
            .await
    }
}

async fn fetch_snapshot(adapter: Arc<StorageAdapter>) -> AppResult<Snapshot> {
    let activities = adapter.get_all("activities").await?;
    let action_items = adapter.get_all("action_items").await?;
    let sponsor_contacts = adapter.get_all("sponsor_contacts").await?;
    let sponsors = adapter.get_all("sponsors").await?;
    let sponsee_contacts = adapter.get_all("sponsee_contacts").await?;
    Ok(Snapshot {
        activities: rows_to("activities", activities),
        action_items: rows_to("action_items", action_items),
        sponsor_contacts: rows_to("sponsor_contacts", sponsor_contacts),
        sponsors: rows_to("sponsors", sponsors),
        sponsee_contacts: rows_to("sponsee_contacts", sponsee_contacts),
    })
}

/// Join action items and sponsor names onto the raw activity rows.
fn enrich(
    mut activities: Vec<Activity>,
    action_items: &[ActionItem],
    sponsors: &[Sponsor],
) -> Vec<Activity> {
    let first_sponsor_name = sponsors
        .first()
        .map(Sponsor::display_name)
        .filter(|name| !name.is_empty());

    // Directly referenced action items: merge the item onto the activity and
    // re-tag by ownership.
    for activity in &mut activities {
        let Some(item_id) = activity.action_item_id else {
            continue;
        };
        let Some(item) = action_items.iter().find(|i| i.id == item_id) else {
            continue;
        };
        activity.title = Some(item.title.clone());
        activity.text = item.text.clone();
        activity.kind = classify_action_item(item).to_string();
        if item.sponsor_contact_id.is_some() {
            activity.sponsor_name = first_sponsor_name.clone();
        }
        activity.action_item_data = Some(item.clone());
    }

    // Contact-logged sponsor action items carry no direct reference; they
    // are associated by table ownership.
    for activity in &mut activities {
        if activity.kind != TYPE_SPONSOR_ACTION_ITEM {
            continue;
        }
        if activity.sponsor_name.is_none() {
            activity.sponsor_name = first_sponsor_name.clone();
        }
        if activity.action_item_data.is_none() {
            let matched = activity
                .sponsor_contact_id
                .and_then(|contact_id| {
                    action_items
                        .iter()
                        .find(|i| i.deleted == 0 && i.sponsor_contact_id == Some(contact_id))
                })
                .or_else(|| {
                    action_items
                        .iter()
                        .find(|i| i.deleted == 0 && i.sponsor_contact_id.is_some())
                });
            if let Some(item) = matched {
                if activity.title.is_none() {
                    activity.title = Some(item.title.clone());
                }
                if activity.text.is_none() {
                    activity.text = item.text.clone();
                }
                activity.action_item_data = Some(item.clone());
            }
        }
    }

    activities
}

/// Keep only credit-bearing entries whose backing action item (if any) is
/// not soft-deleted.
fn credit_filter(feed: Vec<Activity>) -> Vec<Activity> {
    feed.into_iter()
        .filter(|a| a.is_credit_bearing())
        .filter(|a| a.action_item_data.as_ref().map_or(true, |i| i.deleted == 0))
        .collect()
}

fn window_filter(feed: &[Activity], days: u32, now_ms: i64) -> Vec<Activity> {
    let start = now_ms - days as i64 * MS_PER_DAY;
    feed.iter()
        .filter(|a| parse_date_ms(&a.date).is_some_and(|ms| ms >= start))
        .cloned()
        .collect()
}

fn rows_to<T: DeserializeOwned>(table: &str, rows: Vec<JsonMap>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(Value::Object(row)) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target = "stillwater",
                    event = "row_decode_failed",
                    table = %table,
                    error = %err
                );
                None
            }
        })
        .collect()
}

fn row_to<T: DeserializeOwned>(row: JsonMap) -> AppResult<T> {
    serde_json::from_value(Value::Object(row)).map_err(AppError::from)
}
