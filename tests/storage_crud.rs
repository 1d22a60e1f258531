use anyhow::Result;
use serde_json::{json, Value};
use stillwater::JsonMap;

#[path = "util.rs"]
mod util;

fn activity_fields(date: &str) -> JsonMap {
    let mut fields = JsonMap::new();
    fields.insert("type".into(), json!("meeting"));
    fields.insert("date".into(), json!(date));
    fields.insert("notes".into(), json!("shared at the end"));
    fields.insert("duration".into(), json!(60));
    fields
}

#[tokio::test]
async fn add_then_get_by_id_round_trips_every_field() -> Result<()> {
    let adapter = util::ready_adapter().await;
    let fields = activity_fields("2025-06-15");

    let created = adapter.add("activities", &fields).await?;
    let id = created.get("id").and_then(Value::as_i64).expect("assigned id");

    let fetched = adapter
        .get_by_id("activities", id)
        .await?
        .expect("row present after insert");
    for (key, value) in &fields {
        assert_eq!(fetched.get(key), Some(value), "field {key}");
    }
    // Column defaults applied by the engine are visible on the way back.
    assert_eq!(fetched.get("completed"), Some(&json!(0)));
    Ok(())
}

#[tokio::test]
async fn ids_come_from_the_engine_and_increase() -> Result<()> {
    let adapter = util::ready_adapter().await;

    let first = adapter.add("activities", &activity_fields("2025-06-01")).await?;
    let second = adapter.add("activities", &activity_fields("2025-06-02")).await?;

    let a = first.get("id").and_then(Value::as_i64).unwrap();
    let b = second.get("id").and_then(Value::as_i64).unwrap();
    assert!(b > a);
    Ok(())
}

#[tokio::test]
async fn concurrent_adds_to_one_table_get_distinct_ids() -> Result<()> {
    let adapter = std::sync::Arc::new(util::ready_adapter().await);
    let fields_a = activity_fields("2025-06-01");
    let fields_b = activity_fields("2025-06-02");
    let (a, b) = tokio::join!(
        adapter.add("activities", &fields_a),
        adapter.add("activities", &fields_b),
    );
    let a = a?.get("id").and_then(Value::as_i64).unwrap();
    let b = b?.get("id").and_then(Value::as_i64).unwrap();
    assert_ne!(a, b);
    Ok(())
}

#[tokio::test]
async fn update_returns_row_or_none_for_missing_id() -> Result<()> {
    let adapter = util::ready_adapter().await;
    let created = adapter.add("activities", &activity_fields("2025-06-15")).await?;
    let id = created.get("id").and_then(Value::as_i64).unwrap();

    let mut updates = JsonMap::new();
    updates.insert("notes".into(), json!("chaired"));
    let updated = adapter
        .update("activities", id, &updates)
        .await?
        .expect("existing row updates");
    assert_eq!(updated.get("notes"), Some(&json!("chaired")));
    assert_eq!(updated.get("duration"), Some(&json!(60)));

    // Missing ids are a None, not an error.
    let missing = adapter.update("activities", 9_999, &updates).await?;
    assert!(missing.is_none());
    Ok(())
}

#[tokio::test]
async fn remove_reports_whether_a_row_was_deleted() -> Result<()> {
    let adapter = util::ready_adapter().await;
    let created = adapter.add("activities", &activity_fields("2025-06-15")).await?;
    let id = created.get("id").and_then(Value::as_i64).unwrap();

    assert!(adapter.remove("activities", id).await?);
    assert!(!adapter.remove("activities", id).await?);
    assert!(adapter.get_by_id("activities", id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn get_all_returns_every_row() -> Result<()> {
    let adapter = util::ready_adapter().await;
    for day in ["2025-06-01", "2025-06-02", "2025-06-03"] {
        adapter.add("activities", &activity_fields(day)).await?;
    }
    let rows = adapter.get_all("activities").await?;
    assert_eq!(rows.len(), 3);
    Ok(())
}

#[tokio::test]
async fn json_columns_round_trip_as_structured_values() -> Result<()> {
    let adapter = util::ready_adapter().await;

    let mut fields = JsonMap::new();
    fields.insert("name".into(), json!("Pat"));
    fields.insert("homeGroups".into(), json!(["Tuesday Night", "Noon Group"]));
    fields.insert("preferences".into(), json!({"use24HourFormat": true}));

    let created = adapter.add("users", &fields).await?;
    assert_eq!(
        created.get("homeGroups"),
        Some(&json!(["Tuesday Night", "Noon Group"]))
    );
    assert_eq!(created.get("preferences"), Some(&json!({"use24HourFormat": true})));
    Ok(())
}

#[tokio::test]
async fn quotes_in_text_fields_survive() -> Result<()> {
    let adapter = util::ready_adapter().await;
    let mut fields = activity_fields("2025-06-15");
    fields.insert("notes".into(), json!("met at O'Malley's; \"big\" turnout"));

    let created = adapter.add("activities", &fields).await?;
    assert_eq!(
        created.get("notes"),
        Some(&json!("met at O'Malley's; \"big\" turnout"))
    );
    Ok(())
}

#[tokio::test]
async fn unknown_tables_and_columns_are_rejected() -> Result<()> {
    let adapter = util::ready_adapter().await;

    let err = adapter.get_all("sqlite_master").await.unwrap_err();
    assert_eq!(err.code(), "DB/INVALID_TABLE");

    let mut fields = JsonMap::new();
    fields.insert("notes = 'x', type".into(), json!("meeting"));
    let err = adapter.add("activities", &fields).await.unwrap_err();
    assert_eq!(err.code(), "DB/INVALID_COLUMN");
    Ok(())
}
