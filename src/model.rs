//! Typed entities for the persisted tables.
//!
//! Column names are camelCase in the store, so every struct carries a
//! `rename_all` to keep the Rust side idiomatic. Integer flags
//! (`completed`, `deleted`) stay 0/1 integers end to end.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::storage::shape::JsonMap;

pub const TYPE_ACTION_ITEM: &str = "action-item";
pub const TYPE_SPONSOR_ACTION_ITEM: &str = "sponsor_action_item";
pub const TYPE_SPONSEE_ACTION_ITEM: &str = "sponsee_action_item";

/// A logged activity — the unit the scoring engine consumes.
///
/// `title`, `text`, `sponsor_name` and `action_item_data` are enrichment
/// fields: they are populated by the feed layer from joined tables and are
/// never written back to the activities table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub meeting_name: Option<String>,
    #[serde(default)]
    pub meeting_id: Option<i64>,
    #[serde(default)]
    pub literature_title: Option<String>,
    #[serde(default)]
    pub step_number: Option<i64>,
    #[serde(default)]
    pub person_called: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub completed: Option<i64>,
    #[serde(default)]
    pub action_item_id: Option<i64>,
    #[serde(default)]
    pub sponsor_contact_id: Option<i64>,
    #[serde(default)]
    pub sponsee_contact_id: Option<i64>,
    #[serde(default)]
    pub sponsor_id: Option<i64>,
    #[serde(default)]
    pub sponsee_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sponsor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_item_data: Option<ActionItem>,
}

impl Activity {
    /// Whether this entry counts toward the visible history and the fitness
    /// score. Plain and sponsee-owned action items exist for bookkeeping
    /// screens only.
    pub fn is_credit_bearing(&self) -> bool {
        self.kind != TYPE_ACTION_ITEM && self.kind != TYPE_SPONSEE_ACTION_ITEM
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionItem {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed: i64,
    #[serde(default)]
    pub deleted: i64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub contact_id: Option<i64>,
    #[serde(default)]
    pub sponsor_contact_id: Option<i64>,
    #[serde(default)]
    pub sponsee_contact_id: Option<i64>,
    #[serde(default)]
    pub sponsor_name: Option<String>,
    #[serde(default)]
    pub sponsor_id: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Credit classification is derived from ownership, never stored as ground
/// truth: a sponsor-owned item earns credit, a sponsee-owned one does not,
/// an unowned one is plain bookkeeping.
pub fn classify_action_item(item: &ActionItem) -> &'static str {
    if item.sponsor_contact_id.is_some() {
        TYPE_SPONSOR_ACTION_ITEM
    } else if item.sponsee_contact_id.is_some() {
        TYPE_SPONSEE_ACTION_ITEM
    } else {
        TYPE_ACTION_ITEM
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorContact {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub sponsor_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponseeContact {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub sponsee_id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sponsor {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sobriety_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Sponsor {
    /// First name plus last name, however much of it is filled in.
    pub fn display_name(&self) -> String {
        let first = self.name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        match (first.is_empty(), last.is_empty()) {
            (false, false) => format!("{first} {last}"),
            (false, true) => first.to_string(),
            (true, false) => last.to_string(),
            (true, true) => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sponsee {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sobriety_date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub days: Option<Value>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub schedule: Option<Value>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub location_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub coordinates: Option<Value>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub online_url: Option<String>,
    #[serde(default)]
    pub is_home_group: Option<i64>,
    #[serde(default)]
    pub types: Option<Value>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Singleton-per-install profile. Sponsor fields are flattened onto the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sobriety_date: Option<String>,
    #[serde(default)]
    pub home_groups: Option<Value>,
    #[serde(default)]
    pub privacy_settings: Option<Value>,
    #[serde(default)]
    pub preferences: Option<Value>,
    #[serde(default, rename = "sponsor_name")]
    pub sponsor_name: Option<String>,
    #[serde(default, rename = "sponsor_lastName")]
    pub sponsor_last_name: Option<String>,
    #[serde(default, rename = "sponsor_phone")]
    pub sponsor_phone: Option<String>,
    #[serde(default, rename = "sponsor_email")]
    pub sponsor_email: Option<String>,
    #[serde(default, rename = "sponsor_sobrietyDate")]
    pub sponsor_sobriety_date: Option<String>,
    #[serde(default, rename = "sponsor_notes")]
    pub sponsor_notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl User {
    /// Whether the profile holds anything the user actually typed in, as
    /// opposed to the defaults written at first launch.
    pub fn has_meaningful_data(&self) -> bool {
        [
            &self.name,
            &self.last_name,
            &self.phone_number,
            &self.email,
            &self.sobriety_date,
        ]
        .into_iter()
        .any(|f| f.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Serialize an input struct into the field map the storage adapter takes.
pub(crate) fn fields_of<T: Serialize>(value: &T) -> JsonMap {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => JsonMap::new(),
    }
}

// ---------------------------------------------------------------------------
// Insert payloads. Absent optional fields stay out of the INSERT entirely so
// column defaults apply.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literature_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_number: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_called: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_item_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_contact_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsee_contact_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsee_id: Option<i64>,
}

impl NewActivity {
    pub fn new(kind: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            date: date.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActionItem {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_contact_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsee_contact_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_id: Option<i64>,
}

impl NewActionItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSponsorContact {
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

impl NewSponsorContact {
    pub fn new(kind: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            user_id: "default_user".into(),
            kind: kind.into(),
            date: date.into(),
            sponsor_id: None,
            note: None,
            topic: None,
            duration: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSponseeContact {
    pub user_id: String,
    pub sponsee_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
}

impl NewSponseeContact {
    pub fn new(sponsee_id: i64, kind: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            user_id: "default_user".into(),
            sponsee_id,
            kind: kind.into(),
            date: date.into(),
            note: None,
            topic: None,
            duration: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSponsor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sobriety_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSponsee {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sobriety_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeeting {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub online_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_home_group: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub types: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(sponsor: Option<i64>, sponsee: Option<i64>) -> ActionItem {
        ActionItem {
            id: 1,
            title: "Read chapter five".into(),
            text: None,
            notes: None,
            due_date: None,
            completed: 0,
            deleted: 0,
            kind: None,
            contact_id: None,
            sponsor_contact_id: sponsor,
            sponsee_contact_id: sponsee,
            sponsor_name: None,
            sponsor_id: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn classification_follows_ownership() {
        assert_eq!(classify_action_item(&item(Some(3), None)), TYPE_SPONSOR_ACTION_ITEM);
        assert_eq!(classify_action_item(&item(None, Some(4))), TYPE_SPONSEE_ACTION_ITEM);
        assert_eq!(classify_action_item(&item(None, None)), TYPE_ACTION_ITEM);
        // Sponsor ownership wins when both keys are somehow populated.
        assert_eq!(classify_action_item(&item(Some(3), Some(4))), TYPE_SPONSOR_ACTION_ITEM);
    }

    #[test]
    fn credit_filter_matches_type_tags() {
        let mut activity: Activity =
            serde_json::from_value(json!({"type": "meeting", "date": "2025-01-01"})).unwrap();
        assert!(activity.is_credit_bearing());
        activity.kind = TYPE_SPONSOR_ACTION_ITEM.into();
        assert!(activity.is_credit_bearing());
        activity.kind = TYPE_SPONSEE_ACTION_ITEM.into();
        assert!(!activity.is_credit_bearing());
        activity.kind = TYPE_ACTION_ITEM.into();
        assert!(!activity.is_credit_bearing());
    }

    #[test]
    fn activity_deserializes_from_camel_case_row() {
        let activity: Activity = serde_json::from_value(json!({
            "id": 12,
            "type": "meeting",
            "date": "2025-03-04",
            "meetingName": "Tuesday Night",
            "sponsorContactId": 7,
            "duration": 60
        }))
        .unwrap();
        assert_eq!(activity.id, 12);
        assert_eq!(activity.meeting_name.as_deref(), Some("Tuesday Night"));
        assert_eq!(activity.sponsor_contact_id, Some(7));
    }

    #[test]
    fn new_activity_serializes_only_present_fields() {
        let fields = fields_of(&NewActivity::new("prayer", "2025-03-04"));
        assert_eq!(fields.get("type"), Some(&json!("prayer")));
        assert_eq!(fields.get("date"), Some(&json!("2025-03-04")));
        assert!(!fields.contains_key("notes"));
        assert!(!fields.contains_key("id"));
    }

    #[test]
    fn sponsor_display_name_handles_partial_fields() {
        let mut sponsor: Sponsor = serde_json::from_value(json!({"id": 1})).unwrap();
        assert_eq!(sponsor.display_name(), "");
        sponsor.name = Some("Jim".into());
        assert_eq!(sponsor.display_name(), "Jim");
        sponsor.last_name = Some("W".into());
        assert_eq!(sponsor.display_name(), "Jim W");
    }

    #[test]
    fn user_meaningful_data_ignores_blank_defaults() {
        let blank: User = serde_json::from_value(json!({"id": 1, "name": "", "email": " "})).unwrap();
        assert!(!blank.has_meaningful_data());
        let filled: User =
            serde_json::from_value(json!({"id": 1, "sobrietyDate": "2020-01-01"})).unwrap();
        assert!(filled.has_meaningful_data());
    }
}
