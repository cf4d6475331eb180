//! Slot identity and state types.
//!
//! A *slot* is one bookable time unit within a resource's schedule for
//! a given day. The backend addresses slots by [`SlotKey`]; the client
//! keeps one [`SlotRecord`] per time block for the currently joined
//! [`DayContext`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// Composite identity of a bookable slot.
///
/// Two keys are equal iff all three fields match. The date is a
/// calendar day -- the backend sometimes sends full ISO timestamps in
/// event payloads, so deserialization truncates to the date portion
/// (see [`calendar_date`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotKey {
    /// Id of the resource schedule the slot belongs to.
    pub resource_schedule_id: DbId,
    /// Calendar day of the slot.
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
    /// Time of day, `"HH:MM"` or `"HH:MM:SS"`.
    pub time_block: String,
}

/// One bookable unit as tracked by the client.
///
/// Availability is derived state: a slot is available exactly when it
/// is neither booked nor locked. The store re-derives it on every
/// reconciliation, so `locked_until` stays advisory display data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    /// Time of day, unique within one day context.
    pub time_block: String,
    /// Whether the slot can currently be selected.
    pub is_available: bool,
    /// Id of the appointment occupying the slot, if booked.
    #[serde(default)]
    pub booked_appointment_id: Option<DbId>,
    /// User currently holding a short-lived lock on the slot.
    #[serde(default)]
    pub locked_by_user_id: Option<DbId>,
    /// Server-granted lock deadline. Advisory only.
    #[serde(default)]
    pub locked_until: Option<Timestamp>,
    /// Resource schedule this record belongs to.
    pub resource_schedule_id: DbId,
}

/// The (resource schedule, date) pair a client is subscribed to for
/// live updates. Exactly one context is active per hub connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayContext {
    pub resource_schedule_id: DbId,
    pub date: NaiveDate,
}

impl DayContext {
    /// Whether an incoming event's slot belongs to this context.
    ///
    /// Events for other resources or other calendar days are stale
    /// leftovers from a previous context and must be dropped.
    pub fn matches(&self, slot: &SlotKey) -> bool {
        slot.resource_schedule_id == self.resource_schedule_id && slot.date == self.date
    }
}

/// One booking attempt in flight. Lives from a successful lock until
/// the confirm resolves or the user abandons the hold.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub slot: SlotKey,
    /// `None` means the appointment is for the authenticated user.
    pub beneficiary_person_id: Option<DbId>,
}

/// A person related to the authenticated user who may be the
/// beneficiary of an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedPerson {
    pub id: DbId,
    pub full_name: String,
    /// Kinship description, e.g. `"daughter"`. Free-form.
    #[serde(default)]
    pub relationship: Option<String>,
}

/// Serde helpers for calendar-day fields.
///
/// The hub occasionally delivers dates as full ISO-8601 timestamps
/// (`"2025-01-01T00:00:00Z"`). Comparison is by calendar day, so
/// deserialization takes the first ten characters and parses them as
/// `YYYY-MM-DD`. Serialization always emits the plain date.
pub mod calendar_date {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let day = raw.get(..10).unwrap_or(&raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(resource_schedule_id: DbId, date: &str, time_block: &str) -> SlotKey {
        SlotKey {
            resource_schedule_id,
            date: date.parse().unwrap(),
            time_block: time_block.to_string(),
        }
    }

    #[test]
    fn slot_keys_equal_when_all_fields_match() {
        assert_eq!(key(1, "2025-01-01", "08:00"), key(1, "2025-01-01", "08:00"));
    }

    #[test]
    fn slot_keys_differ_on_any_field() {
        let base = key(1, "2025-01-01", "08:00");
        assert_ne!(base, key(2, "2025-01-01", "08:00"));
        assert_ne!(base, key(1, "2025-01-02", "08:00"));
        assert_ne!(base, key(1, "2025-01-01", "09:00"));
    }

    #[test]
    fn context_matches_same_resource_and_day() {
        let ctx = DayContext {
            resource_schedule_id: 1,
            date: "2025-01-01".parse().unwrap(),
        };
        assert!(ctx.matches(&key(1, "2025-01-01", "08:00")));
        assert!(!ctx.matches(&key(2, "2025-01-01", "08:00")));
        assert!(!ctx.matches(&key(1, "2025-01-02", "08:00")));
    }

    #[test]
    fn slot_key_deserializes_plain_date() {
        let json = r#"{"resourceScheduleId":3,"date":"2025-01-01","timeBlock":"08:00"}"#;
        let parsed: SlotKey = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, key(3, "2025-01-01", "08:00"));
    }

    #[test]
    fn slot_key_deserializes_full_timestamp_to_calendar_day() {
        let json = r#"{"resourceScheduleId":3,"date":"2025-01-01T14:30:00Z","timeBlock":"08:00"}"#;
        let parsed: SlotKey = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.date, "2025-01-01".parse::<NaiveDate>().unwrap());
    }

    #[test]
    fn slot_key_serializes_date_as_ymd() {
        let json = serde_json::to_value(key(3, "2025-01-01", "08:00")).unwrap();
        assert_eq!(json["date"], "2025-01-01");
        assert_eq!(json["timeBlock"], "08:00");
        assert_eq!(json["resourceScheduleId"], 3);
    }

    #[test]
    fn slot_record_optional_fields_default_to_none() {
        let json = r#"{"timeBlock":"08:00","isAvailable":true,"resourceScheduleId":1}"#;
        let record: SlotRecord = serde_json::from_str(json).unwrap();
        assert!(record.is_available);
        assert!(record.booked_appointment_id.is_none());
        assert!(record.locked_by_user_id.is_none());
        assert!(record.locked_until.is_none());
    }
}
