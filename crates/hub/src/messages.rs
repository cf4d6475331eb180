//! Appointment hub wire messages and parser.
//!
//! The hub exchanges JSON messages of the shape
//! `{"type": "<Kind>", "data": {...}}`. Commands carry a client-chosen
//! invocation `id`; the server echoes it in the matching reply so the
//! connection can correlate replies with in-flight calls. Push events
//! carry no id -- they may arrive at any time after `JoinDay`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use turnero_core::events::SlotEvent;
use turnero_core::model::{calendar_date, SlotKey};
use turnero_core::types::{DbId, Timestamp};

/// Commands sent by the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Register interest in one day's slot events.
    JoinDay {
        id: u64,
        resource_schedule_id: DbId,
        #[serde(with = "calendar_date")]
        date: NaiveDate,
    },

    /// Unregister from a previously joined day.
    LeaveDay {
        id: u64,
        resource_schedule_id: DbId,
        #[serde(with = "calendar_date")]
        date: NaiveDate,
    },

    /// Request a short-lived exclusive hold on a slot.
    LockSlot { id: u64, slot: SlotKey },

    /// Release a hold the caller owns.
    UnlockSlot { id: u64, slot: SlotKey },

    /// Convert an active hold into a booked appointment.
    ConfirmSlot {
        id: u64,
        slot: SlotKey,
        beneficiary_person_id: Option<DbId>,
    },
}

impl ClientMessage {
    /// The invocation id the server will echo in its reply.
    pub fn invocation_id(&self) -> u64 {
        match self {
            ClientMessage::JoinDay { id, .. }
            | ClientMessage::LeaveDay { id, .. }
            | ClientMessage::LockSlot { id, .. }
            | ClientMessage::UnlockSlot { id, .. }
            | ClientMessage::ConfirmSlot { id, .. } => *id,
        }
    }
}

/// Everything the server can send: command replies and push events.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Generic acknowledgement for `JoinDay`/`LeaveDay`/`UnlockSlot`.
    Ack { id: u64 },

    /// Reply to `LockSlot`. `locked == false` means another user holds
    /// the slot or it is already booked -- a normal business outcome.
    LockResult { id: u64, locked: bool },

    /// Reply to `ConfirmSlot`.
    ConfirmResult {
        id: u64,
        success: bool,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        appointment_id: Option<DbId>,
    },

    /// Push: a user acquired a hold on a slot.
    SlotLocked {
        slot: SlotKey,
        lock_owner_user_id: DbId,
        locked_until: Timestamp,
    },

    /// Push: a hold was released or expired.
    SlotUnlocked { slot: SlotKey },

    /// Push: a slot was booked.
    SlotBooked { slot: SlotKey, appointment_id: DbId },
}

impl ServerMessage {
    /// The echoed invocation id, for reply messages.
    pub fn reply_id(&self) -> Option<u64> {
        match self {
            ServerMessage::Ack { id }
            | ServerMessage::LockResult { id, .. }
            | ServerMessage::ConfirmResult { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Convert a push message into its [`SlotEvent`]. Returns `None`
    /// for reply messages.
    pub fn into_slot_event(self) -> Option<SlotEvent> {
        match self {
            ServerMessage::SlotLocked {
                slot,
                lock_owner_user_id,
                locked_until,
            } => Some(SlotEvent::Locked {
                slot,
                lock_owner_user_id,
                locked_until,
            }),
            ServerMessage::SlotUnlocked { slot } => Some(SlotEvent::Unlocked { slot }),
            ServerMessage::SlotBooked {
                slot,
                appointment_id,
            } => Some(SlotEvent::Booked {
                slot,
                appointment_id,
            }),
            _ => None,
        }
    }
}

/// Parse a hub text frame into a typed [`ServerMessage`].
///
/// Returns `Err` for malformed JSON or unknown `type` values.
/// Callers should log unknown types and continue.
pub fn parse_message(text: &str) -> Result<ServerMessage, serde_json::Error> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_key() -> SlotKey {
        SlotKey {
            resource_schedule_id: 1,
            date: "2025-01-01".parse().unwrap(),
            time_block: "08:00".to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Server messages
    // -----------------------------------------------------------------------

    #[test]
    fn parse_ack() {
        let json = r#"{"type":"Ack","data":{"id":7}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ServerMessage::Ack { id } => assert_eq!(id, 7),
            other => panic!("Expected Ack, got {other:?}"),
        }
    }

    #[test]
    fn parse_lock_result() {
        let json = r#"{"type":"LockResult","data":{"id":3,"locked":false}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ServerMessage::LockResult { id, locked } => {
                assert_eq!(id, 3);
                assert!(!locked);
            }
            other => panic!("Expected LockResult, got {other:?}"),
        }
    }

    #[test]
    fn parse_confirm_result_with_reason() {
        let json = r#"{"type":"ConfirmResult","data":{"id":4,"success":false,"reason":"slot no longer available"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ServerMessage::ConfirmResult {
                id,
                success,
                reason,
                appointment_id,
            } => {
                assert_eq!(id, 4);
                assert!(!success);
                assert_eq!(reason.as_deref(), Some("slot no longer available"));
                assert!(appointment_id.is_none());
            }
            other => panic!("Expected ConfirmResult, got {other:?}"),
        }
    }

    #[test]
    fn parse_confirm_result_success_carries_appointment_id() {
        let json = r#"{"type":"ConfirmResult","data":{"id":5,"success":true,"appointmentId":42}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ServerMessage::ConfirmResult {
                success,
                appointment_id,
                ..
            } => {
                assert!(success);
                assert_eq!(appointment_id, Some(42));
            }
            other => panic!("Expected ConfirmResult, got {other:?}"),
        }
    }

    #[test]
    fn parse_slot_locked_push() {
        let json = r#"{"type":"SlotLocked","data":{"slot":{"resourceScheduleId":1,"date":"2025-01-01","timeBlock":"08:00"},"lockOwnerUserId":9,"lockedUntil":"2025-01-01T08:05:00Z"}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ServerMessage::SlotLocked {
                slot,
                lock_owner_user_id,
                ..
            } => {
                assert_eq!(slot, slot_key());
                assert_eq!(lock_owner_user_id, 9);
            }
            other => panic!("Expected SlotLocked, got {other:?}"),
        }
    }

    #[test]
    fn parse_slot_booked_push_with_timestamp_date() {
        // The hub sometimes sends the slot date as a full timestamp.
        let json = r#"{"type":"SlotBooked","data":{"slot":{"resourceScheduleId":1,"date":"2025-01-01T00:00:00Z","timeBlock":"08:00"},"appointmentId":99}}"#;
        let msg = parse_message(json).unwrap();
        match msg {
            ServerMessage::SlotBooked {
                slot,
                appointment_id,
            } => {
                assert_eq!(slot, slot_key());
                assert_eq!(appointment_id, 99);
            }
            other => panic!("Expected SlotBooked, got {other:?}"),
        }
    }

    #[test]
    fn reply_id_only_on_replies() {
        let reply = parse_message(r#"{"type":"Ack","data":{"id":1}}"#).unwrap();
        assert_eq!(reply.reply_id(), Some(1));

        let push =
            parse_message(r#"{"type":"SlotUnlocked","data":{"slot":{"resourceScheduleId":1,"date":"2025-01-01","timeBlock":"08:00"}}}"#)
                .unwrap();
        assert_eq!(push.reply_id(), None);
    }

    #[test]
    fn push_converts_to_slot_event() {
        let push =
            parse_message(r#"{"type":"SlotUnlocked","data":{"slot":{"resourceScheduleId":1,"date":"2025-01-01","timeBlock":"08:00"}}}"#)
                .unwrap();
        match push.into_slot_event() {
            Some(SlotEvent::Unlocked { slot }) => assert_eq!(slot, slot_key()),
            other => panic!("Expected Unlocked event, got {other:?}"),
        }
    }

    #[test]
    fn reply_does_not_convert_to_slot_event() {
        let reply = parse_message(r#"{"type":"Ack","data":{"id":1}}"#).unwrap();
        assert!(reply.into_slot_event().is_none());
    }

    #[test]
    fn parse_unknown_type_returns_error() {
        assert!(parse_message(r#"{"type":"Telemetry","data":{}}"#).is_err());
    }

    #[test]
    fn parse_invalid_json_returns_error() {
        assert!(parse_message("not json at all").is_err());
    }

    // -----------------------------------------------------------------------
    // Client messages
    // -----------------------------------------------------------------------

    #[test]
    fn lock_slot_encodes_type_and_camel_case_fields() {
        let msg = ClientMessage::LockSlot {
            id: 11,
            slot: slot_key(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(json["type"], "LockSlot");
        assert_eq!(json["data"]["id"], 11);
        assert_eq!(json["data"]["slot"]["timeBlock"], "08:00");
        assert_eq!(json["data"]["slot"]["resourceScheduleId"], 1);
    }

    #[test]
    fn confirm_slot_encodes_null_beneficiary() {
        let msg = ClientMessage::ConfirmSlot {
            id: 12,
            slot: slot_key(),
            beneficiary_person_id: None,
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(json["type"], "ConfirmSlot");
        assert!(json["data"]["beneficiaryPersonId"].is_null());
    }

    #[test]
    fn join_day_encodes_plain_date() {
        let msg = ClientMessage::JoinDay {
            id: 1,
            resource_schedule_id: 5,
            date: "2025-03-09".parse().unwrap(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&msg).unwrap()).unwrap();
        assert_eq!(json["type"], "JoinDay");
        assert_eq!(json["data"]["resourceScheduleId"], 5);
        assert_eq!(json["data"]["date"], "2025-03-09");
    }

    #[test]
    fn invocation_id_matches_encoded_id() {
        let msg = ClientMessage::UnlockSlot {
            id: 21,
            slot: slot_key(),
        };
        assert_eq!(msg.invocation_id(), 21);
    }
}
