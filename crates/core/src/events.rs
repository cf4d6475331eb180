//! Push events delivered by the appointment hub.
//!
//! These are the high-level slot state changes the client cares about,
//! produced by the hub layer after decoding raw WebSocket frames. The
//! server is authoritative: the store applies whichever event arrives
//! unconditionally, including over local optimistic state.

use serde::Serialize;

use crate::model::SlotKey;
use crate::types::{DbId, Timestamp};

/// A slot state change pushed by the server.
#[derive(Debug, Clone, Serialize)]
pub enum SlotEvent {
    /// Another user (or this one) acquired a short-lived hold.
    Locked {
        slot: SlotKey,
        lock_owner_user_id: DbId,
        /// When the hold expires server-side. Advisory.
        locked_until: Timestamp,
    },

    /// A hold was released or expired.
    Unlocked { slot: SlotKey },

    /// The slot was converted into a booked appointment. Terminal for
    /// the slot until the next wholesale refresh.
    Booked { slot: SlotKey, appointment_id: DbId },
}

impl SlotEvent {
    /// The slot this event refers to.
    pub fn slot(&self) -> &SlotKey {
        match self {
            SlotEvent::Locked { slot, .. } => slot,
            SlotEvent::Unlocked { slot } => slot,
            SlotEvent::Booked { slot, .. } => slot,
        }
    }
}
