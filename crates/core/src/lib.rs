//! Shared model and vocabulary for the turnero booking client.
//!
//! This crate has zero internal deps so it can be used by every layer:
//!
//! - [`model`] -- slot identity and state ([`SlotKey`], [`SlotRecord`],
//!   [`DayContext`], [`BookingRequest`], [`RelatedPerson`]).
//! - [`events`] -- push events delivered by the appointment hub.
//! - [`phase`] -- the booking flow state machine table.
//! - [`ports`] -- collaborator traits the orchestrator is written
//!   against, plus their error types.
//! - [`display`] -- human-facing formatting helpers for front-ends.

pub mod display;
pub mod events;
pub mod model;
pub mod phase;
pub mod ports;
pub mod types;

pub use events::SlotEvent;
pub use model::{BookingRequest, DayContext, RelatedPerson, SlotKey, SlotRecord};
pub use phase::BookingPhase;
pub use ports::{
    AvailabilityProvider, ChannelError, ConfirmReply, FetchError, LockReply,
    RelatedPersonProvider, SlotChannel,
};
pub use types::{DbId, Timestamp};
