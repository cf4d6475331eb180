//! Slot store and booking orchestration.
//!
//! - [`SlotStore`] -- the client-side source of truth for the joined
//!   day's availability. Applies server push events unconditionally
//!   (server wins) and publishes the ordered slot list to subscribers
//!   on every change.
//! - [`BookingFlow`] -- the UI-facing state machine: activate a day,
//!   select a slot (lock), choose a beneficiary, confirm or cancel,
//!   switch days, tear down -- with best-effort lock release on every
//!   abandonment path.
//! - [`BookingNotice`] -- the user-visible outcomes the flow emits.

pub mod notice;
pub mod orchestrator;
pub mod store;

pub use notice::BookingNotice;
pub use orchestrator::{BookingError, BookingFlow, ConfirmationOutcome, SlotSelection};
pub use store::SlotStore;
