//! Collaborator ports the booking flow is written against.
//!
//! The orchestrator talks to two external systems: the REST API that
//! supplies a day's availability (plus the user's related persons) and
//! the appointment hub that arbitrates locks. Both are behind traits
//! so the flow can be exercised with scripted fakes.

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::broadcast;

use crate::events::SlotEvent;
use crate::model::{RelatedPerson, SlotRecord};
use crate::types::DbId;

/// Outcome of a lock request. `locked == false` is a normal business
/// outcome (someone else holds the slot), not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockReply {
    pub locked: bool,
}

/// Outcome of a confirm request. `success == false` carries a
/// human-readable `reason`; it is reported, never thrown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmReply {
    pub success: bool,
    pub reason: Option<String>,
    /// Id of the created appointment when `success` is true.
    pub appointment_id: Option<DbId>,
}

/// Errors from the live channel.
///
/// A dropped connection mid-call means *unknown outcome*: the caller
/// must not assume the slot is held or free either way.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// No connection has been established yet.
    #[error("not connected to the appointment hub")]
    NotConnected,

    /// A slot command was issued without an active day context.
    #[error("no active day context")]
    NoActiveDay,

    /// The connection dropped before a reply arrived.
    #[error("connection lost before a reply arrived")]
    ConnectionLost,

    /// Any other transport-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors from the REST collaborators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The request itself failed (network, DNS, TLS).
    #[error("request failed: {0}")]
    Request(String),

    /// The backend returned a non-success status.
    #[error("unexpected response ({status}): {body}")]
    Response { status: u16, body: String },
}

/// The persistent bidirectional connection to the appointment hub.
///
/// Slot commands (`lock`/`unlock`/`confirm`) address slots by time
/// block only; the implementation completes the key from the active
/// day context set by [`join_day`](SlotChannel::join_day).
#[async_trait]
pub trait SlotChannel: Send + Sync {
    /// Establish the connection. Idempotent: a no-op when already
    /// connected. The token is opaque to this subsystem.
    async fn connect(&self, token: &str) -> Result<(), ChannelError>;

    /// Register interest in one day's slot events and make it the
    /// active context.
    async fn join_day(&self, resource_schedule_id: DbId, date: NaiveDate)
        -> Result<(), ChannelError>;

    /// Unregister from the active context. A no-op when none is active.
    async fn leave_day(&self) -> Result<(), ChannelError>;

    /// Request a short-lived exclusive hold on a slot.
    async fn lock(&self, time_block: &str) -> Result<LockReply, ChannelError>;

    /// Release a hold the caller owns. Safe to call after the hold
    /// expired server-side.
    async fn unlock(&self, time_block: &str) -> Result<(), ChannelError>;

    /// Convert an active hold into a booked appointment, optionally on
    /// behalf of a related person.
    async fn confirm(
        &self,
        time_block: &str,
        beneficiary_person_id: Option<DbId>,
    ) -> Result<ConfirmReply, ChannelError>;

    /// Subscribe to push events for the active context. Events may
    /// arrive at any time after `join_day`, interleaved with replies
    /// to this client's own in-flight commands.
    fn events(&self) -> broadcast::Receiver<SlotEvent>;
}

/// One-shot fetch of a day's slot list.
#[async_trait]
pub trait AvailabilityProvider: Send + Sync {
    /// Fetch the slot list for an appointment type and calendar day.
    /// `include_occupied` asks the backend to include booked/locked
    /// slots rather than only free ones.
    async fn available_blocks(
        &self,
        appointment_type_id: DbId,
        date: NaiveDate,
        include_occupied: bool,
    ) -> Result<Vec<SlotRecord>, FetchError>;
}

/// Lookup of the authenticated user's related persons.
#[async_trait]
pub trait RelatedPersonProvider: Send + Sync {
    async fn related_persons(&self) -> Result<Vec<RelatedPerson>, FetchError>;
}
