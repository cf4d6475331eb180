//! The booking flow.
//!
//! [`BookingFlow`] drives one booking screen's lifecycle: activate a
//! day (fetch + connect + join), select a slot (lock), choose a
//! beneficiary, confirm or cancel, switch days, tear down. It owns the
//! [`SlotStore`] and an event pump task that feeds hub push events into
//! it, so the slot list stays live independently of any booking attempt
//! in flight.
//!
//! Collaborators are injected as ports ([`SlotChannel`],
//! [`AvailabilityProvider`], [`RelatedPersonProvider`]); the flow is
//! constructed per screen and disposed via
//! [`shutdown`](BookingFlow::shutdown), not shared across screens.
//!
//! Every hold-abandoning path (cancel, confirm failure, day switch,
//! teardown) releases the hold with a best-effort unlock; a failed
//! unlock is logged, never surfaced, with server-side expiry as the
//! backstop.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;

use turnero_core::events::SlotEvent;
use turnero_core::model::{BookingRequest, DayContext, RelatedPerson, SlotKey, SlotRecord};
use turnero_core::phase::BookingPhase;
use turnero_core::ports::{
    AvailabilityProvider, ChannelError, FetchError, RelatedPersonProvider, SlotChannel,
};
use turnero_core::types::DbId;

use crate::notice::BookingNotice;
use crate::store::SlotStore;

/// Broadcast capacity for user-visible notices.
const NOTICE_CHANNEL_CAPACITY: usize = 32;

/// Result of selecting a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotSelection {
    /// Another user holds the slot or it is already booked. No hold
    /// was acquired.
    Taken,

    /// Hold acquired; the user must pick a beneficiary (self or one of
    /// the listed related persons) or cancel.
    AwaitingBeneficiary(Vec<RelatedPerson>),

    /// Hold acquired and, with no related persons to choose from,
    /// confirmed immediately for the user themself.
    Booked { appointment_id: Option<DbId> },

    /// The immediate confirmation was refused by the backend.
    Failed { reason: String },
}

/// Result of confirming a held slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmationOutcome {
    Booked { appointment_id: Option<DbId> },
    Failed { reason: String },
}

impl From<ConfirmationOutcome> for SlotSelection {
    fn from(outcome: ConfirmationOutcome) -> Self {
        match outcome {
            ConfirmationOutcome::Booked { appointment_id } => {
                SlotSelection::Booked { appointment_id }
            }
            ConfirmationOutcome::Failed { reason } => SlotSelection::Failed { reason },
        }
    }
}

/// Errors from the booking flow.
///
/// Business outcomes are not here -- a refused lock or confirm comes
/// back as [`SlotSelection`] / [`ConfirmationOutcome`] values.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// An operation was invoked in a phase that does not allow it.
    #[error("{0}")]
    Phase(String),

    /// The live channel failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// A REST collaborator failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

struct FlowState {
    phase: BookingPhase,
    appointment_type_id: Option<DbId>,
    date: Option<NaiveDate>,
    hold: Option<BookingRequest>,
    pump: Option<JoinHandle<()>>,
}

/// The UI-facing booking state machine.
pub struct BookingFlow {
    channel: Arc<dyn SlotChannel>,
    availability: Arc<dyn AvailabilityProvider>,
    persons: Arc<dyn RelatedPersonProvider>,
    store: Arc<SlotStore>,
    notice_tx: broadcast::Sender<BookingNotice>,
    state: Mutex<FlowState>,
}

impl BookingFlow {
    /// Create a flow over the injected collaborators. No network
    /// activity happens until [`activate`](Self::activate).
    pub fn new(
        channel: Arc<dyn SlotChannel>,
        availability: Arc<dyn AvailabilityProvider>,
        persons: Arc<dyn RelatedPersonProvider>,
    ) -> Self {
        let (notice_tx, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        Self {
            channel,
            availability,
            persons,
            store: Arc::new(SlotStore::new()),
            notice_tx,
            state: Mutex::new(FlowState {
                phase: BookingPhase::Idle,
                appointment_type_id: None,
                date: None,
                hold: None,
                pump: None,
            }),
        }
    }

    /// The slot store driving the screen's list.
    pub fn store(&self) -> Arc<SlotStore> {
        Arc::clone(&self.store)
    }

    /// Subscribe to the ordered slot list. The receiver immediately
    /// holds the latest snapshot.
    pub fn slots(&self) -> watch::Receiver<Vec<SlotRecord>> {
        self.store.subscribe()
    }

    /// Subscribe to user-visible notices.
    pub fn notices(&self) -> broadcast::Receiver<BookingNotice> {
        self.notice_tx.subscribe()
    }

    /// Current phase, for phase-dependent UI.
    pub async fn phase(&self) -> BookingPhase {
        self.state.lock().await.phase
    }

    /// Activate the screen: fetch the day's availability, seed the
    /// store, connect the hub, and join the day discovered from the
    /// first returned slot. An empty day has no resource id, so no
    /// join happens and nothing live is shown.
    ///
    /// A failed fetch leaves the flow `Ready` with an empty list; a
    /// failed connect falls back to `Idle`. Both emit a notice.
    pub async fn activate(
        &self,
        token: &str,
        appointment_type_id: DbId,
        date: NaiveDate,
    ) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;
        self.transition(&mut state, BookingPhase::Fetching)?;
        state.appointment_type_id = Some(appointment_type_id);
        state.date = Some(date);

        let blocks = match self
            .availability
            .available_blocks(appointment_type_id, date, true)
            .await
        {
            Ok(blocks) => blocks,
            Err(e) => {
                tracing::warn!(error = %e, %date, "Availability fetch failed");
                self.store.set_context(None).await;
                self.store.set_blocks(Vec::new()).await;
                self.transition(&mut state, BookingPhase::Ready)?;
                self.notify(BookingNotice::AvailabilityUnavailable);
                return Err(e.into());
            }
        };

        if let Err(e) = self.channel.connect(token).await {
            tracing::error!(error = %e, "Hub connect failed");
            self.transition(&mut state, BookingPhase::Idle)?;
            self.notify(BookingNotice::ConnectionFailed);
            return Err(e.into());
        }

        if state.pump.is_none() {
            state.pump = Some(spawn_event_pump(
                self.channel.events(),
                Arc::clone(&self.store),
            ));
        }

        self.enter_day(&mut state, blocks, date).await?;
        self.transition(&mut state, BookingPhase::Ready)?;
        Ok(())
    }

    /// Select an available slot: request a lock, then either hand the
    /// user the beneficiary choice or -- with no related persons --
    /// confirm immediately for the user themself.
    ///
    /// A refused lock is a normal outcome: the flow returns to `Ready`
    /// with a [`BookingNotice::SlotTaken`] and no further hub calls.
    pub async fn select_slot(&self, time_block: &str) -> Result<SlotSelection, BookingError> {
        let mut state = self.state.lock().await;
        self.transition(&mut state, BookingPhase::Locking)?;

        // Unavailable slots are not lockable; a stale tap can race a
        // push event that just took the slot.
        let lockable = self
            .store
            .get(time_block)
            .await
            .is_some_and(|r| r.is_available);
        if !lockable {
            self.transition(&mut state, BookingPhase::Ready)?;
            self.notify(BookingNotice::SlotTaken);
            return Ok(SlotSelection::Taken);
        }

        let slot = match self.slot_key(time_block).await {
            Ok(slot) => slot,
            Err(e) => {
                self.transition(&mut state, BookingPhase::Ready)?;
                return Err(e);
            }
        };

        let reply = match self.channel.lock(time_block).await {
            Ok(reply) => reply,
            Err(e) => {
                // Unknown outcome: no hold is recorded and nothing is
                // unlocked; the next refresh restores truth.
                tracing::error!(error = %e, time_block, "Lock call failed");
                self.transition(&mut state, BookingPhase::Ready)?;
                self.notify(BookingNotice::ConnectionFailed);
                return Err(e.into());
            }
        };

        if !reply.locked {
            self.transition(&mut state, BookingPhase::Ready)?;
            self.notify(BookingNotice::SlotTaken);
            return Ok(SlotSelection::Taken);
        }

        tracing::info!(time_block, "Slot hold acquired");
        state.hold = Some(BookingRequest {
            slot,
            beneficiary_person_id: None,
        });

        let persons = match self.persons.related_persons().await {
            Ok(persons) => persons,
            Err(e) => {
                tracing::error!(error = %e, "Related-person fetch failed");
                self.release_hold(&mut state).await;
                self.transition(&mut state, BookingPhase::Ready)?;
                self.notify(BookingNotice::ConnectionFailed);
                return Err(e.into());
            }
        };

        if persons.is_empty() {
            // Nothing to choose: one-step confirmation as self.
            self.transition(&mut state, BookingPhase::Confirming)?;
            let outcome = self.do_confirm(&mut state, None).await?;
            return Ok(outcome.into());
        }

        self.transition(&mut state, BookingPhase::AwaitingBeneficiaryChoice)?;
        Ok(SlotSelection::AwaitingBeneficiary(persons))
    }

    /// Confirm the held slot for the chosen beneficiary (`None` means
    /// the authenticated user themself). Valid while the beneficiary
    /// chooser is open.
    pub async fn confirm(
        &self,
        beneficiary_person_id: Option<DbId>,
    ) -> Result<ConfirmationOutcome, BookingError> {
        let mut state = self.state.lock().await;
        self.transition(&mut state, BookingPhase::Confirming)?;
        self.do_confirm(&mut state, beneficiary_person_id).await
    }

    /// Abandon the beneficiary chooser. Always releases the hold with
    /// exactly one unlock call, regardless of its outcome.
    pub async fn cancel(&self) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;
        self.transition(&mut state, BookingPhase::Ready)?;
        self.release_hold(&mut state).await;
        tracing::info!("Booking attempt cancelled");
        Ok(())
    }

    /// Switch to a different date: release any hold, leave the old day
    /// context, fetch the new day's list, seed the store, and join the
    /// new context discovered from the first returned slot.
    pub async fn switch_day(&self, date: NaiveDate) -> Result<(), BookingError> {
        let mut state = self.state.lock().await;
        let Some(appointment_type_id) = state.appointment_type_id else {
            return Err(BookingError::Phase(
                "day switch before the screen was activated".into(),
            ));
        };

        if state.phase == BookingPhase::AwaitingBeneficiaryChoice {
            self.transition(&mut state, BookingPhase::Ready)?;
        }
        self.transition(&mut state, BookingPhase::Fetching)?;
        state.date = Some(date);

        // A hold on the old day is abandoned; release it before the
        // old context goes away.
        self.release_hold(&mut state).await;

        if self.store.context().await.is_some() {
            if let Err(e) = self.channel.leave_day().await {
                // The server keeps emitting to a gone observer until
                // the connection closes; harmless.
                tracing::warn!(error = %e, "Leave-day failed during day switch");
            }
            self.store.set_context(None).await;
        }

        let blocks = match self
            .availability
            .available_blocks(appointment_type_id, date, true)
            .await
        {
            Ok(blocks) => blocks,
            Err(e) => {
                tracing::warn!(error = %e, %date, "Availability fetch failed");
                self.store.set_blocks(Vec::new()).await;
                self.transition(&mut state, BookingPhase::Ready)?;
                self.notify(BookingNotice::AvailabilityUnavailable);
                return Err(e.into());
            }
        };

        self.enter_day(&mut state, blocks, date).await?;
        self.transition(&mut state, BookingPhase::Ready)?;
        tracing::info!(%date, "Switched day");
        Ok(())
    }

    /// Tear the screen down: stop the event pump, release any hold,
    /// and leave the day context. The injected channel itself is owned
    /// by the caller and disposed separately.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;

        if let Some(pump) = state.pump.take() {
            pump.abort();
        }

        self.release_hold(&mut state).await;

        if self.store.context().await.is_some() {
            if let Err(e) = self.channel.leave_day().await {
                tracing::warn!(error = %e, "Leave-day failed during teardown");
            }
            self.store.set_context(None).await;
        }

        state.phase = BookingPhase::Idle;
        tracing::info!("Booking flow shut down");
    }

    // ---- private helpers ----

    /// Seed the store with a fetched day and join its context. With an
    /// empty list there is no resource id to join, so the day stays
    /// static.
    async fn enter_day(
        &self,
        state: &mut FlowState,
        blocks: Vec<SlotRecord>,
        date: NaiveDate,
    ) -> Result<(), BookingError> {
        let resource_schedule_id = blocks.first().map(|r| r.resource_schedule_id);
        self.store.set_blocks(blocks).await;

        let Some(resource_schedule_id) = resource_schedule_id else {
            self.store.set_context(None).await;
            tracing::info!(%date, "No slots returned; skipping day join");
            return Ok(());
        };

        self.store
            .set_context(Some(DayContext {
                resource_schedule_id,
                date,
            }))
            .await;

        if let Err(e) = self.channel.join_day(resource_schedule_id, date).await {
            tracing::error!(error = %e, "Join-day failed");
            self.transition(state, BookingPhase::Ready)?;
            self.notify(BookingNotice::ConnectionFailed);
            return Err(e.into());
        }
        Ok(())
    }

    /// Issue the confirm for the current hold. `state.phase` is
    /// already `Confirming`.
    async fn do_confirm(
        &self,
        state: &mut FlowState,
        beneficiary_person_id: Option<DbId>,
    ) -> Result<ConfirmationOutcome, BookingError> {
        let Some(hold) = state.hold.as_mut() else {
            return Err(BookingError::Phase("confirm without an active hold".into()));
        };
        hold.beneficiary_person_id = beneficiary_person_id;
        let time_block = hold.slot.time_block.clone();

        match self.channel.confirm(&time_block, beneficiary_person_id).await {
            Ok(reply) if reply.success => {
                // The slot list reflects the booking via the SlotBooked
                // push, applied by the store independently of this flow.
                state.hold = None;
                self.transition(state, BookingPhase::Done)?;
                self.transition(state, BookingPhase::Ready)?;
                self.notify(BookingNotice::BookingConfirmed);
                tracing::info!(time_block, "Booking confirmed");
                Ok(ConfirmationOutcome::Booked {
                    appointment_id: reply.appointment_id,
                })
            }
            Ok(reply) => {
                let reason = reply
                    .reason
                    .unwrap_or_else(|| "the booking was rejected".to_string());
                tracing::info!(time_block, %reason, "Booking refused");

                // No cleanup unlock for a slot already booked out from
                // under us -- there is no hold left to release.
                let already_booked = self
                    .store
                    .get(&time_block)
                    .await
                    .is_some_and(|r| r.booked_appointment_id.is_some());
                if !already_booked {
                    self.best_effort_unlock(&time_block).await;
                }

                state.hold = None;
                self.transition(state, BookingPhase::Ready)?;
                self.notify(BookingNotice::BookingFailed {
                    reason: reason.clone(),
                });
                Ok(ConfirmationOutcome::Failed { reason })
            }
            Err(e) => {
                // Unknown outcome: release best-effort and let the next
                // refresh restore truth.
                tracing::error!(error = %e, time_block, "Confirm call failed");
                self.best_effort_unlock(&time_block).await;
                state.hold = None;
                self.transition(state, BookingPhase::Ready)?;
                self.notify(BookingNotice::ConnectionFailed);
                Err(e.into())
            }
        }
    }

    /// Release the current hold, if any, with one best-effort unlock.
    async fn release_hold(&self, state: &mut FlowState) {
        if let Some(hold) = state.hold.take() {
            self.best_effort_unlock(&hold.slot.time_block).await;
        }
    }

    async fn best_effort_unlock(&self, time_block: &str) {
        if let Err(e) = self.channel.unlock(time_block).await {
            // Server-side lock expiry is the backstop.
            tracing::warn!(error = %e, time_block, "Failed to release slot hold");
        }
    }

    /// Build the full key for a time block from the joined context.
    async fn slot_key(&self, time_block: &str) -> Result<SlotKey, BookingError> {
        let ctx = self
            .store
            .context()
            .await
            .ok_or(BookingError::Channel(ChannelError::NoActiveDay))?;
        Ok(SlotKey {
            resource_schedule_id: ctx.resource_schedule_id,
            date: ctx.date,
            time_block: time_block.to_string(),
        })
    }

    fn transition(&self, state: &mut FlowState, to: BookingPhase) -> Result<(), BookingError> {
        state
            .phase
            .validate_transition(to)
            .map_err(BookingError::Phase)?;
        tracing::debug!(from = %state.phase, to = %to, "Booking phase transition");
        state.phase = to;
        Ok(())
    }

    fn notify(&self, notice: BookingNotice) {
        // Zero receivers just means no UI is listening.
        let _ = self.notice_tx.send(notice);
    }
}

/// Feed hub push events into the store until the channel closes.
fn spawn_event_pump(
    mut events: broadcast::Receiver<SlotEvent>,
    store: Arc<SlotStore>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => store.apply(&event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Slot event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
