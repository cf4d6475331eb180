//! Scripted collaborator fakes for booking-flow tests.
//!
//! [`ScriptedChannel`] records every hub call and answers lock/confirm
//! from scripted reply queues (defaulting to success); push events are
//! injected through the same broadcast channel the real hub uses.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::broadcast;

use turnero_core::events::SlotEvent;
use turnero_core::model::{RelatedPerson, SlotRecord};
use turnero_core::ports::{
    AvailabilityProvider, ChannelError, ConfirmReply, FetchError, LockReply,
    RelatedPersonProvider, SlotChannel,
};
use turnero_core::types::DbId;

/// One recorded hub interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum HubCall {
    Connect,
    JoinDay {
        resource_schedule_id: DbId,
        date: NaiveDate,
    },
    LeaveDay,
    Lock {
        time_block: String,
    },
    Unlock {
        time_block: String,
    },
    Confirm {
        time_block: String,
        beneficiary_person_id: Option<DbId>,
    },
}

/// A recording [`SlotChannel`] with scripted replies.
pub struct ScriptedChannel {
    calls: Mutex<Vec<HubCall>>,
    connect_failure: Mutex<Option<ChannelError>>,
    lock_replies: Mutex<VecDeque<Result<LockReply, ChannelError>>>,
    confirm_replies: Mutex<VecDeque<Result<ConfirmReply, ChannelError>>>,
    event_tx: broadcast::Sender<SlotEvent>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            calls: Mutex::new(Vec::new()),
            connect_failure: Mutex::new(None),
            lock_replies: Mutex::new(VecDeque::new()),
            confirm_replies: Mutex::new(VecDeque::new()),
            event_tx,
        }
    }

    pub fn fail_next_connect(&self, error: ChannelError) {
        *self.connect_failure.lock().unwrap() = Some(error);
    }

    pub fn script_lock(&self, reply: Result<LockReply, ChannelError>) {
        self.lock_replies.lock().unwrap().push_back(reply);
    }

    pub fn script_confirm(&self, reply: Result<ConfirmReply, ChannelError>) {
        self.confirm_replies.lock().unwrap().push_back(reply);
    }

    /// Inject a push event as if the server had sent it.
    pub fn push_event(&self, event: SlotEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn calls(&self) -> Vec<HubCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn unlock_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, HubCall::Unlock { .. }))
            .count()
    }

    pub fn confirm_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, HubCall::Confirm { .. }))
            .count()
    }

    fn record(&self, call: HubCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SlotChannel for ScriptedChannel {
    async fn connect(&self, _token: &str) -> Result<(), ChannelError> {
        self.record(HubCall::Connect);
        match self.connect_failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn join_day(
        &self,
        resource_schedule_id: DbId,
        date: NaiveDate,
    ) -> Result<(), ChannelError> {
        self.record(HubCall::JoinDay {
            resource_schedule_id,
            date,
        });
        Ok(())
    }

    async fn leave_day(&self) -> Result<(), ChannelError> {
        self.record(HubCall::LeaveDay);
        Ok(())
    }

    async fn lock(&self, time_block: &str) -> Result<LockReply, ChannelError> {
        self.record(HubCall::Lock {
            time_block: time_block.to_string(),
        });
        self.lock_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(LockReply { locked: true }))
    }

    async fn unlock(&self, time_block: &str) -> Result<(), ChannelError> {
        self.record(HubCall::Unlock {
            time_block: time_block.to_string(),
        });
        Ok(())
    }

    async fn confirm(
        &self,
        time_block: &str,
        beneficiary_person_id: Option<DbId>,
    ) -> Result<ConfirmReply, ChannelError> {
        self.record(HubCall::Confirm {
            time_block: time_block.to_string(),
            beneficiary_person_id,
        });
        self.confirm_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ConfirmReply {
                success: true,
                reason: None,
                appointment_id: Some(99),
            }))
    }

    fn events(&self) -> broadcast::Receiver<SlotEvent> {
        self.event_tx.subscribe()
    }
}

/// A recording [`AvailabilityProvider`] answering from a queue.
pub struct ScriptedAvailability {
    calls: Mutex<Vec<(DbId, NaiveDate, bool)>>,
    responses: Mutex<VecDeque<Result<Vec<SlotRecord>, FetchError>>>,
}

impl ScriptedAvailability {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
        }
    }

    pub fn script(&self, response: Result<Vec<SlotRecord>, FetchError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> Vec<(DbId, NaiveDate, bool)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AvailabilityProvider for ScriptedAvailability {
    async fn available_blocks(
        &self,
        appointment_type_id: DbId,
        date: NaiveDate,
        include_occupied: bool,
    ) -> Result<Vec<SlotRecord>, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((appointment_type_id, date, include_occupied));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Vec::new()))
    }
}

/// A fixed [`RelatedPersonProvider`].
pub struct FixedPersons {
    persons: Vec<RelatedPerson>,
}

impl FixedPersons {
    pub fn none() -> Self {
        Self {
            persons: Vec::new(),
        }
    }

    pub fn with(persons: Vec<RelatedPerson>) -> Self {
        Self { persons }
    }
}

#[async_trait]
impl RelatedPersonProvider for FixedPersons {
    async fn related_persons(&self) -> Result<Vec<RelatedPerson>, FetchError> {
        Ok(self.persons.clone())
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn record(time_block: &str, resource_schedule_id: DbId, available: bool) -> SlotRecord {
    SlotRecord {
        time_block: time_block.to_string(),
        is_available: available,
        booked_appointment_id: None,
        locked_by_user_id: None,
        locked_until: None,
        resource_schedule_id,
    }
}

pub fn person(id: DbId, full_name: &str) -> RelatedPerson {
    RelatedPerson {
        id,
        full_name: full_name.to_string(),
        relationship: None,
    }
}
