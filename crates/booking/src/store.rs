//! Client-side slot state store.
//!
//! One [`SlotStore`] holds the currently joined day's records, keyed
//! by time block. Server push events are applied unconditionally --
//! the server is the single arbiter of lock ownership and the store is
//! a read-through cache any event may overwrite, including local
//! optimistic state. Events for a different resource or calendar day
//! are stale leftovers from a previous context and are dropped without
//! an emission.
//!
//! Every mutation publishes the full list, sorted ascending by time
//! block, on a [`tokio::sync::watch`] channel: new subscribers see the
//! latest snapshot immediately, then every subsequent emission.

use std::collections::HashMap;

use tokio::sync::{watch, RwLock};

use turnero_core::events::SlotEvent;
use turnero_core::model::{DayContext, SlotRecord};

struct StoreInner {
    context: Option<DayContext>,
    blocks: HashMap<String, SlotRecord>,
}

/// In-memory authoritative client-side map of the joined day's slots.
pub struct SlotStore {
    inner: RwLock<StoreInner>,
    snapshot_tx: watch::Sender<Vec<SlotRecord>>,
}

impl SlotStore {
    /// Create an empty store with no active context. All events are
    /// dropped until a context is set.
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Vec::new());
        Self {
            inner: RwLock::new(StoreInner {
                context: None,
                blocks: HashMap::new(),
            }),
            snapshot_tx,
        }
    }

    /// Set (or clear) the active day context used to filter incoming
    /// events. Does not touch the records; callers replace them via
    /// [`set_blocks`](Self::set_blocks).
    pub async fn set_context(&self, context: Option<DayContext>) {
        self.inner.write().await.context = context;
    }

    /// The currently active day context, if any.
    pub async fn context(&self) -> Option<DayContext> {
        self.inner.read().await.context
    }

    /// Replace the entire record set, keyed by time block. Used after
    /// the initial fetch and on every day switch. Emits.
    pub async fn set_blocks(&self, list: Vec<SlotRecord>) {
        let mut inner = self.inner.write().await;
        inner.blocks = list
            .into_iter()
            .map(|record| (record.time_block.clone(), record))
            .collect();
        self.emit(&inner);
    }

    /// Reconcile one server push event into the store.
    ///
    /// Out-of-context events and events for time blocks outside the
    /// loaded range are ignored without an emission.
    pub async fn apply(&self, event: &SlotEvent) {
        let mut inner = self.inner.write().await;

        let in_context = inner
            .context
            .is_some_and(|ctx| ctx.matches(event.slot()));
        if !in_context {
            tracing::debug!(
                time_block = %event.slot().time_block,
                "Dropping out-of-context slot event",
            );
            return;
        }

        let Some(record) = inner.blocks.get_mut(&event.slot().time_block) else {
            // Slot outside the currently loaded range.
            return;
        };

        match event {
            SlotEvent::Locked {
                lock_owner_user_id,
                locked_until,
                ..
            } => {
                record.is_available = false;
                record.locked_by_user_id = Some(*lock_owner_user_id);
                record.locked_until = Some(*locked_until);
            }
            SlotEvent::Unlocked { .. } => {
                // Availability comes back only when the slot is not
                // separately booked.
                record.is_available = record.booked_appointment_id.is_none();
                record.locked_by_user_id = None;
                record.locked_until = None;
            }
            SlotEvent::Booked { appointment_id, .. } => {
                record.is_available = false;
                record.booked_appointment_id = Some(*appointment_id);
            }
        }

        self.emit(&inner);
    }

    /// Current records sorted ascending by time block.
    pub async fn snapshot(&self) -> Vec<SlotRecord> {
        sorted(&self.inner.read().await.blocks)
    }

    /// Look up one record by time block.
    pub async fn get(&self, time_block: &str) -> Option<SlotRecord> {
        self.inner.read().await.blocks.get(time_block).cloned()
    }

    /// Subscribe to snapshot emissions. The receiver immediately holds
    /// the latest snapshot; each mutation marks it changed.
    pub fn subscribe(&self) -> watch::Receiver<Vec<SlotRecord>> {
        self.snapshot_tx.subscribe()
    }

    fn emit(&self, inner: &StoreInner) {
        // send_replace stores the value even with zero subscribers.
        self.snapshot_tx.send_replace(sorted(&inner.blocks));
    }
}

impl Default for SlotStore {
    fn default() -> Self {
        Self::new()
    }
}

/// The full record list sorted ascending by time block. Lexicographic
/// order is correct for the fixed `"HH:MM[:SS]"` format.
fn sorted(blocks: &HashMap<String, SlotRecord>) -> Vec<SlotRecord> {
    let mut list: Vec<SlotRecord> = blocks.values().cloned().collect();
    list.sort_by(|a, b| a.time_block.cmp(&b.time_block));
    list
}
