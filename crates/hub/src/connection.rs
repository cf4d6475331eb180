//! The live hub connection.
//!
//! [`HubConnection`] owns a long-lived task that drives the WebSocket:
//! it writes commands, correlates replies to in-flight invocations by
//! id, fans push events out on a [`tokio::sync::broadcast`] channel,
//! and reconnects with backoff when the connection drops. After a
//! successful reconnect it re-joins the active day so push events
//! resume without caller involvement.
//!
//! A dropped connection resolves every in-flight invocation with
//! [`ChannelError::ConnectionLost`] -- the outcome of those calls is
//! unknown and callers must not assume the slot ended up held or free.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use turnero_core::events::SlotEvent;
use turnero_core::model::{DayContext, SlotKey};
use turnero_core::ports::{ChannelError, ConfirmReply, LockReply, SlotChannel};
use turnero_core::types::DbId;

use crate::client::{HubClient, HubStream};
use crate::messages::{parse_message, ClientMessage, ServerMessage};
use crate::reconnect::{reconnect_loop, ReconnectConfig};

/// Broadcast channel capacity for slot push events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long teardown waits for the connection task to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// An in-flight command handed to the connection task.
struct Invocation {
    message: ClientMessage,
    reply_tx: oneshot::Sender<ServerMessage>,
}

/// Handle state guarded by a mutex: present only while connected.
#[derive(Default)]
struct ConnectionState {
    cmd_tx: Option<mpsc::UnboundedSender<Invocation>>,
    task: Option<JoinHandle<()>>,
    active_day: Option<DayContext>,
}

/// The persistent, reconnecting connection to the appointment hub.
///
/// Constructed per booking screen and disposed on teardown via
/// [`disconnect`](HubConnection::disconnect); it is not a shared
/// singleton.
pub struct HubConnection {
    client: HubClient,
    reconnect: ReconnectConfig,
    event_tx: broadcast::Sender<SlotEvent>,
    next_id: Arc<AtomicU64>,
    cancel: CancellationToken,
    state: Mutex<ConnectionState>,
}

impl HubConnection {
    /// Create a connection handle. No network activity happens until
    /// [`connect`](Self::connect).
    pub fn new(client: HubClient) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client,
            reconnect: ReconnectConfig::default(),
            event_tx,
            next_id: Arc::new(AtomicU64::new(1)),
            cancel: CancellationToken::new(),
            state: Mutex::new(ConnectionState::default()),
        }
    }

    /// Override the reconnection backoff parameters.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Establish the connection and spawn the connection task.
    ///
    /// Idempotent: a second call while connected is a no-op.
    pub async fn connect(&self, token: &str) -> Result<(), ChannelError> {
        let mut state = self.state.lock().await;
        if state.cmd_tx.is_some() {
            tracing::debug!("Hub connect called while already connected");
            return Ok(());
        }

        let socket = self
            .client
            .connect(token)
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(
            self.client.clone(),
            token.to_owned(),
            socket.ws_stream,
            cmd_rx,
            self.event_tx.clone(),
            Arc::clone(&self.next_id),
            self.reconnect.clone(),
            self.cancel.child_token(),
        ));

        state.cmd_tx = Some(cmd_tx);
        state.task = Some(task);
        Ok(())
    }

    /// Tear the connection down and wait briefly for the task to exit.
    ///
    /// Terminal: the handle belongs to one screen lifetime and is not
    /// reused after teardown.
    pub async fn disconnect(&self) {
        self.cancel.cancel();

        let mut state = self.state.lock().await;
        state.cmd_tx = None;
        state.active_day = None;
        if let Some(task) = state.task.take() {
            let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, task).await;
        }
        tracing::info!("Hub connection closed");
    }

    /// Allocate the next invocation id.
    fn next_invocation_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a command and wait for the correlated reply.
    async fn invoke(&self, message: ClientMessage) -> Result<ServerMessage, ChannelError> {
        let cmd_tx = self
            .state
            .lock()
            .await
            .cmd_tx
            .clone()
            .ok_or(ChannelError::NotConnected)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(Invocation { message, reply_tx })
            .map_err(|_| ChannelError::NotConnected)?;

        // A dropped sender means the connection died with the call in
        // flight: unknown outcome.
        reply_rx.await.map_err(|_| ChannelError::ConnectionLost)
    }

    /// Invoke and require a bare [`ServerMessage::Ack`] reply.
    async fn invoke_expecting_ack(&self, message: ClientMessage) -> Result<(), ChannelError> {
        match self.invoke(message).await? {
            ServerMessage::Ack { .. } => Ok(()),
            other => Err(ChannelError::Transport(format!(
                "unexpected reply to command: {other:?}"
            ))),
        }
    }

    /// Build a full slot key for `time_block` from the active context.
    async fn slot_key(&self, time_block: &str) -> Result<SlotKey, ChannelError> {
        let state = self.state.lock().await;
        let ctx = state.active_day.ok_or(ChannelError::NoActiveDay)?;
        Ok(SlotKey {
            resource_schedule_id: ctx.resource_schedule_id,
            date: ctx.date,
            time_block: time_block.to_string(),
        })
    }
}

#[async_trait]
impl SlotChannel for HubConnection {
    async fn connect(&self, token: &str) -> Result<(), ChannelError> {
        HubConnection::connect(self, token).await
    }

    async fn join_day(
        &self,
        resource_schedule_id: DbId,
        date: NaiveDate,
    ) -> Result<(), ChannelError> {
        {
            let mut state = self.state.lock().await;
            if state.cmd_tx.is_none() {
                return Err(ChannelError::NotConnected);
            }
            state.active_day = Some(DayContext {
                resource_schedule_id,
                date,
            });
        }

        self.invoke_expecting_ack(ClientMessage::JoinDay {
            id: self.next_invocation_id(),
            resource_schedule_id,
            date,
        })
        .await?;

        tracing::info!(resource_schedule_id, %date, "Joined day");
        Ok(())
    }

    async fn leave_day(&self) -> Result<(), ChannelError> {
        // Clear the context first so a reconnect racing this call
        // cannot re-join a day we are abandoning.
        let ctx = {
            let mut state = self.state.lock().await;
            if state.cmd_tx.is_none() {
                return Ok(());
            }
            match state.active_day.take() {
                Some(ctx) => ctx,
                None => return Ok(()),
            }
        };

        self.invoke_expecting_ack(ClientMessage::LeaveDay {
            id: self.next_invocation_id(),
            resource_schedule_id: ctx.resource_schedule_id,
            date: ctx.date,
        })
        .await?;

        tracing::info!(
            resource_schedule_id = ctx.resource_schedule_id,
            date = %ctx.date,
            "Left day",
        );
        Ok(())
    }

    async fn lock(&self, time_block: &str) -> Result<LockReply, ChannelError> {
        let slot = self.slot_key(time_block).await?;
        match self
            .invoke(ClientMessage::LockSlot {
                id: self.next_invocation_id(),
                slot,
            })
            .await?
        {
            ServerMessage::LockResult { locked, .. } => Ok(LockReply { locked }),
            other => Err(ChannelError::Transport(format!(
                "unexpected reply to LockSlot: {other:?}"
            ))),
        }
    }

    async fn unlock(&self, time_block: &str) -> Result<(), ChannelError> {
        let slot = self.slot_key(time_block).await?;
        self.invoke_expecting_ack(ClientMessage::UnlockSlot {
            id: self.next_invocation_id(),
            slot,
        })
        .await
    }

    async fn confirm(
        &self,
        time_block: &str,
        beneficiary_person_id: Option<DbId>,
    ) -> Result<ConfirmReply, ChannelError> {
        let slot = self.slot_key(time_block).await?;
        match self
            .invoke(ClientMessage::ConfirmSlot {
                id: self.next_invocation_id(),
                slot,
                beneficiary_person_id,
            })
            .await?
        {
            ServerMessage::ConfirmResult {
                success,
                reason,
                appointment_id,
                ..
            } => Ok(ConfirmReply {
                success,
                reason,
                appointment_id,
            }),
            other => Err(ChannelError::Transport(format!(
                "unexpected reply to ConfirmSlot: {other:?}"
            ))),
        }
    }

    fn events(&self) -> broadcast::Receiver<SlotEvent> {
        self.event_tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

/// Why the per-connection processing loop exited.
enum Exit {
    /// Cancellation: close the socket and end the task.
    Teardown,
    /// The connection dropped: fail in-flight calls and reconnect.
    ConnectionLost,
}

/// Core connection loop: process frames and commands, reconnect on
/// drop, re-join the active day once restored.
#[allow(clippy::too_many_arguments)]
async fn run_connection(
    client: HubClient,
    token: String,
    mut socket: HubStream,
    mut cmd_rx: mpsc::UnboundedReceiver<Invocation>,
    event_tx: broadcast::Sender<SlotEvent>,
    next_id: Arc<AtomicU64>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut pending: HashMap<u64, oneshot::Sender<ServerMessage>> = HashMap::new();
    let mut active_day: Option<(DbId, NaiveDate)> = None;

    loop {
        let exit = process_until_drop(
            &mut socket,
            &mut cmd_rx,
            &mut pending,
            &mut active_day,
            &event_tx,
            &cancel,
        )
        .await;

        // Dropping the reply senders resolves every in-flight call
        // with ConnectionLost: their outcome is unknown.
        pending.clear();

        match exit {
            Exit::Teardown => {
                let _ = socket.close(None).await;
                return;
            }
            Exit::ConnectionLost => {}
        }

        tracing::warn!("Hub connection lost, entering reconnect loop");
        let Some(restored) = reconnect_loop(&client, &token, &reconnect, &cancel).await else {
            return; // cancelled
        };
        socket = restored.ws_stream;

        // Re-register interest so push events resume for the day the
        // caller was watching.
        if let Some((resource_schedule_id, date)) = active_day {
            let join = ClientMessage::JoinDay {
                id: next_id.fetch_add(1, Ordering::Relaxed),
                resource_schedule_id,
                date,
            };
            match serde_json::to_string(&join) {
                Ok(json) => {
                    if socket.send(Message::Text(json)).await.is_err() {
                        continue; // dropped again; back to reconnect
                    }
                    tracing::info!(resource_schedule_id, %date, "Re-joined day after reconnect");
                }
                Err(e) => tracing::error!(error = %e, "Failed to encode re-join message"),
            }
        }
    }
}

/// Pump one socket until it drops or the task is cancelled.
async fn process_until_drop(
    socket: &mut HubStream,
    cmd_rx: &mut mpsc::UnboundedReceiver<Invocation>,
    pending: &mut HashMap<u64, oneshot::Sender<ServerMessage>>,
    active_day: &mut Option<(DbId, NaiveDate)>,
    event_tx: &broadcast::Sender<SlotEvent>,
    cancel: &CancellationToken,
) -> Exit {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Exit::Teardown,

            cmd = cmd_rx.recv() => match cmd {
                // Every handle is gone; nothing can issue commands.
                None => return Exit::Teardown,
                Some(Invocation { message, reply_tx }) => {
                    track_active_day(&message, active_day);

                    let id = message.invocation_id();
                    let json = match serde_json::to_string(&message) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode hub command");
                            continue;
                        }
                    };

                    pending.insert(id, reply_tx);
                    if let Err(e) = socket.send(Message::Text(json)).await {
                        tracing::warn!(error = %e, "Hub send failed");
                        return Exit::ConnectionLost;
                    }
                }
            },

            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_frame(&text, pending, event_tx),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    // Handled automatically by tungstenite.
                }
                Some(Ok(Message::Binary(_))) => {
                    tracing::trace!("Ignoring binary hub frame");
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Hub WebSocket closed");
                    return Exit::ConnectionLost;
                }
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Hub receive error");
                    return Exit::ConnectionLost;
                }
                None => return Exit::ConnectionLost,
            },
        }
    }
}

/// Mirror the caller's day context inside the task so a reconnect can
/// re-join without reaching back into the handle.
fn track_active_day(message: &ClientMessage, active_day: &mut Option<(DbId, NaiveDate)>) {
    match message {
        ClientMessage::JoinDay {
            resource_schedule_id,
            date,
            ..
        } => *active_day = Some((*resource_schedule_id, *date)),
        ClientMessage::LeaveDay { .. } => *active_day = None,
        _ => {}
    }
}

/// Dispatch one parsed text frame: replies resolve their pending
/// invocation, pushes fan out to subscribers.
fn handle_frame(
    text: &str,
    pending: &mut HashMap<u64, oneshot::Sender<ServerMessage>>,
    event_tx: &broadcast::Sender<SlotEvent>,
) {
    match parse_message(text) {
        Ok(msg) => {
            if let Some(id) = msg.reply_id() {
                match pending.remove(&id) {
                    // The caller may have given up; a closed oneshot is fine.
                    Some(reply_tx) => {
                        let _ = reply_tx.send(msg);
                    }
                    None => tracing::debug!(id, "Reply with no pending invocation"),
                }
            } else if let Some(event) = msg.into_slot_event() {
                // Zero receivers just means no store is listening yet.
                let _ = event_tx.send(event);
            }
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                raw_message = %text,
                "Failed to parse hub message",
            );
        }
    }
}
