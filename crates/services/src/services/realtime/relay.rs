use std::{
    collections::{BTreeSet, HashMap},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use axum::extract::ws::Message;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use utils::{
    config::RelayConfig,
    relay_msg::{ClientMessage, EventError, RelayEvent, RoomKey, RoomKeyError, id_from_value},
};

use super::rooms::{ConnectionId, RoomRegistry};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed frame: {0}")]
    MalformedFrame(serde_json::Error),
    #[error(transparent)]
    InvalidRoom(#[from] RoomKeyError),
    #[error(transparent)]
    InvalidEvent(#[from] EventError),
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
    #[error("client-emitted events are disabled")]
    ClientEventsDisabled,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub rooms: Vec<RoomKey>,
    pub delivered: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct RelayState {
    registry: RoomRegistry,
    outboxes: HashMap<ConnectionId, mpsc::Sender<Message>>,
}

/// Fans relay events out to the members of their target rooms.
///
/// Delivery is at-most-once and best effort: each connection owns a bounded
/// outbox, and a frame that does not fit (or whose receiver is gone) is
/// dropped for that connection only. Fan-outs are serialized by a single
/// lock, so members of a room observe events in publish order.
#[derive(Clone)]
pub struct Relay {
    state: Arc<Mutex<RelayState>>,
    next_id: Arc<AtomicU64>,
    config: RelayConfig,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(RelayState::default())),
            next_id: Arc::new(AtomicU64::new(1)),
            config,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Registers a new connection and returns its outbound frame stream.
    ///
    /// Dropping the returned guard disconnects the connection.
    pub fn connect(&self) -> (ConnectionGuard, mpsc::Receiver<Message>) {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        self.state.lock().outboxes.insert(id, tx);
        info!(connection_id = %id, "Connection opened");
        (
            ConnectionGuard {
                id,
                relay: self.clone(),
            },
            rx,
        )
    }

    /// Removes `connection` from every room and closes its outbox.
    pub fn disconnect(&self, connection: ConnectionId) {
        let mut state = self.state.lock();
        let left = state.registry.on_disconnect(connection);
        if state.outboxes.remove(&connection).is_some() {
            info!(connection_id = %connection, rooms = left.len(), "Connection closed");
        }
    }

    pub fn join(&self, connection: ConnectionId, room: RoomKey) -> Result<bool, RelayError> {
        let mut state = self.state.lock();
        if !state.outboxes.contains_key(&connection) {
            return Err(RelayError::UnknownConnection(connection));
        }
        debug!(connection_id = %connection, room = %room, "Joining room");
        Ok(state.registry.join(connection, room))
    }

    pub fn leave(&self, connection: ConnectionId, room: &RoomKey) -> bool {
        debug!(connection_id = %connection, room = %room, "Leaving room");
        self.state.lock().registry.leave(connection, room)
    }

    pub fn members_of(&self, room: &RoomKey) -> Vec<ConnectionId> {
        self.state.lock().registry.members_of(room)
    }

    pub fn rooms_of(&self, connection: ConnectionId) -> Vec<RoomKey> {
        self.state.lock().registry.rooms_of(connection)
    }

    pub fn user_of(&self, connection: ConnectionId) -> Option<String> {
        self.state
            .lock()
            .registry
            .user_of(connection)
            .map(str::to_string)
    }

    pub fn connection_count(&self) -> usize {
        self.state.lock().outboxes.len()
    }

    /// Publishes a store-backed event from a mutation handler.
    pub fn publish(&self, event: &RelayEvent) -> Result<Delivery, RelayError> {
        self.fan_out(event, None)
    }

    /// Re-broadcasts an event emitted by a client to everyone but the client.
    pub fn relay_from_client(
        &self,
        origin: ConnectionId,
        event: &RelayEvent,
    ) -> Result<Delivery, RelayError> {
        if !self.config.accept_client_events {
            return Err(RelayError::ClientEventsDisabled);
        }
        self.fan_out(event, Some(origin))
    }

    /// Applies one inbound frame of `connection`.
    ///
    /// Returns the fan-out report when the frame was an event.
    pub fn handle_client_message(
        &self,
        connection: ConnectionId,
        message: ClientMessage,
    ) -> Result<Option<Delivery>, RelayError> {
        let command = match message.into_event() {
            Ok(event) => return self.relay_from_client(connection, &event).map(Some),
            Err(command) => command,
        };
        match command {
            ClientMessage::JoinUserRoom(id) => {
                self.join(connection, RoomKey::User(id_from_value(&id)?))?;
            }
            ClientMessage::JoinProjectRoom(id) => {
                self.join(connection, RoomKey::Project(id_from_value(&id)?))?;
            }
            ClientMessage::LeaveProjectRoom(id) => {
                self.leave(connection, &RoomKey::Project(id_from_value(&id)?));
            }
            _ => {}
        }
        Ok(None)
    }

    /// Parses and applies a text frame. Faults are logged and ignored so a
    /// bad frame never tears down the connection.
    pub fn handle_text_frame(&self, connection: ConnectionId, text: &str) {
        let result = serde_json::from_str::<ClientMessage>(text)
            .map_err(RelayError::MalformedFrame)
            .and_then(|message| self.handle_client_message(connection, message));
        if let Err(e) = result {
            warn!(connection_id = %connection, error = %e, "Ignoring client frame");
        }
    }

    fn fan_out(
        &self,
        event: &RelayEvent,
        exclude: Option<ConnectionId>,
    ) -> Result<Delivery, RelayError> {
        let rooms = event.target_rooms()?;
        let message = event.to_ws_message()?;

        let state = self.state.lock();
        // A connection in several target rooms still receives the event once.
        let recipients: BTreeSet<ConnectionId> = rooms
            .iter()
            .flat_map(|room| state.registry.members_of(room))
            .filter(|member| Some(*member) != exclude)
            .collect();

        let mut delivery = Delivery {
            rooms,
            ..Default::default()
        };
        for recipient in recipients {
            let Some(outbox) = state.outboxes.get(&recipient) else {
                delivery.dropped += 1;
                continue;
            };
            match outbox.try_send(message.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(connection_id = %recipient, event = %event.kind, "Outbox full, dropping event");
                    delivery.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(connection_id = %recipient, event = %event.kind, "Outbox closed, dropping event");
                    delivery.dropped += 1;
                }
            }
        }

        debug!(
            event = %event.kind,
            rooms = ?delivery.rooms.iter().map(ToString::to_string).collect::<Vec<_>>(),
            delivered = delivery.delivered,
            dropped = delivery.dropped,
            "Event fanned out"
        );
        Ok(delivery)
    }
}

/// Registration of one live connection; disconnects it when dropped.
pub struct ConnectionGuard {
    id: ConnectionId,
    relay: Relay,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.relay.disconnect(self.id);
    }
}
