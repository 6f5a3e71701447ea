// Typed protocol layer over the transport: inbound frames become client events, intents
// become wire messages.

use super::transport::{Transport, TransportConfig, TransportEvent};
use crate::domain::{ArenaError, Vector2};
use crate::interface_adapters::protocol::Message;
use crate::use_cases::{ServerLink, SocketEvent};
use tokio::sync::mpsc;
use tracing::warn;

pub struct ProtocolSocket {
    transport: Transport,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl ProtocolSocket {
    pub fn new(transport: Transport, events: mpsc::UnboundedReceiver<TransportEvent>) -> Self {
        Self { transport, events }
    }

    /// Spawns a transport for `config` and dials it.
    pub fn open(config: TransportConfig) -> Result<Self, ArenaError> {
        let (transport, events) = Transport::spawn(config);
        transport.connect()?;
        Ok(Self::new(transport, events))
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Next typed event; `None` once the transport actor is gone.
    ///
    /// By the time a `go_away` is returned the transport is already closed.
    pub async fn next_event(&mut self) -> Option<SocketEvent> {
        loop {
            let event = match self.events.recv().await? {
                TransportEvent::Connected => SocketEvent::Connected,
                TransportEvent::Disconnected { explicit } => SocketEvent::Disconnected { explicit },
                TransportEvent::Message(message) => match self.dispatch(message) {
                    Some(event) => event,
                    None => continue,
                },
            };
            return Some(event);
        }
    }

    fn dispatch(&self, message: Message) -> Option<SocketEvent> {
        if let Some(event) = message.world_event() {
            return Some(SocketEvent::World(event));
        }
        match message {
            Message::Welcome(payload) => Some(SocketEvent::Welcome(payload.into())),
            Message::WorldState(payload) => Some(SocketEvent::WorldState((&payload).into())),
            // The transport closed itself before handing this over.
            Message::GoAway(payload) => Some(SocketEvent::GoAway {
                reason: payload.reason,
            }),
            other => {
                warn!(tag = other.tag(), "ignoring server-bound message echoed by server");
                None
            }
        }
    }

    /// Sends `start_moving` with the normalized direction.
    pub fn start_moving(&self, direction: Vector2) -> Result<(), ArenaError> {
        self.transport
            .send(&Message::start_moving(direction.normalize()))
    }

    pub fn stop_moving(&self) -> Result<(), ArenaError> {
        self.transport.send(&Message::StopMoving)
    }

    /// Sends `fire` with the normalized aim.
    pub fn fire(&self, aim: Vector2) -> Result<(), ArenaError> {
        self.transport.send(&Message::fire(aim.normalize()))
    }
}

impl ServerLink for ProtocolSocket {
    async fn next_event(&mut self) -> Option<SocketEvent> {
        ProtocolSocket::next_event(self).await
    }

    fn start_moving(&self, direction: Vector2) -> Result<(), ArenaError> {
        ProtocolSocket::start_moving(self, direction)
    }

    fn stop_moving(&self) -> Result<(), ArenaError> {
        ProtocolSocket::stop_moving(self)
    }

    fn fire(&self, aim: Vector2) -> Result<(), ArenaError> {
        ProtocolSocket::fire(self, aim)
    }
}
