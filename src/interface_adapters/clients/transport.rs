// Client connection actor: one websocket, reconnects on a fixed interval until told to stop.

use crate::domain::ArenaError;
use crate::interface_adapters::protocol::{self, Message};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};

pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(10_000);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub url: String,
    pub reconnect_interval: Duration,
    pub connect_timeout: Duration,
}

impl TransportConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Disconnected,
    Connecting,
    Connected,
    /// Explicitly disconnected; no retry is pending.
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected { explicit: bool },
    Message(Message),
}

/// At most one pending reconnect deadline.
#[derive(Debug, Clone)]
pub struct ReconnectTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl ReconnectTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    /// Schedules a retry one interval after `now`, replacing any pending one.
    pub fn schedule(&mut self, now: Instant) -> Instant {
        let at = now + self.interval;
        self.deadline = Some(at);
        at
    }

    /// Returns true when a pending retry was dropped.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consumes the pending retry once it is due.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
enum Command {
    Connect,
    Disconnect { ack: oneshot::Sender<()> },
    Send(String),
}

/// Handle to the transport actor. Dropping it stops the actor and closes the connection.
#[derive(Debug)]
pub struct Transport {
    commands: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<TransportState>,
}

impl Transport {
    /// Spawns the actor in the `Disconnected` state. Nothing is dialed until `connect`.
    pub fn spawn(config: TransportConfig) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(TransportState::Disconnected);

        let actor = TransportActor {
            timer: ReconnectTimer::new(config.reconnect_interval),
            config,
            commands: commands_rx,
            state_tx,
            events: events_tx,
        };
        tokio::spawn(actor.run());

        (Self { commands, state_rx }, events_rx)
    }

    pub fn state(&self) -> TransportState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<TransportState> {
        self.state_rx.clone()
    }

    /// Dials now, cancelling any pending retry.
    pub fn connect(&self) -> Result<(), ArenaError> {
        if self.state() == TransportState::Connected {
            error!("connect requested while already connected");
            return Err(ArenaError::DuplicateConnect);
        }
        self.commands
            .send(Command::Connect)
            .map_err(|_| ArenaError::TransportUnavailable)
    }

    /// Closes the connection for good and cancels any pending retry.
    ///
    /// Resolves once the actor has closed the channel. Idempotent.
    pub async fn disconnect(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Disconnect { ack }).is_err() {
            return;
        }
        let _ = done.await;
    }

    /// Writes one message if connected. Nothing is queued for later delivery.
    pub fn send(&self, message: &Message) -> Result<(), ArenaError> {
        if self.state() != TransportState::Connected {
            warn!(tag = message.tag(), "send while not connected; dropping");
            return Err(ArenaError::TransportUnavailable);
        }
        let txt = protocol::encode(message).map_err(|e| {
            error!(error = %e, tag = message.tag(), "failed to encode outbound message");
            ArenaError::MalformedFrame(e.to_string())
        })?;
        self.commands
            .send(Command::Send(txt))
            .map_err(|_| ArenaError::TransportUnavailable)
    }
}

// How a live connection ended.
enum Ended {
    Lost,
    Explicit(oneshot::Sender<()>),
    // The server sent `go_away`; already closed and never retried.
    Evicted,
    HandleDropped,
}

// How a connection attempt ended.
enum Dialed {
    Open(Box<WsStream>),
    Failed,
    Aborted(oneshot::Sender<()>),
    HandleDropped,
}

struct TransportActor {
    config: TransportConfig,
    timer: ReconnectTimer,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<TransportState>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportActor {
    async fn run(mut self) {
        loop {
            // Idle: wait for an explicit connect or the pending retry.
            let deadline = self.timer.deadline();
            let dial = tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    None => break,
                    Some(Command::Connect) => {
                        if self.timer.cancel() {
                            debug!("pending retry cancelled by connect");
                        }
                        true
                    }
                    Some(Command::Disconnect { ack }) => {
                        self.timer.cancel();
                        self.set_state(TransportState::Closed);
                        let _ = ack.send(());
                        false
                    }
                    Some(Command::Send(_)) => {
                        warn!("send while not connected; dropping");
                        false
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.timer.take_due(Instant::now())
                }
            };
            if !dial {
                continue;
            }

            match self.dial().await {
                Dialed::Open(ws) => {
                    info!(url = %self.config.url, "connected");
                    self.set_state(TransportState::Connected);
                    self.emit(TransportEvent::Connected);

                    match self.pump(*ws).await {
                        Ended::Lost => self.lost(),
                        Ended::Explicit(ack) => {
                            info!(url = %self.config.url, "disconnected");
                            self.closed();
                            let _ = ack.send(());
                        }
                        Ended::Evicted => {
                            info!(url = %self.config.url, "evicted by server");
                            self.emit(TransportEvent::Disconnected { explicit: true });
                        }
                        Ended::HandleDropped => break,
                    }
                }
                Dialed::Failed => self.lost(),
                Dialed::Aborted(ack) => {
                    info!(url = %self.config.url, "connect aborted");
                    self.closed();
                    let _ = ack.send(());
                }
                Dialed::HandleDropped => break,
            }
        }
        debug!("transport actor exiting");
    }

    async fn dial(&mut self) -> Dialed {
        self.set_state(TransportState::Connecting);
        let attempt = timeout(self.config.connect_timeout, connect_async(self.config.url.as_str()));
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                res = &mut attempt => {
                    return match res {
                        Ok(Ok((ws, _))) => Dialed::Open(Box::new(ws)),
                        Ok(Err(e)) => {
                            warn!(url = %self.config.url, error = %e, "connect failed");
                            Dialed::Failed
                        }
                        Err(_) => {
                            warn!(url = %self.config.url, "connect timed out");
                            Dialed::Failed
                        }
                    };
                }
                cmd = self.commands.recv() => match cmd {
                    None => return Dialed::HandleDropped,
                    Some(Command::Disconnect { ack }) => return Dialed::Aborted(ack),
                    Some(Command::Connect) => debug!("connect already in progress"),
                    Some(Command::Send(_)) => warn!("send while connecting; dropping"),
                }
            }
        }
    }

    async fn pump(&mut self, ws: WsStream) -> Ended {
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                msg = stream.next() => match msg {
                    Some(Ok(WsMessage::Text(txt))) => match protocol::decode(txt.as_str()) {
                        Ok(message @ Message::GoAway(_)) => {
                            // Closed before anyone can observe the eviction.
                            self.timer.cancel();
                            let _ = sink.send(WsMessage::Close(None)).await;
                            let _ = sink.close().await;
                            self.set_state(TransportState::Closed);
                            self.emit(TransportEvent::Message(message));
                            return Ended::Evicted;
                        }
                        Ok(message) => self.emit(TransportEvent::Message(message)),
                        // One bad frame does not cost the connection.
                        Err(e) => warn!(error = %e, bytes = txt.len(), "dropping undecodable frame"),
                    },
                    Some(Ok(WsMessage::Binary(_))) => warn!("dropping binary frame"),
                    Some(Ok(WsMessage::Close(frame))) => {
                        info!(?frame, "server closed connection");
                        return Ended::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket error");
                        return Ended::Lost;
                    }
                    None => {
                        info!("connection closed");
                        return Ended::Lost;
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    Some(Command::Send(txt)) => {
                        if let Err(e) = sink.send(WsMessage::Text(txt.into())).await {
                            warn!(error = %e, "failed to send message");
                            return Ended::Lost;
                        }
                    }
                    Some(Command::Connect) => error!("connect requested while already connected"),
                    Some(Command::Disconnect { ack }) => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        let _ = sink.close().await;
                        return Ended::Explicit(ack);
                    }
                    None => {
                        let _ = sink.close().await;
                        return Ended::HandleDropped;
                    }
                },
            }
        }
    }

    fn lost(&mut self) {
        let at = self.timer.schedule(Instant::now());
        debug!(
            retry_in_ms = at.saturating_duration_since(Instant::now()).as_millis() as u64,
            "reconnect scheduled"
        );
        self.set_state(TransportState::Disconnected);
        self.emit(TransportEvent::Disconnected { explicit: false });
    }

    fn closed(&mut self) {
        self.timer.cancel();
        self.set_state(TransportState::Closed);
        self.emit(TransportEvent::Disconnected { explicit: true });
    }

    fn set_state(&self, state: TransportState) {
        self.state_tx.send_replace(state);
    }

    fn emit(&self, event: TransportEvent) {
        // The receiver going away only means nobody listens anymore.
        let _ = self.events.send(event);
    }
}
