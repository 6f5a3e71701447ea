use crate::domain::Vector2;
use crate::interface_adapters::protocol::{self, Message as WireMessage};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::conn_id;
use crate::use_cases::{GameEvent, Intent, JoinReply, WorldUpdate};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    WorldUpdatesClosed,
    Rejected(String),
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    // Separate connection id for correlating logs before/after a player_id exists.
    let id = conn_id();
    let span = info_span!("conn", conn_id = id, player_id = tracing::field::Empty);

    async move {
        let mut ctx = match bootstrap_connection(&mut socket, &state).await {
            Ok(ctx) => ctx,
            Err(NetError::Rejected(reason)) => {
                info!(%reason, "join rejected");
                return;
            }
            Err(e) => {
                error!(error = ?e, "failed to bootstrap connection");
                let _ = send_close_with_reason(&mut socket, close_code::ERROR, "bootstrap failed")
                    .await;
                return;
            }
        };

        tracing::Span::current().record("player_id", ctx.player_id);
        info!(player_id = ctx.player_id, "client connected");

        // Main Client Loop
        if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
            warn!(error = ?e, "client loop exited with error");
        }
    }
    .instrument(span)
    .await
}

async fn send_message(socket: &mut WebSocket, msg: &WireMessage) -> Result<usize, NetError> {
    // Serialize message safely; log JSON errors instead of panicking
    let txt = protocol::encode(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub player_id: u32,
    pub input_tx: mpsc::Sender<GameEvent>,
    pub updates: broadcast::Receiver<Arc<WorldUpdate>>,
    pub world_latest_rx: watch::Receiver<Arc<WorldUpdate>>,
    // Count lag recovery snapshots sent to this client.
    pub lag_recovery_count: u64,
    // Tick of the last lag recovery snapshot; backlog at or before it is dropped.
    pub resynced_at: Option<u64>,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_frames: u32,

    pub last_input_full_log: Instant,
    pub last_world_lag_log: Instant,
    pub last_invalid_input_log: Instant,

    // Sent as `go_away` right before closing.
    pub eviction: Option<&'static str>,
    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &AppState,
) -> Result<ConnCtx, NetError> {
    // The world task replies with a baseline and a subscription that starts right after it.
    let (reply_tx, reply_rx) = oneshot::channel();
    state
        .input_tx
        .send(GameEvent::Join { reply: reply_tx })
        .await
        .map_err(|_| NetError::InputClosed)?;
    let reply = reply_rx.await.map_err(|_| NetError::InputClosed)?;

    let (welcome, baseline, updates) = match reply {
        JoinReply::Admitted {
            welcome,
            baseline,
            updates,
        } => (welcome, baseline, updates),
        JoinReply::Rejected { reason } => {
            let _ = send_message(socket, &WireMessage::go_away(reason.clone())).await;
            let _ = send_close_with_reason(socket, close_code::AGAIN, "server full").await;
            return Err(NetError::Rejected(reason));
        }
    };
    let player_id = welcome.id;

    // Send Welcome + Baseline
    // If either fails, compensate with Leave to avoid "joined but never connected".
    let mut bytes_out = 0;
    for msg in [
        WireMessage::Welcome(welcome.into()),
        WireMessage::WorldState((&baseline).into()),
    ] {
        match send_message(socket, &msg).await {
            Ok(bytes) => bytes_out += bytes as u64,
            Err(e) => {
                state
                    .input_tx
                    .send(GameEvent::Leave { player_id })
                    .await
                    .map_err(|_| NetError::InputClosed)?; // InputClosed takes precedence
                return Err(e);
            }
        }
    }

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        player_id,
        input_tx: state.input_tx.clone(),
        updates,
        world_latest_rx: state.world_latest_rx.clone(),
        lag_recovery_count: 0,
        resynced_at: None,

        msgs_in: 0,
        msgs_out: 2,
        bytes_in: 0,
        bytes_out,

        invalid_frames: 0,

        last_input_full_log: now,
        last_world_lag_log: now,
        last_invalid_input_log: now,

        eviction: None,
        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_FRAMES: u32 = 10;

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

// Vectors are normalized by the session; only non-finite components are refused here.
fn sanitize_intent(intent: Intent) -> Option<Intent> {
    let finite = |v: Vector2| v.x.is_finite() && v.y.is_finite();
    match intent {
        Intent::StartMoving(v) | Intent::Fire(v) if !finite(v) => None,
        other => Some(other),
    }
}

fn client_intent(msg: &WireMessage) -> Option<Intent> {
    match msg {
        WireMessage::StartMoving(p) => Some(Intent::StartMoving(p.into())),
        WireMessage::StopMoving => Some(Intent::StopMoving),
        WireMessage::Fire(p) => Some(Intent::Fire(p.into())),
        _ => None,
    }
}

fn process_intent(ctx: &mut ConnCtx, intent: Intent) -> Result<LoopControl, NetError> {
    let player_id = ctx.player_id;
    let Some(intent) = sanitize_intent(intent) else {
        if should_log(&mut ctx.last_invalid_input_log) {
            warn!(player_id, "invalid intent values (NaN/inf); dropping");
        }
        return Ok(LoopControl::Continue);
    };

    match ctx.input_tx.try_send(GameEvent::Intent { player_id, intent }) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_evt)) => {
            if should_log(&mut ctx.last_input_full_log) {
                warn!(player_id, "input channel full; dropping intent");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_evt)) => Err(NetError::InputClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let player_id = ctx.player_id;
    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming Message from Client
            incoming = socket.recv() => {
                match handle_incoming_ws(incoming, ctx) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            // Outgoing World Update
            update = ctx.updates.recv() => {
                match update {
                    Ok(update) if is_stale(&update, ctx.resynced_at) => false,
                    Ok(update) => {
                        ctx.resynced_at = None;
                        match forward_update(&update, socket, ctx).await {
                            LoopControl::Continue => false,
                            LoopControl::Disconnect => true,
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(&mut ctx.last_world_lag_log) {
                            warn!(missed = n, "world updates lagged; sending snapshot");
                        }

                        // Resync strategy: send the latest world snapshot.
                        let latest = ctx.world_latest_rx.borrow().clone();
                        if latest.snapshot.is_none() {
                            if should_log(&mut ctx.last_world_lag_log) {
                                warn!("world snapshot unavailable during lag recovery");
                            }
                            false
                        } else {
                            // Track how often we need to recover from lag.
                            ctx.lag_recovery_count += 1;
                            ctx.resynced_at = Some(latest.tick);
                            let outcome = forward_update(&latest, socket, ctx).await;
                            debug!(
                                player_id,
                                tick = latest.tick,
                                count = ctx.lag_recovery_count,
                                "sent lag recovery snapshot"
                            );

                            match outcome {
                                LoopControl::Continue => false,
                                LoopControl::Disconnect => true,
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::WorldUpdatesClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(reason) = ctx.eviction.take() {
                let _ = send_message(socket, &WireMessage::go_away(reason)).await;
            }
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(ctx).await {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    if let Some(err) = fatal {
        Err(err)
    } else {
        Ok(())
    }
}

fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let player_id = ctx.player_id;
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                let refused = match protocol::decode(text.as_str()) {
                    Ok(msg) => match client_intent(&msg) {
                        Some(intent) => return process_intent(ctx, intent),
                        None => format!("`{}` is not a client message", msg.tag()),
                    },
                    Err(e) => e.to_string(),
                };

                ctx.invalid_frames += 1;
                if should_log(&mut ctx.last_invalid_input_log) {
                    warn!(
                        player_id,
                        bytes = text.len(),
                        invalid = ctx.invalid_frames,
                        error = %refused,
                        "invalid client frame"
                    );
                }

                if ctx.invalid_frames >= MAX_INVALID_FRAMES {
                    ctx.eviction = Some("too many invalid messages");
                    ctx.close_frame = Some(CloseFrame {
                        code: close_code::POLICY,
                        reason: "too many invalid messages".into(),
                    });
                    return Ok(LoopControl::Disconnect);
                }

                Ok(LoopControl::Continue)
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(player_id, error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(player_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

// The receiver resumes at the oldest retained update after a lag; everything up to the
// recovery snapshot is already folded into it.
fn is_stale(update: &WorldUpdate, resynced_at: Option<u64>) -> bool {
    resynced_at.is_some_and(|tick| update.tick <= tick)
}

async fn forward_update(
    update: &WorldUpdate,
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
) -> LoopControl {
    for frame in update.frames_with(protocol::encode_update) {
        if let LoopControl::Disconnect = forward_frame(frame.clone(), socket, ctx).await {
            return LoopControl::Disconnect;
        }
    }
    LoopControl::Continue
}

async fn forward_frame(frame: Utf8Bytes, socket: &mut WebSocket, ctx: &mut ConnCtx) -> LoopControl {
    let bytes_len = frame.len();
    match socket.send(Message::Text(frame)).await.map_err(NetError::Ws) {
        Ok(()) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send world update");
            LoopControl::Disconnect
        }
    }
}

async fn disconnect_cleanup(ctx: &ConnCtx) -> Result<(), NetError> {
    let player_id = ctx.player_id;
    // Removes the player and its bullets; everyone else gets `player_left`.
    ctx.input_tx
        .send(GameEvent::Leave { player_id })
        .await
        .map_err(|_| NetError::InputClosed)?;

    debug!(
        player_id,
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_frames = ctx.invalid_frames,
        lag_recovery_count = ctx.lag_recovery_count,
        "connection stats"
    );
    info!(player_id, "client disconnected");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{WorldEvent, WorldState};

    fn update(tick: u64) -> WorldUpdate {
        WorldUpdate::new(
            tick,
            vec![WorldEvent::PlayerJoined { id: 1 }],
            Some(WorldState::default()),
        )
    }

    #[test]
    fn backlog_up_to_the_recovery_snapshot_is_skipped() {
        let resynced_at = Some(40);
        assert!(is_stale(&update(13), resynced_at));
        assert!(is_stale(&update(40), resynced_at));
        assert!(!is_stale(&update(41), resynced_at));
    }

    #[test]
    fn nothing_is_skipped_without_a_recovery() {
        assert!(!is_stale(&update(0), None));
        assert!(!is_stale(&update(7), None));
    }

    #[test]
    fn sanitize_refuses_non_finite_vectors_only() {
        assert_eq!(
            sanitize_intent(Intent::Fire(Vector2::new(f32::NAN, 0.0))),
            None
        );
        assert_eq!(
            sanitize_intent(Intent::StartMoving(Vector2::new(3.0, 4.0))),
            Some(Intent::StartMoving(Vector2::new(3.0, 4.0)))
        );
        assert_eq!(sanitize_intent(Intent::StopMoving), Some(Intent::StopMoving));
    }
}
