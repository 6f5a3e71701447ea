use super::session::GameSession;
use super::types::{GameEvent, JoinReply, SessionStats, WorldUpdate};
use crate::domain::{WorldEvent, WorldState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc, oneshot, watch};
use tracing::{debug, info};

/// Channels the world task publishes into.
pub struct WorldChannels {
    pub world_tx: broadcast::Sender<Arc<WorldUpdate>>,
    // Latest snapshot, for connections that fell behind the broadcast.
    pub world_latest_tx: watch::Sender<Arc<WorldUpdate>>,
    pub stats_tx: watch::Sender<SessionStats>,
}

#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub tick_interval: Duration,
    pub snapshot_every_ticks: u64,
}

pub async fn world_task(
    mut input_rx: mpsc::Receiver<GameEvent>,
    mut session: GameSession,
    channels: WorldChannels,
    settings: LoopSettings,
    shutdown: Arc<Notify>,
) {
    // Drive the fixed-step game loop at the configured tick rate.
    let mut interval = tokio::time::interval(settings.tick_interval);
    let snapshot_every = settings.snapshot_every_ticks.max(1);

    // Events produced since the last publish, in order.
    let mut pending: Vec<WorldEvent> = Vec::new();

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                info!("world task shutting down");
                break;
            }
            _ = interval.tick() => {}
        }

        while let Ok(ev) = input_rx.try_recv() {
            match ev {
                GameEvent::Join { reply } => {
                    admit(&mut session, &channels, &mut pending, reply);
                }
                GameEvent::Leave { player_id } => {
                    pending.extend(session.leave(player_id));
                }
                GameEvent::Intent { player_id, intent } => {
                    pending.extend(session.handle_intent(player_id, intent));
                }
            }
        }

        pending.extend(session.tick());

        let snapshot =
            (session.tick_count() % snapshot_every == 0).then(|| session.world().clone());
        publish(&channels, session.tick_count(), &mut pending, snapshot);
        channels.stats_tx.send_replace(session.stats());
    }
}

/// Joins one player so that its baseline plus the broadcast that follows are consistent.
///
/// Pending events are flushed first and the subscription is taken before the player is
/// admitted, so the new connection sees neither an event already folded into its baseline
/// nor misses its own `player_joined`.
fn admit(
    session: &mut GameSession,
    channels: &WorldChannels,
    pending: &mut Vec<WorldEvent>,
    reply: oneshot::Sender<JoinReply>,
) {
    // These events happened after the last snapshot, so they carry the upcoming tick.
    publish(channels, session.tick_count() + 1, pending, None);
    let baseline = session.world().clone();
    let updates = channels.world_tx.subscribe();

    let (outcome, admitted_id) = match session.join() {
        Ok(admitted) => {
            let id = admitted.welcome.id;
            pending.extend(admitted.events);
            let outcome = JoinReply::Admitted {
                welcome: admitted.welcome,
                baseline,
                updates,
            };
            (outcome, Some(id))
        }
        Err(rejected) => {
            info!(reason = rejected.reason, "join rejected");
            let outcome = JoinReply::Rejected {
                reason: rejected.reason.to_string(),
            };
            (outcome, None)
        }
    };

    if reply.send(outcome).is_err() {
        // The connection went away while waiting; undo the admission.
        if let Some(player_id) = admitted_id {
            debug!(player_id, "joining connection vanished");
            pending.extend(session.leave(player_id));
        }
    }
}

fn publish(
    channels: &WorldChannels,
    tick: u64,
    pending: &mut Vec<WorldEvent>,
    snapshot: Option<WorldState>,
) {
    if pending.is_empty() && snapshot.is_none() {
        return;
    }

    let events = std::mem::take(pending);
    if let Some(world) = &snapshot {
        channels.world_latest_tx.send_replace(Arc::new(WorldUpdate::new(
            tick,
            Vec::new(),
            Some(world.clone()),
        )));
    }

    // No subscribers is fine; nobody is connected.
    let _ = channels
        .world_tx
        .send(Arc::new(WorldUpdate::new(tick, events, snapshot)));
}
