// Use-case level inputs/outputs for the world task.

use crate::domain::{Vector2, WelcomeInfo, WorldEvent, WorldState};
use axum::extract::ws::Utf8Bytes;
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, oneshot};

#[derive(Debug)]
pub enum GameEvent {
    Join { reply: oneshot::Sender<JoinReply> },
    Leave { player_id: u32 },
    Intent { player_id: u32, intent: Intent },
}

/// Client intent; vectors arrive as sent and are normalized by the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Intent {
    StartMoving(Vector2),
    StopMoving,
    Fire(Vector2),
}

#[derive(Debug)]
pub enum JoinReply {
    Admitted {
        welcome: WelcomeInfo,
        // World as it was right before this player joined; `updates` continues from it.
        baseline: WorldState,
        updates: broadcast::Receiver<Arc<WorldUpdate>>,
    },
    Rejected {
        reason: String,
    },
}

/// Everything the session produced in one publish step.
///
/// Encoded frames are cached so the update is serialized once no matter how many
/// connections forward it.
#[derive(Debug)]
pub struct WorldUpdate {
    pub tick: u64,
    pub events: Vec<WorldEvent>,
    pub snapshot: Option<WorldState>,
    frames: OnceLock<Vec<Utf8Bytes>>,
}

impl WorldUpdate {
    pub fn new(tick: u64, events: Vec<WorldEvent>, snapshot: Option<WorldState>) -> Self {
        Self {
            tick,
            events,
            snapshot,
            frames: OnceLock::new(),
        }
    }

    pub fn frames_with(&self, encode: impl FnOnce(&WorldUpdate) -> Vec<Utf8Bytes>) -> &[Utf8Bytes] {
        self.frames.get_or_init(|| encode(self))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub tick: u64,
    pub player_count: u32,
    pub alive_players: usize,
    pub alive_bullets: usize,
}

/// Typed event seen by a client, after decoding and transport bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Connected,
    Disconnected { explicit: bool },
    Welcome(WelcomeInfo),
    WorldState(WorldState),
    /// Incremental lifecycle patch.
    World(WorldEvent),
    /// The server evicted this client. The transport is already disconnected.
    GoAway { reason: String },
}
