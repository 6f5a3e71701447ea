use crate::use_cases::{GameEvent, SessionStats, WorldUpdate};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Clone)]
pub struct AppState {
    // Joins, leaves and intents flowing from the network into the world task.
    pub input_tx: mpsc::Sender<GameEvent>,
    // Latest snapshot update for lag recovery.
    pub world_latest_rx: watch::Receiver<Arc<WorldUpdate>>,
    // Per-tick session counters.
    pub stats_rx: watch::Receiver<SessionStats>,
}
