// Plain HTTP routes next to the websocket endpoint.

use crate::interface_adapters::state::AppState;
use axum::{Json, extract::State};
use std::sync::Arc;

#[derive(Debug, serde::Serialize)]
pub struct StatusResponse {
    pub tick: u64,
    pub player_count: u32,
    pub alive_players: usize,
    pub alive_bullets: usize,
}

pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let stats = *state.stats_rx.borrow();
    Json(StatusResponse {
        tick: stats.tick,
        player_count: stats.player_count,
        alive_players: stats.alive_players,
        alive_bullets: stats.alive_bullets,
    })
}
