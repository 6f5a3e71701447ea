/// Gameplay tuning for players.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).

#[derive(Debug, Clone, Copy)]
pub struct PlayerTuning {
    /// Movement speed in units per tick.
    pub speed: f32,

    /// Collision radius in units.
    pub size: f32,

    /// Ticks a destroyed player waits before respawning.
    pub respawn_ticks: u32,

    /// Minimum ticks between two shots of the same player.
    pub fire_cooldown_ticks: u32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            speed: 2.0,
            size: 10.0,
            respawn_ticks: 120,
            fire_cooldown_ticks: 10,
        }
    }
}
