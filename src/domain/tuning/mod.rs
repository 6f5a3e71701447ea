// Gameplay tuning shared by the session and the simulation systems.

pub mod bullet;
pub mod player;

pub use bullet::{BulletTuning, SelfHitRule};
pub use player::PlayerTuning;

use super::math::Vector2;
use super::state::WelcomeInfo;

/// Everything the authoritative session needs to know about the arena.
#[derive(Debug, Clone, Copy)]
pub struct ArenaTuning {
    /// Arena width in units; x spans `[0, width]`.
    pub width: f32,
    /// Arena height in units; y spans `[0, height]`.
    pub height: f32,
    /// Connection capacity; further joins are turned away.
    pub max_players: u32,
    pub player: PlayerTuning,
    pub bullet: BulletTuning,
}

impl Default for ArenaTuning {
    fn default() -> Self {
        Self {
            width: 500.0,
            height: 500.0,
            max_players: 32,
            player: PlayerTuning::default(),
            bullet: BulletTuning::default(),
        }
    }
}

impl ArenaTuning {
    pub fn size(&self) -> Vector2 {
        Vector2::new(self.width, self.height)
    }

    pub fn welcome(&self, player_id: u32) -> WelcomeInfo {
        WelcomeInfo {
            id: player_id,
            speed: self.player.speed,
            size: self.player.size,
            bullet_speed: self.bullet.speed,
            bullet_size: self.bullet.size,
        }
    }
}
