use crate::domain::math::Vector2;
use crate::domain::state::WorldState;
use crate::domain::tuning::ArenaTuning;
use rand::Rng;
use tracing::warn;

const SPAWN_ATTEMPTS: usize = 100;

/// Picks a random spot inside the arena clear of every alive player and bullet.
///
/// Gives up after a bounded number of draws and returns the last candidate, so a crowded arena
/// still spawns the player somewhere.
pub fn random_free_spot<R: Rng + ?Sized>(
    world: &WorldState,
    tuning: &ArenaTuning,
    rng: &mut R,
) -> Vector2 {
    let size = tuning.player.size;
    let player_gap_sq = (2.0 * size) * (2.0 * size);
    let bullet_gap = size + tuning.bullet.size;
    let bullet_gap_sq = bullet_gap * bullet_gap;

    // One unit off the clamping boundary.
    let margin = size + 1.0;

    let mut candidate = Vector2::new(tuning.width / 2.0, tuning.height / 2.0);
    for _ in 0..SPAWN_ATTEMPTS {
        candidate = Vector2::new(
            draw(rng, margin, tuning.width - margin),
            draw(rng, margin, tuning.height - margin),
        );

        let clear_of_players = world
            .alive_players
            .iter()
            .all(|p| p.position.distance_sq(candidate) >= player_gap_sq);
        let clear_of_bullets = world
            .alive_bullets
            .iter()
            .all(|b| b.position.distance_sq(candidate) >= bullet_gap_sq);
        if clear_of_players && clear_of_bullets {
            return candidate;
        }
    }

    warn!(x = candidate.x, y = candidate.y, "no free spawn spot found; spawning anyway");
    candidate
}

fn draw<R: Rng + ?Sized>(rng: &mut R, lo: f32, hi: f32) -> f32 {
    if lo < hi {
        rng.gen_range(lo..hi)
    } else {
        (lo + hi) / 2.0
    }
}
