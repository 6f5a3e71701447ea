use crate::domain::math::Vector2;
use crate::domain::state::Entity;

#[derive(Debug, Clone, Copy)]
pub struct MovementConfig {
    pub speed: f32, // units/tick
    pub size: f32,  // player radius

    pub width: f32,
    pub height: f32,
}

impl MovementConfig {
    fn min(&self) -> Vector2 {
        Vector2::new(self.size, self.size)
    }

    fn max(&self) -> Vector2 {
        Vector2::new(self.width - self.size, self.height - self.size)
    }
}

/// Advances every moving player by one tick.
///
/// Candidates are tested against the positions players held before this tick, so two players
/// heading into each other are both stopped regardless of iteration order. A rejected player
/// keeps its position for the tick; an accepted one is clamped into the arena.
pub fn move_players(players: &mut [Entity], cfg: MovementConfig) {
    let origins: Vec<(u32, Vector2)> = players.iter().map(|p| (p.id, p.position)).collect();
    let min_gap = 2.0 * cfg.size;
    let min_gap_sq = min_gap * min_gap;

    for player in players.iter_mut() {
        let Some(direction) = player.direction else {
            continue;
        };

        let candidate = player.position + direction * cfg.speed;
        let blocked = origins
            .iter()
            .any(|&(id, pos)| id != player.id && candidate.distance_sq(pos) < min_gap_sq);
        if blocked {
            continue;
        }

        player.position = candidate.clamp(cfg.min(), cfg.max());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(speed: f32) -> MovementConfig {
        MovementConfig {
            speed,
            size: 10.0,
            width: 500.0,
            height: 500.0,
        }
    }

    #[test]
    fn player_against_the_wall_is_clamped() {
        let mut players = [Entity::moving(1, Vector2::new(10.0, 10.0), Vector2::new(-1.0, 0.0))];
        move_players(&mut players, cfg(5.0));
        assert_eq!(players[0].position, Vector2::new(10.0, 10.0));
    }

    #[test]
    fn free_player_moves_by_speed() {
        let mut players = [Entity::moving(1, Vector2::new(100.0, 100.0), Vector2::new(0.0, 1.0))];
        move_players(&mut players, cfg(5.0));
        assert_eq!(players[0].position, Vector2::new(100.0, 105.0));
    }

    #[test]
    fn stationary_players_stay_put() {
        let mut players = [Entity::stationary(1, Vector2::new(42.0, 42.0))];
        move_players(&mut players, cfg(5.0));
        assert_eq!(players[0].position, Vector2::new(42.0, 42.0));
    }

    #[test]
    fn approaching_players_are_both_rejected_in_any_order() {
        let a = Entity::moving(1, Vector2::new(100.0, 100.0), Vector2::new(1.0, 0.0));
        let b = Entity::moving(2, Vector2::new(122.0, 100.0), Vector2::new(-1.0, 0.0));

        let mut forward = [a, b];
        move_players(&mut forward, cfg(5.0));
        let mut reversed = [b, a];
        move_players(&mut reversed, cfg(5.0));

        assert_eq!(forward[0].position, a.position);
        assert_eq!(forward[1].position, b.position);
        assert_eq!(reversed[0].position, b.position);
        assert_eq!(reversed[1].position, a.position);
    }

    #[test]
    fn candidates_are_checked_against_pre_tick_positions() {
        // The leader moves away, but the follower is still judged against where it was.
        let leader = Entity::moving(1, Vector2::new(125.0, 100.0), Vector2::new(1.0, 0.0));
        let follower = Entity::moving(2, Vector2::new(100.0, 100.0), Vector2::new(1.0, 0.0));
        let mut players = [leader, follower];
        move_players(&mut players, cfg(10.0));

        assert_eq!(players[0].position, Vector2::new(135.0, 100.0));
        assert_eq!(players[1].position, Vector2::new(100.0, 100.0));
    }
}
