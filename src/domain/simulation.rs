// Fixed-step world simulation: movement, bullet travel, collision resolution.

use super::state::WorldState;
use super::systems::bullets::{self, BulletConfig, BulletOrigin, Hit};
use super::systems::movement::{self, MovementConfig};
use super::tuning::ArenaTuning;
use std::collections::HashMap;

/// What one `step` removed from the world.
#[derive(Debug, Default, PartialEq)]
pub struct TickOutcome {
    pub hits: Vec<Hit>,
    /// Bullet ids removed this tick, in collection order.
    pub destroyed_bullets: Vec<u32>,
}

#[derive(Debug)]
pub struct Simulation {
    tuning: ArenaTuning,
    origins: HashMap<u32, BulletOrigin>,
}

impl Simulation {
    pub fn new(tuning: ArenaTuning) -> Self {
        Self {
            tuning,
            origins: HashMap::new(),
        }
    }

    pub fn tuning(&self) -> &ArenaTuning {
        &self.tuning
    }

    pub fn register_bullet(&mut self, bullet_id: u32, owner_id: u32, fired_at_tick: u64) {
        self.origins.insert(
            bullet_id,
            BulletOrigin {
                owner_id,
                fired_at_tick,
            },
        );
    }

    /// Drops every bullet fired by `owner_id` from both the world and the origin table.
    pub fn remove_bullets_of(&mut self, world: &mut WorldState, owner_id: u32) -> Vec<u32> {
        let owned: Vec<u32> = self
            .origins
            .iter()
            .filter(|(_, origin)| origin.owner_id == owner_id)
            .map(|(&id, _)| id)
            .collect();
        for id in &owned {
            self.origins.remove(id);
            world.remove_bullet(*id);
        }
        owned
    }

    /// Runs one tick. Kills and bullet removals are applied in a single pass after every
    /// collision check has seen the same positions.
    pub fn step(&mut self, world: &mut WorldState, tick: u64) -> TickOutcome {
        let t = self.tuning;

        movement::move_players(
            &mut world.alive_players,
            MovementConfig {
                speed: t.player.speed,
                size: t.player.size,
                width: t.width,
                height: t.height,
            },
        );

        bullets::advance_bullets(&mut world.alive_bullets, t.bullet.speed);

        let collisions = bullets::resolve_collisions(
            &world.alive_players,
            &world.alive_bullets,
            &self.origins,
            tick,
            BulletConfig {
                size: t.bullet.size,
                player_size: t.player.size,
                width: t.width,
                height: t.height,
                self_hit: t.bullet.self_hit,
            },
        );

        let destroyed_bullets: Vec<u32> = world
            .alive_bullets
            .iter()
            .map(|b| b.id)
            .filter(|id| collisions.destroyed_bullets.contains(id))
            .collect();

        world
            .alive_players
            .retain(|p| !collisions.killed_players.contains(&p.id));
        world
            .alive_bullets
            .retain(|b| !collisions.destroyed_bullets.contains(&b.id));
        self.origins
            .retain(|id, _| !collisions.destroyed_bullets.contains(id));

        TickOutcome {
            hits: collisions.hits,
            destroyed_bullets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::math::Vector2;
    use crate::domain::state::Entity;
    use crate::domain::tuning::SelfHitRule;

    fn tuning() -> ArenaTuning {
        let mut t = ArenaTuning {
            width: 100.0,
            height: 100.0,
            ..ArenaTuning::default()
        };
        t.bullet.speed = 5.0;
        t.bullet.size = 2.0;
        t.bullet.self_hit = SelfHitRule::Never;
        t
    }

    #[test]
    fn out_of_bounds_bullet_is_removed() {
        let mut sim = Simulation::new(tuning());
        let mut world = WorldState::default();
        world.upsert_bullet(Entity::moving(1, Vector2::new(99.0, 50.0), Vector2::new(1.0, 0.0)));
        sim.register_bullet(1, 9, 0);

        let outcome = sim.step(&mut world, 1);

        assert_eq!(outcome.destroyed_bullets, vec![1]);
        assert!(outcome.hits.is_empty());
        assert!(world.alive_bullets.is_empty());
    }

    #[test]
    fn kill_removes_player_and_bullet_in_one_pass() {
        let mut sim = Simulation::new(tuning());
        let mut world = WorldState {
            player_count: 2,
            ..WorldState::default()
        };
        world.upsert_player(Entity::stationary(1, Vector2::new(20.0, 20.0)));
        world.upsert_player(Entity::stationary(2, Vector2::new(60.0, 50.0)));
        world.upsert_bullet(Entity::moving(7, Vector2::new(50.0, 50.0), Vector2::new(1.0, 0.0)));
        sim.register_bullet(7, 1, 0);

        let outcome = sim.step(&mut world, 1);

        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].killer_id, Some(1));
        assert!(world.player(2).is_none());
        assert!(world.player(1).is_some());
        assert!(world.bullet(7).is_none());
        assert_eq!(world.player_count, 2);
    }

    #[test]
    fn leaving_owner_takes_bullets_along() {
        let mut sim = Simulation::new(tuning());
        let mut world = WorldState::default();
        world.upsert_bullet(Entity::moving(1, Vector2::new(10.0, 10.0), Vector2::new(1.0, 0.0)));
        world.upsert_bullet(Entity::moving(2, Vector2::new(30.0, 10.0), Vector2::new(1.0, 0.0)));
        sim.register_bullet(1, 5, 0);
        sim.register_bullet(2, 6, 0);

        assert_eq!(sim.remove_bullets_of(&mut world, 5), vec![1]);
        assert!(world.bullet(1).is_none());
        assert!(world.bullet(2).is_some());
    }
}
