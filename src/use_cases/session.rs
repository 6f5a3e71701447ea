// Authoritative game session: admission, intents, respawns and the per-tick step.

use super::types::{Intent, SessionStats};
use crate::domain::systems::spawn;
use crate::domain::{
    ArenaTuning, Entity, KillCause, Simulation, Vector2, WelcomeInfo, WorldEvent, WorldState,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Successful join: the constants for the new client plus the events to broadcast.
#[derive(Debug)]
pub struct Admitted {
    pub welcome: WelcomeInfo,
    pub events: Vec<WorldEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinRejected {
    pub reason: &'static str,
}

#[derive(Debug, Default)]
struct PlayerSlot {
    // Ticks left before a destroyed player comes back.
    respawn_in: Option<u32>,
    fire_cooldown: u32,
}

pub struct GameSession {
    tuning: ArenaTuning,
    world: WorldState,
    simulation: Simulation,
    // Connected players, alive or waiting to respawn.
    players: BTreeMap<u32, PlayerSlot>,
    next_player_id: u32,
    next_bullet_id: u32,
    tick: u64,
    rng: StdRng,
}

impl GameSession {
    pub fn new(tuning: ArenaTuning) -> Self {
        Self::with_rng(tuning, StdRng::from_entropy())
    }

    pub fn with_rng(tuning: ArenaTuning, rng: StdRng) -> Self {
        Self {
            tuning,
            world: WorldState::default(),
            simulation: Simulation::new(tuning),
            players: BTreeMap::new(),
            next_player_id: 0,
            next_bullet_id: 0,
            tick: 0,
            rng,
        }
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            tick: self.tick,
            player_count: self.world.player_count,
            alive_players: self.world.alive_players.len(),
            alive_bullets: self.world.alive_bullets.len(),
        }
    }

    pub fn join(&mut self) -> Result<Admitted, JoinRejected> {
        if self.players.len() >= self.tuning.max_players as usize {
            return Err(JoinRejected {
                reason: "server full",
            });
        }

        let id = self.next_player_id;
        self.next_player_id = self.next_player_id.wrapping_add(1);
        self.players.insert(id, PlayerSlot::default());
        self.world.player_count = self.players.len() as u32;

        let position = self.spawn(id);
        info!(player_id = id, x = position.x, y = position.y, "player joined");

        Ok(Admitted {
            welcome: self.tuning.welcome(id),
            events: vec![
                WorldEvent::PlayerJoined { id },
                WorldEvent::PlayerSpawned { id, position },
            ],
        })
    }

    pub fn leave(&mut self, player_id: u32) -> Vec<WorldEvent> {
        if self.players.remove(&player_id).is_none() {
            return Vec::new();
        }

        self.world.remove_player(player_id);
        let bullets = self
            .simulation
            .remove_bullets_of(&mut self.world, player_id);
        self.world.player_count = self.players.len() as u32;

        info!(player_id, removed_bullets = bullets.len(), "player left");
        vec![WorldEvent::PlayerLeft { id: player_id }]
    }

    pub fn handle_intent(&mut self, player_id: u32, intent: Intent) -> Vec<WorldEvent> {
        match intent {
            Intent::StartMoving(v) => {
                let direction = v.normalize();
                if direction.is_zero() {
                    return self.stop(player_id);
                }
                let Some(player) = self.world.player_mut(player_id) else {
                    debug!(player_id, "start_moving from a player that is not alive");
                    return Vec::new();
                };
                player.direction = Some(direction);
                vec![WorldEvent::PlayerMoving {
                    id: player_id,
                    position: player.position,
                    direction,
                }]
            }
            Intent::StopMoving => self.stop(player_id),
            Intent::Fire(aim) => self.fire(player_id, aim).into_iter().collect(),
        }
    }

    /// Advances the session by one tick and returns the lifecycle events it produced.
    pub fn tick(&mut self) -> Vec<WorldEvent> {
        self.tick += 1;
        let mut events = Vec::new();

        let mut due = Vec::new();
        for (&id, slot) in self.players.iter_mut() {
            slot.fire_cooldown = slot.fire_cooldown.saturating_sub(1);
            match slot.respawn_in {
                Some(left) if left <= 1 => {
                    slot.respawn_in = None;
                    due.push(id);
                }
                Some(left) => slot.respawn_in = Some(left - 1),
                None => {}
            }
        }
        for id in due {
            let position = self.spawn(id);
            debug!(player_id = id, "player respawned");
            events.push(WorldEvent::PlayerSpawned { id, position });
        }

        let outcome = self.simulation.step(&mut self.world, self.tick);
        for hit in outcome.hits {
            if let Some(slot) = self.players.get_mut(&hit.victim_id) {
                slot.respawn_in = Some(self.tuning.player.respawn_ticks);
            }
            info!(
                player_id = hit.victim_id,
                killer_id = ?hit.killer_id,
                bullet_id = hit.bullet_id,
                "player destroyed"
            );
            events.push(WorldEvent::PlayerDestroyed {
                id: hit.victim_id,
                cause: hit.killer_id.map(|killer_id| KillCause {
                    killer_id,
                    bullet_id: hit.bullet_id,
                }),
            });
        }

        events
    }

    fn stop(&mut self, player_id: u32) -> Vec<WorldEvent> {
        let Some(player) = self.world.player_mut(player_id) else {
            debug!(player_id, "stop_moving from a player that is not alive");
            return Vec::new();
        };
        player.direction = None;
        vec![WorldEvent::PlayerStopped {
            id: player_id,
            position: player.position,
        }]
    }

    fn fire(&mut self, player_id: u32, aim: Vector2) -> Option<WorldEvent> {
        let aim = aim.normalize();
        if aim.is_zero() {
            debug!(player_id, "fire with zero aim ignored");
            return None;
        }
        let origin = self.world.player(player_id)?.position;
        let slot = self.players.get_mut(&player_id)?;
        if slot.fire_cooldown > 0 {
            return None;
        }
        slot.fire_cooldown = self.tuning.player.fire_cooldown_ticks;

        // Spawn just outside the firer so the shot does not start inside it.
        let offset = self.tuning.player.size + self.tuning.bullet.size + 1.0;
        let position = origin + aim * offset;
        let bullet_id = self.next_bullet_id;
        self.next_bullet_id = self.next_bullet_id.wrapping_add(1);

        self.world
            .upsert_bullet(Entity::moving(bullet_id, position, aim));
        self.simulation
            .register_bullet(bullet_id, player_id, self.tick);

        Some(WorldEvent::ShotsFired {
            id: player_id,
            bullet_id,
            position,
            aim,
        })
    }

    fn spawn(&mut self, id: u32) -> Vector2 {
        let position = spawn::random_free_spot(&self.world, &self.tuning, &mut self.rng);
        self.world.upsert_player(Entity::stationary(id, position));
        position
    }
}
