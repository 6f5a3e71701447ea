// Client-side world reconciliation: wait for a baseline, then replace or patch it.

use crate::domain::{Entity, ReconcileError, WelcomeInfo, WorldEvent, WorldState};

/// A live client game: the connection constants plus the reconciled world.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSession {
    pub welcome: WelcomeInfo,
    pub world: WorldState,
}

impl ClientSession {
    pub fn local_player_id(&self) -> u32 {
        self.welcome.id
    }

    /// The local player, if it is currently alive.
    pub fn local_player(&self) -> Option<&Entity> {
        self.world.player(self.welcome.id)
    }
}

/// Client world lifecycle.
///
/// `welcome` and the first `world_state` may arrive in either order; the session is built
/// once both are present.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientWorld {
    Pending {
        welcome: Option<WelcomeInfo>,
        world: Option<WorldState>,
    },
    Ready(ClientSession),
    Over {
        reason: String,
    },
}

impl Default for ClientWorld {
    fn default() -> Self {
        ClientWorld::Pending {
            welcome: None,
            world: None,
        }
    }
}

impl ClientWorld {
    pub fn session(&self) -> Option<&ClientSession> {
        match self {
            ClientWorld::Ready(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self, ClientWorld::Over { .. })
    }

    pub fn on_welcome(&mut self, info: WelcomeInfo) {
        match self {
            ClientWorld::Over { .. } => {}
            // A fresh welcome means a fresh connection; the old world no longer applies.
            ClientWorld::Ready(_) => {
                *self = ClientWorld::Pending {
                    welcome: Some(info),
                    world: None,
                };
            }
            ClientWorld::Pending { welcome, .. } => {
                *welcome = Some(info);
                self.promote();
            }
        }
    }

    /// A full snapshot always becomes the new baseline.
    pub fn on_world_state(&mut self, snapshot: WorldState) {
        match self {
            ClientWorld::Over { .. } => {}
            ClientWorld::Ready(session) => session.world = snapshot,
            ClientWorld::Pending { world, .. } => {
                *world = Some(snapshot);
                self.promote();
            }
        }
    }

    /// Patches the baseline with one lifecycle event. Without a baseline the patch is refused.
    pub fn apply(&mut self, event: &WorldEvent) -> Result<(), ReconcileError> {
        match self {
            ClientWorld::Ready(session) => patch(&mut session.world, event),
            ClientWorld::Pending {
                world: Some(world), ..
            } => patch(world, event),
            _ => Err(ReconcileError::NoBaseline),
        }
    }

    /// Connection lost: everything received so far is stale.
    pub fn on_disconnect(&mut self) {
        if !self.is_over() {
            *self = ClientWorld::default();
        }
    }

    pub fn end(&mut self, reason: impl Into<String>) {
        *self = ClientWorld::Over {
            reason: reason.into(),
        };
    }

    fn promote(&mut self) {
        if let ClientWorld::Pending {
            welcome: Some(welcome),
            world: Some(world),
        } = self
        {
            *self = ClientWorld::Ready(ClientSession {
                welcome: *welcome,
                world: std::mem::take(world),
            });
        }
    }
}

fn patch(world: &mut WorldState, event: &WorldEvent) -> Result<(), ReconcileError> {
    match *event {
        WorldEvent::PlayerJoined { .. } => {
            world.player_count = world.player_count.saturating_add(1);
        }
        WorldEvent::PlayerLeft { id } => {
            world.player_count = world.player_count.saturating_sub(1);
            world.remove_player(id);
        }
        WorldEvent::PlayerSpawned { id, position } => {
            world.upsert_player(Entity::stationary(id, position));
        }
        WorldEvent::PlayerDestroyed { id, cause } => {
            world
                .remove_player(id)
                .ok_or(ReconcileError::UnknownPlayer(id))?;
            if let Some(cause) = cause {
                world.remove_bullet(cause.bullet_id);
            }
        }
        WorldEvent::PlayerMoving {
            id,
            position,
            direction,
        } => {
            let player = world
                .player_mut(id)
                .ok_or(ReconcileError::UnknownPlayer(id))?;
            player.position = position;
            player.direction = Some(direction);
        }
        WorldEvent::PlayerStopped { id, position } => {
            let player = world
                .player_mut(id)
                .ok_or(ReconcileError::UnknownPlayer(id))?;
            player.position = position;
            player.direction = None;
        }
        WorldEvent::ShotsFired {
            bullet_id,
            position,
            aim,
            ..
        } => {
            world.upsert_bullet(Entity::moving(bullet_id, position, aim));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{KillCause, Vector2};

    fn welcome() -> WelcomeInfo {
        WelcomeInfo {
            id: 1,
            speed: 5.0,
            size: 10.0,
            bullet_speed: 8.0,
            bullet_size: 2.0,
        }
    }

    fn snapshot() -> WorldState {
        WorldState {
            player_count: 1,
            alive_players: vec![Entity::stationary(1, Vector2::new(50.0, 50.0))],
            alive_bullets: vec![],
        }
    }

    fn ready() -> ClientWorld {
        let mut cw = ClientWorld::default();
        cw.on_welcome(welcome());
        cw.on_world_state(snapshot());
        cw
    }

    #[test]
    fn session_is_built_from_welcome_and_world_state_in_either_order() {
        let mut a = ClientWorld::default();
        a.on_welcome(welcome());
        assert!(a.session().is_none());
        a.on_world_state(snapshot());

        let mut b = ClientWorld::default();
        b.on_world_state(snapshot());
        assert!(b.session().is_none());
        b.on_welcome(welcome());

        for cw in [a, b] {
            let session = cw.session().expect("session should be ready");
            assert_eq!(session.local_player_id(), 1);
            assert_eq!(
                session.local_player().map(|p| p.position),
                Some(Vector2::new(50.0, 50.0))
            );
        }
    }

    #[test]
    fn patches_without_baseline_are_refused() {
        let mut cw = ClientWorld::default();
        cw.on_welcome(welcome());
        assert_eq!(
            cw.apply(&WorldEvent::PlayerJoined { id: 2 }),
            Err(ReconcileError::NoBaseline)
        );
    }

    #[test]
    fn world_state_replaces_patched_state() {
        let mut cw = ready();
        cw.apply(&WorldEvent::PlayerSpawned {
            id: 2,
            position: Vector2::new(1.0, 1.0),
        })
        .expect("spawn patch");
        cw.on_world_state(snapshot());
        assert_eq!(cw.session().map(|s| &s.world), Some(&snapshot()));
    }

    #[test]
    fn lifecycle_patches_update_entities_by_id() {
        let mut cw = ready();
        let events = [
            WorldEvent::PlayerJoined { id: 2 },
            WorldEvent::PlayerSpawned {
                id: 2,
                position: Vector2::new(100.0, 100.0),
            },
            WorldEvent::PlayerMoving {
                id: 2,
                position: Vector2::new(101.0, 100.0),
                direction: Vector2::new(1.0, 0.0),
            },
            WorldEvent::ShotsFired {
                id: 1,
                bullet_id: 9,
                position: Vector2::new(60.0, 50.0),
                aim: Vector2::new(1.0, 0.0),
            },
            WorldEvent::PlayerDestroyed {
                id: 2,
                cause: Some(KillCause {
                    killer_id: 1,
                    bullet_id: 9,
                }),
            },
        ];
        for event in &events {
            cw.apply(event).expect("patch should apply");
        }

        let world = &cw.session().expect("ready").world;
        assert_eq!(world.player_count, 2);
        assert!(world.player(2).is_none());
        assert!(world.bullet(9).is_none());
    }

    #[test]
    fn repeated_spawns_keep_ids_unique() {
        let mut cw = ready();
        for _ in 0..3 {
            cw.apply(&WorldEvent::PlayerSpawned {
                id: 1,
                position: Vector2::new(20.0, 20.0),
            })
            .expect("spawn");
        }
        assert_eq!(cw.session().expect("ready").world.alive_players.len(), 1);
    }

    #[test]
    fn patch_for_absent_player_is_reported_and_dropped() {
        let mut cw = ready();
        let before = cw.clone();
        assert_eq!(
            cw.apply(&WorldEvent::PlayerStopped {
                id: 42,
                position: Vector2::ZERO,
            }),
            Err(ReconcileError::UnknownPlayer(42))
        );
        assert_eq!(cw, before);
    }

    #[test]
    fn disconnect_resets_and_go_away_ends() {
        let mut cw = ready();
        cw.on_disconnect();
        assert_eq!(cw, ClientWorld::default());

        cw.end("server full");
        cw.on_disconnect();
        cw.on_welcome(welcome());
        assert_eq!(
            cw,
            ClientWorld::Over {
                reason: "server full".to_string()
            }
        );
    }
}
