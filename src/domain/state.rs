// Domain-level world entities and snapshot types.

use super::math::Vector2;

/// A positioned, optionally moving simulated object (player or bullet).
///
/// Players and bullets live in separate id spaces, so a player and a bullet may share an id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entity {
    pub id: u32,
    pub position: Vector2,
    // None means stationary.
    pub direction: Option<Vector2>,
}

impl Entity {
    pub fn stationary(id: u32, position: Vector2) -> Self {
        Self {
            id,
            position,
            direction: None,
        }
    }

    pub fn moving(id: u32, position: Vector2, direction: Vector2) -> Self {
        Self {
            id,
            position,
            direction: Some(direction),
        }
    }
}

/// Session-scoped constants issued once per connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelcomeInfo {
    /// Player id of the receiving client.
    pub id: u32,
    /// Player speed in units per tick.
    pub speed: f32,
    /// Player collision radius.
    pub size: f32,
    /// Bullet speed in units per tick.
    pub bullet_speed: f32,
    /// Bullet collision radius.
    pub bullet_size: f32,
}

/// Full set of alive entities plus the connection count.
///
/// `player_count` counts connections; a connected player waiting to respawn is not in
/// `alive_players`. Ids are unique within each collection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldState {
    pub player_count: u32,
    pub alive_players: Vec<Entity>,
    pub alive_bullets: Vec<Entity>,
}

impl WorldState {
    pub fn player(&self, id: u32) -> Option<&Entity> {
        self.alive_players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: u32) -> Option<&mut Entity> {
        self.alive_players.iter_mut().find(|p| p.id == id)
    }

    pub fn bullet(&self, id: u32) -> Option<&Entity> {
        self.alive_bullets.iter().find(|b| b.id == id)
    }

    /// Inserts the player, replacing any existing entry with the same id in place.
    pub fn upsert_player(&mut self, player: Entity) {
        upsert(&mut self.alive_players, player);
    }

    pub fn remove_player(&mut self, id: u32) -> Option<Entity> {
        remove(&mut self.alive_players, id)
    }

    /// Inserts the bullet, replacing any existing entry with the same id in place.
    pub fn upsert_bullet(&mut self, bullet: Entity) {
        upsert(&mut self.alive_bullets, bullet);
    }

    pub fn remove_bullet(&mut self, id: u32) -> Option<Entity> {
        remove(&mut self.alive_bullets, id)
    }
}

fn upsert(entities: &mut Vec<Entity>, entity: Entity) {
    match entities.iter_mut().find(|e| e.id == entity.id) {
        Some(slot) => *slot = entity,
        None => entities.push(entity),
    }
}

fn remove(entities: &mut Vec<Entity>, id: u32) -> Option<Entity> {
    let index = entities.iter().position(|e| e.id == id)?;
    Some(entities.remove(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_keeps_ids_unique_and_order_stable() {
        let mut world = WorldState::default();
        world.upsert_player(Entity::stationary(1, Vector2::new(1.0, 1.0)));
        world.upsert_player(Entity::stationary(2, Vector2::new(2.0, 2.0)));
        world.upsert_player(Entity::moving(1, Vector2::new(5.0, 5.0), Vector2::new(1.0, 0.0)));

        let ids: Vec<u32> = world.alive_players.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(world.player(1).map(|p| p.position), Some(Vector2::new(5.0, 5.0)));
    }

    #[test]
    fn player_and_bullet_ids_do_not_collide() {
        let mut world = WorldState::default();
        world.upsert_player(Entity::stationary(7, Vector2::ZERO));
        world.upsert_bullet(Entity::stationary(7, Vector2::ZERO));

        assert!(world.remove_bullet(7).is_some());
        assert!(world.player(7).is_some());
        assert!(world.remove_bullet(7).is_none());
    }
}
