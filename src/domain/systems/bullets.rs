use crate::domain::math::Vector2;
use crate::domain::state::Entity;
use crate::domain::tuning::SelfHitRule;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy)]
pub struct BulletConfig {
    pub size: f32,        // bullet radius
    pub player_size: f32, // player radius

    pub width: f32,
    pub height: f32,

    pub self_hit: SelfHitRule,
}

/// Who fired a bullet and when. Bullets on the wire carry neither, so the session keeps this
/// next to the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulletOrigin {
    pub owner_id: u32,
    pub fired_at_tick: u64,
}

/// A player destroyed by a bullet this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub victim_id: u32,
    pub bullet_id: u32,
    // None once the firer has left the session.
    pub killer_id: Option<u32>,
}

/// Marks collected during one collision scan, applied afterwards in a single pass.
#[derive(Debug, Default)]
pub struct Collisions {
    /// First hit per victim, in bullet order.
    pub hits: Vec<Hit>,
    pub killed_players: HashSet<u32>,
    pub destroyed_bullets: HashSet<u32>,
}

pub fn advance_bullets(bullets: &mut [Entity], speed: f32) {
    for bullet in bullets.iter_mut() {
        if let Some(direction) = bullet.direction {
            bullet.position = bullet.position + direction * speed;
        }
    }
}

/// Scans every bullet against the arena bounds and every player.
///
/// Leaving the arena takes priority: such a bullet is not tested against players this tick.
/// A bullet hits at most one player, the first in collection order.
pub fn resolve_collisions(
    players: &[Entity],
    bullets: &[Entity],
    origins: &HashMap<u32, BulletOrigin>,
    tick: u64,
    cfg: BulletConfig,
) -> Collisions {
    let hit_radius = cfg.player_size + cfg.size;
    let hit_radius_sq = hit_radius * hit_radius;
    let mut out = Collisions::default();

    for bullet in bullets {
        if !in_bounds(bullet.position, cfg) {
            out.destroyed_bullets.insert(bullet.id);
            continue;
        }

        let origin = origins.get(&bullet.id).copied();
        let victim = players.iter().find(|player| {
            if bullet.position.distance_sq(player.position) >= hit_radius_sq {
                return false;
            }
            match origin {
                Some(o) if o.owner_id == player.id => {
                    cfg.self_hit.allows(tick.saturating_sub(o.fired_at_tick))
                }
                _ => true,
            }
        });

        if let Some(victim) = victim {
            out.destroyed_bullets.insert(bullet.id);
            if out.killed_players.insert(victim.id) {
                out.hits.push(Hit {
                    victim_id: victim.id,
                    bullet_id: bullet.id,
                    killer_id: origin.map(|o| o.owner_id),
                });
            }
        }
    }

    out
}

fn in_bounds(p: Vector2, cfg: BulletConfig) -> bool {
    (0.0..=cfg.width).contains(&p.x) && (0.0..=cfg.height).contains(&p.y)
}
