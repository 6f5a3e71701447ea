// Lifecycle deltas produced by the session and patched into client worlds.

use super::math::Vector2;

/// Who destroyed a player. Killer and bullet always travel together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KillCause {
    pub killer_id: u32,
    pub bullet_id: u32,
}

/// Discrete world change, broadcast between full `world_state` snapshots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldEvent {
    PlayerJoined {
        id: u32,
    },
    PlayerLeft {
        id: u32,
    },
    PlayerSpawned {
        id: u32,
        position: Vector2,
    },
    PlayerDestroyed {
        id: u32,
        cause: Option<KillCause>,
    },
    PlayerMoving {
        id: u32,
        position: Vector2,
        direction: Vector2,
    },
    PlayerStopped {
        id: u32,
        position: Vector2,
    },
    ShotsFired {
        id: u32,
        bullet_id: u32,
        position: Vector2,
        aim: Vector2,
    },
}
