// Domain layer: core simulation types and rules.

pub mod errors;
pub mod events;
pub mod input;
pub mod math;
pub mod simulation;
pub mod state;
pub mod systems;
pub mod tuning;

pub use errors::{ArenaError, ReconcileError};
pub use events::{KillCause, WorldEvent};
pub use input::{Control, HeldControls, InputEvent};
pub use math::Vector2;
pub use simulation::{Simulation, TickOutcome};
pub use state::{Entity, WelcomeInfo, WorldState};
pub use tuning::{ArenaTuning, BulletTuning, PlayerTuning, SelfHitRule};
