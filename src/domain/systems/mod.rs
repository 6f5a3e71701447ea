// Per-tick rules applied by the simulation, one concern per module.

pub mod bullets;
pub mod movement;
pub mod spawn;
