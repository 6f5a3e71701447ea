// Use cases layer: the authoritative session actor and the client game loop.

pub mod client;
pub mod game;
pub mod reconcile;
pub mod session;
pub mod types;

pub use client::{ClientExit, ServerLink, Surface, run_client};
pub use game::{LoopSettings, WorldChannels, world_task};
pub use reconcile::{ClientSession, ClientWorld};
pub use session::GameSession;
pub use types::{GameEvent, Intent, JoinReply, SessionStats, SocketEvent, WorldUpdate};
