// Client game loop: reconcile server events, draw, and turn local input into intents.

use super::reconcile::ClientWorld;
use super::types::SocketEvent;
use crate::domain::{ArenaError, Control, HeldControls, InputEvent, Vector2, WorldState};
use std::future::Future;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Rendering collaborator. Only ever sees reconciled state.
pub trait Surface {
    fn draw(&mut self, world: &WorldState, local_player_id: u32);
}

/// Connection to the server as the client loop needs it.
pub trait ServerLink {
    fn next_event(&mut self) -> impl Future<Output = Option<SocketEvent>> + Send;
    fn start_moving(&self, direction: Vector2) -> Result<(), ArenaError>;
    fn stop_moving(&self) -> Result<(), ArenaError>;
    fn fire(&self, aim: Vector2) -> Result<(), ArenaError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientExit {
    /// The server sent `go_away`; the reason is meant for the user.
    Evicted { reason: String },
    LinkClosed,
    InputClosed,
}

#[derive(Debug, Default)]
struct LocalControls {
    held: HeldControls,
    // Last known pointer position in arena units.
    cursor: Option<Vector2>,
}

pub async fn run_client<L, S>(
    link: &mut L,
    surface: &mut S,
    mut inputs: mpsc::Receiver<InputEvent>,
) -> ClientExit
where
    L: ServerLink,
    S: Surface,
{
    let mut world = ClientWorld::default();
    let mut controls = LocalControls::default();

    loop {
        tokio::select! {
            event = link.next_event() => {
                let Some(event) = event else {
                    info!("server link closed");
                    return ClientExit::LinkClosed;
                };
                if let Some(reason) = apply_event(&mut world, event) {
                    return ClientExit::Evicted { reason };
                }
                if let Some(session) = world.session() {
                    surface.draw(&session.world, session.local_player_id());
                }
            }
            input = inputs.recv() => {
                let Some(input) = input else {
                    info!("input source closed");
                    return ClientExit::InputClosed;
                };
                if let Err(e) = handle_input(link, &world, &mut controls, input) {
                    debug!(error = %e, "intent not sent");
                }
            }
        }
    }
}

// Returns the eviction reason once the server has sent `go_away`.
fn apply_event(world: &mut ClientWorld, event: SocketEvent) -> Option<String> {
    match event {
        SocketEvent::Connected => info!("connected to server"),
        SocketEvent::Disconnected { explicit } => {
            info!(explicit, "disconnected from server");
            world.on_disconnect();
        }
        SocketEvent::Welcome(welcome) => {
            info!(player_id = welcome.id, "welcome received");
            world.on_welcome(welcome);
        }
        SocketEvent::WorldState(snapshot) => world.on_world_state(snapshot),
        SocketEvent::World(patch) => {
            if let Err(e) = world.apply(&patch) {
                warn!(error = %e, ?patch, "dropping world patch");
            }
        }
        SocketEvent::GoAway { reason } => {
            warn!(%reason, "evicted by server");
            world.end(reason.clone());
            return Some(reason);
        }
    }
    None
}

fn handle_input<L: ServerLink>(
    link: &L,
    world: &ClientWorld,
    controls: &mut LocalControls,
    input: InputEvent,
) -> Result<(), ArenaError> {
    match input {
        InputEvent::Key {
            control: Control::Fire,
            pressed: true,
        } => match controls.cursor {
            Some(target) => fire_at(link, world, target),
            None => Ok(()),
        },
        InputEvent::Key { control, pressed } => {
            if !controls.held.apply(control, pressed) {
                return Ok(());
            }
            let direction = controls.held.direction();
            if direction.is_zero() {
                link.stop_moving()
            } else {
                link.start_moving(direction)
            }
        }
        InputEvent::MouseMove(position) => {
            controls.cursor = Some(position);
            Ok(())
        }
        InputEvent::MouseClick(position) => {
            controls.cursor = Some(position);
            fire_at(link, world, position)
        }
    }
}

// Aim is relative to the local player; nothing happens while it is dead or not yet known.
fn fire_at<L: ServerLink>(link: &L, world: &ClientWorld, target: Vector2) -> Result<(), ArenaError> {
    let Some(me) = world.session().and_then(|s| s.local_player()) else {
        return Ok(());
    };
    let aim = target - me.position;
    if aim.is_zero() {
        return Ok(());
    }
    link.fire(aim)
}
