// Headless client: connects to the arena, wanders around and shoots at random.

use arena_shooter::domain::{Control, InputEvent, Vector2, WorldState};
use arena_shooter::frameworks::{config, server::init_runtime};
use arena_shooter::interface_adapters::clients::{ProtocolSocket, TransportConfig};
use arena_shooter::use_cases::{ClientExit, Surface, run_client};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const INPUT_PERIOD: Duration = Duration::from_millis(250);
const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MOVE_KEYS: [Control; 4] = [Control::Up, Control::Down, Control::Left, Control::Right];

// Logs a summary of the reconciled world instead of drawing it.
struct LogSurface {
    last_log: Option<Instant>,
}

impl Surface for LogSurface {
    fn draw(&mut self, world: &WorldState, local_player_id: u32) {
        let now = Instant::now();
        if self
            .last_log
            .is_some_and(|at| now.duration_since(at) < LOG_THROTTLE)
        {
            return;
        }
        self.last_log = Some(now);

        let me = world.player(local_player_id).map(|p| p.position);
        tracing::info!(
            local_player_id,
            alive = me.is_some(),
            x = me.map(|p| p.x),
            y = me.map(|p| p.y),
            players = world.player_count,
            bullets = world.alive_bullets.len(),
            "world"
        );
    }
}

// Presses and releases movement keys and clicks at random arena points.
async fn random_inputs(tx: mpsc::Sender<InputEvent>, arena: Vector2) {
    let mut rng = StdRng::from_entropy();
    let mut interval = tokio::time::interval(INPUT_PERIOD);
    loop {
        interval.tick().await;
        let event = match rng.gen_range(0..3) {
            0 => InputEvent::Key {
                control: MOVE_KEYS[rng.gen_range(0..MOVE_KEYS.len())],
                pressed: rng.gen_bool(0.6),
            },
            1 => InputEvent::MouseMove(Vector2::new(
                rng.gen_range(0.0..arena.x),
                rng.gen_range(0.0..arena.y),
            )),
            _ => InputEvent::MouseClick(Vector2::new(
                rng.gen_range(0.0..arena.x),
                rng.gen_range(0.0..arena.y),
            )),
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }
}

#[tokio::main]
async fn main() {
    init_runtime();

    let transport = TransportConfig {
        reconnect_interval: config::reconnect_interval(),
        ..TransportConfig::new(config::server_url())
    };
    tracing::info!(url = %transport.url, "bot starting");

    let mut socket = match ProtocolSocket::open(transport) {
        Ok(socket) => socket,
        Err(e) => {
            tracing::error!(error = %e, "failed to open connection");
            return;
        }
    };

    let (input_tx, input_rx) = mpsc::channel(64);
    tokio::spawn(random_inputs(input_tx, config::arena_tuning().size()));

    let mut surface = LogSurface { last_log: None };
    match run_client(&mut socket, &mut surface, input_rx).await {
        ClientExit::Evicted { reason } => tracing::warn!(%reason, "bot evicted"),
        exit => tracing::info!(?exit, "bot stopped"),
    }
}
