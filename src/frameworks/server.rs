// Framework bootstrap for the arena server runtime.

use crate::frameworks::config;
use crate::interface_adapters::http::status_handler;
use crate::interface_adapters::net::ws_handler;
use crate::interface_adapters::state::AppState;
use crate::use_cases::{
    GameEvent, GameSession, LoopSettings, SessionStats, WorldChannels, WorldUpdate, world_task,
};

use axum::{Router, routing::get};
use std::{io::Result, sync::Arc};
use tokio::sync::{Notify, broadcast, mpsc, watch};

pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let shutdown = Arc::new(Notify::new());
    // build state
    let state = build_state(shutdown.clone());
    // Start the Web Server
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/status", get(status_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    // Serve app and report errors rather than panicking
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown requested");
            }
        })
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        });

    // Stop the world loop once no connection can reach it anymore.
    shutdown.notify_one();
    served
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = format!("{}:{}", config::host(), config::http_port());

    // Bind TCP listener with error handling
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state(shutdown: Arc<Notify>) -> Arc<AppState> {
    // Setup Channels
    // input_tx/rx: joins, leaves and intents all go to the single world task.
    let (input_tx, input_rx) = mpsc::channel::<GameEvent>(config::INPUT_CHANNEL_CAPACITY);

    // world_tx: per-tick updates fanned out to every connection.
    let (world_tx, _world_rx) =
        broadcast::channel::<Arc<WorldUpdate>>(config::WORLD_BROADCAST_CAPACITY);
    let (world_latest_tx, world_latest_rx) =
        watch::channel(Arc::new(WorldUpdate::new(0, Vec::new(), None)));
    let (stats_tx, stats_rx) = watch::channel(SessionStats::default());

    let tuning = config::arena_tuning();
    let settings = LoopSettings {
        tick_interval: config::tick_interval(),
        snapshot_every_ticks: config::snapshot_every_ticks(),
    };
    tracing::debug!(
        width = tuning.width,
        height = tuning.height,
        max_players = tuning.max_players,
        tick_ms = settings.tick_interval.as_millis(),
        snapshot_every_ticks = settings.snapshot_every_ticks,
        "arena configured"
    );

    // Spawn the Game Loop (World Task)
    tokio::spawn(world_task(
        input_rx,
        GameSession::new(tuning),
        WorldChannels {
            world_tx,
            world_latest_tx,
            stats_tx,
        },
        settings,
        shutdown,
    ));

    Arc::new(AppState {
        input_tx,
        world_latest_rx,
        stats_rx,
    })
}
