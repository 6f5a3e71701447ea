use crate::domain::{ArenaTuning, BulletTuning, PlayerTuning, SelfHitRule};
use std::{env, fmt::Display, str::FromStr, time::Duration};
use tracing::warn;

// Runtime/server constants (not gameplay tuning).

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const WORLD_BROADCAST_CAPACITY: usize = 128;

const DEFAULT_TICK_MS: u64 = 16;
const DEFAULT_RECONNECT_MS: u64 = 10_000;

// Reads `key` and parses it, falling back to `default` when unset or unusable.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(e) => {
                warn!(key, value = %raw, error = %e, %default, "invalid setting; using default");
                default
            }
        },
        Err(_) => default,
    }
}

// Like `env_or`, but also rejects values the game cannot run with.
fn env_checked<T>(key: &str, default: T, valid: impl Fn(&T) -> bool) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    let value = env_or(key, default);
    if valid(&value) {
        value
    } else {
        warn!(key, %value, %default, "setting out of range; using default");
        default
    }
}

fn positive(value: &f32) -> bool {
    value.is_finite() && *value > 0.0
}

pub fn host() -> String {
    env::var("ARENA_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

pub fn http_port() -> u16 {
    env_or("ARENA_PORT", 8080)
}

pub fn tick_interval() -> Duration {
    Duration::from_millis(env_checked("ARENA_TICK_MS", DEFAULT_TICK_MS, |ms| *ms > 0))
}

pub fn snapshot_every_ticks() -> u64 {
    env_checked("ARENA_SNAPSHOT_EVERY_TICKS", 1, |n| *n > 0)
}

pub fn arena_tuning() -> ArenaTuning {
    let defaults = ArenaTuning::default();
    ArenaTuning {
        width: env_checked("ARENA_WIDTH", defaults.width, positive),
        height: env_checked("ARENA_HEIGHT", defaults.height, positive),
        max_players: env_checked("ARENA_MAX_PLAYERS", defaults.max_players, |n| *n > 0),
        player: player_tuning(defaults.player),
        bullet: bullet_tuning(defaults.bullet),
    }
}

fn player_tuning(defaults: PlayerTuning) -> PlayerTuning {
    PlayerTuning {
        speed: env_checked("ARENA_PLAYER_SPEED", defaults.speed, positive),
        size: env_checked("ARENA_PLAYER_SIZE", defaults.size, positive),
        respawn_ticks: env_or("ARENA_RESPAWN_TICKS", defaults.respawn_ticks),
        fire_cooldown_ticks: env_or("ARENA_FIRE_COOLDOWN_TICKS", defaults.fire_cooldown_ticks),
    }
}

fn bullet_tuning(defaults: BulletTuning) -> BulletTuning {
    BulletTuning {
        speed: env_checked("ARENA_BULLET_SPEED", defaults.speed, positive),
        size: env_checked("ARENA_BULLET_SIZE", defaults.size, positive),
        self_hit: self_hit_rule(defaults.self_hit),
    }
}

fn self_hit_rule(default: SelfHitRule) -> SelfHitRule {
    let Ok(raw) = env::var("ARENA_SELF_HIT_GRACE_TICKS") else {
        return default;
    };
    match parse_self_hit(&raw) {
        Some(rule) => rule,
        None => {
            warn!(
                key = "ARENA_SELF_HIT_GRACE_TICKS",
                value = %raw,
                "invalid setting; using default"
            );
            default
        }
    }
}

/// Accepts `never`, `always`, or a grace period in ticks.
pub fn parse_self_hit(raw: &str) -> Option<SelfHitRule> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "never" => Some(SelfHitRule::Never),
        "always" => Some(SelfHitRule::Always),
        ticks => ticks.parse().ok().map(SelfHitRule::AfterTicks),
    }
}

/// Websocket endpoint the bot client dials.
pub fn server_url() -> String {
    env::var("ARENA_SERVER_URL").unwrap_or_else(|_| "ws://127.0.0.1:8080/ws".to_string())
}

pub fn reconnect_interval() -> Duration {
    Duration::from_millis(env_checked(
        "ARENA_RECONNECT_MS",
        DEFAULT_RECONNECT_MS,
        |ms| *ms > 0,
    ))
}
