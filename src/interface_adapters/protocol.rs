// Wire protocol DTOs and the frame codec.
//
// Every frame is one JSON object `{"type": <tag>, "data": {...}}`. `data` is omitted for
// dataless messages and optional properties are omitted rather than sent as `null`.

use crate::domain::{ArenaError, Entity, KillCause, Vector2, WelcomeInfo, WorldEvent, WorldState};
use crate::use_cases::WorldUpdate;
use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::error;

/// Every message of the protocol, in both directions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Message {
    // Server -> client.
    Welcome(WelcomePayload),
    GoAway(GoAwayPayload),
    PlayerJoined(IdPayload),
    PlayerLeft(IdPayload),
    ShotsFired(ShotsFiredPayload),
    PlayerSpawned(PositionPayload),
    PlayerDestroyed(PlayerDestroyedPayload),
    PlayerMoving(PlayerMovingPayload),
    PlayerStopped(PositionPayload),
    WorldState(WorldStatePayload),
    // Client -> server.
    StartMoving(MovePayload),
    StopMoving,
    Fire(MovePayload),
}

impl Message {
    pub fn tag(&self) -> &'static str {
        match self {
            Message::Welcome(_) => "welcome",
            Message::GoAway(_) => "go_away",
            Message::PlayerJoined(_) => "player_joined",
            Message::PlayerLeft(_) => "player_left",
            Message::ShotsFired(_) => "shots_fired",
            Message::PlayerSpawned(_) => "player_spawned",
            Message::PlayerDestroyed(_) => "player_destroyed",
            Message::PlayerMoving(_) => "player_moving",
            Message::PlayerStopped(_) => "player_stopped",
            Message::WorldState(_) => "world_state",
            Message::StartMoving(_) => "start_moving",
            Message::StopMoving => "stop_moving",
            Message::Fire(_) => "fire",
        }
    }

    pub fn go_away(reason: impl Into<String>) -> Self {
        Message::GoAway(GoAwayPayload {
            reason: reason.into(),
        })
    }

    pub fn start_moving(direction: Vector2) -> Self {
        Message::StartMoving(direction.into())
    }

    pub fn fire(aim: Vector2) -> Self {
        Message::Fire(aim.into())
    }

    /// The lifecycle patch carried by this message, if it is one.
    pub fn world_event(&self) -> Option<WorldEvent> {
        let event = match self {
            Message::PlayerJoined(p) => WorldEvent::PlayerJoined { id: p.id },
            Message::PlayerLeft(p) => WorldEvent::PlayerLeft { id: p.id },
            Message::ShotsFired(p) => WorldEvent::ShotsFired {
                id: p.id,
                bullet_id: p.bullet_id,
                position: Vector2::new(p.x, p.y),
                aim: Vector2::new(p.aim_x, p.aim_y),
            },
            Message::PlayerSpawned(p) => WorldEvent::PlayerSpawned {
                id: p.id,
                position: Vector2::new(p.x, p.y),
            },
            Message::PlayerDestroyed(p) => WorldEvent::PlayerDestroyed {
                id: p.id,
                cause: p.cause(),
            },
            Message::PlayerMoving(p) => WorldEvent::PlayerMoving {
                id: p.id,
                position: Vector2::new(p.x, p.y),
                direction: Vector2::new(p.move_x, p.move_y),
            },
            Message::PlayerStopped(p) => WorldEvent::PlayerStopped {
                id: p.id,
                position: Vector2::new(p.x, p.y),
            },
            _ => return None,
        };
        Some(event)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomePayload {
    pub id: u32,
    pub speed: f32,
    pub size: f32,
    pub bullet_speed: f32,
    pub bullet_size: f32,
}

impl From<WelcomeInfo> for WelcomePayload {
    fn from(info: WelcomeInfo) -> Self {
        Self {
            id: info.id,
            speed: info.speed,
            size: info.size,
            bullet_speed: info.bullet_speed,
            bullet_size: info.bullet_size,
        }
    }
}

impl From<WelcomePayload> for WelcomeInfo {
    fn from(payload: WelcomePayload) -> Self {
        Self {
            id: payload.id,
            speed: payload.speed,
            size: payload.size,
            bullet_speed: payload.bullet_speed,
            bullet_size: payload.bullet_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoAwayPayload {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdPayload {
    pub id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotsFiredPayload {
    pub id: u32,
    pub bullet_id: u32,
    pub x: f32,
    pub y: f32,
    pub aim_x: f32,
    pub aim_y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionPayload {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDestroyedPayload {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killer_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bullet_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMovingPayload {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub move_x: f32,
    pub move_y: f32,
}

/// Movement or aim vector sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovePayload {
    pub move_x: f32,
    pub move_y: f32,
}

impl From<Vector2> for MovePayload {
    fn from(v: Vector2) -> Self {
        Self {
            move_x: v.x,
            move_y: v.y,
        }
    }
}

impl From<&MovePayload> for Vector2 {
    fn from(payload: &MovePayload) -> Self {
        Vector2::new(payload.move_x, payload.move_y)
    }
}

/// Flattened entity inside `world_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityPayload {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_y: Option<f32>,
}

impl From<&Entity> for EntityPayload {
    fn from(entity: &Entity) -> Self {
        Self {
            id: entity.id,
            x: entity.position.x,
            y: entity.position.y,
            move_x: entity.direction.map(|d| d.x),
            move_y: entity.direction.map(|d| d.y),
        }
    }
}

impl From<&EntityPayload> for Entity {
    fn from(payload: &EntityPayload) -> Self {
        let direction = match (payload.move_x, payload.move_y) {
            (Some(x), Some(y)) => Some(Vector2::new(x, y)),
            _ => None,
        };
        Entity {
            id: payload.id,
            position: Vector2::new(payload.x, payload.y),
            direction,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldStatePayload {
    pub player_count: u32,
    pub alive_players: Vec<EntityPayload>,
    pub alive_bullets: Vec<EntityPayload>,
}

impl From<&WorldState> for WorldStatePayload {
    fn from(world: &WorldState) -> Self {
        Self {
            player_count: world.player_count,
            alive_players: world.alive_players.iter().map(EntityPayload::from).collect(),
            alive_bullets: world.alive_bullets.iter().map(EntityPayload::from).collect(),
        }
    }
}

impl From<&WorldStatePayload> for WorldState {
    fn from(payload: &WorldStatePayload) -> Self {
        Self {
            player_count: payload.player_count,
            alive_players: payload.alive_players.iter().map(Entity::from).collect(),
            alive_bullets: payload.alive_bullets.iter().map(Entity::from).collect(),
        }
    }
}

impl From<&WorldEvent> for Message {
    fn from(event: &WorldEvent) -> Self {
        match *event {
            WorldEvent::PlayerJoined { id } => Message::PlayerJoined(IdPayload { id }),
            WorldEvent::PlayerLeft { id } => Message::PlayerLeft(IdPayload { id }),
            WorldEvent::PlayerSpawned { id, position } => Message::PlayerSpawned(PositionPayload {
                id,
                x: position.x,
                y: position.y,
            }),
            WorldEvent::PlayerDestroyed { id, cause } => {
                Message::PlayerDestroyed(PlayerDestroyedPayload {
                    id,
                    killer_id: cause.map(|c| c.killer_id),
                    bullet_id: cause.map(|c| c.bullet_id),
                })
            }
            WorldEvent::PlayerMoving {
                id,
                position,
                direction,
            } => Message::PlayerMoving(PlayerMovingPayload {
                id,
                x: position.x,
                y: position.y,
                move_x: direction.x,
                move_y: direction.y,
            }),
            WorldEvent::PlayerStopped { id, position } => Message::PlayerStopped(PositionPayload {
                id,
                x: position.x,
                y: position.y,
            }),
            WorldEvent::ShotsFired {
                id,
                bullet_id,
                position,
                aim,
            } => Message::ShotsFired(ShotsFiredPayload {
                id,
                bullet_id,
                x: position.x,
                y: position.y,
                aim_x: aim.x,
                aim_y: aim.y,
            }),
        }
    }
}

impl PlayerDestroyedPayload {
    pub fn cause(&self) -> Option<KillCause> {
        match (self.killer_id, self.bullet_id) {
            (Some(killer_id), Some(bullet_id)) => Some(KillCause {
                killer_id,
                bullet_id,
            }),
            _ => None,
        }
    }
}

/// Encodes one message as a whitespace-free text frame.
pub fn encode(message: &Message) -> serde_json::Result<String> {
    serde_json::to_string(message)
}

/// Encodes a world update once; connections share the resulting frames.
pub fn encode_update(update: &WorldUpdate) -> Vec<Utf8Bytes> {
    let snapshot = update
        .snapshot
        .as_ref()
        .map(|world| Message::WorldState(world.into()));
    update
        .events
        .iter()
        .map(Message::from)
        .chain(snapshot)
        .filter_map(|message| match encode(&message) {
            Ok(txt) => Some(Utf8Bytes::from(txt)),
            Err(e) => {
                error!(error = ?e, tag = message.tag(), "failed to encode world update");
                None
            }
        })
        .collect()
}

/// Decodes one text frame into a message, validating the payload for its tag.
pub fn decode(frame: &str) -> Result<Message, ArenaError> {
    let value: Value =
        serde_json::from_str(frame).map_err(|e| ArenaError::MalformedFrame(e.to_string()))?;
    let Value::Object(mut envelope) = value else {
        return Err(ArenaError::MalformedFrame(
            "frame is not a JSON object".to_string(),
        ));
    };

    let tag = match envelope.remove("type") {
        Some(Value::String(tag)) => tag,
        Some(_) => {
            return Err(ArenaError::MalformedFrame(
                "`type` is not a string".to_string(),
            ));
        }
        None => return Err(ArenaError::MalformedFrame("missing `type`".to_string())),
    };
    let data = envelope.remove("data");
    if let Some(key) = envelope.keys().next() {
        return Err(ArenaError::MalformedFrame(format!(
            "unexpected envelope key `{key}`"
        )));
    }

    match tag.as_str() {
        "welcome" => payload(data).map(Message::Welcome),
        "go_away" => payload(data).map(Message::GoAway),
        "player_joined" => payload(data).map(Message::PlayerJoined),
        "player_left" => payload(data).map(Message::PlayerLeft),
        "shots_fired" => payload(data).map(Message::ShotsFired),
        "player_spawned" => payload(data).map(Message::PlayerSpawned),
        "player_destroyed" => payload(data).map(Message::PlayerDestroyed),
        "player_moving" => payload(data).map(Message::PlayerMoving),
        "player_stopped" => payload(data).map(Message::PlayerStopped),
        "world_state" => payload(data).map(Message::WorldState),
        "start_moving" => payload(data).map(Message::StartMoving),
        "stop_moving" => dataless(data).map(|()| Message::StopMoving),
        "fire" => payload(data).map(Message::Fire),
        _ => Err(ArenaError::UnknownMessageType(tag.clone())),
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Id,
    Number,
    Text,
    List,
}

impl Kind {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Kind::Id => value.as_u64().is_some_and(|v| v <= u64::from(u32::MAX)),
            Kind::Number => value.is_number(),
            Kind::Text => value.is_string(),
            Kind::List => value.is_array(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Kind::Id => "an unsigned 32-bit integer",
            Kind::Number => "a number",
            Kind::Text => "a string",
            Kind::List => "an array",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Field {
    name: &'static str,
    kind: Kind,
    required: bool,
}

const fn req(name: &'static str, kind: Kind) -> Field {
    Field {
        name,
        kind,
        required: true,
    }
}

const fn opt(name: &'static str, kind: Kind) -> Field {
    Field {
        name,
        kind,
        required: false,
    }
}

const ENTITY_FIELDS: &[Field] = &[
    req("id", Kind::Id),
    req("x", Kind::Number),
    req("y", Kind::Number),
    opt("move_x", Kind::Number),
    opt("move_y", Kind::Number),
];

/// Payload schema: field table checked before serde sees the object.
trait Payload: DeserializeOwned {
    const FIELDS: &'static [Field];

    fn check_nested(_data: &Map<String, Value>) -> Result<(), ArenaError> {
        Ok(())
    }

    // Cross-field rules the field table cannot express.
    fn validate(&self) -> Result<(), ArenaError> {
        Ok(())
    }
}

impl Payload for WelcomePayload {
    const FIELDS: &'static [Field] = &[
        req("id", Kind::Id),
        req("speed", Kind::Number),
        req("size", Kind::Number),
        req("bullet_speed", Kind::Number),
        req("bullet_size", Kind::Number),
    ];
}

impl Payload for GoAwayPayload {
    const FIELDS: &'static [Field] = &[req("reason", Kind::Text)];
}

impl Payload for IdPayload {
    const FIELDS: &'static [Field] = &[req("id", Kind::Id)];
}

impl Payload for ShotsFiredPayload {
    const FIELDS: &'static [Field] = &[
        req("id", Kind::Id),
        req("bullet_id", Kind::Id),
        req("x", Kind::Number),
        req("y", Kind::Number),
        req("aim_x", Kind::Number),
        req("aim_y", Kind::Number),
    ];
}

impl Payload for PositionPayload {
    const FIELDS: &'static [Field] = &[
        req("id", Kind::Id),
        req("x", Kind::Number),
        req("y", Kind::Number),
    ];
}

impl Payload for PlayerDestroyedPayload {
    const FIELDS: &'static [Field] = &[
        req("id", Kind::Id),
        opt("killer_id", Kind::Id),
        opt("bullet_id", Kind::Id),
    ];

    fn validate(&self) -> Result<(), ArenaError> {
        paired("killer_id", self.killer_id, "bullet_id", self.bullet_id)
    }
}

impl Payload for PlayerMovingPayload {
    const FIELDS: &'static [Field] = &[
        req("id", Kind::Id),
        req("x", Kind::Number),
        req("y", Kind::Number),
        req("move_x", Kind::Number),
        req("move_y", Kind::Number),
    ];
}

impl Payload for MovePayload {
    const FIELDS: &'static [Field] = &[req("move_x", Kind::Number), req("move_y", Kind::Number)];
}

impl Payload for WorldStatePayload {
    const FIELDS: &'static [Field] = &[
        req("player_count", Kind::Id),
        req("alive_players", Kind::List),
        req("alive_bullets", Kind::List),
    ];

    fn check_nested(data: &Map<String, Value>) -> Result<(), ArenaError> {
        for list in ["alive_players", "alive_bullets"] {
            let Some(Value::Array(entities)) = data.get(list) else {
                continue;
            };
            for (index, entity) in entities.iter().enumerate() {
                let path = format!("{list}[{index}]");
                let Value::Object(fields) = entity else {
                    return Err(ArenaError::invalid_payload(path, "expected an object"));
                };
                check_fields(&format!("{path}."), fields, ENTITY_FIELDS)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ArenaError> {
        let lists = [
            ("alive_players", &self.alive_players),
            ("alive_bullets", &self.alive_bullets),
        ];
        for (list, entities) in lists {
            for (index, entity) in entities.iter().enumerate() {
                paired("move_x", entity.move_x, "move_y", entity.move_y).map_err(|e| match e {
                    ArenaError::InvalidPayload { field, reason } => {
                        ArenaError::invalid_payload(format!("{list}[{index}].{field}"), reason)
                    }
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}

fn payload<T: Payload>(data: Option<Value>) -> Result<T, ArenaError> {
    let fields = match data {
        Some(Value::Object(fields)) => fields,
        Some(_) => {
            return Err(ArenaError::MalformedFrame(
                "`data` is not an object".to_string(),
            ));
        }
        None => Map::new(),
    };
    check_fields("", &fields, T::FIELDS)?;
    T::check_nested(&fields)?;

    let payload: T = serde_json::from_value(Value::Object(fields))
        .map_err(|e| ArenaError::invalid_payload("data", e.to_string()))?;
    payload.validate()?;
    Ok(payload)
}

fn dataless(data: Option<Value>) -> Result<(), ArenaError> {
    match data {
        None | Some(Value::Null) => Ok(()),
        Some(Value::Object(fields)) => match fields.keys().next() {
            Some(key) => Err(ArenaError::invalid_payload(
                key.as_str(),
                "unexpected field",
            )),
            None => Ok(()),
        },
        Some(_) => Err(ArenaError::MalformedFrame(
            "`data` is not an object".to_string(),
        )),
    }
}

fn check_fields(path: &str, data: &Map<String, Value>, fields: &[Field]) -> Result<(), ArenaError> {
    if let Some(key) = data
        .keys()
        .find(|key| !fields.iter().any(|f| f.name == key.as_str()))
    {
        return Err(ArenaError::invalid_payload(
            format!("{path}{key}"),
            "unexpected field",
        ));
    }

    for field in fields {
        match data.get(field.name) {
            None if field.required => {
                return Err(ArenaError::invalid_payload(
                    format!("{path}{}", field.name),
                    "missing required field",
                ));
            }
            Some(value) if !field.kind.accepts(value) => {
                return Err(ArenaError::invalid_payload(
                    format!("{path}{}", field.name),
                    format!("expected {}", field.kind.describe()),
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn paired<T>(
    first: &str,
    a: Option<T>,
    second: &str,
    b: Option<T>,
) -> Result<(), ArenaError> {
    match (a.is_some(), b.is_some()) {
        (true, false) => Err(ArenaError::invalid_payload(
            second,
            format!("must be present together with `{first}`"),
        )),
        (false, true) => Err(ArenaError::invalid_payload(
            first,
            format!("must be present together with `{second}`"),
        )),
        _ => Ok(()),
    }
}
