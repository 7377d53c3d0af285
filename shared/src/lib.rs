//! Wire protocol and gameplay constants shared by the server and the test client
//!
//! Every datagram carries exactly one JSON object with a `type` discriminator.
//! `MOVE` messages nest a second discriminator (`subtype`) inside their `data`
//! object, while `SHOOT` messages carry `subtype` next to `data`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 41234;

pub const SPAWN_X: f32 = 400.0;
pub const SPAWN_Y: f32 = 300.0;
pub const MAX_HEALTH: i32 = 100;

/// Distance a projectile travels per physics tick
pub const PROJECTILE_SPEED: f32 = 10.0;
/// Projectiles spawn this far ahead of the shooter
pub const PROJECTILE_SPAWN_OFFSET: f32 = 20.0;
pub const PROJECTILE_LIFETIME_MS: u64 = 2000;
pub const COLLISION_RADIUS: f32 = 20.0;
pub const HIT_DAMAGE: i32 = 10;

pub const PROJECTILE_TICK_MS: u64 = 100;
pub const COLLISION_TICK_MS: u64 = 10;
pub const HEARTBEAT_SWEEP_MS: u64 = 1000;
pub const HEARTBEAT_TIMEOUT_MS: u64 = 5000;

/// Clients send a heartbeat on this interval
pub const HEARTBEAT_INTERVAL_MS: u64 = 1000;

/// Maps any finite rotation in degrees into `[0, 360)`.
///
/// Non-finite input collapses to 0 so a bad client value can never poison
/// the projectile direction.
pub fn normalize_rotation(rotation: f32) -> f32 {
    if !rotation.is_finite() {
        return 0.0;
    }
    let normalized = ((rotation % 360.0) + 360.0) % 360.0;
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// A vector in 2D world space. Positive y points down the screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `degrees`, measured clockwise from +x.
    pub fn from_degrees(degrees: f32) -> Self {
        let radians = degrees.to_radians();
        Self {
            x: radians.cos(),
            y: radians.sin(),
        }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn distance(&self, other: &Vector2) -> f32 {
        Vector2::new(other.x - self.x, other.y - self.y).magnitude()
    }
}

/// Failure to turn a datagram into a [`Message`]
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("datagram is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Who produced a `MOVE` or `MARK_PLAYER_DEAD` broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRef {
    #[serde(rename = "playerName")]
    pub name: String,
}

/// Client-reported transform carried by a `CHANGE_INFO` move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerTransform {
    #[serde(rename = "playerName")]
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub health: i32,
    #[serde(default)]
    pub is_shot: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subtype")]
pub enum MoveData {
    #[serde(rename = "CHANGE_INFO")]
    ChangeInfo(PlayerTransform),
    #[serde(rename = "HEARTBEAT")]
    Heartbeat {
        #[serde(rename = "playerName")]
        name: String,
    },
    #[serde(rename = "DELETE_PLAYER")]
    DeletePlayer {
        #[serde(rename = "playerName")]
        name: String,
    },
}

impl MoveData {
    pub fn player_name(&self) -> &str {
        match self {
            MoveData::ChangeInfo(transform) => &transform.name,
            MoveData::Heartbeat { name } | MoveData::DeletePlayer { name } => name,
        }
    }
}

/// Projectile fields as rendered by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletState {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub direction: Vector2,
    #[serde(rename = "playerName")]
    pub owner: String,
    /// Wall-clock creation time in epoch milliseconds
    #[serde(rename = "createdTime")]
    pub created_time: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subtype", content = "data")]
pub enum ShootEvent {
    #[serde(rename = "ADD_BULLET")]
    Add(BulletState),
    #[serde(rename = "UPDATE_BULLET")]
    Update(BulletState),
    #[serde(rename = "REMOVE_BULLET")]
    Remove { id: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    #[serde(rename = "NAME")]
    Join {
        #[serde(rename = "playerName")]
        name: String,
    },
    #[serde(rename = "NAME_ACCEPTED")]
    NameAccepted,
    #[serde(rename = "NAME_TAKEN")]
    NameTaken,
    #[serde(rename = "MOVE")]
    Move {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<Source>,
        data: MoveData,
    },
    #[serde(rename = "SHOOT")]
    Shoot(ShootEvent),
    #[serde(rename = "MARK_PLAYER_DEAD")]
    PlayerEliminated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<Source>,
        data: PlayerRef,
    },
    #[serde(rename = "WINNER")]
    GameWon {
        #[serde(rename = "playerName")]
        name: String,
    },
}

impl Message {
    /// Parses one datagram.
    pub fn decode(bytes: &[u8]) -> Result<Message, ProtocolError> {
        let text = std::str::from_utf8(bytes)?;
        Ok(serde_json::from_str(text)?)
    }

    /// Serializes the message into a single datagram payload.
    ///
    /// None of the message types contain non-string map keys, so this only
    /// fails if a custom serializer is swapped in.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn join_ack(accepted: bool) -> Message {
        if accepted {
            Message::NameAccepted
        } else {
            Message::NameTaken
        }
    }

    pub fn delete_player(name: &str) -> Message {
        Message::Move {
            source: Some(Source::Server),
            data: MoveData::DeletePlayer {
                name: name.to_string(),
            },
        }
    }

    pub fn player_eliminated(name: &str) -> Message {
        Message::PlayerEliminated {
            source: Some(Source::Server),
            data: PlayerRef {
                name: name.to_string(),
            },
        }
    }

    pub fn game_won(name: &str) -> Message {
        Message::GameWon {
            name: name.to_string(),
        }
    }
}
