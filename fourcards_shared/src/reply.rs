//! Typed replies from the game process.
//!
//! Replies arrive as single-quoted JSON (see [`crate::lenient`]) except for
//! player registration, which answers with plain text.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::GameError;

/// Status string the process uses for successful queries.
pub const STATUS_SUCCESS: &str = "success";
/// Join status for a caller who is already seated.
pub const STATUS_ALREADY_JOINED: &str = "You are already in this game";
/// Join status for a refused join.
pub const STATUS_ERROR: &str = "error";

/// Accepts `"12"` or `12` and yields `"12"`.
fn string_or_number<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// Registered profile for an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub username: Option<String>,
}

impl UserInfo {
    /// Registered name. A blank name counts as unregistered.
    pub fn name(&self) -> Option<&str> {
        self.username.as_deref().filter(|n| !n.trim().is_empty())
    }
}

/// Game stage label reported by the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GameStage {
    LookingForMembers,
    OnGoing,
    Completed,
    Other(String),
}

impl GameStage {
    pub fn as_str(&self) -> &str {
        match self {
            GameStage::LookingForMembers => "LOOKING FOR MEMBERS",
            GameStage::OnGoing => "ON-GOING",
            GameStage::Completed => "COMPLETED",
            GameStage::Other(s) => s,
        }
    }
}

impl From<String> for GameStage {
    fn from(s: String) -> Self {
        match s.as_str() {
            "LOOKING FOR MEMBERS" => GameStage::LookingForMembers,
            "ON-GOING" => GameStage::OnGoing,
            "COMPLETED" => GameStage::Completed,
            _ => GameStage::Other(s),
        }
    }
}

impl From<GameStage> for String {
    fn from(stage: GameStage) -> Self {
        stage.as_str().to_string()
    }
}

impl std::fmt::Display for GameStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room status as returned by `GetRoomStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomStatus {
    #[serde(rename = "gameID", default, deserialize_with = "string_or_number")]
    pub game_id: String,
    #[serde(rename = "gameState")]
    pub game_state: GameStage,
    /// Comma-joined participant addresses, creator first.
    #[serde(default)]
    pub players: String,
}

impl RoomStatus {
    pub fn participants(&self) -> Vec<String> {
        if self.players.is_empty() {
            return Vec::new();
        }
        self.players.split(',').map(str::to_string).collect()
    }

    pub fn creator(&self) -> Option<&str> {
        if self.players.is_empty() {
            return None;
        }
        self.players.split(',').next()
    }
}

/// Reply to `CreateGameRoom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRoom {
    #[serde(default)]
    pub message: String,
    #[serde(rename = "gameID", deserialize_with = "string_or_number")]
    pub game_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub password: String,
}

/// Raw reply to `JoinRoom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinReply {
    pub status: String,
    #[serde(default)]
    pub message: String,
}

/// What a join attempt achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyJoined,
}

impl JoinReply {
    pub fn into_outcome(self) -> Result<JoinOutcome, GameError> {
        match self.status.as_str() {
            STATUS_SUCCESS => Ok(JoinOutcome::Joined),
            STATUS_ALREADY_JOINED => Ok(JoinOutcome::AlreadyJoined),
            STATUS_ERROR => Err(GameError::Rejected(self.message)),
            other => Err(GameError::InvalidResponse(format!(
                "unknown join status '{other}'"
            ))),
        }
    }
}

/// Plain-text reply to `RegisterPlayer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    Updated,
    Taken,
    Unexpected(String),
}

impl RegisterOutcome {
    pub fn from_reply(data: &str) -> Self {
        match data {
            "Successfully registered player" => RegisterOutcome::Registered,
            "Username updated successfully" => RegisterOutcome::Updated,
            "Username already taken" => RegisterOutcome::Taken,
            other => RegisterOutcome::Unexpected(other.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RegisterOutcome::Registered | RegisterOutcome::Updated)
    }
}

/// Reply to `GetCurrentTurn`. Everything besides `status` is kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnInfo {
    pub status: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl TurnInfo {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// A detail field rendered as text.
    pub fn detail(&self, key: &str) -> Option<String> {
        self.details.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// Reply to `GetMyCards`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardsInfo {
    pub status: String,
    #[serde(default)]
    pub cards: Vec<u8>,
}

impl CardsInfo {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }
}
