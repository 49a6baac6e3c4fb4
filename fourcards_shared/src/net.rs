//! Wire envelopes for talking to an AO process.
//!
//! Goals:
//! - Name every action the game process understands.
//! - Mirror the compute unit's JSON shapes for results and dry-runs.
//! - Keep tag construction in one place so every submission carries the
//!   standard protocol tags.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GameError;

/// Tag value stamped into the `SDK` tag of every request.
pub const SDK_NAME: &str = "fourcards";

/// Actions handled by the game process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    CreateGameRoom,
    JoinRoom,
    RegisterPlayer,
    GetUserInfo,
    GetRoomStatus,
    GetCurrentTurn,
    GetMyCards,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::CreateGameRoom => "CreateGameRoom",
            Action::JoinRoom => "JoinRoom",
            Action::RegisterPlayer => "RegisterPlayer",
            Action::GetUserInfo => "GetUserInfo",
            Action::GetRoomStatus => "GetRoomStatus",
            Action::GetCurrentTurn => "GetCurrentTurn",
            Action::GetMyCards => "GetMyCards",
        }
    }

    pub fn from_tag(s: &str) -> Option<Self> {
        match s {
            "CreateGameRoom" => Some(Action::CreateGameRoom),
            "JoinRoom" => Some(Action::JoinRoom),
            "RegisterPlayer" => Some(Action::RegisterPlayer),
            "GetUserInfo" => Some(Action::GetUserInfo),
            "GetRoomStatus" => Some(Action::GetRoomStatus),
            "GetCurrentTurn" => Some(Action::GetCurrentTurn),
            "GetMyCards" => Some(Action::GetMyCards),
            _ => None,
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single name/value tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub value: String,
}

impl Tag {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Ordered tag list for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<Tag>,
}

impl TagSet {
    /// Starts a tag set for `action`.
    pub fn action(action: Action) -> Self {
        let mut set = Self::default();
        set.push("Action", action.as_str());
        set
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.tags.push(Tag::new(name, value));
    }

    pub fn game_id(mut self, game_id: &str) -> Self {
        self.push("gameID", game_id);
        self
    }

    pub fn password(mut self, password: &str) -> Self {
        self.push("password", password);
        self
    }

    pub fn address(mut self, address: &str) -> Self {
        self.push("address", address);
        self
    }

    pub fn username(mut self, username: &str) -> Self {
        self.push("username", username);
        self
    }

    /// Looks up the first tag named `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }

    /// The `Action` tag, if it names a known action.
    pub fn action_tag(&self) -> Option<Action> {
        self.get("Action").and_then(Action::from_tag)
    }

    /// User tags followed by the standard AO message tags.
    pub fn into_wire(self) -> Vec<Tag> {
        let mut tags = self.tags;
        tags.push(Tag::new("Data-Protocol", "ao"));
        tags.push(Tag::new("Variant", "ao.TN.1"));
        tags.push(Tag::new("Type", "Message"));
        tags.push(Tag::new("SDK", SDK_NAME));
        tags
    }
}

/// One message emitted by the process while handling a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessMessage {
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

/// Outcome of evaluating one message (or dry-run).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultSet {
    #[serde(default)]
    pub messages: Vec<ProcessMessage>,
    #[serde(default)]
    pub spawns: Vec<Value>,
    #[serde(default)]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ResultSet {
    /// Result set carrying a single reply message.
    pub fn reply(data: impl Into<String>) -> Self {
        Self {
            messages: vec![ProcessMessage {
                data: data.into(),
                ..ProcessMessage::default()
            }],
            ..Self::default()
        }
    }

    /// Data of the first emitted message.
    pub fn first_data(&self) -> Result<&str, GameError> {
        self.messages
            .first()
            .map(|m| m.data.as_str())
            .ok_or(GameError::NoMessages)
    }
}

/// One entry of the results listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEdge {
    #[serde(default)]
    pub cursor: String,
    pub node: ResultSet,
}

/// Paged results listing (`sort=DESC` puts the newest first).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsPage {
    #[serde(default)]
    pub edges: Vec<ResultEdge>,
}

impl ResultsPage {
    /// Data of the first message of the newest edge.
    pub fn latest_data(&self) -> Result<&str, GameError> {
        let edge = self
            .edges
            .first()
            .ok_or_else(|| GameError::InvalidResponse("empty results listing".into()))?;
        edge.node
            .messages
            .first()
            .map(|m| m.data.as_str())
            .ok_or_else(|| GameError::InvalidResponse("latest result has no messages".into()))
    }
}

/// Reply from the messenger unit after accepting a data item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub id: String,
    #[serde(default)]
    pub message: String,
}

/// Body of a compute unit dry-run request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DryRunRequest {
    pub id: String,
    pub target: String,
    pub owner: String,
    pub anchor: String,
    pub data: String,
    pub tags: Vec<Tag>,
}

impl DryRunRequest {
    /// Placeholder id/owner values are accepted by the compute unit for
    /// read-only evaluation.
    pub fn new(process_id: &str, tags: TagSet, data: &str) -> Self {
        Self {
            id: "1234".to_string(),
            target: process_id.to_string(),
            owner: "1234".to_string(),
            anchor: "0".to_string(),
            data: data.to_string(),
            tags: tags.into_wire(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_tags_match_process_names() {
        for action in [
            Action::CreateGameRoom,
            Action::JoinRoom,
            Action::RegisterPlayer,
            Action::GetUserInfo,
            Action::GetRoomStatus,
            Action::GetCurrentTurn,
            Action::GetMyCards,
        ] {
            assert_eq!(Action::from_tag(action.as_str()), Some(action));
        }
        assert_eq!(Action::from_tag("Eval"), None);
    }

    #[test]
    fn wire_tags_append_protocol_tags() {
        let tags = TagSet::action(Action::JoinRoom)
            .game_id("7")
            .password("pw")
            .into_wire();
        assert_eq!(tags[0], Tag::new("Action", "JoinRoom"));
        assert_eq!(tags[1], Tag::new("gameID", "7"));
        assert!(tags.contains(&Tag::new("Data-Protocol", "ao")));
        assert!(tags.contains(&Tag::new("Type", "Message")));
    }

    #[test]
    fn result_set_decodes_cu_shape() {
        let raw = r#"{"Messages":[{"Data":"{'status':'success'}","Tags":[{"name":"Action","value":"Reply"}]}],"Spawns":[],"Output":""}"#;
        let rs: ResultSet = serde_json::from_str(raw).unwrap();
        assert_eq!(rs.first_data().unwrap(), "{'status':'success'}");
        assert!(rs.error.is_none());
    }

    #[test]
    fn empty_result_set_reports_no_messages() {
        let rs: ResultSet = serde_json::from_str("{}").unwrap();
        assert_eq!(rs.first_data(), Err(GameError::NoMessages));
    }

    #[test]
    fn results_page_latest_data() {
        let raw = r#"{"edges":[{"cursor":"c1","node":{"Messages":[{"Data":"Successfully registered player"}]}}]}"#;
        let page: ResultsPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.latest_data().unwrap(), "Successfully registered player");

        let empty = ResultsPage::default();
        assert!(matches!(
            empty.latest_data(),
            Err(GameError::InvalidResponse(_))
        ));
    }
}
