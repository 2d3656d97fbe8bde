//! Frames exchanged with clients.
//!
//! Server → client: `{"event": "<name>", "data": <payload>}`.
//!
//! Client → server control messages:
//! `{"type": "join_team" | "leave_team" | "join_department" |
//! "leave_department" | "join_room" | "leave_room", "data": "<id>"}`.
//! Ids may also be sent as JSON numbers.

use herald_core::GroupKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name of the greeting pushed after admission.
pub const CONNECTED_EVENT: &str = "connected";

/// Greeting text carried by the `connected` event.
pub const CONNECTED_MESSAGE: &str = "Connected to HRM Socket Service";

#[derive(Serialize)]
struct ServerFrame<'a> {
    event: &'a str,
    data: &'a Value,
}

/// Serialize a server push frame.
pub fn event_frame(event: &str, data: &Value) -> serde_json::Result<String> {
    serde_json::to_string(&ServerFrame { event, data })
}

/// The `connected` greeting for `user_id`, stamped with the current time.
pub fn connected_frame(user_id: &str) -> serde_json::Result<String> {
    let data = serde_json::json!({
        "message": CONNECTED_MESSAGE,
        "userId": user_id,
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
    });
    event_frame(CONNECTED_EVENT, &data)
}

/// Why a client text frame was not a usable control message.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Not JSON, or no `type` field.
    #[error("malformed control message: {0}")]
    Json(#[from] serde_json::Error),
    /// `type` names no known control message.
    #[error("unknown control message type: {0}")]
    UnknownType(String),
    /// `data` is missing, empty, or not a string/number.
    #[error("control message {0} has no target id")]
    MissingTarget(String),
}

/// Group change requested by a client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    /// Join `team:<id>`.
    JoinTeam(String),
    /// Leave `team:<id>`.
    LeaveTeam(String),
    /// Join `department:<id>`.
    JoinDepartment(String),
    /// Leave `department:<id>`.
    LeaveDepartment(String),
    /// Join a named room.
    JoinRoom(String),
    /// Leave a named room.
    LeaveRoom(String),
}

#[derive(Deserialize)]
struct RawControl {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl ControlMessage {
    /// Parse a client text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let raw: RawControl = serde_json::from_str(text)?;
        let target = match &raw.data {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => {
                return Err(match raw.kind.as_str() {
                    "join_team" | "leave_team" | "join_department" | "leave_department"
                    | "join_room" | "leave_room" => ProtocolError::MissingTarget(raw.kind),
                    _ => ProtocolError::UnknownType(raw.kind),
                });
            }
        };
        match raw.kind.as_str() {
            "join_team" => Ok(Self::JoinTeam(target)),
            "leave_team" => Ok(Self::LeaveTeam(target)),
            "join_department" => Ok(Self::JoinDepartment(target)),
            "leave_department" => Ok(Self::LeaveDepartment(target)),
            "join_room" => Ok(Self::JoinRoom(target)),
            "leave_room" => Ok(Self::LeaveRoom(target)),
            _ => Err(ProtocolError::UnknownType(raw.kind)),
        }
    }

    /// Group the message addresses.
    pub fn group(&self) -> GroupKey {
        match self {
            Self::JoinTeam(id) | Self::LeaveTeam(id) => GroupKey::Team(id.clone()),
            Self::JoinDepartment(id) | Self::LeaveDepartment(id) => {
                GroupKey::Department(id.clone())
            }
            Self::JoinRoom(name) | Self::LeaveRoom(name) => GroupKey::Channel(name.clone()),
        }
    }

    /// Whether this is a join (as opposed to a leave).
    pub fn is_join(&self) -> bool {
        matches!(
            self,
            Self::JoinTeam(_) | Self::JoinDepartment(_) | Self::JoinRoom(_)
        )
    }
}
