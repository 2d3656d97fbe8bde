//! Event envelopes and their routing targets.
//!
//! Queue messages arrive as JSON:
//!
//! ```json
//! {
//!   "event": "leave_request_approved",
//!   "payload": { "requestId": 17 },
//!   "userIds": ["u1", "u2"],
//!   "employeeIds": ["EMP001"],
//!   "teamId": "team-7",
//!   "roles": ["manager", "hr_staff"]
//! }
//! ```
//!
//! All routing hints are optional. Decoding collapses them into exactly one
//! [`RoutingTarget`] using the fixed priority
//! `userIds > employeeIds > teamId > roles > broadcast`; lower-priority hints
//! on the same message are discarded.
//!
//! A hint list selects its branch whenever it is non-empty on the wire, even
//! if none of its entries is a usable id. Such a message resolves to an empty
//! target and reaches nobody.

use serde::Deserialize;
use serde_json::Value;

use crate::errors::DecodeError;

/// Resolved destination of an envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoutingTarget {
    /// Every connection of each listed user id.
    Users(Vec<String>),
    /// The `employee:<id>` group of each listed employee id.
    Employees(Vec<String>),
    /// The `team:<id>` group.
    Team(String),
    /// The `role:<name>` group of each role, fanned out independently.
    Roles(Vec<String>),
    /// Every open connection.
    Broadcast,
}

impl RoutingTarget {
    /// Collapse routing hints into a single target by priority.
    ///
    /// `None` means the hint was absent. A `Some` list selects its branch
    /// even when empty.
    pub fn from_hints(
        user_ids: Option<Vec<String>>,
        employee_ids: Option<Vec<String>>,
        team_id: Option<String>,
        roles: Option<Vec<String>>,
    ) -> Self {
        if let Some(ids) = user_ids {
            Self::Users(ids)
        } else if let Some(ids) = employee_ids {
            Self::Employees(ids)
        } else if let Some(team) = team_id {
            Self::Team(team)
        } else if let Some(roles) = roles {
            Self::Roles(roles)
        } else {
            Self::Broadcast
        }
    }

    /// Short label for logs and metrics.
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Users(_) => "users",
            Self::Employees(_) => "employees",
            Self::Team(_) => "team",
            Self::Roles(_) => "roles",
            Self::Broadcast => "broadcast",
        }
    }
}

/// One routable event plus its payload and destination.
#[derive(Clone, Debug, PartialEq)]
pub struct EventEnvelope {
    /// Event name pushed to clients.
    pub event: String,
    /// Opaque payload, forwarded untouched.
    pub payload: Value,
    /// Where the event goes.
    pub target: RoutingTarget,
}

/// Wire shape of a queue message body.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    user_ids: Option<Vec<Value>>,
    #[serde(default)]
    employee_ids: Option<Vec<Value>>,
    #[serde(default)]
    team_id: Option<Value>,
    #[serde(default)]
    roles: Option<Vec<Value>>,
}

impl EventEnvelope {
    /// Build an envelope directly.
    pub fn new(event: impl Into<String>, payload: Value, target: RoutingTarget) -> Self {
        Self {
            event: event.into(),
            payload,
            target,
        }
    }

    /// Decode a queue message body.
    ///
    /// Ids may be JSON strings or numbers; `null`, empty strings and other
    /// non-scalar entries are skipped. A `teamId` that is neither absent,
    /// `null`, `""` nor a usable id is rejected.
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        let wire: WireEnvelope = serde_json::from_slice(body)?;
        if wire.event.is_empty() {
            return Err(DecodeError::EmptyEventName);
        }
        let target = RoutingTarget::from_hints(
            hint_list(wire.user_ids),
            hint_list(wire.employee_ids),
            team_hint(wire.team_id)?,
            hint_list(wire.roles),
        );
        Ok(Self {
            event: wire.event,
            payload: wire.payload,
            target,
        })
    }
}

/// A JSON id as a string: non-empty strings as-is, numbers in decimal.
pub fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `None` for an absent or empty list, otherwise its usable ids.
fn hint_list(values: Option<Vec<Value>>) -> Option<Vec<String>> {
    let values = values.filter(|v| !v.is_empty())?;
    Some(values.iter().filter_map(scalar_id).collect())
}

fn team_hint(value: Option<Value>) -> Result<Option<String>, DecodeError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(value) => scalar_id(&value)
            .map(Some)
            .ok_or(DecodeError::InvalidTeamId),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn decode(value: &Value) -> Result<EventEnvelope, DecodeError> {
        EventEnvelope::decode(value.to_string().as_bytes())
    }

    #[test]
    fn user_ids_win_over_roles() {
        let env = decode(&json!({
            "event": "notification",
            "payload": {"n": 1},
            "userIds": ["u1"],
            "roles": ["manager"],
        }))
        .unwrap();
        assert_eq!(env.target, RoutingTarget::Users(vec!["u1".into()]));
        assert_eq!(env.payload["n"], 1);
    }

    #[test]
    fn employees_win_over_team() {
        let env = decode(&json!({
            "event": "e",
            "employeeIds": ["EMP001"],
            "teamId": "t1",
        }))
        .unwrap();
        assert_eq!(env.target, RoutingTarget::Employees(vec!["EMP001".into()]));
    }

    #[test]
    fn team_wins_over_roles() {
        let env = decode(&json!({"event": "e", "teamId": "t1", "roles": ["hr"]})).unwrap();
        assert_eq!(env.target, RoutingTarget::Team("t1".into()));
    }

    #[test]
    fn roles_when_nothing_else() {
        let env = decode(&json!({"event": "e", "roles": ["manager", "hr_staff"]})).unwrap();
        assert_eq!(
            env.target,
            RoutingTarget::Roles(vec!["manager".into(), "hr_staff".into()])
        );
    }

    #[test]
    fn no_hints_is_broadcast() {
        let env = decode(&json!({"event": "system_notice", "payload": "hi"})).unwrap();
        assert_eq!(env.target, RoutingTarget::Broadcast);
    }

    #[test]
    fn empty_and_null_hints_fall_through() {
        let env = decode(&json!({
            "event": "e",
            "userIds": [],
            "employeeIds": null,
            "teamId": "",
            "roles": ["admin"],
        }))
        .unwrap();
        assert_eq!(env.target, RoutingTarget::Roles(vec!["admin".into()]));
    }

    #[test]
    fn numeric_ids_are_stringified() {
        let env = decode(&json!({"event": "e", "teamId": 42})).unwrap();
        assert_eq!(env.target, RoutingTarget::Team("42".into()));

        let env = decode(&json!({"event": "e", "userIds": [7, null, "u8", ""]})).unwrap();
        assert_eq!(env.target, RoutingTarget::Users(vec!["7".into(), "u8".into()]));
    }

    #[test]
    fn unusable_entries_keep_their_branch() {
        for junk in [json!([null]), json!([{}]), json!([true]), json!([""])] {
            let env = decode(&json!({"event": "payslip", "userIds": junk, "roles": ["hr"]}))
                .unwrap();
            assert_eq!(env.target, RoutingTarget::Users(vec![]), "userIds {junk}");

            let env = decode(&json!({"event": "e", "employeeIds": junk, "teamId": "t1"}))
                .unwrap();
            assert_eq!(env.target, RoutingTarget::Employees(vec![]), "employeeIds {junk}");

            let env = decode(&json!({"event": "e", "roles": junk})).unwrap();
            assert_eq!(env.target, RoutingTarget::Roles(vec![]), "roles {junk}");
        }
    }

    #[test]
    fn non_scalar_team_id_is_rejected() {
        for junk in [json!({}), json!(true), json!(["t1"])] {
            assert_matches!(
                decode(&json!({"event": "e", "teamId": junk})),
                Err(DecodeError::InvalidTeamId)
            );
        }
    }

    #[test]
    fn scalar_id_forms() {
        assert_eq!(scalar_id(&json!("u1")).as_deref(), Some("u1"));
        assert_eq!(scalar_id(&json!(42)).as_deref(), Some("42"));
        assert_eq!(scalar_id(&json!("")), None);
        assert_eq!(scalar_id(&json!(null)), None);
        assert_eq!(scalar_id(&json!({"id": 1})), None);
    }

    #[test]
    fn missing_payload_is_null() {
        let env = decode(&json!({"event": "ping"})).unwrap();
        assert_eq!(env.payload, Value::Null);
    }

    #[test]
    fn not_json_is_rejected() {
        assert_matches!(
            EventEnvelope::decode(b"definitely not json"),
            Err(DecodeError::Json(_))
        );
    }

    #[test]
    fn missing_event_is_rejected() {
        assert_matches!(decode(&json!({"payload": {}})), Err(DecodeError::Json(_)));
    }

    #[test]
    fn empty_event_is_rejected() {
        assert_matches!(decode(&json!({"event": ""})), Err(DecodeError::EmptyEventName));
    }

    #[test]
    fn strategy_labels() {
        assert_eq!(RoutingTarget::Users(vec![]).strategy(), "users");
        assert_eq!(RoutingTarget::Employees(vec![]).strategy(), "employees");
        assert_eq!(RoutingTarget::Team(String::new()).strategy(), "team");
        assert_eq!(RoutingTarget::Roles(vec![]).strategy(), "roles");
        assert_eq!(RoutingTarget::Broadcast.strategy(), "broadcast");
    }
}
