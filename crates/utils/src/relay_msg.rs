//! Wire types of the real-time layer.
//!
//! Every frame exchanged over the socket is a JSON object of the shape
//! `{"event": <name>, "data": <value>}`. Outbound frames are always one of
//! the four [`EventKind`]s; inbound frames may additionally be room
//! management commands (see [`ClientMessage`]).

use std::{fmt, str::FromStr};

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use ts_rs::TS;

const MAX_ROOM_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomKeyError {
    #[error("room id is empty")]
    Empty,
    #[error("room id `{0}` contains invalid characters or is too long")]
    InvalidId(String),
    #[error("room id must be a string or an integer, got {0}")]
    InvalidType(String),
    #[error("unknown room key `{0}`")]
    UnknownPrefix(String),
}

/// Name of a multicast group: `user-<id>` or `project-<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RoomKey {
    User(String),
    Project(String),
}

impl RoomKey {
    pub fn user(id: impl Into<String>) -> Result<Self, RoomKeyError> {
        Ok(Self::User(validate_id(id.into())?))
    }

    pub fn project(id: impl Into<String>) -> Result<Self, RoomKeyError> {
        Ok(Self::Project(validate_id(id.into())?))
    }

    pub fn id(&self) -> &str {
        match self {
            Self::User(id) | Self::Project(id) => id,
        }
    }

    pub fn is_user_room(&self) -> bool {
        matches!(self, Self::User(_))
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user-{id}"),
            Self::Project(id) => write!(f, "project-{id}"),
        }
    }
}

impl FromStr for RoomKey {
    type Err = RoomKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("user-") {
            Self::user(id)
        } else if let Some(id) = s.strip_prefix("project-") {
            Self::project(id)
        } else {
            Err(RoomKeyError::UnknownPrefix(s.to_string()))
        }
    }
}

fn validate_id(id: String) -> Result<String, RoomKeyError> {
    if id.is_empty() {
        return Err(RoomKeyError::Empty);
    }
    let valid = id.len() <= MAX_ROOM_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id)
    } else {
        Err(RoomKeyError::InvalidId(id))
    }
}

/// Reads an identifier sent as a JSON string or integer.
pub fn id_from_value(value: &Value) -> Result<String, RoomKeyError> {
    match value {
        Value::String(s) => validate_id(s.clone()),
        Value::Number(n) if n.is_u64() || n.is_i64() => validate_id(n.to_string()),
        other => Err(RoomKeyError::InvalidType(json_type_name(other).to_string())),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    ProjectCreated,
    ProjectUpdated,
    TaskCreated,
    TaskUpdated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project-created",
            Self::ProjectUpdated => "project-updated",
            Self::TaskCreated => "task-created",
            Self::TaskUpdated => "task-updated",
        }
    }

    pub fn is_project_event(&self) -> bool {
        matches!(self, Self::ProjectCreated | Self::ProjectUpdated)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("{kind} payload must be a JSON object")]
    NotAnObject { kind: EventKind },
    #[error("{kind} payload has an invalid `{field}`: {source}")]
    InvalidField {
        kind: EventKind,
        field: &'static str,
        source: RoomKeyError,
    },
    #[error("{kind} payload is missing `{field}`")]
    MissingField {
        kind: EventKind,
        field: &'static str,
    },
}

/// A transient notification that a project or task was created or updated.
///
/// The payload is the full REST representation of the mutated record and
/// is forwarded verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct RelayEvent {
    #[serde(rename = "event")]
    pub kind: EventKind,
    #[serde(rename = "data")]
    pub payload: Value,
}

impl RelayEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Builds an event from a record using its REST serialization.
    pub fn from_record<T: Serialize>(kind: EventKind, record: &T) -> serde_json::Result<Self> {
        Ok(Self::new(kind, serde_json::to_value(record)?))
    }

    /// Rooms this event fans out to, derived from identifying payload fields.
    pub fn target_rooms(&self) -> Result<Vec<RoomKey>, EventError> {
        match self.kind {
            EventKind::ProjectCreated => Ok(vec![RoomKey::User(self.field("ownerId")?)]),
            EventKind::ProjectUpdated => Ok(vec![RoomKey::Project(self.field("id")?)]),
            EventKind::TaskCreated | EventKind::TaskUpdated => Ok(vec![
                RoomKey::Project(self.field("projectId")?),
                RoomKey::User(self.field("assigneeId")?),
            ]),
        }
    }

    /// Human readable `title` of the record, if the payload carries one.
    pub fn title(&self) -> Option<&str> {
        self.payload.get("title").and_then(Value::as_str)
    }

    pub fn to_ws_message(&self) -> serde_json::Result<Message> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }

    fn field(&self, field: &'static str) -> Result<String, EventError> {
        let object = self
            .payload
            .as_object()
            .ok_or(EventError::NotAnObject { kind: self.kind })?;
        match object.get(field) {
            None | Some(Value::Null) => Err(EventError::MissingField {
                kind: self.kind,
                field,
            }),
            Some(value) => id_from_value(value).map_err(|source| EventError::InvalidField {
                kind: self.kind,
                field,
                source,
            }),
        }
    }
}

/// Frames a client may send over its socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinUserRoom(Value),
    JoinProjectRoom(Value),
    LeaveProjectRoom(Value),
    ProjectCreated(Value),
    ProjectUpdated(Value),
    TaskCreated(Value),
    TaskUpdated(Value),
}

impl ClientMessage {
    /// Splits event frames from room management commands.
    pub fn into_event(self) -> Result<RelayEvent, Self> {
        match self {
            Self::ProjectCreated(data) => Ok(RelayEvent::new(EventKind::ProjectCreated, data)),
            Self::ProjectUpdated(data) => Ok(RelayEvent::new(EventKind::ProjectUpdated, data)),
            Self::TaskCreated(data) => Ok(RelayEvent::new(EventKind::TaskCreated, data)),
            Self::TaskUpdated(data) => Ok(RelayEvent::new(EventKind::TaskUpdated, data)),
            other => Err(other),
        }
    }
}

impl From<RelayEvent> for ClientMessage {
    fn from(event: RelayEvent) -> Self {
        match event.kind {
            EventKind::ProjectCreated => Self::ProjectCreated(event.payload),
            EventKind::ProjectUpdated => Self::ProjectUpdated(event.payload),
            EventKind::TaskCreated => Self::TaskCreated(event.payload),
            EventKind::TaskUpdated => Self::TaskUpdated(event.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn room_keys_display_and_parse() {
        assert_eq!(RoomKey::user("42").unwrap().to_string(), "user-42");
        assert_eq!(
            "project-9".parse::<RoomKey>().unwrap(),
            RoomKey::Project("9".to_string())
        );
        let uuid = "550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(
            format!("project-{uuid}").parse::<RoomKey>().unwrap().id(),
            uuid
        );
    }

    #[test]
    fn malformed_room_keys_are_rejected() {
        assert_eq!("user-".parse::<RoomKey>(), Err(RoomKeyError::Empty));
        assert!(matches!(
            "team-1".parse::<RoomKey>(),
            Err(RoomKeyError::UnknownPrefix(_))
        ));
        assert!(matches!(
            RoomKey::project("a b"),
            Err(RoomKeyError::InvalidId(_))
        ));
        assert!(matches!(
            RoomKey::project("x".repeat(200)),
            Err(RoomKeyError::InvalidId(_))
        ));
    }

    #[test]
    fn ids_accept_strings_and_integers_only() {
        assert_eq!(id_from_value(&json!("42")).unwrap(), "42");
        assert_eq!(id_from_value(&json!(42)).unwrap(), "42");
        assert!(matches!(
            id_from_value(&json!(4.2)),
            Err(RoomKeyError::InvalidType(_))
        ));
        assert!(matches!(
            id_from_value(&json!({"id": 1})),
            Err(RoomKeyError::InvalidType(t)) if t == "object"
        ));
    }

    #[test]
    fn target_rooms_follow_event_kind() {
        let created = RelayEvent::new(
            EventKind::ProjectCreated,
            json!({"id": "p1", "ownerId": "42", "title": "Launch"}),
        );
        assert_eq!(created.target_rooms().unwrap(), vec![RoomKey::User("42".into())]);

        let updated = RelayEvent::new(
            EventKind::ProjectUpdated,
            json!({"id": "p1", "ownerId": "42"}),
        );
        assert_eq!(updated.target_rooms().unwrap(), vec![RoomKey::Project("p1".into())]);

        let task = RelayEvent::new(
            EventKind::TaskUpdated,
            json!({"id": "t1", "projectId": "9", "assigneeId": 7}),
        );
        assert_eq!(
            task.target_rooms().unwrap(),
            vec![RoomKey::Project("9".into()), RoomKey::User("7".into())]
        );
    }

    #[test]
    fn missing_identifying_fields_are_errors() {
        let task = RelayEvent::new(EventKind::TaskCreated, json!({"id": "t1", "projectId": "9"}));
        assert_eq!(
            task.target_rooms(),
            Err(EventError::MissingField {
                kind: EventKind::TaskCreated,
                field: "assigneeId"
            })
        );

        let null_owner = RelayEvent::new(EventKind::ProjectCreated, json!({"ownerId": null}));
        assert!(matches!(
            null_owner.target_rooms(),
            Err(EventError::MissingField { field: "ownerId", .. })
        ));

        let not_object = RelayEvent::new(EventKind::ProjectUpdated, json!("p1"));
        assert!(matches!(
            not_object.target_rooms(),
            Err(EventError::NotAnObject { .. })
        ));
    }

    #[test]
    fn events_use_event_data_framing() {
        let event = RelayEvent::new(EventKind::TaskCreated, json!({"id": "t1"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, json!({"event": "task-created", "data": {"id": "t1"}}));

        let back: RelayEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn client_frames_parse_into_commands_and_events() {
        let join: ClientMessage =
            serde_json::from_str(r#"{"event":"join-user-room","data":"42"}"#).unwrap();
        assert_eq!(join, ClientMessage::JoinUserRoom(json!("42")));
        assert!(join.into_event().is_err());

        let event: ClientMessage = serde_json::from_str(
            r#"{"event":"task-created","data":{"projectId":"9","assigneeId":"7","id":"t1"}}"#,
        )
        .unwrap();
        let event = event.into_event().unwrap();
        assert_eq!(event.kind, EventKind::TaskCreated);
        assert_eq!(event.payload["id"], "t1");

        let unknown = r#"{"event":"drop-tables","data":1}"#;
        assert!(serde_json::from_str::<ClientMessage>(unknown).is_err());
    }

    #[test]
    fn title_is_read_from_payload() {
        let event = RelayEvent::new(EventKind::ProjectCreated, json!({"title": "Launch"}));
        assert_eq!(event.title(), Some("Launch"));
        let untitled = RelayEvent::new(EventKind::ProjectCreated, json!({"id": "p1"}));
        assert_eq!(untitled.title(), None);
    }
}
