//! Live Feed Message Types
//!
//! Frames on the socket are JSON, adjacently tagged:
//! `{"type": "bus_location_update", "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{BusId, ChatMessage, ConversationId, Location, Notification, RouteId};

/// Events pushed by the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A bus reported a new position
    BusLocationUpdate(LocationUpdate),
    /// A message was posted in a joined conversation
    ChatMessage(ChatMessage),
    /// A notification for the current user
    Notification(Notification),
    /// Room join confirmed
    RoomJoined { room: String },
    /// Room leave confirmed
    RoomLeft { room: String },
    /// Keepalive from the server, answered with `pong`
    Ping,
    /// Answer to our `ping`
    Pong,
    /// Server-side error for a command we sent
    Error { message: String },
}

impl ServerEvent {
    /// Parse one text frame
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Wire name of the event, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::BusLocationUpdate(_) => "bus_location_update",
            ServerEvent::ChatMessage(_) => "chat_message",
            ServerEvent::Notification(_) => "notification",
            ServerEvent::RoomJoined { .. } => "room_joined",
            ServerEvent::RoomLeft { .. } => "room_left",
            ServerEvent::Ping => "ping",
            ServerEvent::Pong => "pong",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Payload of `bus_location_update`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationUpdate {
    pub bus_id: BusId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LocationUpdate {
    pub fn location(&self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
            heading: self.heading,
            speed: self.speed,
            timestamp: self.timestamp,
        }
    }
}

/// Commands sent to the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinRoom { room: String },
    LeaveRoom { room: String },
    Ping,
    Pong,
}

impl ClientCommand {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Room name helpers
///
/// A room must be joined before the backend forwards its events.
pub struct Room;

impl Room {
    pub fn conversation(id: ConversationId) -> String {
        format!("conversation:{}", id)
    }

    pub fn route(id: RouteId) -> String {
        format!("route:{}", id)
    }

    pub fn bus(id: BusId) -> String {
        format!("bus:{}", id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location_update() {
        let json = r#"{
            "type": "bus_location_update",
            "data": {"bus_id": 3, "latitude": 12.9, "longitude": 77.6, "heading": 180.0}
        }"#;
        match ServerEvent::parse(json).unwrap() {
            ServerEvent::BusLocationUpdate(update) => {
                assert_eq!(update.bus_id, 3);
                assert_eq!(update.location().heading, Some(180.0));
                assert!(update.speed.is_none());
            }
            other => panic!("Expected BusLocationUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_chat_message() {
        let json = r#"{
            "type": "chat_message",
            "data": {
                "id": 10, "conversation_id": 4, "sender_id": 2,
                "content": "Running late", "created_at": "2024-03-01T08:30:00Z"
            }
        }"#;
        let event = ServerEvent::parse(json).unwrap();
        assert_eq!(event.kind(), "chat_message");
        assert!(matches!(event, ServerEvent::ChatMessage(ref m) if m.id == 10));
    }

    #[test]
    fn test_parse_rooms_and_keepalive() {
        let joined = ServerEvent::parse(r#"{"type": "room_joined", "data": {"room": "route:2"}}"#)
            .unwrap();
        assert_eq!(
            joined,
            ServerEvent::RoomJoined {
                room: "route:2".to_string()
            }
        );
        assert_eq!(ServerEvent::parse(r#"{"type": "ping"}"#).unwrap(), ServerEvent::Ping);
        assert_eq!(ServerEvent::parse(r#"{"type": "pong"}"#).unwrap(), ServerEvent::Pong);
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        assert!(ServerEvent::parse(r#"{"type": "bus_exploded", "data": {}}"#).is_err());
        assert!(ServerEvent::parse("not json").is_err());
    }

    #[test]
    fn test_client_command_serialize() {
        let json = ClientCommand::JoinRoom {
            room: Room::conversation(4),
        }
        .to_json()
        .unwrap();
        assert!(json.contains("\"type\":\"join_room\""));
        assert!(json.contains("\"room\":\"conversation:4\""));

        let json = ClientCommand::Pong.to_json().unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn test_room_names() {
        assert_eq!(Room::route(7), "route:7");
        assert_eq!(Room::bus(12), "bus:12");
    }
}
