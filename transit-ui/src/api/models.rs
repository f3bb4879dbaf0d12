//! Backend Data Types
//!
//! JSON shapes returned by the REST API and pushed over the live socket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type BusId = i64;
pub type RouteId = i64;
pub type ConversationId = i64;

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: String,
}

impl User {
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum BusStatus {
    Operational,
    Idle,
    Maintenance,
    Breakdown,
}

impl BusStatus {
    pub const ALL: [BusStatus; 4] = [
        BusStatus::Operational,
        BusStatus::Idle,
        BusStatus::Maintenance,
        BusStatus::Breakdown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusStatus::Operational => "operational",
            BusStatus::Idle => "idle",
            BusStatus::Maintenance => "maintenance",
            BusStatus::Breakdown => "breakdown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Marker color on the map and badge color in the list
    pub fn color(&self) -> &'static str {
        match self {
            BusStatus::Operational => "#4CAF50",
            BusStatus::Idle => "#FF9800",
            BusStatus::Maintenance => "#2196F3",
            BusStatus::Breakdown => "#F44336",
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub heading: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Bus {
    pub id: BusId,
    pub license_plate: String,
    pub status: BusStatus,
    #[serde(default)]
    pub route_id: Option<RouteId>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct BusStop {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub route_ids: Vec<RouteId>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub stop_ids: Vec<i64>,
}

impl Route {
    pub fn label(&self) -> &str {
        self.number.as_deref().unwrap_or(&self.name)
    }
}

/// `[longitude, latitude]` pairs
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct RouteShape {
    pub route_id: RouteId,
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub sender_id: i64,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "notification_type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

fn default_kind() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

// ============ Live socket ============

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
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

/// Server to client frames, `{"type": ..., "data": ...}`
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    BusLocationUpdate(LocationUpdate),
    ChatMessage(ChatMessage),
    Notification(Notification),
    RoomJoined { room: String },
    RoomLeft { room: String },
    Ping,
    Pong,
    Error { message: String },
}

/// Client to server frames
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    JoinRoom { room: String },
    LeaveRoom { room: String },
    Ping,
    Pong,
}

pub fn conversation_room(id: ConversationId) -> String {
    format!("conversation:{}", id)
}

pub fn bus_room(id: BusId) -> String {
    format!("bus:{}", id)
}
