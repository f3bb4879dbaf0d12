//! Data types mirrored from the transit backend
//!
//! The client owns none of this data. These are UI-scoped copies of
//! server entities, deserialized straight from the backend's JSON:
//! - `User`: the logged-in account
//! - `Bus` and `Location`: tracked vehicles and their last known position
//! - `BusStop`, `Route` and `RouteShape`: static reference geometry
//! - `ChatMessage` and `Notification`: ephemeral feed items

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend identifier for users
pub type UserId = i64;
/// Backend identifier for buses
pub type BusId = i64;
/// Backend identifier for bus stops
pub type StopId = i64;
/// Backend identifier for routes
pub type RouteId = i64;
/// Backend identifier for conversations
pub type ConversationId = i64;

/// Account role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Passenger,
    Driver,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Passenger => write!(f, "passenger"),
            Role::Driver => write!(f, "driver"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// The authenticated user (`GET /account/me`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
}

impl User {
    /// Name shown in the UI: full name when set, otherwise the username
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

/// Operational state of a tracked vehicle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum BusStatus {
    Operational,
    Idle,
    Maintenance,
    Breakdown,
}

impl BusStatus {
    /// All statuses, in display order
    pub fn all() -> &'static [BusStatus] {
        &[
            BusStatus::Operational,
            BusStatus::Idle,
            BusStatus::Maintenance,
            BusStatus::Breakdown,
        ]
    }

    /// Whether the bus is expected to be moving on its route
    pub fn is_in_service(&self) -> bool {
        matches!(self, BusStatus::Operational)
    }
}

impl std::fmt::Display for BusStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusStatus::Operational => write!(f, "operational"),
            BusStatus::Idle => write!(f, "idle"),
            BusStatus::Maintenance => write!(f, "maintenance"),
            BusStatus::Breakdown => write!(f, "breakdown"),
        }
    }
}

impl std::str::FromStr for BusStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "operational" => Ok(BusStatus::Operational),
            "idle" => Ok(BusStatus::Idle),
            "maintenance" => Ok(BusStatus::Maintenance),
            "breakdown" => Ok(BusStatus::Breakdown),
            other => Err(format!("Unknown bus status: {}", other)),
        }
    }
}

/// A position fix for a bus
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// Degrees clockwise from north
    #[serde(default)]
    pub heading: Option<f64>,
    /// km/h
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            heading: None,
            speed: None,
            timestamp: None,
        }
    }

    /// Builder method: set heading
    pub fn heading(mut self, heading: f64) -> Self {
        self.heading = Some(heading);
        self
    }
}

/// A tracked vehicle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
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

impl Bus {
    pub fn new(id: BusId, license_plate: impl Into<String>, status: BusStatus) -> Self {
        Self {
            id,
            license_plate: license_plate.into(),
            status,
            route_id: None,
            capacity: None,
            location: None,
        }
    }

    /// Builder method: assign to a route
    pub fn on_route(mut self, route_id: RouteId) -> Self {
        self.route_id = Some(route_id);
        self
    }

    /// Builder method: set last known location
    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// A stop on one or more routes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusStop {
    pub id: StopId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub route_ids: Vec<RouteId>,
}

/// A bus route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub id: RouteId,
    pub name: String,
    #[serde(default)]
    pub number: Option<String>,
    /// CSS hex color, e.g. `#2196F3`
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub stop_ids: Vec<StopId>,
}

impl Route {
    /// Short label: route number when present, otherwise the name
    pub fn label(&self) -> &str {
        self.number.as_deref().unwrap_or(&self.name)
    }
}

/// Generated road geometry for a route
///
/// Coordinates are `[longitude, latitude]` pairs, GeoJSON order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteShape {
    pub route_id: RouteId,
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
}

impl RouteShape {
    /// Iterate the shape as `(latitude, longitude)`
    pub fn lat_lon(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.coordinates.iter().map(|[lon, lat]| (*lat, *lon))
    }
}

/// A chat message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: i64,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    #[serde(default)]
    pub sender_name: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A user-facing notification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    #[serde(rename = "notification_type", default = "default_notification_kind")]
    pub kind: String,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

fn default_notification_kind() -> String {
    "info".to_string()
}

/// Response of `POST /accounts/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_deserialize_with_location() {
        let json = r#"{
            "id": 7,
            "license_plate": "KA-01-1234",
            "status": "operational",
            "route_id": 3,
            "location": {"latitude": 12.97, "longitude": 77.59, "heading": 90.0},
            "driver": {"id": 4}
        }"#;
        let bus: Bus = serde_json::from_str(json).unwrap();
        assert_eq!(bus.id, 7);
        assert_eq!(bus.status, BusStatus::Operational);
        assert_eq!(bus.route_id, Some(3));
        let location = bus.location.unwrap();
        assert_eq!(location.heading, Some(90.0));
        assert!(location.speed.is_none());
    }

    #[test]
    fn test_bus_deserialize_minimal() {
        let json = r#"{"id": 1, "license_plate": "X", "status": "breakdown"}"#;
        let bus: Bus = serde_json::from_str(json).unwrap();
        assert_eq!(bus.status, BusStatus::Breakdown);
        assert!(bus.location.is_none());
        assert!(bus.route_id.is_none());
    }

    #[test]
    fn test_unknown_status_rejected() {
        let json = r#"{"id": 1, "license_plate": "X", "status": "flying"}"#;
        assert!(serde_json::from_str::<Bus>(json).is_err());
        assert!("flying".parse::<BusStatus>().is_err());
        assert_eq!(" Idle ".parse::<BusStatus>().unwrap(), BusStatus::Idle);
    }

    #[test]
    fn test_user_display_name() {
        let mut user: User = serde_json::from_str(
            r#"{"id": 1, "username": "asha", "role": "driver", "full_name": "Asha Rao"}"#,
        )
        .unwrap();
        assert_eq!(user.role, Role::Driver);
        assert_eq!(user.display_name(), "Asha Rao");

        user.full_name = Some("  ".to_string());
        assert_eq!(user.display_name(), "asha");
    }

    #[test]
    fn test_notification_kind_field() {
        let json = r#"{
            "id": 5,
            "title": "Delay",
            "message": "Route 12 delayed",
            "notification_type": "warning",
            "created_at": "2024-03-01T08:30:00Z"
        }"#;
        let notification: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(notification.kind, "warning");
        assert!(!notification.is_read);

        let json = r#"{"id": 6, "title": "t", "message": "m", "created_at": "2024-03-01T08:30:00Z"}"#;
        let notification: Notification = serde_json::from_str(json).unwrap();
        assert_eq!(notification.kind, "info");
    }

    #[test]
    fn test_route_shape_lat_lon_order() {
        let shape = RouteShape {
            route_id: 1,
            coordinates: vec![[77.59, 12.97], [77.60, 12.98]],
        };
        let points: Vec<_> = shape.lat_lon().collect();
        assert_eq!(points[0], (12.97, 77.59));
    }

    #[test]
    fn test_token_response_default_type() {
        let token: TokenResponse = serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(token.token_type, "bearer");
    }
}
