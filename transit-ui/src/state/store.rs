//! State Reducers
//!
//! Pure merge functions behind the global signals. Kept free of Leptos so
//! they run as plain unit tests.

use std::collections::BTreeMap;

use crate::api::models::{
    bus_room, conversation_room, Bus, BusId, BusStatus, BusStop, ChatMessage, ConversationId,
    LocationUpdate, Notification, RouteId, RouteShape,
};

pub const RECONNECT_BASE_MS: u32 = 1000;
pub const RECONNECT_MAX_MS: u32 = 30_000;

/// Live socket state shown in the banner
#[derive(Clone, Debug, PartialEq, Default)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay_ms: u32 },
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    /// Banner text; `None` when the banner is hidden
    pub fn banner(&self) -> Option<String> {
        match self {
            ConnectionStatus::Connected => None,
            ConnectionStatus::Connecting => Some("Connecting…".to_string()),
            ConnectionStatus::Reconnecting { attempt, delay_ms } => Some(format!(
                "Reconnecting in {}s (attempt {})",
                delay_ms.div_ceil(1000),
                attempt
            )),
            ConnectionStatus::Disconnected => Some("Disconnected".to_string()),
        }
    }
}

/// Delay before reconnect attempt `attempt` (zero-based)
pub fn backoff_delay(attempt: u32) -> u32 {
    let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
    RECONNECT_BASE_MS.saturating_mul(factor).min(RECONNECT_MAX_MS)
}

/// Map toggles; never touch fetched data
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayOptions {
    pub show_routes: bool,
    pub show_stops: bool,
    pub show_buses: bool,
    pub selected_route: Option<RouteId>,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_routes: true,
            show_stops: true,
            show_buses: true,
            selected_route: None,
        }
    }
}

/// Overwrite one bus's location. Unknown ids are ignored.
pub fn apply_location(buses: &mut [Bus], update: &LocationUpdate) -> bool {
    match buses.iter_mut().find(|b| b.id == update.bus_id) {
        Some(bus) => {
            bus.location = Some(update.location());
            true
        }
        None => false,
    }
}

/// Append unless the id is already present
pub fn push_message(messages: &mut Vec<ChatMessage>, message: ChatMessage) -> bool {
    if messages.iter().any(|m| m.id == message.id) {
        return false;
    }
    messages.push(message);
    true
}

/// Merge a history page; returns how many were new
pub fn merge_messages(messages: &mut Vec<ChatMessage>, incoming: Vec<ChatMessage>) -> usize {
    let added = incoming
        .into_iter()
        .filter(|m| push_message(messages, m.clone()))
        .count();
    if added > 0 {
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    }
    added
}

/// Prepend unless the id is already present
pub fn push_notification(notifications: &mut Vec<Notification>, notification: Notification) -> bool {
    if notifications.iter().any(|n| n.id == notification.id) {
        return false;
    }
    notifications.insert(0, notification);
    true
}

/// Newest first, one entry per id
pub fn normalize_notifications(mut notifications: Vec<Notification>) -> Vec<Notification> {
    let mut seen = std::collections::HashSet::new();
    notifications.retain(|n| seen.insert(n.id));
    notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    notifications
}

pub fn mark_read(notifications: &mut [Notification], id: i64) -> bool {
    match notifications.iter_mut().find(|n| n.id == id) {
        Some(n) if !n.is_read => {
            n.is_read = true;
            true
        }
        _ => false,
    }
}

pub fn mark_all_read(notifications: &mut [Notification]) {
    for n in notifications {
        n.is_read = true;
    }
}

pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.is_read).count()
}

pub fn status_counts(buses: &[Bus]) -> BTreeMap<BusStatus, usize> {
    let mut counts: BTreeMap<BusStatus, usize> = BusStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for bus in buses {
        *counts.entry(bus.status).or_default() += 1;
    }
    counts
}

/// Buses passing the tracker's status filter
pub fn filter_buses(buses: &[Bus], status: Option<BusStatus>) -> Vec<Bus> {
    buses
        .iter()
        .filter(|b| status.map_or(true, |s| b.status == s))
        .cloned()
        .collect()
}

/// What the map draws under the current toggles
pub struct MapLayers<'a> {
    pub shapes: Vec<&'a RouteShape>,
    pub stops: Vec<&'a BusStop>,
    pub buses: Vec<&'a Bus>,
}

pub fn visible_layers<'a>(
    display: &DisplayOptions,
    shapes: impl IntoIterator<Item = &'a RouteShape>,
    stops: &'a [BusStop],
    buses: &'a [Bus],
) -> MapLayers<'a> {
    let on_route = |route_id: Option<RouteId>| match display.selected_route {
        Some(selected) => route_id == Some(selected),
        None => true,
    };

    MapLayers {
        shapes: if display.show_routes {
            shapes.into_iter().filter(|s| on_route(Some(s.route_id))).collect()
        } else {
            Vec::new()
        },
        stops: if display.show_stops {
            stops
                .iter()
                .filter(|s| match display.selected_route {
                    Some(r) => s.route_ids.contains(&r),
                    None => true,
                })
                .collect()
        } else {
            Vec::new()
        },
        buses: if display.show_buses {
            buses
                .iter()
                .filter(|b| b.location.is_some() && on_route(b.route_id))
                .collect()
        } else {
            Vec::new()
        },
    }
}

/// Toast severity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    Success,
    Info,
    Warning,
    Error,
}

impl AlertKind {
    /// Map a backend `notification_type`; unknown types are informational
    pub fn from_notification(kind: &str) -> Self {
        match kind {
            "success" => AlertKind::Success,
            "warning" | "delay" => AlertKind::Warning,
            "alert" | "error" | "breakdown" => AlertKind::Error,
            _ => AlertKind::Info,
        }
    }

    /// Icon and background class
    pub fn style(&self) -> (&'static str, &'static str) {
        match self {
            AlertKind::Success => ("✓", "bg-green-600"),
            AlertKind::Info => ("ℹ", "bg-blue-600"),
            AlertKind::Warning => ("⚠", "bg-yellow-600"),
            AlertKind::Error => ("✕", "bg-red-600"),
        }
    }

    /// Errors stay up longer
    pub fn timeout_ms(&self) -> u32 {
        match self {
            AlertKind::Error => 5000,
            _ => 3000,
        }
    }
}

/// One toast; `seq` tells a newer toast from the one a timer was set for
#[derive(Clone, Debug, PartialEq)]
pub struct Alert {
    pub seq: u32,
    pub kind: AlertKind,
    pub text: String,
}

/// Rooms the open panels want, whether or not a socket was up when they opened
pub fn panel_rooms(
    active_conversation: Option<ConversationId>,
    tracked_bus: Option<BusId>,
) -> Vec<String> {
    active_conversation
        .map(conversation_room)
        .into_iter()
        .chain(tracked_bus.map(bus_room))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Location;
    use chrono::{TimeZone, Utc};

    fn bus(id: i64, status: BusStatus, route: Option<i64>) -> Bus {
        Bus {
            id,
            license_plate: format!("P-{}", id),
            status,
            route_id: route,
            capacity: None,
            location: Some(Location {
                latitude: 10.0,
                longitude: 20.0,
                heading: None,
                speed: None,
                timestamp: None,
            }),
        }
    }

    fn message(id: i64, minute: u32) -> ChatMessage {
        ChatMessage {
            id,
            conversation_id: 1,
            sender_id: 2,
            sender_name: None,
            content: format!("m{}", id),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, minute, 0).unwrap(),
        }
    }

    fn notification(id: i64, minute: u32) -> Notification {
        Notification {
            id,
            title: "t".into(),
            message: "m".into(),
            kind: "info".into(),
            is_read: false,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_location_update_touches_one_bus() {
        let mut buses = vec![
            bus(1, BusStatus::Operational, Some(1)),
            bus(2, BusStatus::Idle, Some(1)),
        ];
        let before = buses[1].clone();
        let update = LocationUpdate {
            bus_id: 1,
            latitude: 11.0,
            longitude: 21.0,
            heading: Some(90.0),
            speed: None,
            timestamp: None,
        };

        assert!(apply_location(&mut buses, &update));
        assert_eq!(buses[0].location.as_ref().unwrap().latitude, 11.0);
        assert_eq!(buses[1], before);

        let unknown = LocationUpdate { bus_id: 99, ..update };
        assert!(!apply_location(&mut buses, &unknown));
    }

    #[test]
    fn test_messages_not_duplicated() {
        let mut messages = Vec::new();
        assert!(push_message(&mut messages, message(1, 0)));
        assert!(push_message(&mut messages, message(2, 1)));
        assert!(!push_message(&mut messages, message(1, 0)));

        // History reloaded after reconnect overlaps what the socket delivered
        let added = merge_messages(&mut messages, vec![message(0, 0), message(1, 0), message(2, 1)]);
        assert_eq!(added, 1);
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_notifications() {
        let mut list = normalize_notifications(vec![
            notification(1, 0),
            notification(2, 5),
            notification(1, 0),
        ]);
        assert_eq!(list.iter().map(|n| n.id).collect::<Vec<_>>(), vec![2, 1]);

        assert!(push_notification(&mut list, notification(3, 9)));
        assert!(!push_notification(&mut list, notification(3, 9)));
        assert_eq!(list[0].id, 3);
        assert_eq!(unread_count(&list), 3);

        assert!(mark_read(&mut list, 2));
        assert!(!mark_read(&mut list, 2));
        assert_eq!(unread_count(&list), 2);

        mark_all_read(&mut list);
        assert_eq!(unread_count(&list), 0);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let delays: Vec<u32> = (0..7).map(backoff_delay).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16_000, 30_000, 30_000]);
        assert_eq!(backoff_delay(64), 30_000);
    }

    #[test]
    fn test_banner_text() {
        assert_eq!(ConnectionStatus::Connected.banner(), None);
        assert_eq!(
            ConnectionStatus::Reconnecting {
                attempt: 3,
                delay_ms: 4000
            }
            .banner()
            .unwrap(),
            "Reconnecting in 4s (attempt 3)"
        );
    }

    #[test]
    fn test_display_options_do_not_touch_data() {
        let buses = vec![
            bus(1, BusStatus::Operational, Some(1)),
            bus(2, BusStatus::Idle, Some(2)),
        ];
        let stops = vec![BusStop {
            id: 1,
            name: "Central".into(),
            latitude: 0.0,
            longitude: 0.0,
            route_ids: vec![1],
        }];
        let shapes = vec![RouteShape {
            route_id: 2,
            coordinates: vec![[0.0, 0.0]],
        }];
        let snapshot = (buses.clone(), stops.clone(), shapes.clone());

        let mut display = DisplayOptions::default();
        let layers = visible_layers(&display, &shapes, &stops, &buses);
        assert_eq!((layers.shapes.len(), layers.stops.len(), layers.buses.len()), (1, 1, 2));

        display.show_stops = false;
        display.selected_route = Some(1);
        let layers = visible_layers(&display, &shapes, &stops, &buses);
        assert!(layers.shapes.is_empty());
        assert!(layers.stops.is_empty());
        assert_eq!(layers.buses.len(), 1);

        assert_eq!(buses, snapshot.0);
        assert_eq!(stops, snapshot.1);
        assert_eq!(shapes, snapshot.2);
    }

    #[test]
    fn test_status_counts_and_filter() {
        let buses = vec![
            bus(1, BusStatus::Operational, None),
            bus(2, BusStatus::Operational, None),
            bus(3, BusStatus::Breakdown, None),
        ];
        let counts = status_counts(&buses);
        assert_eq!(counts[&BusStatus::Operational], 2);
        assert_eq!(counts[&BusStatus::Maintenance], 0);
        assert_eq!(filter_buses(&buses, Some(BusStatus::Breakdown)).len(), 1);
        assert_eq!(filter_buses(&buses, None).len(), 3);
    }

    #[test]
    fn test_panel_rooms() {
        assert!(panel_rooms(None, None).is_empty());
        assert_eq!(panel_rooms(Some(4), None), vec!["conversation:4"]);
        assert_eq!(
            panel_rooms(Some(4), Some(7)),
            vec!["conversation:4", "bus:7"]
        );
        assert_eq!(panel_rooms(None, Some(7)), vec!["bus:7"]);
    }

    #[test]
    fn test_alert_kind_from_notification() {
        assert_eq!(AlertKind::from_notification("delay"), AlertKind::Warning);
        assert_eq!(AlertKind::from_notification("breakdown"), AlertKind::Error);
        assert_eq!(AlertKind::from_notification("success"), AlertKind::Success);
        assert_eq!(AlertKind::from_notification("info"), AlertKind::Info);
        assert_eq!(AlertKind::from_notification("something-new"), AlertKind::Info);
        assert!(AlertKind::Error.timeout_ms() > AlertKind::Info.timeout_ms());
    }
}
