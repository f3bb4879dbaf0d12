//! Dashboard State
//!
//! The client's UI-scoped copy of server data: a REST snapshot that live
//! events are merged into. Nothing here is authoritative and nothing is
//! persisted.
//!
//! Merge rules:
//! - a location update overwrites one known bus in place; unknown ids are ignored
//! - chat messages and notifications are de-duplicated by id, so a replay
//!   after reconnect or a REST history reload never shows a message twice
//! - display options only affect rendering

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::live::{ConnectionStatus, LocationUpdate, ServerEvent};
use crate::models::{
    Bus, BusId, BusStatus, BusStop, ChatMessage, ConversationId, Notification, Route, RouteId,
    RouteShape, User,
};

/// What applying an event did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// State changed
    Updated,
    /// Already had it (same message/notification id)
    Duplicate,
    /// Refers to something not in the snapshot
    Ignored,
    /// Event carries no state (ping, pong, error)
    NoChange,
}

/// Rendering toggles
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayOptions {
    pub show_routes: bool,
    pub show_stops: bool,
    pub show_buses: bool,
    /// Restrict the map to one route
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

/// Messages of one conversation in arrival order
#[derive(Debug, Default, Clone)]
struct Conversation {
    messages: Vec<ChatMessage>,
    seen: HashSet<i64>,
}

impl Conversation {
    fn push(&mut self, message: ChatMessage) -> bool {
        if !self.seen.insert(message.id) {
            return false;
        }
        self.messages.push(message);
        true
    }
}

/// Client-side dashboard model
#[derive(Debug, Default, Clone)]
pub struct DashboardState {
    user: Option<User>,
    buses: Vec<Bus>,
    stops: Vec<BusStop>,
    routes: Vec<Route>,
    shapes: HashMap<RouteId, RouteShape>,
    conversations: HashMap<ConversationId, Conversation>,
    /// Newest first
    notifications: Vec<Notification>,
    rooms: BTreeSet<String>,
    pub display: DisplayOptions,
    pub connection: ConnectionStatus,
}

impl DashboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace snapshot data from the REST API
    pub fn load_snapshot(
        &mut self,
        user: Option<User>,
        buses: Vec<Bus>,
        stops: Vec<BusStop>,
        routes: Vec<Route>,
    ) {
        self.user = user;
        self.buses = buses;
        self.stops = stops;
        self.routes = routes;
        tracing::debug!(
            buses = self.buses.len(),
            stops = self.stops.len(),
            routes = self.routes.len(),
            "Snapshot loaded"
        );
    }

    /// Merge one live event
    pub fn apply(&mut self, event: &ServerEvent) -> Applied {
        match event {
            ServerEvent::BusLocationUpdate(update) => self.apply_location(update),
            ServerEvent::ChatMessage(message) => {
                if self.push_message(message.clone()) {
                    Applied::Updated
                } else {
                    Applied::Duplicate
                }
            }
            ServerEvent::Notification(notification) => {
                if self.push_notification(notification.clone()) {
                    Applied::Updated
                } else {
                    Applied::Duplicate
                }
            }
            ServerEvent::RoomJoined { room } => {
                if self.rooms.insert(room.clone()) {
                    Applied::Updated
                } else {
                    Applied::NoChange
                }
            }
            ServerEvent::RoomLeft { room } => {
                if self.rooms.remove(room) {
                    Applied::Updated
                } else {
                    Applied::NoChange
                }
            }
            ServerEvent::Ping | ServerEvent::Pong | ServerEvent::Error { .. } => Applied::NoChange,
        }
    }

    fn apply_location(&mut self, update: &LocationUpdate) -> Applied {
        match self.buses.iter_mut().find(|b| b.id == update.bus_id) {
            Some(bus) => {
                bus.location = Some(update.location());
                Applied::Updated
            }
            None => {
                tracing::debug!(bus_id = update.bus_id, "Location update for unknown bus");
                Applied::Ignored
            }
        }
    }

    /// Append a message unless its id was already seen
    pub fn push_message(&mut self, message: ChatMessage) -> bool {
        self.conversations
            .entry(message.conversation_id)
            .or_default()
            .push(message)
    }

    /// Merge a REST history page; returns how many were new
    pub fn merge_messages(
        &mut self,
        conversation_id: ConversationId,
        messages: Vec<ChatMessage>,
    ) -> usize {
        let conversation = self.conversations.entry(conversation_id).or_default();
        let added = messages
            .into_iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| conversation.push(m.clone()))
            .count();
        if added > 0 {
            conversation
                .messages
                .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        }
        added
    }

    /// Prepend a notification unless its id was already seen
    pub fn push_notification(&mut self, notification: Notification) -> bool {
        if self.notifications.iter().any(|n| n.id == notification.id) {
            return false;
        }
        self.notifications.insert(0, notification);
        true
    }

    /// Replace notifications with a REST snapshot (newest first)
    pub fn set_notifications(&mut self, mut notifications: Vec<Notification>) {
        let mut seen = HashSet::new();
        notifications.retain(|n| seen.insert(n.id));
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.notifications = notifications;
    }

    pub fn mark_notification_read(&mut self, id: i64) -> bool {
        match self.notifications.iter_mut().find(|n| n.id == id) {
            Some(n) if !n.is_read => {
                n.is_read = true;
                true
            }
            _ => false,
        }
    }

    pub fn mark_all_read(&mut self) {
        for notification in &mut self.notifications {
            notification.is_read = true;
        }
    }

    pub fn set_route_shape(&mut self, shape: RouteShape) {
        self.shapes.insert(shape.route_id, shape);
    }

    // ============ Read access ============

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.iter().find(|b| b.id == id)
    }

    pub fn buses_on_route(&self, route_id: RouteId) -> Vec<&Bus> {
        self.buses
            .iter()
            .filter(|b| b.route_id == Some(route_id))
            .collect()
    }

    pub fn stops(&self) -> &[BusStop] {
        &self.stops
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route_shape(&self, route_id: RouteId) -> Option<&RouteShape> {
        self.shapes.get(&route_id)
    }

    pub fn messages(&self, conversation_id: ConversationId) -> &[ChatMessage] {
        self.conversations
            .get(&conversation_id)
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn unread_notifications(&self) -> usize {
        self.notifications.iter().filter(|n| !n.is_read).count()
    }

    pub fn rooms(&self) -> impl Iterator<Item = &String> {
        self.rooms.iter()
    }

    /// Bus count per status, every status present
    pub fn status_counts(&self) -> BTreeMap<BusStatus, usize> {
        let mut counts: BTreeMap<BusStatus, usize> =
            BusStatus::all().iter().map(|s| (*s, 0)).collect();
        for bus in &self.buses {
            *counts.entry(bus.status).or_insert(0) += 1;
        }
        counts
    }

    // ============ Rendering view ============

    /// Buses the map should draw under the current display options
    pub fn visible_buses(&self) -> Vec<&Bus> {
        if !self.display.show_buses {
            return Vec::new();
        }
        self.buses
            .iter()
            .filter(|b| b.location.is_some())
            .filter(|b| match self.display.selected_route {
                Some(route) => b.route_id == Some(route),
                None => true,
            })
            .collect()
    }

    /// Stops the map should draw under the current display options
    pub fn visible_stops(&self) -> Vec<&BusStop> {
        if !self.display.show_stops {
            return Vec::new();
        }
        self.stops
            .iter()
            .filter(|s| match self.display.selected_route {
                Some(route) => s.route_ids.contains(&route),
                None => true,
            })
            .collect()
    }

    /// Route shapes the map should draw under the current display options
    pub fn visible_shapes(&self) -> Vec<&RouteShape> {
        if !self.display.show_routes {
            return Vec::new();
        }
        let mut shapes: Vec<&RouteShape> = self
            .shapes
            .values()
            .filter(|s| match self.display.selected_route {
                Some(route) => s.route_id == route,
                None => true,
            })
            .collect();
        shapes.sort_by_key(|s| s.route_id);
        shapes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;
    use chrono::{TimeZone, Utc};

    fn fleet() -> Vec<Bus> {
        vec![
            Bus::new(1, "A-1", BusStatus::Operational)
                .on_route(10)
                .at(Location::new(12.0, 77.0)),
            Bus::new(2, "A-2", BusStatus::Idle)
                .on_route(20)
                .at(Location::new(13.0, 78.0)),
            Bus::new(3, "A-3", BusStatus::Maintenance),
        ]
    }

    fn state() -> DashboardState {
        let mut state = DashboardState::new();
        let stops = vec![BusStop {
            id: 100,
            name: "Central".to_string(),
            latitude: 12.1,
            longitude: 77.1,
            route_ids: vec![10],
        }];
        let routes = vec![Route {
            id: 10,
            name: "Airport".to_string(),
            number: Some("10A".to_string()),
            color: None,
            stop_ids: vec![100],
        }];
        state.load_snapshot(None, fleet(), stops, routes);
        state
    }

    fn message(id: i64, conversation_id: ConversationId) -> ChatMessage {
        ChatMessage {
            id,
            conversation_id,
            sender_id: 1,
            sender_name: None,
            content: format!("message {}", id),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, id as u32 % 60).unwrap(),
        }
    }

    fn notification(id: i64, minute: u32) -> Notification {
        Notification {
            id,
            title: "Delay".to_string(),
            message: "Route delayed".to_string(),
            kind: "warning".to_string(),
            is_read: false,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 8, minute, 0).unwrap(),
        }
    }

    fn location_update(bus_id: BusId) -> ServerEvent {
        ServerEvent::BusLocationUpdate(LocationUpdate {
            bus_id,
            latitude: 12.5,
            longitude: 77.5,
            heading: Some(45.0),
            speed: Some(30.0),
            timestamp: None,
        })
    }

    #[test]
    fn test_location_update_touches_only_target_bus() {
        let mut state = state();
        let before: Vec<Bus> = state.buses().to_vec();

        assert_eq!(state.apply(&location_update(2)), Applied::Updated);

        let moved = state.bus(2).unwrap().location.clone().unwrap();
        assert_eq!(moved.latitude, 12.5);
        assert_eq!(moved.heading, Some(45.0));
        assert_eq!(state.bus(2).unwrap().status, BusStatus::Idle);

        assert_eq!(state.bus(1), Some(&before[0]));
        assert_eq!(state.bus(3), Some(&before[2]));
    }

    #[test]
    fn test_location_update_unknown_bus_ignored() {
        let mut state = state();
        let before: Vec<Bus> = state.buses().to_vec();
        assert_eq!(state.apply(&location_update(99)), Applied::Ignored);
        assert_eq!(state.buses(), before.as_slice());
    }

    #[test]
    fn test_chat_replay_not_duplicated() {
        let mut state = state();
        assert_eq!(
            state.apply(&ServerEvent::ChatMessage(message(1, 4))),
            Applied::Updated
        );
        assert_eq!(
            state.apply(&ServerEvent::ChatMessage(message(2, 4))),
            Applied::Updated
        );
        // Same message again after a reconnect
        assert_eq!(
            state.apply(&ServerEvent::ChatMessage(message(1, 4))),
            Applied::Duplicate
        );

        let ids: Vec<i64> = state.messages(4).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(state.messages(5).is_empty());
    }

    #[test]
    fn test_merge_history_with_live_messages() {
        let mut state = state();
        state.push_message(message(3, 4));

        let added = state.merge_messages(4, vec![message(1, 4), message(2, 4), message(3, 4)]);
        assert_eq!(added, 2);
        let ids: Vec<i64> = state.messages(4).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        // A live message after the merge is appended in arrival order
        state.push_message(message(4, 4));
        assert_eq!(state.messages(4).last().map(|m| m.id), Some(4));

        // Messages for another conversation are not merged in
        assert_eq!(state.merge_messages(4, vec![message(9, 5)]), 0);
        assert!(state.messages(5).is_empty());
    }

    #[test]
    fn test_notifications_newest_first_and_deduplicated() {
        let mut state = state();
        state.set_notifications(vec![notification(1, 0), notification(2, 5)]);
        assert_eq!(state.notifications()[0].id, 2);

        assert_eq!(
            state.apply(&ServerEvent::Notification(notification(3, 10))),
            Applied::Updated
        );
        assert_eq!(
            state.apply(&ServerEvent::Notification(notification(3, 10))),
            Applied::Duplicate
        );
        assert_eq!(state.notifications()[0].id, 3);
        assert_eq!(state.unread_notifications(), 3);

        assert!(state.mark_notification_read(2));
        assert!(!state.mark_notification_read(2));
        assert_eq!(state.unread_notifications(), 2);

        state.mark_all_read();
        assert_eq!(state.unread_notifications(), 0);
    }

    #[test]
    fn test_rooms_tracked() {
        let mut state = state();
        let joined = ServerEvent::RoomJoined {
            room: "route:10".to_string(),
        };
        assert_eq!(state.apply(&joined), Applied::Updated);
        assert_eq!(state.apply(&joined), Applied::NoChange);
        assert_eq!(state.rooms().count(), 1);

        let left = ServerEvent::RoomLeft {
            room: "route:10".to_string(),
        };
        assert_eq!(state.apply(&left), Applied::Updated);
        assert_eq!(state.rooms().count(), 0);
        assert_eq!(state.apply(&ServerEvent::Ping), Applied::NoChange);
    }

    #[test]
    fn test_display_toggles_leave_data_alone() {
        let mut state = state();
        state.set_route_shape(RouteShape {
            route_id: 10,
            coordinates: vec![[77.0, 12.0], [77.1, 12.1]],
        });

        let buses_before = state.buses().to_vec();
        let stops_before = state.stops().to_vec();
        assert_eq!(state.visible_buses().len(), 2);
        assert_eq!(state.visible_shapes().len(), 1);

        state.display.show_routes = false;
        state.display.show_stops = false;
        assert!(state.visible_shapes().is_empty());
        assert!(state.visible_stops().is_empty());
        assert!(state.route_shape(10).is_some());

        state.display.show_routes = true;
        state.display.selected_route = Some(20);
        let visible: Vec<BusId> = state.visible_buses().iter().map(|b| b.id).collect();
        assert_eq!(visible, vec![2]);
        assert!(state.visible_shapes().is_empty());

        assert_eq!(state.buses(), buses_before.as_slice());
        assert_eq!(state.stops(), stops_before.as_slice());
    }

    #[test]
    fn test_status_counts() {
        let state = state();
        let counts = state.status_counts();
        assert_eq!(counts[&BusStatus::Operational], 1);
        assert_eq!(counts[&BusStatus::Idle], 1);
        assert_eq!(counts[&BusStatus::Maintenance], 1);
        assert_eq!(counts[&BusStatus::Breakdown], 0);
        assert_eq!(state.buses_on_route(10).len(), 1);
    }
}
