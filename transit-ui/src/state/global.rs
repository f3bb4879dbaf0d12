//! Global Application State
//!
//! Reactive state management using Leptos signals. Merging goes through the
//! pure reducers in [`super::store`].

use leptos::*;
use std::collections::HashMap;

use super::store::{self, Alert, AlertKind, ConnectionStatus, DisplayOptions};
use super::websocket::LiveSocket;
use crate::api::{
    self,
    models::{
        Bus, BusId, BusStop, ChatMessage, ConversationId, Notification, Route, RouteId,
        RouteShape, ServerEvent, User,
    },
    ApiError,
};

/// Global application state provided to all components
#[derive(Clone, Copy)]
pub struct GlobalState {
    /// Mirror of the stored token; `None` sends guarded pages to login
    pub token: RwSignal<Option<String>>,
    pub user: RwSignal<Option<User>>,
    pub buses: RwSignal<Vec<Bus>>,
    pub stops: RwSignal<Vec<BusStop>>,
    pub routes: RwSignal<Vec<Route>>,
    pub shapes: RwSignal<HashMap<RouteId, RouteShape>>,
    pub messages: RwSignal<HashMap<ConversationId, Vec<ChatMessage>>>,
    /// Newest first
    pub notifications: RwSignal<Vec<Notification>>,
    pub display: RwSignal<DisplayOptions>,
    pub connection: RwSignal<ConnectionStatus>,
    pub selected_bus: RwSignal<Option<BusId>>,
    /// Bus whose room is currently joined
    pub tracked_bus: RwSignal<Option<BusId>>,
    pub active_conversation: RwSignal<Option<ConversationId>>,
    /// Global loading state
    pub loading: RwSignal<bool>,
    /// Toast currently shown
    pub alert: RwSignal<Option<Alert>>,
    alert_seq: StoredValue<u32>,
    /// Live socket, once the dashboard opened it
    pub socket: StoredValue<Option<LiveSocket>>,
}

/// Provide global state to the component tree
pub fn provide_global_state() {
    let state = GlobalState {
        token: create_rw_signal(api::get_token()),
        user: create_rw_signal(None),
        buses: create_rw_signal(Vec::new()),
        stops: create_rw_signal(Vec::new()),
        routes: create_rw_signal(Vec::new()),
        shapes: create_rw_signal(HashMap::new()),
        messages: create_rw_signal(HashMap::new()),
        notifications: create_rw_signal(Vec::new()),
        display: create_rw_signal(DisplayOptions::default()),
        connection: create_rw_signal(ConnectionStatus::Disconnected),
        selected_bus: create_rw_signal(None),
        tracked_bus: create_rw_signal(None),
        active_conversation: create_rw_signal(None),
        loading: create_rw_signal(false),
        alert: create_rw_signal(None),
        alert_seq: store_value(0),
        socket: store_value(None),
    };

    provide_context(state);
}

impl GlobalState {
    pub fn is_logged_in(&self) -> bool {
        self.token.get_untracked().is_some()
    }

    /// Merge one live event
    pub fn apply_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::BusLocationUpdate(update) => {
                self.buses.update(|buses| {
                    store::apply_location(buses, &update);
                });
            }
            ServerEvent::ChatMessage(message) => {
                self.messages.update(|all| {
                    let list = all.entry(message.conversation_id).or_default();
                    store::push_message(list, message);
                });
            }
            ServerEvent::Notification(notification) => {
                let title = notification.title.clone();
                let kind = notification.kind.clone();
                let mut added = false;
                self.notifications.update(|list| {
                    added = store::push_notification(list, notification);
                });
                if added {
                    self.show_alert(AlertKind::from_notification(&kind), &title);
                }
            }
            ServerEvent::Error { message } => {
                web_sys::console::error_1(&format!("Server error: {}", message).into());
                self.show_error(&message);
            }
            ServerEvent::RoomJoined { room } => {
                web_sys::console::log_1(&format!("Joined {}", room).into());
            }
            ServerEvent::RoomLeft { room } => {
                web_sys::console::log_1(&format!("Left {}", room).into());
            }
            ServerEvent::Ping | ServerEvent::Pong => {}
        }
    }

    pub fn merge_history(&self, conversation_id: ConversationId, history: Vec<ChatMessage>) {
        self.messages.update(|all| {
            store::merge_messages(all.entry(conversation_id).or_default(), history);
        });
    }

    pub fn conversation(&self, conversation_id: ConversationId) -> Vec<ChatMessage> {
        self.messages
            .with(|all| all.get(&conversation_id).cloned().unwrap_or_default())
    }

    pub fn unread_notifications(&self) -> usize {
        self.notifications.with(|list| store::unread_count(list))
    }

    /// Report a failed call. A 401 ends the session, anything else is a toast.
    pub fn handle_api_error(&self, context: &str, error: &ApiError) {
        web_sys::console::error_1(&format!("{}: {}", context, error).into());
        if error.is_unauthorized() {
            self.end_session();
            self.show_error("Session expired, please log in again");
        } else {
            self.show_error(&format!("{}: {}", context, error));
        }
    }

    /// Stored a fresh token after login
    pub fn start_session(&self, token: String) {
        self.token.set(Some(token));
    }

    /// Drop the token, close the socket and forget all fetched data
    pub fn end_session(&self) {
        api::clear_token();
        if let Some(socket) = self.socket.get_value() {
            socket.stop();
        }
        self.socket.set_value(None);

        self.user.set(None);
        self.buses.set(Vec::new());
        self.stops.set(Vec::new());
        self.routes.set(Vec::new());
        self.shapes.set(HashMap::new());
        self.messages.set(HashMap::new());
        self.notifications.set(Vec::new());
        self.selected_bus.set(None);
        self.tracked_bus.set(None);
        self.active_conversation.set(None);
        self.connection.set(ConnectionStatus::Disconnected);
        self.token.set(None);
    }

    /// Show a toast; it clears itself unless a newer one replaced it
    pub fn show_alert(&self, kind: AlertKind, message: &str) {
        let seq = self.alert_seq.get_value().wrapping_add(1);
        self.alert_seq.set_value(seq);
        self.alert.set(Some(Alert {
            seq,
            kind,
            text: message.to_string(),
        }));

        let alert = self.alert;
        gloo_timers::callback::Timeout::new(kind.timeout_ms(), move || {
            if alert.with_untracked(|a| a.as_ref().map(|a| a.seq)) == Some(seq) {
                alert.set(None);
            }
        })
        .forget();
    }

    pub fn show_success(&self, message: &str) {
        self.show_alert(AlertKind::Success, message);
    }

    pub fn show_error(&self, message: &str) {
        self.show_alert(AlertKind::Error, message);
    }

    pub fn dismiss_alert(&self) {
        self.alert.set(None);
    }
}
