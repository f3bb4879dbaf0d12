//! WebSocket Client
//!
//! Live connection to the transit backend. Reconnects with exponential
//! backoff, reads the token again before every attempt, re-joins all rooms
//! once the socket opens and answers server pings.

use gloo_timers::callback::{Interval, Timeout};
use leptos::*;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, MessageEvent, WebSocket};

use super::global::GlobalState;
use super::store::{backoff_delay, panel_rooms, ConnectionStatus};
use crate::api::{
    self,
    models::{ClientCommand, ServerEvent},
};

const PING_INTERVAL_MS: u32 = 30_000;

/// Close code the backend uses for a rejected token (policy violation)
const CLOSE_UNAUTHORIZED: u16 = 1008;

/// Cloneable handle to the live socket
#[derive(Clone)]
pub struct LiveSocket {
    inner: Rc<Inner>,
}

struct Inner {
    url: String,
    state: GlobalState,
    ws: RefCell<Option<WebSocket>>,
    rooms: RefCell<BTreeSet<String>>,
    attempt: Cell<u32>,
    /// Bumped per socket so handlers of a replaced socket do nothing
    generation: Cell<u32>,
    stopped: Cell<bool>,
    keepalive: RefCell<Option<Interval>>,
}

impl LiveSocket {
    /// Open the socket to `url` and keep it open until [`LiveSocket::stop`]
    pub fn start(url: &str, state: GlobalState) -> Self {
        let socket = Self {
            inner: Rc::new(Inner {
                url: url.to_string(),
                state,
                ws: RefCell::new(None),
                rooms: RefCell::new(BTreeSet::new()),
                attempt: Cell::new(0),
                generation: Cell::new(0),
                stopped: Cell::new(false),
                keepalive: RefCell::new(None),
            }),
        };
        connect(&socket.inner);
        socket
    }

    /// Join a room now (if open) and after every reconnect
    pub fn join_room(&self, room: &str) {
        if self.inner.rooms.borrow_mut().insert(room.to_string()) {
            send(
                &self.inner,
                &ClientCommand::JoinRoom {
                    room: room.to_string(),
                },
            );
        }
    }

    pub fn leave_room(&self, room: &str) {
        if self.inner.rooms.borrow_mut().remove(room) {
            send(
                &self.inner,
                &ClientCommand::LeaveRoom {
                    room: room.to_string(),
                },
            );
        }
    }

    /// Close for good; no reconnect follows
    pub fn stop(&self) {
        let inner = &self.inner;
        inner.stopped.set(true);
        inner.keepalive.borrow_mut().take();
        if let Some(ws) = inner.ws.borrow_mut().take() {
            let _ = ws.close();
        }
        inner.state.connection.set(ConnectionStatus::Disconnected);
    }
}

fn is_open(inner: &Inner) -> bool {
    inner
        .ws
        .borrow()
        .as_ref()
        .map(|ws| ws.ready_state() == WebSocket::OPEN)
        .unwrap_or(false)
}

/// Send if open; dropped otherwise (rooms are re-joined on open anyway)
fn send(inner: &Inner, command: &ClientCommand) {
    if !is_open(inner) {
        return;
    }
    let json = match serde_json::to_string(command) {
        Ok(json) => json,
        Err(e) => {
            web_sys::console::error_1(&format!("Failed to encode command: {}", e).into());
            return;
        }
    };
    if let Some(ws) = inner.ws.borrow().as_ref() {
        if let Err(e) = ws.send_with_str(&json) {
            web_sys::console::error_1(&format!("WebSocket send failed: {:?}", e).into());
        }
    }
}

fn connect(inner: &Rc<Inner>) {
    if inner.stopped.get() {
        return;
    }

    let Some(token) = api::get_token() else {
        web_sys::console::warn_1(&"No token, live feed not started".into());
        inner.stopped.set(true);
        inner.state.end_session();
        return;
    };

    inner.state.connection.set(ConnectionStatus::Connecting);

    match WebSocket::new(&api::socket_url(&inner.url, &token)) {
        Ok(ws) => {
            let generation = inner.generation.get().wrapping_add(1);
            inner.generation.set(generation);
            setup_handlers(inner, &ws, generation);
            *inner.ws.borrow_mut() = Some(ws);
        }
        Err(e) => {
            web_sys::console::error_1(&format!("WebSocket connection failed: {:?}", e).into());
            schedule_reconnect(inner);
        }
    }
}

fn schedule_reconnect(inner: &Rc<Inner>) {
    if inner.stopped.get() {
        return;
    }

    let attempt = inner.attempt.get();
    let delay = backoff_delay(attempt);
    inner.attempt.set(attempt.saturating_add(1));
    inner.state.connection.set(ConnectionStatus::Reconnecting {
        attempt: attempt + 1,
        delay_ms: delay,
    });

    // A pending retry after stop() finds `stopped` set and does nothing
    let next = Rc::clone(inner);
    Timeout::new(delay, move || {
        web_sys::console::log_1(
            &format!("Attempting reconnect (attempt {})", next.attempt.get()).into(),
        );
        connect(&next);
    })
    .forget();
}

fn setup_handlers(inner: &Rc<Inner>, ws: &WebSocket, generation: u32) {
    // On open: reset backoff, re-join rooms, start keepalive
    let this = Rc::clone(inner);
    let on_open = Closure::wrap(Box::new(move |_: JsValue| {
        if this.generation.get() != generation {
            return;
        }
        web_sys::console::log_1(&"WebSocket connected".into());
        this.attempt.set(0);
        this.state.connection.set(ConnectionStatus::Connected);

        let rooms: Vec<String> = this.rooms.borrow().iter().cloned().collect();
        for room in rooms {
            send(&this, &ClientCommand::JoinRoom { room });
        }

        let pinger = Rc::clone(&this);
        *this.keepalive.borrow_mut() = Some(Interval::new(PING_INTERVAL_MS, move || {
            send(&pinger, &ClientCommand::Ping);
        }));
    }) as Box<dyn FnMut(JsValue)>);
    ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));
    on_open.forget();

    // On message
    let this = Rc::clone(inner);
    let on_message = Closure::wrap(Box::new(move |event: MessageEvent| {
        if this.generation.get() != generation {
            return;
        }
        let Ok(text) = event.data().dyn_into::<js_sys::JsString>() else {
            return;
        };
        let text: String = text.into();
        match serde_json::from_str::<ServerEvent>(&text) {
            Ok(ServerEvent::Ping) => send(&this, &ClientCommand::Pong),
            Ok(event) => this.state.apply_event(event),
            Err(e) => {
                web_sys::console::error_1(
                    &format!("Failed to parse WebSocket message: {}", e).into(),
                );
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);
    ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
    on_message.forget();

    // On close: reconnect unless stopped or the token was refused
    let this = Rc::clone(inner);
    let on_close = Closure::wrap(Box::new(move |event: CloseEvent| {
        if this.generation.get() != generation {
            return;
        }
        web_sys::console::log_1(
            &format!("WebSocket closed: code={}, reason={}", event.code(), event.reason()).into(),
        );
        this.keepalive.borrow_mut().take();
        this.ws.borrow_mut().take();

        if this.stopped.get() {
            return;
        }
        if event.code() == CLOSE_UNAUTHORIZED {
            this.stopped.set(true);
            this.state.end_session();
            this.state.show_error("Session expired, please log in again");
            return;
        }
        schedule_reconnect(&this);
    }) as Box<dyn FnMut(CloseEvent)>);
    ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));
    on_close.forget();

    // On error; a close event follows
    let on_error = Closure::wrap(Box::new(move |e: JsValue| {
        web_sys::console::error_1(&format!("WebSocket error: {:?}", e).into());
    }) as Box<dyn FnMut(JsValue)>);
    ws.set_onerror(Some(on_error.as_ref().unchecked_ref()));
    on_error.forget();
}

/// Open the live socket for the dashboard and remember it in global state
///
/// Returns the running socket if there is one, `None` when logged out.
pub fn init_websocket(state: GlobalState) -> Option<LiveSocket> {
    if let Some(existing) = state.socket.get_value() {
        return Some(existing);
    }
    api::get_token()?;

    let socket = LiveSocket::start(&api::get_ws_base(), state);
    // Panels opened before the socket existed; joined once it opens
    for room in panel_rooms(
        state.active_conversation.get_untracked(),
        state.tracked_bus.get_untracked(),
    ) {
        socket.join_room(&room);
    }
    state.socket.set_value(Some(socket.clone()));
    Some(socket)
}
