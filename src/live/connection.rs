//! Live Connection
//!
//! Holds the WebSocket to the backend open: connects with the bearer token
//! as a query parameter, re-joins rooms after every (re)connect, answers
//! pings, and reconnects with exponential backoff when the socket drops.
//!
//! Events are dispatched in arrival order to every subscriber of the
//! handle's broadcast channel.

use futures_util::{SinkExt, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::backoff::Backoff;
use super::events::{ClientCommand, ServerEvent};
use crate::config::WebSocketConfig;
use crate::session::{SessionError, TokenStore};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Waiting `delay_ms` before attempt number `attempt`
    Reconnecting { attempt: u32, delay_ms: u64 },
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Reconnecting { attempt, delay_ms } => {
                write!(f, "reconnecting in {}ms (attempt {})", delay_ms, attempt)
            }
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// What listeners receive
#[derive(Debug, Clone, PartialEq)]
pub enum LiveUpdate {
    Event(ServerEvent),
    Status(ConnectionStatus),
}

/// Errors that end the live connection
#[derive(Error, Debug)]
pub enum LiveError {
    /// No token, or the backend refused it. The token has been cleared.
    #[error("Not authenticated")]
    Unauthorized,

    #[error("Gave up after {attempts} reconnect attempts")]
    RetriesExhausted { attempts: u32 },

    /// The connection task is gone
    #[error("Live connection closed")]
    Closed,

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

enum Control {
    Send(ClientCommand),
    Shutdown,
}

/// Why a connected session ended
enum SessionEnd {
    Shutdown,
    Dropped(String),
}

/// Build the socket URL carrying the token
pub fn socket_url(base: &str, token: &str) -> String {
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{}{}token={}", base, separator, urlencoding::encode(token))
}

/// Cloneable control surface for a running [`LiveClient`]
#[derive(Clone)]
pub struct LiveHandle {
    control: mpsc::UnboundedSender<Control>,
    updates: broadcast::Sender<LiveUpdate>,
    status: watch::Receiver<ConnectionStatus>,
    rooms: Arc<RwLock<BTreeSet<String>>>,
}

impl LiveHandle {
    /// Register a listener; it sees every update from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LiveUpdate> {
        self.updates.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn status_watch(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Join a room now and after every reconnect
    pub async fn join_room(&self, room: impl Into<String>) -> Result<(), LiveError> {
        let room = room.into();
        let mut rooms = self.rooms.write().await;
        if rooms.insert(room.clone()) && self.status.borrow().is_connected() {
            self.send(ClientCommand::JoinRoom { room })?;
        }
        Ok(())
    }

    pub async fn leave_room(&self, room: &str) -> Result<(), LiveError> {
        let mut rooms = self.rooms.write().await;
        if rooms.remove(room) && self.status.borrow().is_connected() {
            self.send(ClientCommand::LeaveRoom {
                room: room.to_string(),
            })?;
        }
        Ok(())
    }

    pub async fn rooms(&self) -> Vec<String> {
        self.rooms.read().await.iter().cloned().collect()
    }

    /// Queue a command. Dropped if the socket is down when it is processed.
    pub fn send(&self, command: ClientCommand) -> Result<(), LiveError> {
        self.control
            .send(Control::Send(command))
            .map_err(|_| LiveError::Closed)
    }

    /// Close the socket and stop reconnecting
    pub fn shutdown(&self) {
        let _ = self.control.send(Control::Shutdown);
    }
}

/// Background WebSocket client with reconnect
pub struct LiveClient {
    config: WebSocketConfig,
    tokens: Arc<dyn TokenStore>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    status_tx: watch::Sender<ConnectionStatus>,
    handle: LiveHandle,
}

impl LiveClient {
    pub fn new(config: WebSocketConfig, tokens: Arc<dyn TokenStore>) -> Self {
        let (control, control_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(256);
        let (status_tx, status) = watch::channel(ConnectionStatus::Disconnected);

        let handle = LiveHandle {
            control,
            updates,
            status,
            rooms: Arc::new(RwLock::new(BTreeSet::new())),
        };

        Self {
            config,
            tokens,
            control_rx,
            status_tx,
            handle,
        }
    }

    /// Handle for listeners and commands; take it before `spawn`
    pub fn handle(&self) -> LiveHandle {
        self.handle.clone()
    }

    /// Run the connection loop on the tokio runtime
    pub fn spawn(self) -> JoinHandle<Result<(), LiveError>> {
        tokio::spawn(self.run())
    }

    /// Connection loop. Returns `Ok` on shutdown, `Err` on forced logout or
    /// when reconnect attempts run out.
    pub async fn run(mut self) -> Result<(), LiveError> {
        let mut backoff = Backoff::from_config(&self.config);

        loop {
            let Some(token) = self.tokens.load() else {
                tracing::warn!("No access token, live feed stopped");
                self.set_status(ConnectionStatus::Disconnected);
                return Err(LiveError::Unauthorized);
            };

            self.set_status(ConnectionStatus::Connecting);
            let url = socket_url(&self.config.url, &token);

            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((socket, _)) => {
                    tracing::info!(url = %self.config.url, "Live feed connected");
                    backoff.reset();

                    match self.session(socket).await {
                        SessionEnd::Shutdown => {
                            tracing::info!("Live feed closed");
                            self.set_status(ConnectionStatus::Disconnected);
                            return Ok(());
                        }
                        SessionEnd::Dropped(reason) => {
                            tracing::warn!(reason = %reason, "Live feed dropped");
                        }
                    }
                }
                Err(tungstenite::Error::Http(response))
                    if response.status() == tungstenite::http::StatusCode::UNAUTHORIZED =>
                {
                    tracing::warn!("Live feed rejected the token, clearing session");
                    self.tokens.clear()?;
                    self.set_status(ConnectionStatus::Disconnected);
                    return Err(LiveError::Unauthorized);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Live feed connection failed");
                }
            }

            let Some(delay) = backoff.next_delay() else {
                let attempts = backoff.attempt();
                tracing::error!(attempts, "Live feed reconnect attempts exhausted");
                self.set_status(ConnectionStatus::Disconnected);
                return Err(LiveError::RetriesExhausted { attempts });
            };

            let attempt = backoff.attempt();
            tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting live feed");
            self.set_status(ConnectionStatus::Reconnecting {
                attempt,
                delay_ms: delay.as_millis() as u64,
            });

            if self.wait(delay).await {
                self.set_status(ConnectionStatus::Disconnected);
                return Ok(());
            }
        }
    }

    /// Sleep before the next attempt. Returns true if shutdown was requested.
    async fn wait(&mut self, delay: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + delay;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return false,
                control = self.control_rx.recv() => match control {
                    Some(Control::Send(command)) => {
                        tracing::debug!(?command, "Dropping command while disconnected");
                    }
                    Some(Control::Shutdown) | None => return true,
                },
            }
        }
    }

    async fn session(&mut self, socket: Socket) -> SessionEnd {
        let (mut sink, mut source) = socket.split();

        // Snapshot rooms and flip to Connected under the lock, so a
        // concurrent join_room is either re-joined here or sent by the handle.
        let rooms: Vec<String> = {
            let guard = self.handle.rooms.read().await;
            self.set_status(ConnectionStatus::Connected);
            guard.iter().cloned().collect()
        };

        for room in rooms {
            tracing::debug!(room = %room, "Joining room");
            if let Err(e) = send_command(&mut sink, &ClientCommand::JoinRoom { room }).await {
                return SessionEnd::Dropped(e);
            }
        }

        let period = Duration::from_secs(self.config.ping_interval_secs.max(1));
        let mut keepalive = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match ServerEvent::parse(&text) {
                            Ok(event) => {
                                if event == ServerEvent::Ping {
                                    if let Err(e) = send_command(&mut sink, &ClientCommand::Pong).await {
                                        return SessionEnd::Dropped(e);
                                    }
                                }
                                self.dispatch(event);
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "Failed to parse live event");
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("closed by server: {} {}", f.code, f.reason))
                            .unwrap_or_else(|| "closed by server".to_string());
                        return SessionEnd::Dropped(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Dropped(e.to_string()),
                    None => return SessionEnd::Dropped("stream ended".to_string()),
                },
                control = self.control_rx.recv() => match control {
                    Some(Control::Send(command)) => {
                        if let Err(e) = send_command(&mut sink, &command).await {
                            return SessionEnd::Dropped(e);
                        }
                    }
                    Some(Control::Shutdown) | None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return SessionEnd::Shutdown;
                    }
                },
                _ = keepalive.tick() => {
                    if let Err(e) = send_command(&mut sink, &ClientCommand::Ping).await {
                        return SessionEnd::Dropped(e);
                    }
                }
            }
        }
    }

    fn dispatch(&self, event: ServerEvent) {
        tracing::trace!(kind = event.kind(), "Live event");
        // No subscribers is fine
        let _ = self.handle.updates.send(LiveUpdate::Event(event));
    }

    fn set_status(&self, status: ConnectionStatus) {
        if *self.status_tx.borrow() == status {
            return;
        }
        self.status_tx.send_replace(status.clone());
        let _ = self.handle.updates.send(LiveUpdate::Status(status));
    }
}

async fn send_command<S>(sink: &mut S, command: &ClientCommand) -> Result<(), String>
where
    S: futures_util::Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = command.to_json().map_err(|e| e.to_string())?;
    sink.send(Message::Text(text)).await.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::Room;
    use crate::models::{Bus, BusStatus, Location};
    use crate::session::MemoryTokenStore;
    use crate::store::DashboardState;
    use axum::{
        extract::{
            ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade},
            Query, State,
        },
        http::StatusCode,
        response::{IntoResponse, Response},
        routing::get,
        Router,
    };
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const TOKEN: &str = "tok-1";

    /// Fake backend: first connection delivers two events then closes,
    /// later connections ping, replay message 1 and add message 2.
    #[derive(Default)]
    struct FakeFeed {
        connections: AtomicUsize,
        received: Mutex<Vec<String>>,
    }

    impl FakeFeed {
        fn record(&self, text: &str) {
            self.received.lock().unwrap().push(text.to_string());
        }

        fn received(&self) -> Vec<String> {
            self.received.lock().unwrap().clone()
        }
    }

    fn chat(id: i64) -> String {
        format!(
            r#"{{"type":"chat_message","data":{{"id":{},"conversation_id":4,"sender_id":2,"content":"hi {}","created_at":"2024-03-01T08:30:00Z"}}}}"#,
            id, id
        )
    }

    fn moved(bus_id: i64) -> String {
        format!(
            r#"{{"type":"bus_location_update","data":{{"bus_id":{},"latitude":1.5,"longitude":2.5}}}}"#,
            bus_id
        )
    }

    async fn ws_handler(
        ws: WebSocketUpgrade,
        Query(params): Query<HashMap<String, String>>,
        State(feed): State<Arc<FakeFeed>>,
    ) -> Response {
        if params.get("token").map(String::as_str) != Some(TOKEN) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        ws.on_upgrade(move |socket| fake_session(socket, feed))
    }

    async fn fake_session(mut socket: WebSocket, feed: Arc<FakeFeed>) {
        let n = feed.connections.fetch_add(1, Ordering::SeqCst) + 1;

        while let Some(Ok(msg)) = socket.recv().await {
            if let AxumMessage::Text(text) = msg {
                feed.record(&text);
                if text.contains("join_room") {
                    break;
                }
            }
        }

        let frames = if n == 1 {
            vec![chat(1), moved(1)]
        } else {
            vec![r#"{"type":"ping"}"#.to_string(), chat(1), chat(2)]
        };
        for frame in frames {
            if socket.send(AxumMessage::Text(frame)).await.is_err() {
                return;
            }
        }

        if n == 1 {
            let _ = socket.close().await;
            return;
        }

        while let Some(Ok(msg)) = socket.recv().await {
            if let AxumMessage::Text(text) = msg {
                feed.record(&text);
            }
        }
    }

    async fn spawn_feed() -> (String, Arc<FakeFeed>) {
        let feed = Arc::new(FakeFeed::default());
        let app = Router::new()
            .route("/ws/connect", get(ws_handler))
            .with_state(Arc::clone(&feed));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("ws://{}/ws/connect", addr), feed)
    }

    fn config(url: &str) -> WebSocketConfig {
        WebSocketConfig {
            url: url.to_string(),
            reconnect_base_ms: 10,
            reconnect_max_ms: 50,
            max_reconnect_attempts: 0,
            ping_interval_secs: 30,
        }
    }

    #[test]
    fn test_socket_url() {
        assert_eq!(
            socket_url("ws://h/ws/connect", "a b"),
            "ws://h/ws/connect?token=a%20b"
        );
        assert_eq!(socket_url("ws://h/ws?v=2", "t"), "ws://h/ws?v=2&token=t");
    }

    #[tokio::test]
    async fn test_reconnect_rejoins_without_duplicate_messages() {
        let (url, feed) = spawn_feed().await;
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token(TOKEN));

        let client = LiveClient::new(config(&url), tokens);
        let handle = client.handle();
        let mut updates = handle.subscribe();
        handle.join_room(Room::conversation(4)).await.unwrap();
        let task = client.spawn();

        let mut state = DashboardState::new();
        state.load_snapshot(
            None,
            vec![
                Bus::new(1, "A-1", BusStatus::Operational),
                Bus::new(2, "A-2", BusStatus::Idle).at(Location::new(9.0, 9.0)),
            ],
            Vec::new(),
            Vec::new(),
        );

        let mut connects = 0;
        let collected = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                match updates.recv().await.unwrap() {
                    LiveUpdate::Event(event) => {
                        state.apply(&event);
                        if state.messages(4).len() == 2 {
                            break;
                        }
                    }
                    LiveUpdate::Status(status) => {
                        if status.is_connected() {
                            connects += 1;
                        }
                        state.connection = status;
                    }
                }
            }
        })
        .await;
        assert!(collected.is_ok(), "timed out waiting for live events");

        let ids: Vec<i64> = state.messages(4).iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(connects, 2);
        assert_eq!(state.bus(1).unwrap().location.as_ref().unwrap().latitude, 1.5);
        assert_eq!(state.bus(2).unwrap().location.as_ref().unwrap().latitude, 9.0);
        assert_eq!(feed.connections.load(Ordering::SeqCst), 2);

        // Server ping answered with pong
        let answered = tokio::time::timeout(Duration::from_secs(5), async {
            while !feed.received().iter().any(|t| t.contains("\"pong\"")) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(answered.is_ok());

        let joins = feed
            .received()
            .iter()
            .filter(|t| t.contains("join_room") && t.contains("conversation:4"))
            .count();
        assert_eq!(joins, 2);

        handle.shutdown();
        let result = task.await.unwrap();
        assert!(result.is_ok());
        assert_eq!(handle.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_rejected_token_forces_logout() {
        let (url, _feed) = spawn_feed().await;
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token("expired"));

        let client = LiveClient::new(config(&url), Arc::clone(&tokens));
        let result = client.spawn().await.unwrap();

        assert!(matches!(result, Err(LiveError::Unauthorized)));
        assert!(tokens.load().is_none());
    }

    #[tokio::test]
    async fn test_no_token_stops_immediately() {
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        let client = LiveClient::new(config("ws://127.0.0.1:9/ws/connect"), tokens);
        let result = client.spawn().await.unwrap();
        assert!(matches!(result, Err(LiveError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let mut config = config("ws://127.0.0.1:9/ws/connect");
        config.reconnect_base_ms = 1;
        config.reconnect_max_ms = 2;
        config.max_reconnect_attempts = 2;

        let client = LiveClient::new(config, tokens);
        let handle = client.handle();
        let mut updates = handle.subscribe();
        let result = client.spawn().await.unwrap();

        assert!(matches!(
            result,
            Err(LiveError::RetriesExhausted { attempts: 2 })
        ));

        let mut saw_reconnecting = false;
        while let Ok(update) = updates.try_recv() {
            if matches!(update, LiveUpdate::Status(ConnectionStatus::Reconnecting { .. })) {
                saw_reconnecting = true;
            }
        }
        assert!(saw_reconnecting);
    }

    #[tokio::test]
    async fn test_shutdown_while_waiting() {
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::with_token(TOKEN));
        let mut config = config("ws://127.0.0.1:9/ws/connect");
        config.reconnect_base_ms = 60_000;
        config.reconnect_max_ms = 60_000;

        let client = LiveClient::new(config, tokens);
        let handle = client.handle();
        let task = client.spawn();

        let mut status = handle.status_watch();
        tokio::time::timeout(Duration::from_secs(5), async {
            while !matches!(*status.borrow(), ConnectionStatus::Reconnecting { .. }) {
                status.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        handle.shutdown();
        assert!(task.await.unwrap().is_ok());
    }
}
