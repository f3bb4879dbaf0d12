//! # Transit
//!
//! Client for a live bus-tracking backend. The backend owns every piece of
//! data; this crate fetches snapshots over REST, holds a WebSocket open for
//! pushed updates and merges both into a local dashboard state.
//!
//! ## Modules
//!
//! - [`api`]: Typed REST client with bearer-token auth
//! - [`live`]: WebSocket live feed with reconnect and room re-subscription
//! - [`store`]: Headless dashboard state that events are merged into
//! - [`session`]: Access token storage
//! - [`config`]: TOML configuration with environment overrides
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use transit::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default();
//!     let tokens: Arc<dyn TokenStore> =
//!         Arc::new(FileTokenStore::new(&config.session.token_file));
//!
//!     let client = TransitClient::new(&config.api, Arc::clone(&tokens))?;
//!     client.login("driver1", "secret").await?;
//!
//!     let mut state = DashboardState::new();
//!     state.load_snapshot(
//!         Some(client.me().await?),
//!         client.buses().await?,
//!         client.stops().await?,
//!         client.routes().await?,
//!     );
//!
//!     let live = LiveClient::new(config.websocket.clone(), tokens);
//!     let handle = live.handle();
//!     let mut updates = handle.subscribe();
//!     handle.join_room(Room::route(1)).await?;
//!     let task = live.spawn();
//!
//!     while let Ok(LiveUpdate::Event(event)) = updates.recv().await {
//!         state.apply(&event);
//!     }
//!
//!     handle.shutdown();
//!     task.await??;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod live;
pub mod logging;
pub mod models;
pub mod session;
pub mod store;

pub use api::{ClientError, ClientResult, TransitClient};

pub use config::{
    ApiConfig, Config, ConfigError, LoggingConfig, MapConfig, SessionConfig, WebSocketConfig,
};

pub use live::{
    Backoff, ClientCommand, ConnectionStatus, LiveClient, LiveError, LiveHandle, LiveUpdate,
    LocationUpdate, Room, ServerEvent,
};

pub use models::{
    Bus, BusStatus, BusStop, ChatMessage, Location, Notification, Role, Route, RouteShape,
    TokenResponse, User,
};

pub use session::{FileTokenStore, MemoryTokenStore, SessionError, TokenStore};

pub use store::{Applied, DashboardState, DisplayOptions};
