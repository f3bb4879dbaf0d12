//! Live Feed
//!
//! WebSocket client for `/ws/connect`. The backend pushes bus positions,
//! chat messages and notifications for the rooms a client has joined.
//!
//! ```text
//! LiveClient::run ──► connect_async(url?token=..)
//!        │                 │
//!        │            rejoin rooms, ping every N seconds
//!        │                 │
//!        ◄── backoff ◄── socket drops
//! ```

mod backoff;
mod connection;
mod events;

pub use backoff::Backoff;
pub use connection::{
    socket_url, ConnectionStatus, LiveClient, LiveError, LiveHandle, LiveUpdate,
};
pub use events::{ClientCommand, LocationUpdate, Room, ServerEvent};
