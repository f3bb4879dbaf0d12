//! State Management
//!
//! Global application state, its pure reducers and the live socket.

pub mod global;
pub mod store;
pub mod websocket;

pub use global::GlobalState;
pub use websocket::init_websocket;
