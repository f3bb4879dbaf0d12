//! Backend API
//!
//! REST calls and the data types shared with the live socket.

pub mod client;
pub mod models;

pub use client::*;
