//! Transit REST API Client
//!
//! Thin typed wrapper over the backend's HTTP API (base path `/api`).
//!
//! # Endpoints
//!
//! ## Auth
//! - `POST /accounts/login` - Exchange credentials for a bearer token
//! - `POST /accounts/logout` - End the session
//! - `GET /account/me` - Current user
//!
//! ## Fleet
//! - `GET /buses` - All buses with last known location
//! - `GET /buses/{id}` - One bus
//! - `GET /buses/stops` - Bus stops
//! - `GET /routes` - Routes
//! - `POST /routes/{id}/generate-shape` - Road geometry for a route
//!
//! ## Chat & notifications
//! - `GET /conversations/{id}/messages` - Conversation history
//! - `POST /conversations/{id}/messages` - Send a message
//! - `GET /notifications` - Notifications for the current user
//!
//! No retries, caching or batching: failures go straight to the caller.

pub mod client;
pub mod error;

pub use client::{TransitClient, REQUEST_ID_HEADER};
pub use error::{ClientError, ClientResult};
