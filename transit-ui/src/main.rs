//! Transit Dashboard
//!
//! Live bus-tracking dashboard built with Leptos (WASM).
//!
//! # Features
//!
//! - Map of routes, stops and buses with live positions
//! - Bus tracker list with status filter
//! - Conversation chat and notifications
//! - Connection status banner with automatic reconnect
//!
//! # Architecture
//!
//! This is a client-side rendered (CSR) Leptos application that compiles to
//! WebAssembly. It talks to the transit backend over REST and holds one
//! WebSocket open for pushed updates.

use leptos::*;

mod api;
mod app;
mod components;
mod pages;
mod state;

fn main() {
    // Set up panic hook for better error messages in WASM
    console_error_panic_hook::set_once();

    mount_to_body(|| view! { <app::App /> });
}
