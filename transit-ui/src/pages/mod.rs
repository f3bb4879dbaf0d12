//! Pages
//!
//! Top-level page components for each route.

pub mod login;
pub mod dashboard;
pub mod demo;

pub use login::Login;
pub use dashboard::Dashboard;
pub use demo::Demo;
