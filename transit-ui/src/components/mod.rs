//! UI Components
//!
//! Panels and widgets shared by the dashboard and the demo page.

pub mod nav;
pub mod map;
pub mod bus_tracker;
pub mod chat_panel;
pub mod notification_panel;
pub mod connection_status;
pub mod loading;
pub mod toast;

pub use nav::Nav;
pub use map::MapView;
pub use bus_tracker::BusTracker;
pub use chat_panel::ChatPanel;
pub use notification_panel::NotificationPanel;
pub use connection_status::ConnectionBanner;
pub use loading::{InlineLoading, ListSkeleton, Loading};
pub use toast::Toast;
