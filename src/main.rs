//! Transit Live
//!
//! Tails the backend's live feed: loads the REST snapshot, joins the rooms
//! given on the command line and logs every event as it is merged into the
//! dashboard state.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use transit::logging::init_logging;
use transit::{
    Applied, Config, DashboardState, FileTokenStore, LiveClient, LiveError, LiveUpdate, Room,
    ServerEvent, TokenStore, TransitClient,
};

#[derive(Parser)]
#[command(name = "transit-live")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Follow live bus positions, chat and notifications")]
struct Args {
    /// Config file (default: search the usual locations)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Conversation rooms to join
    #[arg(long = "conversation")]
    conversations: Vec<i64>,

    /// Route rooms to join
    #[arg(long = "route")]
    routes: Vec<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    tracing::info!("Transit Live v{}", env!("CARGO_PKG_VERSION"));

    let tokens: Arc<dyn TokenStore> = Arc::new(FileTokenStore::new(&config.session.token_file));
    if !tokens.is_logged_in() {
        anyhow::bail!("Not logged in, run `transit login` first");
    }

    let client = TransitClient::new(&config.api, Arc::clone(&tokens))?;
    let mut state = DashboardState::new();
    state.load_snapshot(
        Some(client.me().await.context("Failed to load current user")?),
        client.buses().await.context("Failed to load buses")?,
        client.stops().await.context("Failed to load stops")?,
        client.routes().await.context("Failed to load routes")?,
    );

    if let Some(user) = state.user() {
        tracing::info!(user = %user.display_name(), role = %user.role, "Session ready");
    }
    for (status, count) in state.status_counts() {
        tracing::info!(status = %status, count, "Fleet");
    }

    for conversation_id in &args.conversations {
        match client.messages(*conversation_id).await {
            Ok(history) => {
                let added = state.merge_messages(*conversation_id, history);
                tracing::info!(conversation_id, added, "Loaded history");
            }
            Err(e) => tracing::warn!(conversation_id, error = %e, "Failed to load history"),
        }
    }

    let live = LiveClient::new(config.websocket.clone(), Arc::clone(&tokens));
    let handle = live.handle();
    let mut updates = handle.subscribe();

    for id in &args.conversations {
        handle.join_room(Room::conversation(*id)).await?;
    }
    for id in &args.routes {
        handle.join_room(Room::route(*id)).await?;
    }

    let mut task = live.spawn();

    let outcome = loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(LiveUpdate::Event(event)) => {
                    let applied = state.apply(&event);
                    log_event(&state, &event, applied);
                }
                Ok(LiveUpdate::Status(status)) => {
                    tracing::info!(status = %status, "Connection");
                    state.connection = status;
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event listener lagging");
                }
                Err(RecvError::Closed) => {
                    break (&mut task).await;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down...");
                handle.shutdown();
                break (&mut task).await;
            }
            result = &mut task => break result,
        }
    };

    match outcome.context("Live task panicked")? {
        Ok(()) => {
            tracing::info!("Transit Live stopped");
            Ok(())
        }
        Err(LiveError::Unauthorized) => {
            anyhow::bail!("Session expired, run `transit login`")
        }
        Err(e) => Err(e.into()),
    }
}

fn log_event(state: &DashboardState, event: &ServerEvent, applied: Applied) {
    match event {
        ServerEvent::BusLocationUpdate(update) => {
            if applied == Applied::Ignored {
                tracing::debug!(bus_id = update.bus_id, "Location for unknown bus");
                return;
            }
            let plate = state
                .bus(update.bus_id)
                .map(|b| b.license_plate.as_str())
                .unwrap_or("?");
            tracing::info!(
                bus_id = update.bus_id,
                plate = %plate,
                lat = update.latitude,
                lon = update.longitude,
                "Bus moved"
            );
        }
        ServerEvent::ChatMessage(message) if applied == Applied::Updated => {
            tracing::info!(
                conversation_id = message.conversation_id,
                sender = %message.sender_name.as_deref().unwrap_or("?"),
                "{}",
                message.content
            );
        }
        ServerEvent::Notification(notification) if applied == Applied::Updated => {
            tracing::info!(
                kind = %notification.kind,
                unread = state.unread_notifications(),
                "{}: {}",
                notification.title,
                notification.message
            );
        }
        ServerEvent::RoomJoined { room } => tracing::info!(room = %room, "Joined room"),
        ServerEvent::RoomLeft { room } => tracing::info!(room = %room, "Left room"),
        ServerEvent::Error { message } => tracing::warn!(message = %message, "Server error"),
        _ => tracing::trace!(kind = event.kind(), ?applied, "Event"),
    }
}
