//! Dashboard Page
//!
//! Loads the snapshot (user, fleet, stops, routes, notifications), opens the
//! live socket and lays out the panels.

use leptos::*;
use leptos_router::*;

use crate::api::{
    self,
    models::{bus_room, BusId},
    ApiError,
};
use crate::components::{
    BusTracker, ChatPanel, ConnectionBanner, ListSkeleton, MapView, NotificationPanel,
};
use crate::state::{init_websocket, store, GlobalState};

#[component]
pub fn Dashboard() -> impl IntoView {
    let state = expect_context::<GlobalState>();

    // Fetch the snapshot and connect once on mount
    create_effect(move |_| {
        if !state.is_logged_in() {
            return;
        }
        spawn_local(async move {
            state.loading.set(true);
            match load_snapshot(state).await {
                Ok(()) => {
                    init_websocket(state);
                    load_route_shapes(state).await;
                }
                Err(e) => state.handle_api_error("Failed to load dashboard", &e),
            }
            state.loading.set(false);
        });
    });

    let on_select = move |id: BusId| {
        // Refresh the record; live updates only carry the position
        spawn_local(async move {
            match api::fetch_bus(id).await {
                Ok(bus) => state.buses.update(|buses| {
                    if let Some(slot) = buses.iter_mut().find(|b| b.id == bus.id) {
                        *slot = bus;
                    }
                }),
                Err(e) => state.handle_api_error("Failed to refresh bus", &e),
            }
        });

        let previous = state.tracked_bus.get_untracked();
        if previous == Some(id) {
            return;
        }
        state.tracked_bus.set(Some(id));

        // Without a socket yet, init_websocket joins the tracked bus
        if let Some(socket) = state.socket.get_value() {
            if let Some(old) = previous {
                socket.leave_room(&bus_room(old));
            }
            socket.join_room(&bus_room(id));
        }
    };

    view! {
        {move || state.token.get().is_none().then(|| view! { <Redirect path="/login" /> })}

        <div class="space-y-6">
            <div class="flex items-center justify-between">
                <div>
                    <h1 class="text-3xl font-bold">"Dashboard"</h1>
                    <p class="text-gray-400 mt-1">
                        {move || {
                            state
                                .user
                                .get()
                                .map(|u| format!("Welcome back, {}", u.display_name()))
                                .unwrap_or_else(|| "Live fleet overview".to_string())
                        }}
                    </p>
                </div>
            </div>

            <ConnectionBanner />

            <div class="grid grid-cols-1 lg:grid-cols-3 gap-6">
                <section class="lg:col-span-2 bg-gray-800 rounded-xl p-6">
                    <h2 class="text-xl font-semibold mb-4">"Map"</h2>
                    <MapView
                        buses=state.buses
                        stops=state.stops
                        routes=state.routes
                        shapes=state.shapes
                        display=state.display
                        selected=state.selected_bus
                    />
                </section>

                <section class="bg-gray-800 rounded-xl p-6">
                    <h2 class="text-xl font-semibold mb-4">"Buses"</h2>
                    <Show
                        when=move || !(state.loading.get() && state.buses.with(|b| b.is_empty()))
                        fallback=|| view! { <ListSkeleton count=5 /> }
                    >
                        <BusTracker
                            buses=state.buses
                            routes=state.routes
                            selected=state.selected_bus
                            on_select=on_select
                        />
                    </Show>
                </section>
            </div>

            <div class="grid grid-cols-1 lg:grid-cols-2 gap-6">
                <ChatPanel />
                <NotificationPanel />
            </div>
        </div>
    }
}

/// Everything the page needs before the socket is worth opening
async fn load_snapshot(state: GlobalState) -> Result<(), ApiError> {
    let user = api::fetch_me().await?;
    state.user.set(Some(user));

    let buses = api::fetch_buses().await?;
    state.buses.set(buses);

    let stops = api::fetch_stops().await?;
    state.stops.set(stops);

    let routes = api::fetch_routes().await?;
    state.routes.set(routes);

    let notifications = api::fetch_notifications().await?;
    state
        .notifications
        .set(store::normalize_notifications(notifications));

    Ok(())
}

/// Road geometry is optional; the map draws stops and buses without it
async fn load_route_shapes(state: GlobalState) {
    let route_ids: Vec<_> = state.routes.with_untracked(|r| r.iter().map(|r| r.id).collect());

    for route_id in route_ids {
        match api::generate_route_shape(route_id).await {
            Ok(shape) => state.shapes.update(|shapes| {
                shapes.insert(route_id, shape);
            }),
            Err(e) if e.is_unauthorized() => {
                state.handle_api_error("Failed to load route shapes", &e);
                return;
            }
            Err(e) => {
                web_sys::console::warn_1(
                    &format!("No shape for route {}: {}", route_id, e).into(),
                );
            }
        }
    }
}
