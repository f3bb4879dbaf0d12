//! Demo Page
//!
//! A synthetic fleet circling two loop routes. Positions are fed through the
//! same location reducer the live socket uses; nothing touches the network.

use chrono::Utc;
use gloo_timers::callback::Interval;
use leptos::*;
use std::collections::HashMap;
use std::f64::consts::TAU;

use crate::api::models::{Bus, BusId, BusStatus, BusStop, LocationUpdate, Route, RouteShape};
use crate::components::{BusTracker, MapView};
use crate::state::store::{self, DisplayOptions};

const CENTER_LAT: f64 = 52.5200;
const CENTER_LON: f64 = 13.4050;
const TICK_MS: u32 = 1000;
/// Radians per tick
const STEP: f64 = TAU / 120.0;
const SHAPE_POINTS: usize = 72;

struct DemoRoute {
    id: i64,
    name: &'static str,
    number: &'static str,
    color: &'static str,
    /// Loop radius in degrees of latitude
    radius: f64,
}

const ROUTES: [DemoRoute; 2] = [
    DemoRoute {
        id: 1,
        name: "Inner Ring",
        number: "R1",
        color: "#3B82F6",
        radius: 0.012,
    },
    DemoRoute {
        id: 2,
        name: "Outer Ring",
        number: "R2",
        color: "#10B981",
        radius: 0.024,
    },
];

/// Point on a loop at angle `theta`, moving counter-clockwise
///
/// Returns `(latitude, longitude, heading)` with the heading in compass
/// degrees.
fn loop_position(radius: f64, theta: f64) -> (f64, f64, f64) {
    let lat = CENTER_LAT + radius * theta.sin();
    let lon = CENTER_LON + radius * theta.cos() / CENTER_LAT.to_radians().cos();
    let heading = (-theta.sin()).atan2(theta.cos()).to_degrees().rem_euclid(360.0);
    (lat, lon, heading)
}

fn demo_routes() -> Vec<Route> {
    ROUTES
        .iter()
        .map(|r| Route {
            id: r.id,
            name: r.name.to_string(),
            number: Some(r.number.to_string()),
            color: Some(r.color.to_string()),
            stop_ids: Vec::new(),
        })
        .collect()
}

fn demo_shapes() -> HashMap<i64, RouteShape> {
    ROUTES
        .iter()
        .map(|r| {
            let coordinates = (0..=SHAPE_POINTS)
                .map(|i| {
                    let (lat, lon, _) = loop_position(r.radius, TAU * i as f64 / SHAPE_POINTS as f64);
                    [lon, lat]
                })
                .collect();
            (
                r.id,
                RouteShape {
                    route_id: r.id,
                    coordinates,
                },
            )
        })
        .collect()
}

/// Four stops per loop, at the compass points
fn demo_stops() -> Vec<BusStop> {
    let names = ["North", "West", "South", "East"];
    ROUTES
        .iter()
        .flat_map(|r| {
            names.iter().enumerate().map(move |(i, name)| {
                let theta = TAU / 4.0 * (i as f64 + 1.0);
                let (lat, lon, _) = loop_position(r.radius, theta);
                BusStop {
                    id: r.id * 10 + i as i64,
                    name: format!("{} {}", r.number, name),
                    latitude: lat,
                    longitude: lon,
                    route_ids: vec![r.id],
                }
            })
        })
        .collect()
}

/// Three buses per loop, spread evenly. Returns the buses and their start angles.
fn demo_fleet() -> (Vec<Bus>, Vec<(BusId, f64, f64)>) {
    let mut buses = Vec::new();
    let mut tracks = Vec::new();

    for (r_index, route) in ROUTES.iter().enumerate() {
        for slot in 0..3 {
            let id = (r_index * 3 + slot + 1) as BusId;
            let status = if id == 6 {
                BusStatus::Maintenance
            } else {
                BusStatus::Operational
            };
            buses.push(Bus {
                id,
                license_plate: format!("B-TR {:03}", 100 + id),
                status,
                route_id: Some(route.id),
                capacity: Some(60),
                location: None,
            });
            tracks.push((id, route.radius, TAU / 3.0 * slot as f64));
        }
    }

    (buses, tracks)
}

/// One tick's worth of location updates
fn tick_updates(tracks: &[(BusId, f64, f64)], tick: u64) -> Vec<LocationUpdate> {
    let now = Utc::now();
    tracks
        .iter()
        .map(|&(bus_id, radius, start)| {
            let theta = start + STEP * tick as f64;
            let (latitude, longitude, heading) = loop_position(radius, theta);
            LocationUpdate {
                bus_id,
                latitude,
                longitude,
                heading: Some(heading),
                speed: Some(radius * 1000.0),
                timestamp: Some(now),
            }
        })
        .collect()
}

#[component]
pub fn Demo() -> impl IntoView {
    let (fleet, tracks) = demo_fleet();

    let buses = create_rw_signal(fleet);
    let stops = create_rw_signal(demo_stops());
    let routes = create_rw_signal(demo_routes());
    let shapes = create_rw_signal(demo_shapes());
    let display = create_rw_signal(DisplayOptions::default());
    let selected = create_rw_signal(None::<BusId>);
    let (running, set_running) = create_signal(true);

    // Place everyone before the first tick
    buses.update(|list| {
        for update in tick_updates(&tracks, 0) {
            store::apply_location(list, &update);
        }
    });

    let mut tick = 0_u64;
    let interval = Interval::new(TICK_MS, move || {
        if !running.get_untracked() {
            return;
        }
        tick += 1;
        let updates = tick_updates(&tracks, tick);
        buses.update(|list| {
            for update in &updates {
                // The parked bus stays where it is
                if list.iter().any(|b| b.id == update.bus_id && b.status == BusStatus::Maintenance) {
                    continue;
                }
                store::apply_location(list, update);
            }
        });
    });
    on_cleanup(move || drop(interval));

    view! {
        <div class="space-y-6">
            <div class="flex items-center justify-between">
                <div>
                    <h1 class="text-3xl font-bold">"Demo"</h1>
                    <p class="text-gray-400 mt-1">"A simulated fleet, no backend required"</p>
                </div>
                <button
                    on:click=move |_| set_running.update(|r| *r = !*r)
                    class="px-4 py-2 bg-gray-700 hover:bg-gray-600 rounded-lg font-medium transition-colors"
                >
                    {move || if running.get() { "Pause" } else { "Resume" }}
                </button>
            </div>

            <div class="grid grid-cols-1 lg:grid-cols-3 gap-6">
                <section class="lg:col-span-2 bg-gray-800 rounded-xl p-6">
                    <MapView
                        buses=buses
                        stops=stops
                        routes=routes
                        shapes=shapes
                        display=display
                        selected=selected
                    />
                </section>

                <section class="bg-gray-800 rounded-xl p-6">
                    <h2 class="text-xl font-semibold mb-4">"Buses"</h2>
                    <BusTracker buses=buses routes=routes selected=selected />
                </section>
            </div>
        </div>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_heading_follows_direction() {
        let (lat, lon, heading) = loop_position(0.01, 0.0);
        assert!((lat - CENTER_LAT).abs() < 1e-9);
        assert!(lon > CENTER_LON);
        assert!(heading.abs() < 1e-9);

        // Top of the loop, heading west
        let (lat, _, heading) = loop_position(0.01, TAU / 4.0);
        assert!((lat - (CENTER_LAT + 0.01)).abs() < 1e-9);
        assert!((heading - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_demo_fleet_moves_through_reducer() {
        let (mut buses, tracks) = demo_fleet();
        assert_eq!(buses.len(), 6);
        assert_eq!(tracks.len(), 6);

        for update in tick_updates(&tracks, 0) {
            assert!(store::apply_location(&mut buses, &update));
        }
        let before = buses[0].location.clone().map(|l| (l.latitude, l.longitude));

        for update in tick_updates(&tracks, 10) {
            store::apply_location(&mut buses, &update);
        }
        let after = buses[0].location.clone().map(|l| (l.latitude, l.longitude));

        assert!(before.is_some());
        assert_ne!(before, after);
    }

    #[test]
    fn test_demo_shapes_are_closed_loops() {
        let shapes = demo_shapes();
        assert_eq!(shapes.len(), ROUTES.len());
        for shape in shapes.values() {
            let first = shape.coordinates[0];
            let last = shape.coordinates[shape.coordinates.len() - 1];
            assert!((first[0] - last[0]).abs() < 1e-9);
            assert!((first[1] - last[1]).abs() < 1e-9);
        }
    }
}
