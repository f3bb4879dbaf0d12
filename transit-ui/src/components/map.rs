//! Map Component
//!
//! Canvas overlay on a static map image. Stops, route shapes and buses are
//! placed with a Web Mercator projection matching the map provider's tiles.

use leptos::*;
use std::collections::HashMap;
use std::f64::consts::PI;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::api::{
    self,
    models::{Bus, BusId, BusStop, Route, RouteId, RouteShape},
};
use crate::state::store::{visible_layers, DisplayOptions};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 500;

/// Tile edge in pixels used by the static image API
const TILE_SIZE: f64 = 512.0;
const MAX_LATITUDE: f64 = 85.051_128_78;
const MAX_ZOOM: u32 = 16;
const FOCUS_ZOOM: f64 = 14.0;

/// Fallback route color
const ROUTE_COLOR: &str = "#9C27B0";

/// What part of the world the canvas shows
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: f64,
    pub width: f64,
    pub height: f64,
}

/// Absolute pixel position at `zoom`
fn world_xy(lat: f64, lon: f64, zoom: f64) -> (f64, f64) {
    let scale = TILE_SIZE * 2_f64.powf(zoom);
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lon + 180.0) / 360.0 * scale;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * scale;
    (x, y)
}

impl Viewport {
    /// Canvas pixel of a coordinate
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (cx, cy) = world_xy(self.center_lat, self.center_lon, self.zoom);
        let (x, y) = world_xy(lat, lon, self.zoom);
        (x - cx + self.width / 2.0, y - cy + self.height / 2.0)
    }

    /// Smallest view holding every `(lat, lon)` point, whole zoom levels only
    pub fn fit(points: &[(f64, f64)], width: f64, height: f64) -> Self {
        if points.is_empty() {
            return Self {
                center_lat: 0.0,
                center_lon: 0.0,
                zoom: 1.0,
                width,
                height,
            };
        }

        let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(lat, lon) in points {
            min_lat = min_lat.min(lat);
            max_lat = max_lat.max(lat);
            min_lon = min_lon.min(lon);
            max_lon = max_lon.max(lon);
        }

        let center_lat = (min_lat + max_lat) / 2.0;
        let center_lon = (min_lon + max_lon) / 2.0;

        // 10% margin on each side
        let zoom = (0..=MAX_ZOOM)
            .rev()
            .map(f64::from)
            .find(|&z| {
                let (x0, y0) = world_xy(max_lat, min_lon, z);
                let (x1, y1) = world_xy(min_lat, max_lon, z);
                (x1 - x0) <= width * 0.8 && (y1 - y0) <= height * 0.8
            })
            .unwrap_or(0.0);

        Self {
            center_lat,
            center_lon,
            zoom,
            width,
            height,
        }
    }

    /// Same size, centered on a point, zoomed in to at least street level
    pub fn focus(self, lat: f64, lon: f64) -> Self {
        Self {
            center_lat: lat,
            center_lon: lon,
            zoom: self.zoom.max(FOCUS_ZOOM),
            ..self
        }
    }

    /// Background image from the Mapbox Static Images API
    pub fn static_image_url(&self, token: &str) -> String {
        format!(
            "https://api.mapbox.com/styles/v1/{}/static/{:.6},{:.6},{:.2}/{}x{}?access_token={}",
            api::map_style(),
            self.center_lon,
            self.center_lat,
            self.zoom,
            self.width as u32,
            self.height as u32,
            token
        )
    }
}

/// Map of routes, stops and buses
#[component]
pub fn MapView(
    #[prop(into)] buses: Signal<Vec<Bus>>,
    #[prop(into)] stops: Signal<Vec<BusStop>>,
    #[prop(into)] routes: Signal<Vec<Route>>,
    #[prop(into)] shapes: Signal<HashMap<RouteId, RouteShape>>,
    display: RwSignal<DisplayOptions>,
    #[prop(into)] selected: Signal<Option<BusId>>,
) -> impl IntoView {
    let canvas_ref = create_node_ref::<html::Canvas>();
    let token = api::map_token();

    let viewport = create_memo(move |_| {
        let mut points: Vec<(f64, f64)> = Vec::new();
        stops.with(|s| points.extend(s.iter().map(|s| (s.latitude, s.longitude))));
        buses.with(|b| {
            points.extend(
                b.iter()
                    .filter_map(|b| b.location.as_ref())
                    .map(|l| (l.latitude, l.longitude)),
            )
        });
        let view = Viewport::fit(&points, WIDTH as f64, HEIGHT as f64);

        let focused = selected.get().and_then(|id| {
            buses.with(|b| {
                b.iter()
                    .find(|b| b.id == id)
                    .and_then(|b| b.location.as_ref())
                    .map(|l| (l.latitude, l.longitude))
            })
        });
        match focused {
            Some((lat, lon)) => view.focus(lat, lon),
            None => view,
        }
    });

    // Redraw on any data, toggle or selection change
    create_effect(move |_| {
        let view = viewport.get();
        let display_opts = display.get();
        let selected_id = selected.get();
        let colors: HashMap<RouteId, String> = routes.with(|r| {
            r.iter()
                .filter_map(|r| r.color.clone().map(|c| (r.id, c)))
                .collect()
        });

        if let Some(canvas) = canvas_ref.get() {
            shapes.with(|shapes| {
                stops.with(|stops| {
                    buses.with(|buses| {
                        let layers = visible_layers(&display_opts, shapes.values(), stops, buses);
                        draw_map(
                            &canvas,
                            &view,
                            &layers.shapes,
                            &layers.stops,
                            &layers.buses,
                            &colors,
                            selected_id,
                            token.is_some(),
                        );
                    })
                })
            });
        }
    });

    view! {
        <div class="space-y-3">
            <div
                class="relative rounded-lg overflow-hidden bg-gray-800"
                style=format!("aspect-ratio: {} / {}", WIDTH, HEIGHT)
            >
                {move || token.map(|t| view! {
                    <img
                        src=viewport.get().static_image_url(t)
                        class="absolute inset-0 w-full h-full"
                        alt="map"
                    />
                })}
                <canvas
                    node_ref=canvas_ref
                    width=WIDTH.to_string()
                    height=HEIGHT.to_string()
                    class="absolute inset-0 w-full h-full"
                />
            </div>

            <MapToggles display=display routes=routes />
        </div>
    }
}

/// Layer checkboxes and route filter; rendering only
#[component]
fn MapToggles(display: RwSignal<DisplayOptions>, routes: Signal<Vec<Route>>) -> impl IntoView {
    view! {
        <div class="flex flex-wrap items-center gap-4 text-sm text-gray-300">
            <label class="flex items-center space-x-2">
                <input
                    type="checkbox"
                    prop:checked=move || display.get().show_routes
                    on:change=move |_| display.update(|d| d.show_routes = !d.show_routes)
                />
                <span>"Routes"</span>
            </label>
            <label class="flex items-center space-x-2">
                <input
                    type="checkbox"
                    prop:checked=move || display.get().show_stops
                    on:change=move |_| display.update(|d| d.show_stops = !d.show_stops)
                />
                <span>"Stops"</span>
            </label>
            <label class="flex items-center space-x-2">
                <input
                    type="checkbox"
                    prop:checked=move || display.get().show_buses
                    on:change=move |_| display.update(|d| d.show_buses = !d.show_buses)
                />
                <span>"Buses"</span>
            </label>

            <select
                class="bg-gray-700 rounded-lg px-3 py-1 border border-gray-600"
                on:change=move |ev| {
                    let value = event_target_value(&ev);
                    display.update(|d| d.selected_route = value.parse().ok());
                }
            >
                <option value="" selected=move || display.get().selected_route.is_none()>
                    "All routes"
                </option>
                {move || routes.get().into_iter().map(|route| {
                    let id = route.id;
                    view! {
                        <option
                            value=id.to_string()
                            selected=move || display.get().selected_route == Some(id)
                        >
                            {match &route.number {
                                Some(number) => format!("{} · {}", number, route.name),
                                None => route.name.clone(),
                            }}
                        </option>
                    }
                }).collect_view()}
            </select>
        </div>
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_map(
    canvas: &HtmlCanvasElement,
    view: &Viewport,
    shapes: &[&RouteShape],
    stops: &[&BusStop],
    buses: &[&Bus],
    colors: &HashMap<RouteId, String>,
    selected: Option<BusId>,
    has_basemap: bool,
) {
    let ctx = match canvas.get_context("2d") {
        Ok(Some(ctx)) => match ctx.dyn_into::<CanvasRenderingContext2d>() {
            Ok(ctx) => ctx,
            Err(_) => return,
        },
        _ => return,
    };

    let width = canvas.width() as f64;
    let height = canvas.height() as f64;

    ctx.clear_rect(0.0, 0.0, width, height);

    // Plain grid when there is no map image underneath
    if !has_basemap {
        ctx.set_fill_style(&"#1f2937".into()); // gray-800
        ctx.fill_rect(0.0, 0.0, width, height);
        ctx.set_stroke_style(&"#374151".into()); // gray-700
        ctx.set_line_width(1.0);
        let mut x = 0.0;
        while x <= width {
            ctx.begin_path();
            ctx.move_to(x, 0.0);
            ctx.line_to(x, height);
            ctx.stroke();
            x += 50.0;
        }
        let mut y = 0.0;
        while y <= height {
            ctx.begin_path();
            ctx.move_to(0.0, y);
            ctx.line_to(width, y);
            ctx.stroke();
            y += 50.0;
        }
    }

    // Route shapes
    ctx.set_line_width(4.0);
    for shape in shapes {
        let color = colors
            .get(&shape.route_id)
            .map(String::as_str)
            .unwrap_or(ROUTE_COLOR);
        ctx.set_stroke_style(&color.into());
        ctx.begin_path();
        for (i, [lon, lat]) in shape.coordinates.iter().enumerate() {
            let (x, y) = view.project(*lat, *lon);
            if i == 0 {
                ctx.move_to(x, y);
            } else {
                ctx.line_to(x, y);
            }
        }
        ctx.stroke();
    }

    // Stops
    ctx.set_line_width(2.0);
    for stop in stops {
        let (x, y) = view.project(stop.latitude, stop.longitude);
        ctx.set_fill_style(&"#ffffff".into());
        ctx.set_stroke_style(&"#111827".into());
        ctx.begin_path();
        let _ = ctx.arc(x, y, 4.0, 0.0, PI * 2.0);
        ctx.fill();
        ctx.stroke();
    }

    // Buses
    for bus in buses {
        let Some(location) = &bus.location else {
            continue;
        };
        let (x, y) = view.project(location.latitude, location.longitude);
        let color = bus.status.color();

        if let Some(heading) = location.heading {
            let rad = heading.to_radians();
            ctx.set_stroke_style(&color.into());
            ctx.set_line_width(3.0);
            ctx.begin_path();
            ctx.move_to(x, y);
            ctx.line_to(x + rad.sin() * 16.0, y - rad.cos() * 16.0);
            ctx.stroke();
        }

        ctx.set_fill_style(&color.into());
        ctx.begin_path();
        let _ = ctx.arc(x, y, 7.0, 0.0, PI * 2.0);
        ctx.fill();

        if selected == Some(bus.id) {
            ctx.set_stroke_style(&"#FACC15".into()); // yellow-400
            ctx.set_line_width(3.0);
            ctx.begin_path();
            let _ = ctx.arc(x, y, 12.0, 0.0, PI * 2.0);
            ctx.stroke();

            ctx.set_fill_style(&"#ffffff".into());
            ctx.set_font("bold 13px sans-serif");
            let _ = ctx.fill_text(&bus.license_plate, x + 14.0, y - 10.0);
        }
    }

    if stops.is_empty() && buses.is_empty() && shapes.is_empty() {
        ctx.set_fill_style(&"#9ca3af".into());
        ctx.set_font("16px sans-serif");
        let _ = ctx.fill_text("Nothing to show", width / 2.0 - 60.0, height / 2.0);
    }
}
