//! Bus Tracker Component
//!
//! Fleet list with status filter. Selecting a bus highlights it on the map.

use leptos::*;

use crate::api::models::{Bus, BusId, BusStatus, Route};
use crate::state::store::{filter_buses, status_counts};

#[component]
pub fn BusTracker(
    #[prop(into)] buses: Signal<Vec<Bus>>,
    #[prop(into)] routes: Signal<Vec<Route>>,
    selected: RwSignal<Option<BusId>>,
    /// Called with the newly selected bus
    #[prop(optional, into)]
    on_select: Option<Callback<BusId>>,
) -> impl IntoView {
    let (filter, set_filter) = create_signal(None::<BusStatus>);

    let visible = create_memo(move |_| buses.with(|b| filter_buses(b, filter.get())));

    let route_label = move |route_id: Option<i64>| -> String {
        route_id
            .and_then(|id| {
                routes.with(|r| r.iter().find(|r| r.id == id).map(|r| r.label().to_string()))
            })
            .unwrap_or_else(|| "-".to_string())
    };

    view! {
        <div class="space-y-4">
            // Status summary doubles as the filter
            <div class="flex flex-wrap gap-2">
                <FilterChip
                    label="All".to_string()
                    count=Signal::derive(move || buses.with(|b| b.len()))
                    active=Signal::derive(move || filter.get().is_none())
                    on_click=move |_: ev::MouseEvent| set_filter.set(None)
                />
                {BusStatus::ALL.into_iter().map(|status| view! {
                    <FilterChip
                        label=status.as_str().to_string()
                        count=Signal::derive(move || buses.with(|b| status_counts(b)[&status]))
                        active=Signal::derive(move || filter.get() == Some(status))
                        on_click=move |_: ev::MouseEvent| set_filter.set(Some(status))
                    />
                }).collect_view()}
            </div>

            <div class="divide-y divide-gray-700 max-h-96 overflow-y-auto">
                {move || {
                    let list = visible.get();
                    if list.is_empty() {
                        return view! {
                            <p class="text-gray-400 text-sm py-4">"No buses"</p>
                        }.into_view();
                    }

                    list.into_iter().map(|bus| {
                        let id = bus.id;
                        let updated = bus
                            .location
                            .as_ref()
                            .and_then(|l| l.timestamp)
                            .map(|t| t.format("%H:%M:%S").to_string())
                            .unwrap_or_else(|| "no fix".to_string());
                        let route = route_label(bus.route_id);

                        view! {
                            <button
                                class=move || {
                                    let base = "w-full flex items-center justify-between px-3 py-2 text-left transition-colors";
                                    if selected.get() == Some(id) {
                                        format!("{} bg-gray-700", base)
                                    } else {
                                        format!("{} hover:bg-gray-700/50", base)
                                    }
                                }
                                on:click=move |_| {
                                    selected.set(Some(id));
                                    if let Some(callback) = on_select {
                                        callback.call(id);
                                    }
                                }
                            >
                                <div>
                                    <div class="font-medium">{bus.license_plate.clone()}</div>
                                    <div class="text-xs text-gray-400">
                                        {format!("Route {} · {}", route, updated)}
                                    </div>
                                </div>
                                <StatusBadge status=bus.status />
                            </button>
                        }
                    }).collect_view()
                }}
            </div>
        </div>
    }
}

#[component]
fn FilterChip<F>(
    label: String,
    count: Signal<usize>,
    active: Signal<bool>,
    on_click: F,
) -> impl IntoView
where
    F: Fn(ev::MouseEvent) + 'static,
{
    view! {
        <button
            on:click=on_click
            class=move || {
                let base = "px-3 py-1 rounded-full text-xs font-medium capitalize transition-colors";
                if active.get() {
                    format!("{} bg-primary-600 text-white", base)
                } else {
                    format!("{} bg-gray-700 text-gray-300 hover:bg-gray-600", base)
                }
            }
        >
            {format!("{} ", label)}
            <span class="opacity-70">{move || count.get()}</span>
        </button>
    }
}

#[component]
pub fn StatusBadge(status: BusStatus) -> impl IntoView {
    view! {
        <span
            class="px-2 py-0.5 rounded text-xs font-medium capitalize text-white"
            style=format!("background-color: {}", status.color())
        >
            {status.as_str()}
        </span>
    }
}
