//! Connection Status Banner
//!
//! Hidden while the live socket is open.

use leptos::*;

use crate::state::global::GlobalState;
use crate::state::store::ConnectionStatus;

#[component]
pub fn ConnectionBanner() -> impl IntoView {
    let state = expect_context::<GlobalState>();

    view! {
        {move || {
            let status = state.connection.get();
            status.banner().map(|text| {
                let color = match status {
                    ConnectionStatus::Connecting => "bg-blue-900/60 text-blue-200 border-blue-700",
                    ConnectionStatus::Reconnecting { .. } => {
                        "bg-yellow-900/60 text-yellow-200 border-yellow-700"
                    }
                    _ => "bg-red-900/60 text-red-200 border-red-700",
                };
                view! {
                    <div class=format!(
                        "flex items-center space-x-2 px-4 py-2 rounded-lg border text-sm {}",
                        color
                    )>
                        <span class="w-2 h-2 rounded-full bg-current" />
                        <span>{text}</span>
                    </div>
                }
            })
        }}
    }
}
