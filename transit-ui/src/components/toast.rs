//! Toast Component
//!
//! One toast at a time, bottom right. Click to dismiss.

use leptos::*;

use crate::state::global::GlobalState;
use crate::state::store::Alert;

#[component]
pub fn Toast() -> impl IntoView {
    let state = expect_context::<GlobalState>();

    view! {
        <div class="fixed bottom-4 right-4 z-50">
            {move || state.alert.get().map(|alert| view! { <AlertBox alert /> })}
        </div>
    }
}

#[component]
fn AlertBox(alert: Alert) -> impl IntoView {
    let state = expect_context::<GlobalState>();
    let (icon, bg_class) = alert.kind.style();

    view! {
        <button
            on:click=move |_| state.dismiss_alert()
            title="Dismiss"
            class=format!(
                "flex items-center space-x-3 {} text-white text-left px-4 py-3 rounded-lg shadow-lg \
                 max-w-sm transition-all duration-300 ease-out animate-slide-in",
                bg_class
            )
        >
            <span class="text-lg">{icon}</span>
            <span class="text-sm font-medium">{alert.text}</span>
        </button>
    }
}
