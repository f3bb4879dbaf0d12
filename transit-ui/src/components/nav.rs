//! Navigation Component
//!
//! Header bar with brand, links, the signed-in user and logout.

use leptos::*;
use leptos_router::*;

use crate::api;
use crate::state::global::GlobalState;

/// Navigation header component
#[component]
pub fn Nav() -> impl IntoView {
    let state = expect_context::<GlobalState>();

    let logout = move |_| {
        spawn_local(async move {
            api::logout().await;
            state.end_session();
        });
    };

    view! {
        <nav class="bg-gray-800 border-b border-gray-700">
            <div class="container mx-auto px-4">
                <div class="flex items-center justify-between h-16">
                    <A href="/" class="flex items-center space-x-3">
                        <span class="text-2xl">"🚌"</span>
                        <span class="text-xl font-bold text-white">"Transit"</span>
                    </A>

                    <div class="flex items-center space-x-1">
                        <NavLink href="/dashboard" label="Dashboard" />
                        <NavLink href="/demo" label="Demo" />

                        {move || {
                            if state.token.get().is_none() {
                                return view! { <NavLink href="/login" label="Log in" /> }.into_view();
                            }

                            let who = state
                                .user
                                .get()
                                .map(|u| format!("{} · {}", u.display_name(), u.role))
                                .unwrap_or_default();

                            let unread = state.unread_notifications();

                            view! {
                                {(unread > 0).then(|| view! {
                                    <span class="px-2 py-0.5 rounded-full bg-red-600 text-xs" title="Unread notifications">
                                        {unread}
                                    </span>
                                })}
                                <span class="px-4 text-sm text-gray-400">{who}</span>
                                <button
                                    on:click=logout
                                    class="px-4 py-2 rounded-lg text-gray-300 hover:text-white hover:bg-gray-700 transition-colors"
                                >
                                    "Log out"
                                </button>
                            }
                            .into_view()
                        }}
                    </div>
                </div>
            </div>
        </nav>
    }
}

#[component]
fn NavLink(href: &'static str, label: &'static str) -> impl IntoView {
    view! {
        <A
            href=href
            class="px-4 py-2 rounded-lg text-gray-300 hover:text-white hover:bg-gray-700 transition-colors"
            active_class="bg-gray-700 text-white"
        >
            {label}
        </A>
    }
}
