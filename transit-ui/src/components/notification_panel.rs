//! Notification Panel Component
//!
//! Newest first. Read state is kept in the browser only.

use leptos::*;

use crate::api::models::Notification;
use crate::state::global::GlobalState;
use crate::state::store::{self, AlertKind};

#[component]
pub fn NotificationPanel() -> impl IntoView {
    let state = expect_context::<GlobalState>();
    let notifications = state.notifications;

    let unread = create_memo(move |_| notifications.with(|list| store::unread_count(list)));

    let mark_all = move |_| notifications.update(|list| store::mark_all_read(list));

    view! {
        <section class="bg-gray-800 rounded-xl p-6 space-y-4">
            <div class="flex items-center justify-between">
                <h2 class="text-xl font-semibold flex items-center space-x-2">
                    <span>"Notifications"</span>
                    {move || (unread.get() > 0).then(|| view! {
                        <span class="px-2 py-0.5 rounded-full bg-red-600 text-xs">{unread.get()}</span>
                    })}
                </h2>
                <button
                    on:click=mark_all
                    disabled=move || unread.get() == 0
                    class="text-sm text-primary-400 hover:text-primary-300 disabled:text-gray-500"
                >
                    "Mark all read"
                </button>
            </div>

            <div class="space-y-2 max-h-96 overflow-y-auto">
                {move || {
                    let list = notifications.get();
                    if list.is_empty() {
                        return view! {
                            <p class="text-gray-400 text-sm">"Nothing new"</p>
                        }.into_view();
                    }
                    list.into_iter()
                        .map(|notification| view! { <NotificationRow notification /> })
                        .collect_view()
                }}
            </div>
        </section>
    }
}

#[component]
fn NotificationRow(notification: Notification) -> impl IntoView {
    let state = expect_context::<GlobalState>();
    let id = notification.id;
    let is_read = notification.is_read;

    let accent = match AlertKind::from_notification(&notification.kind) {
        AlertKind::Error => "border-red-500",
        AlertKind::Warning => "border-yellow-500",
        AlertKind::Success => "border-green-500",
        AlertKind::Info => "border-blue-500",
    };

    let mark = move |_| {
        state.notifications.update(|list| {
            store::mark_read(list, id);
        });
    };

    view! {
        <div class=format!(
            "border-l-4 {} rounded px-3 py-2 {}",
            accent,
            if is_read { "bg-gray-800 opacity-60" } else { "bg-gray-700" }
        )>
            <div class="flex items-start justify-between">
                <div>
                    <div class="font-medium text-sm">{notification.title}</div>
                    <div class="text-sm text-gray-300">{notification.message}</div>
                    <div class="text-xs text-gray-500 mt-1">
                        {notification.created_at.format("%d %b %H:%M").to_string()}
                    </div>
                </div>
                {(!is_read).then(|| view! {
                    <button
                        on:click=mark
                        class="text-xs text-primary-400 hover:text-primary-300 ml-2 whitespace-nowrap"
                    >
                        "Mark read"
                    </button>
                })}
            </div>
        </div>
    }
}
