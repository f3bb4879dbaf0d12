//! Chat Panel Component
//!
//! One conversation at a time. Opening a conversation joins its room so new
//! messages arrive live, and loads the history over REST.

use leptos::*;

use crate::api::{
    self,
    models::{conversation_room, ChatMessage, ConversationId, ServerEvent},
};
use crate::components::{InlineLoading, Loading};
use crate::state::global::GlobalState;

#[component]
pub fn ChatPanel() -> impl IntoView {
    let state = expect_context::<GlobalState>();

    let (conversation_input, set_conversation_input) = create_signal(String::new());
    let (draft, set_draft) = create_signal(String::new());
    let (loading_history, set_loading_history) = create_signal(false);
    let (sending, set_sending) = create_signal(false);

    let open_conversation = move |id: ConversationId| {
        let previous = state.active_conversation.get_untracked();
        if previous == Some(id) {
            return;
        }
        state.active_conversation.set(Some(id));

        if let Some(socket) = state.socket.get_value() {
            if let Some(old) = previous {
                socket.leave_room(&conversation_room(old));
            }
            socket.join_room(&conversation_room(id));
        }

        set_loading_history.set(true);
        spawn_local(async move {
            match api::fetch_messages(id).await {
                Ok(history) => state.merge_history(id, history),
                Err(e) => state.handle_api_error("Failed to load messages", &e),
            }
            set_loading_history.set(false);
        });
    };

    let on_open = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        match conversation_input.get().trim().parse::<ConversationId>() {
            Ok(id) => open_conversation(id),
            Err(_) => state.show_error("Conversation id must be a number"),
        }
    };

    let on_send = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        let Some(id) = state.active_conversation.get_untracked() else {
            return;
        };
        let content = draft.get().trim().to_string();
        if content.is_empty() || sending.get_untracked() {
            return;
        }

        set_sending.set(true);
        spawn_local(async move {
            match api::send_message(id, &content).await {
                Ok(message) => {
                    // The echo over the socket is deduplicated by id
                    state.apply_event(ServerEvent::ChatMessage(message));
                    set_draft.set(String::new());
                }
                Err(e) => state.handle_api_error("Failed to send message", &e),
            }
            set_sending.set(false);
        });
    };

    let messages = move || {
        state
            .active_conversation
            .get()
            .map(|id| state.conversation(id))
            .unwrap_or_default()
    };

    let own_id = move || state.user.with(|u| u.as_ref().map(|u| u.id));

    view! {
        <section class="bg-gray-800 rounded-xl p-6 flex flex-col space-y-4">
            <div class="flex items-center justify-between">
                <h2 class="text-xl font-semibold">"Chat"</h2>
                {move || loading_history.get().then(|| view! { <InlineLoading /> })}
            </div>

            <form class="flex space-x-2" on:submit=on_open>
                <input
                    type="text"
                    inputmode="numeric"
                    placeholder="Conversation id"
                    prop:value=move || conversation_input.get()
                    on:input=move |ev| set_conversation_input.set(event_target_value(&ev))
                    class="flex-1 bg-gray-700 rounded-lg px-3 py-2 text-sm
                           border border-gray-600 focus:border-primary-500 focus:outline-none"
                />
                <button
                    type="submit"
                    class="px-4 py-2 bg-gray-600 hover:bg-gray-500 rounded-lg text-sm font-medium transition-colors"
                >
                    "Open"
                </button>
            </form>

            <div class="flex-1 min-h-48 max-h-80 overflow-y-auto space-y-2">
                {move || {
                    if state.active_conversation.get().is_none() {
                        return view! {
                            <p class="text-gray-400 text-sm">"Open a conversation to start chatting"</p>
                        }.into_view();
                    }

                    let list = messages();
                    if list.is_empty() && loading_history.get() {
                        return view! { <Loading /> }.into_view();
                    }
                    if list.is_empty() {
                        return view! {
                            <p class="text-gray-400 text-sm">"No messages yet"</p>
                        }.into_view();
                    }

                    let me = own_id();
                    list.into_iter()
                        .map(|message| view! { <MessageRow message=message.clone() own=me == Some(message.sender_id) /> })
                        .collect_view()
                }}
            </div>

            <form class="flex space-x-2" on:submit=on_send>
                <input
                    type="text"
                    placeholder="Type a message"
                    disabled=move || state.active_conversation.get().is_none()
                    prop:value=move || draft.get()
                    on:input=move |ev| set_draft.set(event_target_value(&ev))
                    class="flex-1 bg-gray-700 rounded-lg px-3 py-2 text-sm
                           border border-gray-600 focus:border-primary-500 focus:outline-none
                           disabled:opacity-50"
                />
                <button
                    type="submit"
                    disabled=move || sending.get() || state.active_conversation.get().is_none()
                    class="px-4 py-2 bg-primary-600 hover:bg-primary-700 disabled:bg-gray-700
                           rounded-lg text-sm font-medium transition-colors"
                >
                    {move || if sending.get() { "Sending..." } else { "Send" }}
                </button>
            </form>
        </section>
    }
}

#[component]
fn MessageRow(message: ChatMessage, own: bool) -> impl IntoView {
    let sender = message
        .sender_name
        .clone()
        .unwrap_or_else(|| format!("User {}", message.sender_id));
    let time = message.created_at.format("%H:%M").to_string();

    view! {
        <div class=if own { "flex justify-end" } else { "flex justify-start" }>
            <div class=if own {
                "max-w-[80%] rounded-lg px-3 py-2 bg-primary-600"
            } else {
                "max-w-[80%] rounded-lg px-3 py-2 bg-gray-700"
            }>
                <div class="text-xs opacity-70 mb-1">{format!("{} · {}", sender, time)}</div>
                <div class="text-sm whitespace-pre-wrap">{message.content}</div>
            </div>
        </div>
    }
}
