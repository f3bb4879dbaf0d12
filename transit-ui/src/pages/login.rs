//! Login Page
//!
//! Username and password form. A successful login stores the token and
//! moves on to the dashboard.

use leptos::*;
use leptos_router::*;

use crate::api;
use crate::state::global::GlobalState;

#[component]
pub fn Login() -> impl IntoView {
    let state = expect_context::<GlobalState>();
    let navigate = use_navigate();

    let (username, set_username) = create_signal(String::new());
    let (password, set_password) = create_signal(String::new());
    let (api_url, set_api_url) = create_signal(api::get_api_base());
    let (show_advanced, set_show_advanced) = create_signal(false);
    let (submitting, set_submitting) = create_signal(false);
    let (error, set_error) = create_signal(None::<String>);

    let on_submit = move |ev: ev::SubmitEvent| {
        ev.prevent_default();
        if submitting.get_untracked() {
            return;
        }

        let user = username.get().trim().to_string();
        let pass = password.get();
        if user.is_empty() || pass.is_empty() {
            set_error.set(Some("Enter a username and password".to_string()));
            return;
        }

        let url = api_url.get();
        if url.trim() != api::get_api_base() {
            api::set_api_base(url.trim());
        }

        set_error.set(None);
        set_submitting.set(true);
        let navigate = navigate.clone();
        spawn_local(async move {
            match api::login(&user, &pass).await {
                Ok(token) => {
                    set_password.set(String::new());
                    state.start_session(token.access_token);
                    navigate("/dashboard", Default::default());
                }
                Err(e) => {
                    web_sys::console::error_1(&format!("Login failed: {}", e).into());
                    set_error.set(Some(e.to_string()));
                }
            }
            set_submitting.set(false);
        });
    };

    view! {
        {move || state.token.get().is_some().then(|| view! { <Redirect path="/dashboard" /> })}

        <div class="flex items-center justify-center min-h-[60vh]">
            <form
                on:submit=on_submit
                class="w-full max-w-sm bg-gray-800 rounded-xl p-8 space-y-5"
            >
                <div>
                    <h1 class="text-2xl font-bold">"Log in"</h1>
                    <p class="text-gray-400 text-sm mt-1">"Track the fleet in real time"</p>
                </div>

                {move || error.get().map(|msg| view! {
                    <div class="bg-red-900/60 border border-red-700 text-red-200 text-sm rounded-lg px-3 py-2">
                        {msg}
                    </div>
                })}

                <div>
                    <label class="block text-sm text-gray-400 mb-2">"Username"</label>
                    <input
                        type="text"
                        autocomplete="username"
                        prop:value=move || username.get()
                        on:input=move |ev| set_username.set(event_target_value(&ev))
                        class="w-full bg-gray-700 rounded-lg px-4 py-3
                               border border-gray-600 focus:border-primary-500 focus:outline-none"
                    />
                </div>

                <div>
                    <label class="block text-sm text-gray-400 mb-2">"Password"</label>
                    <input
                        type="password"
                        autocomplete="current-password"
                        prop:value=move || password.get()
                        on:input=move |ev| set_password.set(event_target_value(&ev))
                        class="w-full bg-gray-700 rounded-lg px-4 py-3
                               border border-gray-600 focus:border-primary-500 focus:outline-none"
                    />
                </div>

                <button
                    type="submit"
                    disabled=move || submitting.get()
                    class="w-full py-3 bg-primary-600 hover:bg-primary-700 disabled:bg-gray-700
                           rounded-lg font-medium transition-colors"
                >
                    {move || if submitting.get() { "Logging in..." } else { "Log in" }}
                </button>

                <button
                    type="button"
                    on:click=move |_| set_show_advanced.update(|v| *v = !*v)
                    class="text-xs text-gray-500 hover:text-gray-300"
                >
                    {move || if show_advanced.get() { "Hide server settings" } else { "Server settings" }}
                </button>

                <Show when=move || show_advanced.get()>
                    <div>
                        <label class="block text-sm text-gray-400 mb-2">"API URL"</label>
                        <input
                            type="text"
                            prop:value=move || api_url.get()
                            on:input=move |ev| set_api_url.set(event_target_value(&ev))
                            class="w-full bg-gray-700 rounded-lg px-4 py-2 text-sm
                                   border border-gray-600 focus:border-primary-500 focus:outline-none"
                        />
                    </div>
                </Show>

                <p class="text-center text-sm text-gray-500">
                    "No account? Try the "
                    <A href="/demo" class="text-primary-400 hover:text-primary-300">"demo"</A>
                </p>
            </form>
        </div>
    }
}
