use kahani_shared::{AuthResponse, LoginRequest, RegisterRequest, User};
use leptos::logging::warn;
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::api;

/// Reactive auth state shared via context.
#[derive(Clone, Copy, Debug)]
pub struct AuthState {
    pub user: RwSignal<Option<User>>,
    pub token: RwSignal<Option<String>>,
}

impl AuthState {
    /// Id of the signed-in viewer, without subscribing.
    pub fn viewer_id(&self) -> Option<i64> {
        self.user.get_untracked().map(|u| u.id)
    }

    fn sign_in(&self, resp: AuthResponse) {
        api::set_token(&resp.token);
        self.token.set(Some(resp.token));
        self.user.set(Some(resp.user));
    }

    fn sign_out(&self) {
        api::clear_token();
        self.token.set(None);
        self.user.set(None);
    }
}

/// Provider component: wraps children with auth context.
#[component]
pub fn AuthProvider(children: Children) -> impl IntoView {
    let token = RwSignal::new(api::get_token());
    let user: RwSignal<Option<User>> = RwSignal::new(None);

    let auth = AuthState { user, token };
    provide_context(auth);

    // Fetch user profile when we have a token
    Effect::new(move |_| {
        if token.get().is_some() {
            spawn_local(async move {
                match api::get::<User>("/api/auth/me").await {
                    Ok(u) => user.set(Some(u)),
                    Err(e) => {
                        warn!("stored session rejected: {e}");
                        auth.sign_out();
                    }
                }
            });
        } else {
            user.set(None);
        }
    });

    children()
}

/// Sign-in / sign-up form, or the current user with a logout button.
#[component]
pub fn AuthPanel() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let email = RwSignal::new(String::new());
    let password = RwSignal::new(String::new());
    let display_name = RwSignal::new(String::new());
    let registering = RwSignal::new(false);
    let submitting = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        error.set(None);
        let is_register = registering.get_untracked();
        let email_value = email.get_untracked();
        let password_value = password.get_untracked();

        if is_register {
            let req = RegisterRequest {
                email: email_value,
                password: password_value,
                display_name: Some(display_name.get_untracked()),
            };
            if let Err(e) = req.validate() {
                error.set(Some(e.to_string()));
                return;
            }
            submitting.set(true);
            spawn_local(async move {
                match api::post::<AuthResponse, _>("/api/auth/register", &req).await {
                    Ok(resp) => auth.sign_in(resp),
                    Err(e) => error.set(Some(e)),
                }
                submitting.set(false);
            });
        } else {
            let req = LoginRequest {
                email: email_value,
                password: password_value,
            };
            submitting.set(true);
            spawn_local(async move {
                match api::post::<AuthResponse, _>("/api/auth/login", &req).await {
                    Ok(resp) => auth.sign_in(resp),
                    Err(e) => error.set(Some(e)),
                }
                submitting.set(false);
            });
        }
    };

    move || {
        if let Some(user) = auth.user.get() {
            view! {
                <div class="kahani-auth">
                    <span class="kahani-username">{user.display_name.clone()}</span>
                    <button class="kahani-btn kahani-btn-sm" on:click=move |_| auth.sign_out()>
                        "Logout"
                    </button>
                </div>
            }
            .into_any()
        } else {
            view! {
                <form class="kahani-auth-form" on:submit=on_submit>
                    <input
                        class="kahani-input"
                        type="email"
                        placeholder="Email"
                        prop:value=move || email.get()
                        on:input=move |ev| email.set(event_target_value(&ev))
                    />
                    <input
                        class="kahani-input"
                        type="password"
                        placeholder="Password"
                        prop:value=move || password.get()
                        on:input=move |ev| password.set(event_target_value(&ev))
                    />
                    <Show when=move || registering.get()>
                        <input
                            class="kahani-input"
                            type="text"
                            placeholder="Display name (optional)"
                            prop:value=move || display_name.get()
                            on:input=move |ev| display_name.set(event_target_value(&ev))
                        />
                    </Show>
                    <button class="kahani-btn" type="submit" disabled=move || submitting.get()>
                        {move || if registering.get() { "Create account" } else { "Log in" }}
                    </button>
                    <button
                        class="kahani-btn kahani-btn-link"
                        type="button"
                        on:click=move |_| registering.update(|r| *r = !*r)
                    >
                        {move || {
                            if registering.get() {
                                "Have an account? Log in"
                            } else {
                                "New here? Register"
                            }
                        }}
                    </button>
                    <Show when=move || error.get().is_some()>
                        <p class="kahani-error">{move || error.get().unwrap_or_default()}</p>
                    </Show>
                </form>
            }
            .into_any()
        }
    }
}
