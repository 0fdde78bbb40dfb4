use kahani_shared::{ContactMessage, ContactReceipt};
use leptos::logging::error;
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::api;
use crate::auth::{AuthPanel, AuthState};

/// Feedback form. Only signed-in users may send.
#[component]
pub fn ContactForm() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let name = RwSignal::new(String::new());
    let email = RwSignal::new(String::new());
    let message = RwSignal::new(String::new());
    let sending = RwSignal::new(false);
    let sent = RwSignal::new(false);
    let failure: RwSignal<Option<String>> = RwSignal::new(None);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        failure.set(None);
        sent.set(false);

        let payload = ContactMessage {
            name: name.get_untracked(),
            email: email.get_untracked(),
            message: message.get_untracked(),
        };
        if let Err(e) = payload.validate() {
            failure.set(Some(e.to_string()));
            return;
        }

        sending.set(true);
        spawn_local(async move {
            match api::post::<ContactReceipt, _>("/api/contact", &payload).await {
                Ok(_) => {
                    sent.set(true);
                    name.set(String::new());
                    email.set(String::new());
                    message.set(String::new());
                }
                Err(e) => {
                    error!("error sending feedback: {e}");
                    failure.set(Some(format!("Failed to send feedback: {e}")));
                }
            }
            sending.set(false);
        });
    };

    move || {
        if auth.user.get().is_none() {
            return view! {
                <section class="kahani-contact">
                    <h2>"Access Denied"</h2>
                    <p>"Please log in to submit feedback."</p>
                    <AuthPanel />
                </section>
            }
            .into_any();
        }

        view! {
            <section class="kahani-contact">
                <h2>"Contact Us"</h2>
                <form class="kahani-contact-form" on:submit=on_submit>
                    <input
                        class="kahani-input"
                        type="text"
                        placeholder="Your name"
                        prop:value=move || name.get()
                        on:input=move |ev| name.set(event_target_value(&ev))
                    />
                    <input
                        class="kahani-input"
                        type="email"
                        placeholder="Your email"
                        prop:value=move || email.get()
                        on:input=move |ev| email.set(event_target_value(&ev))
                    />
                    <textarea
                        class="kahani-textarea"
                        placeholder="Your message"
                        prop:value=move || message.get()
                        on:input=move |ev| message.set(event_target_value(&ev))
                    />
                    <button class="kahani-btn" type="submit" disabled=move || sending.get()>
                        {move || if sending.get() { "Sending..." } else { "Send" }}
                    </button>
                </form>
                <Show when=move || sent.get()>
                    <p class="kahani-success">"Thanks! Your message is on its way."</p>
                </Show>
                <Show when=move || failure.get().is_some()>
                    <p class="kahani-error">{move || failure.get().unwrap_or_default()}</p>
                </Show>
            </section>
        }
        .into_any()
    }
}
