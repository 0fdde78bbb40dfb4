mod api;
mod auth;
mod blog;
mod contact;

use leptos::prelude::*;
use wasm_bindgen::JsCast;

fn main() {
    console_error_panic_hook::set_once();

    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        leptos::logging::error!("no document to mount into");
        return;
    };

    // Mount the blog page if the mount point exists
    if let Some(el) = document.get_element_by_id("kahani-blog") {
        let html_el: web_sys::HtmlElement = el.unchecked_into();
        leptos::mount::mount_to(html_el, move || {
            view! {
                <auth::AuthProvider>
                    <blog::BlogApp />
                </auth::AuthProvider>
            }
        })
        .forget();
    }

    // Mount the contact form if the mount point exists
    if let Some(el) = document.get_element_by_id("kahani-contact") {
        let html_el: web_sys::HtmlElement = el.unchecked_into();
        leptos::mount::mount_to(html_el, move || {
            view! {
                <auth::AuthProvider>
                    <contact::ContactForm />
                </auth::AuthProvider>
            }
        })
        .forget();
    }
}
