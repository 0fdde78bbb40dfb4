use std::time::Duration;

use kahani_shared::draft::PostDraft;
use kahani_shared::feed::{FeedState, LikeError};
use kahani_shared::{PostView, SortOrder, ToggleLike};
use leptos::html;
use leptos::logging::{error, warn};
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::{FormData, Url};

use crate::api;
use crate::auth::{AuthPanel, AuthState};

const SEARCH_DEBOUNCE: Duration = Duration::from_millis(250);

/// Fetches the feed and installs it unless a newer load has started since.
/// A failed fetch shows an empty feed.
fn load_feed(feed: RwSignal<FeedState>, sort: SortOrder) {
    let Some(request) = feed.try_update(|f| f.begin_load()) else {
        return;
    };
    spawn_local(async move {
        let posts = match api::get::<Vec<PostView>>(&format!("/api/posts?sort={sort}")).await {
            Ok(posts) => posts,
            Err(e) => {
                error!("error fetching posts: {e}");
                Vec::new()
            }
        };
        feed.update(|f| {
            if !f.finish_load(request, posts) {
                warn!("dropping stale feed response #{request}");
            }
        });
    });
}

/// Top-level blog page: search, sort, composer and the post grid.
#[component]
pub fn BlogApp() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let feed = RwSignal::new(FeedState::new());
    let sort = RwSignal::new(SortOrder::Newest);
    let search_input = RwSignal::new(String::new());
    let query = RwSignal::new(String::new());
    let notice: RwSignal<Option<String>> = RwSignal::new(None);
    let debounce: StoredValue<Option<TimeoutHandle>> = StoredValue::new(None);

    // Reload on sort change and on login/logout, since `is_liked` depends on the viewer.
    Effect::new(move |_| {
        let order = sort.get();
        auth.user.track();
        load_feed(feed, order);
    });

    let on_search = move |ev: leptos::ev::Event| {
        let value = event_target_value(&ev);
        search_input.set(value.clone());
        if let Some(handle) = debounce.get_value() {
            handle.clear();
        }
        let handle = set_timeout_with_handle(move || query.set(value), SEARCH_DEBOUNCE).ok();
        debounce.set_value(handle);
    };

    let on_sort = move |ev: leptos::ev::Event| {
        let value = event_target_value(&ev);
        match value.parse::<SortOrder>() {
            Ok(order) => sort.set(order),
            Err(e) => warn!("{e}"),
        }
    };

    let visible = Memo::new(move |_| feed.with(|f| f.visible(&query.get())));

    view! {
        <section class="kahani-blog">
            <header class="kahani-hero">
                <h1>"Stories that " <span class="kahani-accent">"Inspire"</span></h1>
                <p>
                    "Share your creative journey, inspire others, "
                    "and be part of our growing storytelling community."
                </p>
            </header>
            <AuthPanel />
            <div class="kahani-controls">
                <input
                    class="kahani-input kahani-search"
                    type="text"
                    placeholder="Search stories..."
                    prop:value=move || search_input.get()
                    on:input=on_search
                />
                <select class="kahani-select" on:change=on_sort>
                    <option
                        value={SortOrder::Newest.as_str()}
                        selected=move || sort.get() == SortOrder::Newest
                    >
                        "Newest First"
                    </option>
                    <option
                        value={SortOrder::MostLiked.as_str()}
                        selected=move || sort.get() == SortOrder::MostLiked
                    >
                        "Most Liked"
                    </option>
                </select>
            </div>
            <Show when=move || auth.user.get().is_some()>
                <Composer feed=feed sort=sort />
            </Show>
            <Show when=move || notice.get().is_some()>
                <p class="kahani-notice">{move || notice.get().unwrap_or_default()}</p>
            </Show>
            <Show when=move || feed.with(|f| f.is_loading())>
                <p class="kahani-loading">"Loading..."</p>
            </Show>
            <div class="kahani-post-grid">
                <For
                    each=move || visible.get()
                    key=|p| (p.post.id, p.is_liked, p.post.like_count)
                    let:post
                >
                    <PostCard post=post feed=feed notice=notice />
                </For>
            </div>
        </section>
    }
}

/// One post with its like button.
#[component]
fn PostCard(
    post: PostView,
    feed: RwSignal<FeedState>,
    notice: RwSignal<Option<String>>,
) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let post_id = post.post.id;
    let pending = Memo::new(move |_| feed.with(|f| f.is_pending(post_id)));

    let on_like = move |_| {
        notice.set(None);
        let begun = feed
            .try_update(|f| f.begin_like(post_id, auth.viewer_id()))
            .unwrap_or(Err(LikeError::UnknownPost(post_id)));

        let intent = match begun {
            Ok(intent) => intent,
            Err(LikeError::AuthRequired) => {
                notice.set(Some("Please login to like posts".to_string()));
                return;
            }
            Err(e) => {
                warn!("{e}");
                return;
            }
        };

        let body = ToggleLike {
            currently_liked: Some(intent.currently_liked),
        };
        spawn_local(async move {
            match api::post::<PostView, _>(&format!("/api/posts/{post_id}/like"), &body).await {
                Ok(confirmed) => feed.update(|f| f.settle_like(confirmed)),
                Err(e) => {
                    error!("error updating like: {e}");
                    feed.update(|f| f.fail_like(post_id));
                }
            }
        });
    };

    let comment_count = post.post.comments.len();
    let liked = post.is_liked;

    view! {
        <article class="kahani-post-card">
            {post.post.image_url.clone().map(|src| view! {
                <div class="kahani-post-image">
                    <img src=src alt=post.post.title.clone() />
                </div>
            })}
            <div class="kahani-post-body">
                <h2>{post.post.title.clone()}</h2>
                <p>{post.post.content.clone()}</p>
                <div class="kahani-post-meta">
                    <span class="kahani-author">{post.post.author.clone()}</span>
                    <time>{post.post.created_at.clone()}</time>
                    <button
                        class="kahani-like-btn"
                        class:liked=liked
                        disabled=move || pending.get()
                        on:click=on_like
                    >
                        {if liked { "\u{2665} " } else { "\u{2661} " }}
                        {post.post.like_count}
                    </button>
                    <span class="kahani-comment-count">{format!("{comment_count} comments")}</span>
                </div>
            </div>
        </article>
    }
}

/// New post form with an optional image.
#[component]
fn Composer(feed: RwSignal<FeedState>, sort: RwSignal<SortOrder>) -> impl IntoView {
    let title = RwSignal::new(String::new());
    let content = RwSignal::new(String::new());
    let submitting = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let image_input: NodeRef<html::Input> = NodeRef::new();
    let preview: RwSignal<Option<String>> = RwSignal::new(None);

    let on_pick = move |_: leptos::ev::Event| {
        release_preview(preview);
        let url = image_input
            .get_untracked()
            .and_then(|input| input.files())
            .and_then(|files| files.get(0))
            .and_then(|file| Url::create_object_url_with_blob(&file).ok());
        preview.set(url);
    };
    on_cleanup(move || release_preview(preview));

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        error.set(None);

        let draft = PostDraft::new(title.get_untracked(), content.get_untracked());
        let draft = match draft.validate() {
            Ok(draft) => draft,
            Err(e) => {
                error.set(Some(e.to_string()));
                return;
            }
        };
        let image = image_input
            .get_untracked()
            .and_then(|input| input.files())
            .and_then(|files| files.get(0));

        let form = match build_form(&draft, image.as_ref()) {
            Ok(form) => form,
            Err(e) => {
                error.set(Some(e));
                return;
            }
        };

        submitting.set(true);
        spawn_local(async move {
            match api::post_form::<PostView>("/api/posts", form).await {
                Ok(_) => {
                    title.set(String::new());
                    content.set(String::new());
                    if let Some(input) = image_input.get_untracked() {
                        input.set_value("");
                    }
                    release_preview(preview);
                    load_feed(feed, sort.get_untracked());
                }
                Err(e) => {
                    error!("error creating post: {e}");
                    error.set(Some(e));
                }
            }
            submitting.set(false);
        });
    };

    view! {
        <form class="kahani-composer" on:submit=on_submit>
            <input
                class="kahani-input"
                type="text"
                placeholder="Your story title..."
                prop:value=move || title.get()
                on:input=move |ev| title.set(event_target_value(&ev))
            />
            <textarea
                class="kahani-textarea"
                placeholder="Share your story..."
                prop:value=move || content.get()
                on:input=move |ev| content.set(event_target_value(&ev))
            />
            <label class="kahani-upload">
                "Add an image to your story"
                <input type="file" accept="image/*" node_ref=image_input on:change=on_pick />
            </label>
            <Show when=move || preview.get().is_some()>
                <img
                    class="kahani-preview"
                    alt="Preview"
                    src=move || preview.get().unwrap_or_default()
                />
            </Show>
            <button class="kahani-btn" type="submit" disabled=move || submitting.get()>
                {move || if submitting.get() { "Publishing..." } else { "Share Your Story" }}
            </button>
            <Show when=move || error.get().is_some()>
                <p class="kahani-error">{move || error.get().unwrap_or_default()}</p>
            </Show>
        </form>
    }
}

/// Drops the current preview and frees its object URL.
fn release_preview(preview: RwSignal<Option<String>>) {
    if let Some(url) = preview.try_update(Option::take).flatten() {
        let _ = Url::revoke_object_url(&url);
    }
}

fn build_form(draft: &PostDraft, image: Option<&web_sys::File>) -> Result<FormData, String> {
    let js_err = |e: wasm_bindgen::JsValue| format!("{e:?}");
    let form = FormData::new().map_err(js_err)?;
    form.append_with_str("title", &draft.title).map_err(js_err)?;
    form.append_with_str("content", &draft.content).map_err(js_err)?;
    if let Some(file) = image {
        form.append_with_blob_and_filename("image", file, &file.name())
            .map_err(js_err)?;
    }
    Ok(form)
}
