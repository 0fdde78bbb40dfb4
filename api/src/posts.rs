use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use kahani_shared::{LikeRecord, PostView, SortOrder, ToggleLike};
use serde::Deserialize;
use tracing::info;

use crate::{
    auth,
    compose::{self, Submission},
    db,
    error::ApiError,
    store, AppState,
};

// ── Query params ──

#[derive(Deserialize)]
pub struct FeedParams {
    #[serde(default)]
    sort: SortOrder,
}

// ── Handlers ──

/// GET /api/posts?sort=newest|mostLiked
pub async fn list_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<FeedParams>,
) -> Result<Json<Vec<PostView>>, ApiError> {
    let viewer = auth::viewer_id(&headers, &state.config.jwt_secret);
    let sort = params.sort;

    let posts = db::with_conn(&state.db, move |conn| {
        store::load_feed(conn, sort, viewer).map_err(ApiError::read)
    })
    .await?;

    Ok(Json(posts))
}

/// GET /api/posts/{id}
pub async fn get_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<PostView>, ApiError> {
    let viewer = auth::viewer_id(&headers, &state.config.jwt_secret);

    let post = db::with_conn(&state.db, move |conn| {
        store::post_view(conn, id, viewer).map_err(ApiError::read)
    })
    .await?;

    Ok(Json(post))
}

/// POST /api/posts: multipart `title`, `content`, optional `image`
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PostView>), ApiError> {
    let user_id = auth::extract_user_id(&headers, &state.config.jwt_secret)?;
    let submission = Submission::from_multipart(multipart).await?;

    let post = compose::submit_post(&state.db, state.uploader.as_ref(), submission, user_id).await?;

    Ok((StatusCode::CREATED, Json(post)))
}

/// POST /api/posts/{id}/like: flip the caller's like
///
/// The body `{"currently_liked": bool}` is optional.
pub async fn toggle_like(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<Json<PostView>, ApiError> {
    let user_id = auth::extract_user_id(&headers, &state.config.jwt_secret)?;
    let currently_liked = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<ToggleLike>(&body)
            .map_err(|e| ApiError::Validation(format!("invalid like request: {e}")))?
            .currently_liked
    };

    let post = db::with_conn(&state.db, move |conn| {
        store::toggle_like(conn, id, user_id, currently_liked).map_err(ApiError::write)
    })
    .await?;

    info!(
        post_id = id,
        user_id,
        liked = post.is_liked,
        like_count = post.post.like_count,
        "like toggled"
    );
    Ok(Json(post))
}

/// GET /api/posts/{id}/likes
pub async fn list_likes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<LikeRecord>>, ApiError> {
    let likes = db::with_conn(&state.db, move |conn| {
        store::post_view(conn, id, None).map_err(ApiError::read)?;
        store::like_records(conn, id).map_err(ApiError::read)
    })
    .await?;

    Ok(Json(likes))
}
