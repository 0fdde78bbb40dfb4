mod auth;
mod compose;
mod config;
mod contact;
mod db;
mod error;
mod posts;
mod store;
mod upload;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    config::Config,
    contact::ResendMailer,
    upload::{CloudinaryUploader, ImageUploader, MAX_IMAGE_BYTES},
};

/// Room for the image plus the text fields and multipart framing.
const MAX_POST_FORM_BYTES: usize = MAX_IMAGE_BYTES + 1024 * 1024;

pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Arc<Config>,
    pub uploader: Arc<dyn ImageUploader>,
    pub mailer: Arc<ResendMailer>,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let client = reqwest::Client::new();
        Self {
            db,
            uploader: Arc::new(CloudinaryUploader::new(client.clone(), &config)),
            mailer: Arc::new(ResendMailer::new(client, &config)),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = match state.config.cors_origin.parse::<axum::http::HeaderValue>() {
        Ok(origin) => CorsLayer::new().allow_origin(origin),
        Err(_) => {
            tracing::warn!(
                origin = %state.config.cors_origin,
                "invalid CORS_ORIGIN, CORS disabled"
            );
            CorsLayer::new()
        }
    }
    .allow_methods(AllowMethods::any())
    .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        // Posts
        .route(
            "/api/posts",
            get(posts::list_posts)
                .post(posts::create_post)
                .layer(DefaultBodyLimit::max(MAX_POST_FORM_BYTES)),
        )
        .route("/api/posts/{id}", get(posts::get_post))
        .route("/api/posts/{id}/like", post(posts::toggle_like))
        .route("/api/posts/{id}/likes", get(posts::list_likes))
        // Contact
        .route("/api/contact", post(contact::send_message))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("kahani_api=info,tower_http=info")),
        )
        .with_target(false)
        .compact()
        .init();

    let config = Config::from_env();

    let pool = db::open_pool(&config.database_url)?;
    db::run_migrations(&pool)?;

    let addr = config.bind_addr.clone();
    let app = router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use kahani_shared::{AuthResponse, PostView};
    use tower::ServiceExt;

    use super::*;
    use crate::store::tests::add_user;
    use crate::upload::tests::FakeUploader;

    const BOUNDARY: &str = "kahani-form-boundary";

    fn test_config() -> Config {
        Config {
            database_url: ":memory:".into(),
            bind_addr: "127.0.0.1:0".into(),
            jwt_secret: "test-secret".into(),
            cors_origin: "http://localhost".into(),
            cloudinary_base_url: "http://127.0.0.1:9".into(),
            cloudinary_cloud_name: "test".into(),
            cloudinary_upload_preset: "preset".into(),
            resend_base_url: "http://127.0.0.1:9".into(),
            resend_api_key: String::new(),
            contact_from: "from@example.com".into(),
            contact_to: "to@example.com".into(),
        }
    }

    fn app() -> (Router, DbPool) {
        let pool = db::test_pool();
        (router(AppState::new(pool.clone(), test_config())), pool)
    }

    fn app_with_uploader(uploader: Arc<FakeUploader>) -> (Router, DbPool) {
        let pool = db::test_pool();
        let mut state = AppState::new(pool.clone(), test_config());
        state.uploader = uploader;
        (router(state), pool)
    }

    async fn register(app: &Router, email: &str) -> AuthResponse {
        let body = format!(r#"{{"email":"{email}","password":"hunter22"}}"#);
        let resp = app
            .clone()
            .oneshot(
                Request::post("/api/auth/register")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        body_json(resp).await
    }

    /// One form part: name, optional file name, contents.
    type FormPart<'a> = (&'a str, Option<&'a str>, &'a [u8]);

    fn multipart_body(parts: &[FormPart<'_>]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, data) in parts {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; \
                         name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn compose_request(token: &str, parts: &[FormPart<'_>]) -> Request<Body> {
        Request::post("/api/posts")
            .header("Authorization", format!("Bearer {token}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap()
    }

    fn post_count(pool: &DbPool) -> i64 {
        pool.get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(resp: axum::response::Response) -> T {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn anonymous_feed_has_no_likes() {
        let (app, pool) = app();
        {
            let mut conn = pool.get().unwrap();
            let u = add_user(&conn, "ana");
            let post = store::insert_post(&conn, u, "Moon", "Tide", None).unwrap();
            store::toggle_like(&mut conn, post.post.id, u, None).unwrap();
        }

        let resp = app
            .oneshot(
                Request::get("/api/posts?sort=mostLiked")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let posts: Vec<PostView> = body_json(resp).await;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post.like_count, 1);
        assert!(!posts[0].is_liked);
    }

    #[tokio::test]
    async fn like_without_login_is_rejected() {
        let (app, _pool) = app();
        let resp = app
            .oneshot(
                Request::post("/api/posts/1/like")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_then_like_through_the_api() {
        let (app, pool) = app();

        let resp = app
            .clone()
            .oneshot(
                Request::post("/api/auth/register")
                    .header("Content-Type", "application/json")
                    .body(Body::from(
                        r#"{"email":"ana@example.com","password":"hunter22","display_name":"Ana"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let auth: AuthResponse = body_json(resp).await;

        let post_id = {
            let conn = pool.get().unwrap();
            store::insert_post(&conn, auth.user.id, "Ferry", "Crossing", None)
                .unwrap()
                .post
                .id
        };

        let like = |liked: bool| {
            Request::post(format!("/api/posts/{post_id}/like"))
                .header("Authorization", format!("Bearer {}", auth.token))
                .header("Content-Type", "application/json")
                .body(Body::from(format!(r#"{{"currently_liked":{liked}}}"#)))
                .unwrap()
        };

        let resp = app.clone().oneshot(like(false)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let view: PostView = body_json(resp).await;
        assert!(view.is_liked);
        assert_eq!(view.post.like_count, 1);
        assert_eq!(view.post.author, "Ana");

        let resp = app.clone().oneshot(like(true)).await.unwrap();
        let view: PostView = body_json(resp).await;
        assert!(!view.is_liked);
        assert_eq!(view.post.like_count, 0);
    }

    #[tokio::test]
    async fn unknown_post_is_404() {
        let (app, _pool) = app();
        let resp = app
            .oneshot(Request::get("/api/posts/77").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn compose_without_picked_file_has_no_image() {
        let uploader = Arc::new(FakeUploader::default());
        let (app, pool) = app_with_uploader(uploader.clone());
        let auth = register(&app, "ana@example.com").await;

        let req = compose_request(
            &auth.token,
            &[
                ("title", None, b"Harbour Lights".as_slice()),
                ("content", None, b"The boats came home.".as_slice()),
                ("mood", None, b"calm".as_slice()),
                ("image", Some(""), b"".as_slice()),
            ],
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let view: PostView = body_json(resp).await;
        assert_eq!(view.post.title, "Harbour Lights");
        assert_eq!(view.post.image_url, None);
        assert_eq!(view.post.like_count, 0);
        assert_eq!(uploader.calls(), 0);
        assert_eq!(post_count(&pool), 1);
    }

    #[tokio::test]
    async fn compose_accepts_photos_above_the_default_body_limit() {
        let uploader = Arc::new(FakeUploader::default());
        let (app, _pool) = app_with_uploader(uploader.clone());
        let auth = register(&app, "ana@example.com").await;

        let photo = vec![0xAB; 3 * 1024 * 1024];
        let req = compose_request(
            &auth.token,
            &[
                ("title", None, b"Big Sky".as_slice()),
                ("content", None, b"Wide open.".as_slice()),
                ("image", Some("sky.jpg"), photo.as_slice()),
            ],
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let view: PostView = body_json(resp).await;
        assert_eq!(view.post.image_url.as_deref(), Some("https://images.test/sky.jpg"));
        assert_eq!(uploader.calls(), 1);
    }

    #[tokio::test]
    async fn oversized_image_is_an_upload_failure() {
        let uploader = Arc::new(FakeUploader::default());
        let (app, pool) = app_with_uploader(uploader.clone());
        let auth = register(&app, "ana@example.com").await;

        let photo = vec![0u8; MAX_IMAGE_BYTES + 1];
        let req = compose_request(
            &auth.token,
            &[
                ("title", None, b"Too Big".as_slice()),
                ("content", None, b"Never stored.".as_slice()),
                ("image", Some("huge.png"), photo.as_slice()),
            ],
        );
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(uploader.calls(), 0);
        assert_eq!(post_count(&pool), 0);
    }
}
