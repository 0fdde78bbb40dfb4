//! Publishing new posts.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::Multipart;
use axum::http::StatusCode;
use kahani_shared::{draft::PostDraft, PostView};
use tracing::{info, warn};

use crate::{
    db,
    error::ApiError,
    store,
    upload::{ImageFile, ImageUploader, MAX_IMAGE_BYTES},
    DbPool,
};

/// A post as submitted: text fields plus an optional image.
#[derive(Debug, Default)]
pub struct Submission {
    pub draft: PostDraft,
    pub image: Option<ImageFile>,
}

impl Submission {
    /// Reads `title`, `content` and `image` parts. Unknown parts are skipped.
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut submission = Submission::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| form_error("malformed form", e))?
        {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("title") => submission.draft.title = text(field).await?,
                Some("content") => submission.draft.content = text(field).await?,
                Some("image") => {
                    let file_name = field.file_name().unwrap_or("upload").to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| form_error("unreadable image", e))?;
                    if bytes.len() > MAX_IMAGE_BYTES {
                        return Err(too_large());
                    }
                    // Browsers send an empty part when no file was picked.
                    if !bytes.is_empty() {
                        submission.image = Some(ImageFile {
                            file_name,
                            content_type,
                            bytes: bytes.to_vec(),
                        });
                    }
                }
                other => warn!(field = ?other, "ignoring unexpected form field"),
            }
        }

        Ok(submission)
    }
}

async fn text(field: Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| form_error("unreadable field", e))
}

fn too_large() -> ApiError {
    ApiError::Upload(format!("image is larger than {MAX_IMAGE_BYTES} bytes"))
}

/// Hitting the body limit means the image could not be taken, not that the
/// form was wrong.
fn form_error(context: &str, e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large()
    } else {
        ApiError::Validation(format!("{context}: {e}"))
    }
}

/// Validates, uploads the image if there is one, then writes the post.
///
/// Nothing is written unless the upload succeeded.
pub async fn submit_post(
    pool: &DbPool,
    uploader: &dyn ImageUploader,
    submission: Submission,
    author_id: i64,
) -> Result<PostView, ApiError> {
    let draft = submission.draft.validate()?;
    let title = ammonia::clean(&draft.title);
    let content = ammonia::clean(&draft.content);
    if title.trim().is_empty() || content.trim().is_empty() {
        return Err(ApiError::Validation("title and content are required".into()));
    }

    let image_url = match submission.image {
        Some(image) => Some(uploader.upload(image).await?),
        None => None,
    };

    let view = db::with_conn(pool, move |conn| {
        store::insert_post(conn, author_id, &title, &content, image_url.as_deref())
            .map_err(ApiError::write)
    })
    .await?;

    info!(post_id = view.post.id, author_id, "post published");
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::store::tests::add_user;
    use crate::upload::tests::FakeUploader;

    fn image() -> ImageFile {
        ImageFile {
            file_name: "dragon.png".into(),
            content_type: Some("image/png".into()),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }
    }

    fn post_count(pool: &DbPool) -> i64 {
        pool.get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn publishes_with_uploaded_image() {
        let pool = test_pool();
        let author = add_user(&pool.get().unwrap(), "ana");
        let uploader = FakeUploader::default();

        let submission = Submission {
            draft: PostDraft::new("The Lantern", "It flickered."),
            image: Some(image()),
        };
        let view = submit_post(&pool, &uploader, submission, author).await.unwrap();

        assert_eq!(view.post.title, "The Lantern");
        assert_eq!(view.post.image_url.as_deref(), Some("https://images.test/dragon.png"));
        assert_eq!(view.post.like_count, 0);
        assert!(view.post.comments.is_empty());
        assert_eq!(uploader.calls(), 1);
        assert_eq!(post_count(&pool), 1);
    }

    #[tokio::test]
    async fn image_is_optional() {
        let pool = test_pool();
        let author = add_user(&pool.get().unwrap(), "ana");
        let uploader = FakeUploader::default();

        let submission = Submission {
            draft: PostDraft::new("Plain", "No picture."),
            image: None,
        };
        let view = submit_post(&pool, &uploader, submission, author).await.unwrap();
        assert_eq!(view.post.image_url, None);
        assert_eq!(uploader.calls(), 0);
    }

    #[tokio::test]
    async fn empty_title_writes_nothing() {
        let pool = test_pool();
        let author = add_user(&pool.get().unwrap(), "ana");
        let uploader = FakeUploader::default();

        let submission = Submission {
            draft: PostDraft::new("", "content"),
            image: Some(image()),
        };
        let err = submit_post(&pool, &uploader, submission, author).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(uploader.calls(), 0);
        assert_eq!(post_count(&pool), 0);
    }

    #[tokio::test]
    async fn failed_upload_writes_nothing() {
        let pool = test_pool();
        let author = add_user(&pool.get().unwrap(), "ana");
        let uploader = FakeUploader {
            fail: true,
            ..Default::default()
        };

        let submission = Submission {
            draft: PostDraft::new("Lost", "The picture never arrived."),
            image: Some(image()),
        };
        let err = submit_post(&pool, &uploader, submission, author).await.unwrap_err();
        assert!(matches!(err, ApiError::Upload(_)));
        assert_eq!(post_count(&pool), 0);
    }

    #[tokio::test]
    async fn markup_is_sanitised() {
        let pool = test_pool();
        let author = add_user(&pool.get().unwrap(), "ana");

        let submission = Submission {
            draft: PostDraft::new("Hi<script>alert(1)</script>", "<b>bold</b>"),
            image: None,
        };
        let view = submit_post(&pool, &FakeUploader::default(), submission, author)
            .await
            .unwrap();
        assert_eq!(view.post.title, "Hi");
        assert_eq!(view.post.content, "<b>bold</b>");
    }
}
