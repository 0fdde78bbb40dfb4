use async_trait::async_trait;
use kahani_shared::UploadResponse;
use reqwest::multipart::{Form, Part};

use crate::{config::Config, error::ApiError};

/// Largest image the image host accepts.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// An image received from the composer form.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Somewhere to put post images. Returns the public URL of the stored file.
#[async_trait]
pub trait ImageUploader: Send + Sync {
    async fn upload(&self, image: ImageFile) -> Result<String, ApiError>;
}

/// Unsigned uploads against the Cloudinary image API.
#[derive(Clone)]
pub struct CloudinaryUploader {
    client: reqwest::Client,
    endpoint: String,
    upload_preset: String,
}

impl CloudinaryUploader {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/v1_1/{}/image/upload",
                config.cloudinary_base_url.trim_end_matches('/'),
                config.cloudinary_cloud_name
            ),
            upload_preset: config.cloudinary_upload_preset.clone(),
        }
    }
}

#[async_trait]
impl ImageUploader for CloudinaryUploader {
    async fn upload(&self, image: ImageFile) -> Result<String, ApiError> {
        let mut part = Part::bytes(image.bytes).file_name(image.file_name);
        if let Some(mime) = image.content_type.as_deref() {
            part = part
                .mime_str(mime)
                .map_err(|e| ApiError::Upload(format!("bad content type {mime}: {e}")))?;
        }
        let form = Form::new()
            .part("file", part)
            .text("upload_preset", self.upload_preset.clone());

        let resp = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ApiError::Upload(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ApiError::Upload(format!("image host returned {}", resp.status())));
        }

        let body = resp
            .json::<UploadResponse>()
            .await
            .map_err(|e| ApiError::Upload(format!("unexpected response: {e}")))?;
        Ok(body.secure_url)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Records calls and hands back a predictable URL.
    #[derive(Default)]
    pub(crate) struct FakeUploader {
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl FakeUploader {
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ImageUploader for FakeUploader {
        async fn upload(&self, image: ImageFile) -> Result<String, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ApiError::Upload("connection reset".into()))
            } else {
                Ok(format!("https://images.test/{}", image.file_name))
            }
        }
    }
}
