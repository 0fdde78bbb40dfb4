//! Input checks shared by the composer form and the API.

use crate::{ContactMessage, RegisterRequest};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_CONTENT_LEN: usize = 5000;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password must be at least {} characters", MIN_PASSWORD_LEN)]
    WeakPassword,
}

/// Title and content of a post before it is submitted. The image travels
/// separately because the browser and the server hold it differently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
}

impl PostDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Returns the trimmed draft, or the first rule it breaks.
    pub fn validate(&self) -> Result<PostDraft, DraftError> {
        let title = required("title", &self.title)?;
        let content = required("content", &self.content)?;
        max_len("title", title, MAX_TITLE_LEN)?;
        max_len("content", content, MAX_CONTENT_LEN)?;
        Ok(PostDraft::new(title, content))
    }
}

impl ContactMessage {
    pub fn validate(&self) -> Result<(), DraftError> {
        required("name", &self.name)?;
        let email = required("email", &self.email)?;
        required("message", &self.message)?;
        check_email(email)
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), DraftError> {
        check_email(self.email.trim())?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DraftError::WeakPassword);
        }
        Ok(())
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, DraftError> {
    let value = value.trim();
    if value.is_empty() {
        Err(DraftError::Missing(field))
    } else {
        Ok(value)
    }
}

fn max_len(field: &'static str, value: &str, max: usize) -> Result<(), DraftError> {
    if value.chars().count() > max {
        Err(DraftError::TooLong { field, max })
    } else {
        Ok(())
    }
}

fn check_email(email: &str) -> Result<(), DraftError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(DraftError::InvalidEmail),
    }
}
