use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod draft;
pub mod feed;

// ── Auth ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

// ── Posts ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub image_url: Option<String>,
    pub author_id: i64,
    pub author: String,
    pub created_at: String,
    pub like_count: i64,
    #[serde(default)]
    pub comments: Vec<String>,
}

/// A post as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub is_liked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeRecord {
    pub post_id: i64,
    pub user_id: i64,
    pub created_at: String,
}

/// Body of `POST /api/posts/{id}/like`.
///
/// `currently_liked` is the caller's cached view of the like state. When it
/// is absent the server looks the state up itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToggleLike {
    #[serde(default)]
    pub currently_liked: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "newest")]
    Newest,
    #[serde(rename = "mostLiked")]
    MostLiked,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::MostLiked => "mostLiked",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort order: {0}")]
pub struct UnknownSortOrder(pub String);

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortOrder::Newest),
            "mostLiked" => Ok(SortOrder::MostLiked),
            other => Err(UnknownSortOrder(other.to_string())),
        }
    }
}

/// Response of the image host once an upload succeeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub secure_url: String,
}

// ── Contact ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactReceipt {
    pub id: String,
}
