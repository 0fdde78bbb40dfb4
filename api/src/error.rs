use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kahani_shared::draft::DraftError;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required")]
    AuthRequired,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("image upload failed: {0}")]
    Upload(String),
    #[error("email relay failed: {0}")]
    Email(String),
    #[error("read failed: {0}")]
    Read(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Maps a failed query. A missing row is a 404, anything else a read error.
    pub fn read(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => ApiError::NotFound,
            other => ApiError::Read(other.to_string()),
        }
    }

    pub fn write(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::QueryReturnedNoRows => ApiError::NotFound,
            other => ApiError::Write(other.to_string()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::AuthRequired | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Upload(_) | ApiError::Email(_) => StatusCode::BAD_GATEWAY,
            ApiError::Read(_) | ApiError::Write(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<DraftError> for ApiError {
    fn from(e: DraftError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<r2d2::Error> for ApiError {
    fn from(e: r2d2::Error) -> Self {
        ApiError::Internal(format!("connection pool: {e}"))
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task: {e}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Upload(_) => "Image upload failed".to_string(),
            ApiError::Email(_) => "Could not send message".to_string(),
            ApiError::Read(_) | ApiError::Write(_) | ApiError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        if status.is_server_error() {
            error!("{self}");
        }

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
