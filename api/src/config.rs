use std::env;

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub cors_origin: String,
    pub cloudinary_base_url: String,
    pub cloudinary_cloud_name: String,
    pub cloudinary_upload_preset: String,
    pub resend_base_url: String,
    pub resend_api_key: String,
    pub contact_from: String,
    pub contact_to: String,
}

impl Config {
    /// Loads `.env` if present, then reads the environment.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("ignoring unreadable .env file: {e}");
            }
        }

        Self {
            database_url: var_or("DATABASE_URL", "kahani.db"),
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8080"),
            jwt_secret: var_or("JWT_SECRET", "dev-secret-change-me"),
            cors_origin: var_or("CORS_ORIGIN", "http://localhost:5173"),
            cloudinary_base_url: var_or("CLOUDINARY_BASE_URL", "https://api.cloudinary.com"),
            cloudinary_cloud_name: var_or("CLOUDINARY_CLOUD_NAME", "kahani"),
            cloudinary_upload_preset: var_or("CLOUDINARY_UPLOAD_PRESET", "KahaniAI"),
            resend_base_url: var_or("RESEND_BASE_URL", "https://api.resend.com"),
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            contact_from: var_or("CONTACT_FROM", "onboarding@resend.dev"),
            contact_to: var_or("CONTACT_TO", "feedback@kahani.ai"),
        }
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
