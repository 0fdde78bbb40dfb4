use axum::{extract::State, http::HeaderMap, Json};
use kahani_shared::{ContactMessage, ContactReceipt};
use serde::Serialize;
use tracing::info;

use crate::{auth, config::Config, error::ApiError, AppState};

const SUBJECT: &str = "New Feedback from Kahani.AI";

#[derive(Serialize)]
struct OutgoingEmail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: String,
}

/// Sends contact-form messages through the Resend email API.
#[derive(Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
    to: String,
}

impl ResendMailer {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            endpoint: format!("{}/emails", config.resend_base_url.trim_end_matches('/')),
            api_key: config.resend_api_key.clone(),
            from: config.contact_from.clone(),
            to: config.contact_to.clone(),
        }
    }

    pub async fn send(&self, message: &ContactMessage) -> Result<ContactReceipt, ApiError> {
        if self.api_key.is_empty() {
            return Err(ApiError::Email("RESEND_API_KEY is not set".into()));
        }

        let email = OutgoingEmail {
            from: &self.from,
            to: &self.to,
            subject: SUBJECT,
            html: render_html(message),
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&email)
            .send()
            .await
            .map_err(|e| ApiError::Email(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(ApiError::Email(format!("{status}: {detail}")));
        }

        resp.json::<ContactReceipt>()
            .await
            .map_err(|e| ApiError::Email(format!("unexpected response: {e}")))
    }
}

/// Message body with every user-supplied value escaped.
pub fn render_html(message: &ContactMessage) -> String {
    format!(
        "<p><strong>Name:</strong> {}</p>\n\
         <p><strong>Email:</strong> {}</p>\n\
         <p><strong>Message:</strong> {}</p>",
        ammonia::clean_text(message.name.trim()),
        ammonia::clean_text(message.email.trim()),
        ammonia::clean_text(message.message.trim()),
    )
}

/// POST /api/contact
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ContactMessage>,
) -> Result<Json<ContactReceipt>, ApiError> {
    let user_id = auth::extract_user_id(&headers, &state.config.jwt_secret)?;
    payload.validate()?;

    let receipt = state.mailer.send(&payload).await?;

    info!(user_id, email_id = %receipt.id, "contact message relayed");
    Ok(Json(receipt))
}
