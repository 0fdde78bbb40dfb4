use gloo_net::http::{Request, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use web_sys::{window, FormData};

const TOKEN_KEY: &str = "kahani_token";

fn api_base() -> String {
    // Read from a meta tag set by the host page, falling back to localhost for dev
    let meta = window()
        .and_then(|w| w.document())
        .and_then(|d| d.query_selector("meta[name='kahani-api']").ok().flatten())
        .and_then(|el| el.get_attribute("content"))
        .filter(|url| !url.is_empty());
    meta.unwrap_or_else(|| "http://localhost:8080".to_string())
}

pub fn get_token() -> Option<String> {
    window()?.local_storage().ok()??.get_item(TOKEN_KEY).ok()?
}

pub fn set_token(token: &str) {
    if let Some(storage) = window().and_then(|w| w.local_storage().ok()).flatten() {
        let _ = storage.set_item(TOKEN_KEY, token);
    }
}

pub fn clear_token() {
    if let Some(storage) = window().and_then(|w| w.local_storage().ok()).flatten() {
        let _ = storage.remove_item(TOKEN_KEY);
    }
}

fn authorized(mut req: RequestBuilder) -> RequestBuilder {
    if let Some(token) = get_token() {
        req = req.header("Authorization", &format!("Bearer {}", token));
    }
    req
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, String> {
    if !resp.ok() {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            error: String,
        }
        return Err(match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => format!("API error: {}", resp.status()),
        });
    }

    resp.json().await.map_err(|e| e.to_string())
}

pub async fn get<T: DeserializeOwned>(path: &str) -> Result<T, String> {
    let url = format!("{}{}", api_base(), path);
    let resp = authorized(Request::get(&url))
        .send()
        .await
        .map_err(|e| e.to_string())?;
    read_json(resp).await
}

pub async fn post<T: DeserializeOwned, B: Serialize>(path: &str, body: &B) -> Result<T, String> {
    let url = format!("{}{}", api_base(), path);
    let req = authorized(Request::post(&url).header("Content-Type", "application/json"))
        .body(serde_json::to_string(body).map_err(|e| e.to_string())?)
        .map_err(|e| e.to_string())?;

    let resp = req.send().await.map_err(|e| e.to_string())?;
    read_json(resp).await
}

/// Multipart POST. The browser sets the boundary header itself.
pub async fn post_form<T: DeserializeOwned>(path: &str, form: FormData) -> Result<T, String> {
    let url = format!("{}{}", api_base(), path);
    let req = authorized(Request::post(&url))
        .body(form)
        .map_err(|e| e.to_string())?;

    let resp = req.send().await.map_err(|e| e.to_string())?;
    read_json(resp).await
}
