use axum::{extract::State, http::HeaderMap, Json};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use kahani_shared::{AuthResponse, LoginRequest, RegisterRequest, User};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{db, error::ApiError, AppState};

const TOKEN_TTL_SECS: usize = 30 * 24 * 60 * 60;

// ── JWT Claims ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,   // user id
    pub exp: usize, // expiry (unix timestamp)
}

impl Claims {
    pub fn new(user_id: i64) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as usize)
            .unwrap_or_default();
        Self {
            sub: user_id,
            exp: now + TOKEN_TTL_SECS,
        }
    }
}

pub fn issue_token(user_id: i64, jwt_secret: &str) -> Result<String, ApiError> {
    encode(
        &Header::default(),
        &Claims::new(user_id),
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("token creation failed: {e}")))
}

// ── Extract authenticated user from Authorization header ──

pub fn extract_user_id(headers: &HeaderMap, jwt_secret: &str) -> Result<i64, ApiError> {
    let token = headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::AuthRequired)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::AuthRequired)?;

    Ok(data.claims.sub)
}

/// The viewer behind the request, if any. A bad token reads as anonymous.
pub fn viewer_id(headers: &HeaderMap, jwt_secret: &str) -> Option<i64> {
    extract_user_id(headers, jwt_secret).ok()
}

// ── User rows ──

struct Credentials {
    user: User,
    password_hash: String,
}

fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<Credentials>> {
    conn.query_row(
        "SELECT id, email, display_name, password_hash FROM users WHERE email = ?1",
        [email],
        |row| {
            Ok(Credentials {
                user: User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    display_name: row.get(2)?,
                },
                password_hash: row.get(3)?,
            })
        },
    )
    .optional()
}

fn user_by_id(conn: &Connection, id: i64) -> rusqlite::Result<User> {
    conn.query_row(
        "SELECT id, email, display_name FROM users WHERE id = ?1",
        [id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                display_name: row.get(2)?,
            })
        },
    )
}

pub fn create_user(conn: &Connection, req: &RegisterRequest) -> Result<User, ApiError> {
    req.validate()?;
    let email = req.email.trim().to_lowercase();
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| email.clone());

    let password_hash = bcrypt::hash(&req.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {e}")))?;

    let id = insert_user(conn, &email, &display_name, &password_hash)?;
    Ok(User {
        id,
        email,
        display_name,
    })
}

/// The UNIQUE email column decides duplicates, so concurrent sign-ups with
/// one address cannot both succeed.
fn insert_user(
    conn: &Connection,
    email: &str,
    display_name: &str,
    password_hash: &str,
) -> Result<i64, ApiError> {
    match conn.execute(
        "INSERT INTO users (email, display_name, password_hash) VALUES (?1, ?2, ?3)",
        params![email, display_name, password_hash],
    ) {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(ApiError::Conflict("email already registered".into()))
        }
        Err(e) => Err(ApiError::write(e)),
    }
}

pub fn verify_login(conn: &Connection, req: &LoginRequest) -> Result<User, ApiError> {
    let email = req.email.trim().to_lowercase();
    let creds = find_by_email(conn, &email)
        .map_err(ApiError::read)?
        .ok_or(ApiError::InvalidCredentials)?;

    let valid = bcrypt::verify(&req.password, &creds.password_hash)
        .map_err(|e| ApiError::Internal(format!("password verification failed: {e}")))?;
    if !valid {
        return Err(ApiError::InvalidCredentials);
    }
    Ok(creds.user)
}

// ── Handlers ──

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = db::with_conn(&state.db, move |conn| create_user(conn, &payload)).await?;
    let token = issue_token(user.id, &state.config.jwt_secret)?;

    info!(user_id = user.id, "user registered");
    Ok(Json(AuthResponse { token, user }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = db::with_conn(&state.db, move |conn| verify_login(conn, &payload)).await?;
    let token = issue_token(user.id, &state.config.jwt_secret)?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(AuthResponse { token, user }))
}

/// GET /api/auth/me: return current user
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let user_id = extract_user_id(&headers, &state.config.jwt_secret)?;
    let user = db::with_conn(&state.db, move |conn| {
        user_by_id(conn, user_id).map_err(ApiError::read)
    })
    .await?;

    Ok(Json(user))
}
