use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, User};
use crate::session::{removal_cookie, session_cookie};

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: String,
}

/// Mint the session cookie for a known user.
///
/// Real sign-in happens at the identity provider; this endpoint stands in for
/// its callback in development and tests.
pub async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SessionRequest>,
) -> AppResult<(CookieJar, Json<SessionResponse>)> {
    let db_user = fetch_user_by_email(&state.pool, &payload.email).await?;
    let user: User = db_user.try_into()?;

    let token = state.sessions.encode(user.id, &user.email, &user.permissions)?;

    Ok((
        jar.add(session_cookie(token)),
        Json(SessionResponse {
            user_id: user.id,
            email: user.email,
        }),
    ))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        jar.add(removal_cookie()),
        Json(MessageResponse {
            message: "signed out".to_string(),
        }),
    )
}

async fn fetch_user_by_email(pool: &SqlitePool, email: &str) -> Result<DbUser, AppError> {
    sqlx::query_as::<_, DbUser>(
        "SELECT id, email, name, permissions, created_at, updated_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("unknown user"))
}
