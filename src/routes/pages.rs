//! Downstream page handlers the gate protects.
//!
//! The real application renders UI here; this layer only needs handlers that
//! prove which requests got through, so they answer with small JSON bodies.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{Action, Permission, Principal, Resource};
use crate::errors::{AppError, AppResult};
use crate::models::pov::Pov;
use crate::models::user::{DbUser, User};

pub async fn index() -> Json<Value> {
    Json(json!({ "page": "index" }))
}

pub async fn login() -> Json<Value> {
    Json(json!({ "page": "login" }))
}

pub async fn privacy() -> Json<Value> {
    Json(json!({ "page": "privacy" }))
}

pub async fn unauthorized() -> Json<Value> {
    Json(json!({ "page": "unauthorized" }))
}

pub async fn auth_callback() -> Json<Value> {
    Json(json!({ "page": "auth_callback" }))
}

pub async fn home(principal: Principal) -> Json<Value> {
    Json(json!({
        "page": "home",
        "user_id": principal.user_id,
        "email": principal.email,
    }))
}

pub async fn sites(principal: Principal) -> Json<Value> {
    Json(json!({
        "page": "sites",
        "user_id": principal.user_id,
    }))
}

/// Permission-model call site: listing users needs read (or manage) on user.
pub async fn users_index(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<User>>> {
    principal.require(Permission::new(Action::Read, Resource::User))?;

    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT id, email, name, permissions, created_at, updated_at FROM users ORDER BY email",
    )
    .fetch_all(&state.pool)
    .await?;

    let users = rows
        .into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(users))
}

/// Record detail. The gate has already confirmed membership by the time this
/// runs; a missing row is a plain 404.
pub async fn pov_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Pov>> {
    let pov = fetch_pov(&state.pool, &id).await?;
    Ok(Json(pov))
}

pub async fn active_pov_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Pov>> {
    let pov = fetch_pov(&state.pool, &id).await?;
    if pov.status != "active" {
        return Err(AppError::not_found(format!("no active pov {id}")));
    }
    Ok(Json(pov))
}

async fn fetch_pov(pool: &SqlitePool, id: &str) -> Result<Pov, AppError> {
    sqlx::query_as::<_, Pov>(
        "SELECT id, name, company, status, created_at, updated_at FROM povs WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("pov {id}")))
}
