use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use pov_gate::db::memberships::SqliteMembershipStore;
use pov_gate::proxy::ProxyConfig;
use pov_gate::session::SessionConfig;
use pov_gate::{build_router, AppState};

fn session_config() -> SessionConfig {
    SessionConfig {
        secret: Arc::new(b"test-secret".to_vec()),
        exp_hours: 24,
    }
}

fn proxy_config() -> ProxyConfig {
    ProxyConfig {
        upstream_template: "https://{tenant}.mobicontrol.cloud/rest/api".to_string(),
        timeout: Duration::from_secs(2),
    }
}

async fn setup() -> Result<(Router, SqlitePool, TempDir)> {
    let dir = TempDir::new()?;
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("test.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    let state = AppState::new(pool.clone(), session_config(), proxy_config())?;
    Ok((build_router(state), pool, dir))
}

async fn seed_user(pool: &SqlitePool, email: &str, permissions: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, email, permissions) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(email)
        .bind(permissions)
        .execute(pool)
        .await?;
    Ok(id)
}

async fn seed_pov(pool: &SqlitePool, id: &str, name: &str) -> Result<()> {
    sqlx::query("INSERT INTO povs (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(())
}

async fn grant_membership(pool: &SqlitePool, pov_id: &str, user_id: Uuid) -> Result<()> {
    sqlx::query("INSERT INTO pov_members (pov_id, user_id) VALUES (?, ?)")
        .bind(pov_id)
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

fn get_with_session(path: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .header(header::COOKIE, format!("pov_session={token}"))
        .body(Body::empty())
        .unwrap()
}

fn location(resp: &axum::response::Response) -> Option<String> {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
}

#[tokio::test]
async fn anonymous_protected_path_redirects_to_login() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let resp = app.oneshot(get("/pov/42")).await?;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&resp).as_deref(),
        Some("/login?redirectedFrom=/pov/42")
    );

    Ok(())
}

#[tokio::test]
async fn authenticated_without_membership_redirects_to_unauthorized() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    let user_id = seed_user(&pool, "ada@example.com", r#"["view:pov"]"#).await?;
    seed_pov(&pool, "42", "Acme rollout").await?;

    let token = session_config().encode(user_id, "ada@example.com", &[]).unwrap();
    let resp = app.oneshot(get_with_session("/pov/42", &token)).await?;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp).as_deref(), Some("/unauthorized"));

    Ok(())
}

#[tokio::test]
async fn member_reaches_the_record() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    let user_id = seed_user(&pool, "ada@example.com", r#"["view:pov"]"#).await?;
    seed_pov(&pool, "42", "Acme rollout").await?;
    grant_membership(&pool, "42", user_id).await?;

    let token = session_config().encode(user_id, "ada@example.com", &[]).unwrap();
    let resp = app.oneshot(get_with_session("/pov/42", &token)).await?;

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let v: Value = serde_json::from_slice(&bytes)?;
    assert_eq!(v.get("id").and_then(|id| id.as_str()), Some("42"));
    assert_eq!(v.get("name").and_then(|n| n.as_str()), Some("Acme rollout"));

    Ok(())
}

#[tokio::test]
async fn membership_lookup_error_and_empty_result_deny_identically() -> Result<()> {
    // Empty relation.
    let (app, pool, _dir) = setup().await?;
    let user_id = seed_user(&pool, "ada@example.com", "[]").await?;
    let token = session_config().encode(user_id, "ada@example.com", &[]).unwrap();

    let denied_empty = app.oneshot(get_with_session("/pov/42", &token)).await?;

    // Broken data layer: a pool with no schema at all, so every lookup errors.
    let broken_pool = SqlitePool::connect("sqlite::memory:").await?;
    let state = AppState::new(pool.clone(), session_config(), proxy_config())?
        .with_memberships(Arc::new(SqliteMembershipStore::new(broken_pool)));
    let broken_app = build_router(state);

    let denied_error = broken_app
        .oneshot(get_with_session("/pov/42", &token))
        .await?;

    assert_eq!(denied_empty.status(), StatusCode::SEE_OTHER);
    assert_eq!(denied_error.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&denied_empty), location(&denied_error));
    assert_eq!(location(&denied_empty).as_deref(), Some("/unauthorized"));

    Ok(())
}

#[tokio::test]
async fn bypass_prefixes_skip_the_gate() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    // The API namespace is reachable without any session.
    let resp = app.clone().oneshot(get("/api/health")).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // Static assets never redirect, even though no route serves them here.
    let resp = app.oneshot(get("/assets/app.css")).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(location(&resp).is_none());

    Ok(())
}

#[tokio::test]
async fn public_paths_pass_without_session() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    for path in ["/", "/login", "/privacy"] {
        let resp = app.clone().oneshot(get(path)).await?;
        assert_eq!(resp.status(), StatusCode::OK, "expected 200 for {path}");
    }

    Ok(())
}

#[tokio::test]
async fn gate_decisions_are_idempotent() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    let user_id = seed_user(&pool, "ada@example.com", "[]").await?;
    let token = session_config().encode(user_id, "ada@example.com", &[]).unwrap();

    let first = app.clone().oneshot(get("/pov/42")).await?;
    let second = app.clone().oneshot(get("/pov/42")).await?;
    assert_eq!(first.status(), second.status());
    assert_eq!(location(&first), location(&second));

    let first = app
        .clone()
        .oneshot(get_with_session("/home", &token))
        .await?;
    let second = app.oneshot(get_with_session("/home", &token)).await?;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn redirect_carries_refreshed_session_cookie() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    let user_id = seed_user(&pool, "ada@example.com", "[]").await?;

    // One-hour token resolved by a 24h config is past its half-life, so the
    // gate refreshes it even while redirecting.
    let short = SessionConfig {
        secret: Arc::new(b"test-secret".to_vec()),
        exp_hours: 1,
    };
    let token = short.encode(user_id, "ada@example.com", &[]).unwrap();

    let resp = app.oneshot(get_with_session("/pov/42", &token)).await?;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp).as_deref(), Some("/unauthorized"));

    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("redirect should carry the refreshed session cookie");
    assert!(set_cookie.starts_with("pov_session="));

    Ok(())
}

#[tokio::test]
async fn users_index_enforces_the_permission_model() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    let viewer = seed_user(&pool, "viewer@example.com", r#"["view:pov"]"#).await?;
    let reader = seed_user(&pool, "reader@example.com", r#"["read:user"]"#).await?;
    let manager = seed_user(&pool, "manager@example.com", r#"["manage:user"]"#).await?;

    let cfg = session_config();
    let viewer_token = cfg
        .encode(viewer, "viewer@example.com", &["view:pov".parse().unwrap()])
        .unwrap();
    let reader_token = cfg
        .encode(reader, "reader@example.com", &["read:user".parse().unwrap()])
        .unwrap();
    let manager_token = cfg
        .encode(manager, "manager@example.com", &["manage:user".parse().unwrap()])
        .unwrap();

    let resp = app
        .clone()
        .oneshot(get_with_session("/users", &viewer_token))
        .await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .clone()
        .oneshot(get_with_session("/users", &reader_token))
        .await?;
    assert_eq!(resp.status(), StatusCode::OK);

    // manage:user implies read:user
    let resp = app.oneshot(get_with_session("/users", &manager_token)).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn active_pov_routes_are_record_scoped_too() -> Result<()> {
    let (app, pool, _dir) = setup().await?;
    let user_id = seed_user(&pool, "ada@example.com", "[]").await?;
    seed_pov(&pool, "7", "Active eval").await?;

    let token = session_config().encode(user_id, "ada@example.com", &[]).unwrap();

    let resp = app
        .clone()
        .oneshot(get_with_session("/active-pov/7", &token))
        .await?;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp).as_deref(), Some("/unauthorized"));

    grant_membership(&pool, "7", user_id).await?;
    let resp = app.oneshot(get_with_session("/active-pov/7", &token)).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    Ok(())
}
