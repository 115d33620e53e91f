use std::sync::Arc;

use axum::http::Method;
use axum::middleware;
use axum::routing::{any, get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::memberships::{MembershipStore, SqliteMembershipStore};
use crate::errors::AppError;
use crate::gate;
use crate::proxy::{self, ProxyConfig};
use crate::routes::{auth, health, pages};
use crate::session::SessionConfig;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: Arc<SessionConfig>,
    pub proxy: Arc<ProxyConfig>,
    pub http: reqwest::Client,
    pub memberships: Arc<dyn MembershipStore>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        sessions: SessionConfig,
        proxy: ProxyConfig,
    ) -> Result<Self, AppError> {
        let http = proxy.client()?;
        let memberships = Arc::new(SqliteMembershipStore::new(pool.clone()));

        Ok(Self {
            pool,
            sessions: Arc::new(sessions),
            proxy: Arc::new(proxy),
            http,
            memberships,
        })
    }

    /// Swap in a different membership store; tests use this to fake the
    /// entitlement relation.
    pub fn with_memberships(mut self, store: Arc<dyn MembershipStore>) -> Self {
        self.memberships = store;
        self
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let state = AppState::new(pool, SessionConfig::from_env()?, ProxyConfig::from_env())?;
    Ok(build_router(state))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let page_routes = Router::new()
        .route("/", get(pages::index))
        .route("/login", get(pages::login))
        .route("/privacy", get(pages::privacy))
        .route("/unauthorized", get(pages::unauthorized))
        .route("/auth/callback", get(pages::auth_callback))
        .route("/auth/session", post(auth::create_session))
        .route("/auth/logout", post(auth::logout))
        .route("/home", get(pages::home))
        .route("/sites", get(pages::sites))
        .route("/users", get(pages::users_index))
        .route("/pov/:id", get(pages::pov_detail))
        .route("/active-pov/:id", get(pages::active_pov_detail));

    // The proxy sets its own CORS headers (they must survive error paths),
    // so it sits outside the shared CorsLayer.
    let proxy_routes = Router::new().route("/*suffix", any(proxy::forward));

    Router::new()
        .merge(page_routes)
        .route("/api/health", get(health::health))
        .layer(cors)
        .nest("/api/proxy", proxy_routes)
        .layer(middleware::from_fn_with_state(state.clone(), gate::enforce))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
