//! Tenant-aware reverse proxy for the upstream multi-tenant REST API.
//!
//! The caller-supplied tenant header only selects the routing target; the
//! bearer token is passed through verbatim and validated by the upstream,
//! never by this layer.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::header::{self, HeaderValue};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::errors::AppError;

pub const TENANT_HEADER: &str = "x-tenant";
pub const VERSION_HEADER: &str = "x-version";
pub const API_VERSION: &str = "3";

const DEFAULT_UPSTREAM_TEMPLATE: &str = "https://{tenant}.mobicontrol.cloud/rest/api";
const DEFAULT_TIMEOUT_SECS: u64 = 15;

const ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOW_HEADERS: &str = "Authorization, Content-Type, x-tenant";

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream host template; `{tenant}` is substituted per request.
    pub upstream_template: String,
    pub timeout: Duration,
}

impl ProxyConfig {
    pub fn from_env() -> Self {
        let upstream_template = std::env::var("PROXY_UPSTREAM_TEMPLATE")
            .unwrap_or_else(|_| DEFAULT_UPSTREAM_TEMPLATE.to_string());
        let timeout = std::env::var("PROXY_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS));

        Self {
            upstream_template,
            timeout,
        }
    }

    pub fn client(&self) -> Result<reqwest::Client, AppError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| AppError::configuration(format!("proxy client: {err}")))
    }

    /// Substitute the tenant into the host template and append the suffix and
    /// query string unchanged.
    pub fn upstream_url(&self, tenant: &str, suffix: &str, query: Option<&str>) -> String {
        let base = self.upstream_template.replace("{tenant}", tenant);
        let mut url = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            suffix.trim_start_matches('/')
        );
        if let Some(query) = query {
            if !query.is_empty() {
                url.push('?');
                url.push_str(query);
            }
        }
        url
    }
}

/// Verb-agnostic catch-all under `/api/proxy`.
pub async fn forward(
    State(state): State<AppState>,
    Path(suffix): Path<String>,
    RawQuery(query): RawQuery,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Preflight never contacts the upstream.
    if method == Method::OPTIONS {
        return with_cors(StatusCode::OK.into_response());
    }

    let Some(tenant) = headers.get(TENANT_HEADER).and_then(|value| value.to_str().ok()) else {
        return with_cors(
            (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "bad_request",
                    "message": format!("missing {TENANT_HEADER} header"),
                })),
            )
                .into_response(),
        );
    };

    let url = state.proxy.upstream_url(tenant, &suffix, query.as_deref());

    let upstream_method = reqwest::Method::from_bytes(method.as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET);

    let mut request = state
        .http
        .request(upstream_method, &url)
        .header(VERSION_HEADER, API_VERSION);

    // Authorization rides through verbatim; the upstream is the authority.
    if let Some(auth) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        request = request.header(reqwest::header::AUTHORIZATION, auth);
    }

    if let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        request = request.header(reqwest::header::CONTENT_TYPE, content_type);
    }

    if method != Method::GET && method != Method::HEAD {
        request = request.body(body.to_vec());
    }

    match round_trip(request).await {
        Ok((status, payload)) => with_cors((status, Json(payload)).into_response()),
        Err(err) => {
            tracing::warn!(url = %url, error = %err, "proxy round trip failed");
            with_cors(
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "proxy_failure",
                        "message": err,
                    })),
                )
                    .into_response(),
            )
        }
    }
}

/// One attempt, no retries; retry policy belongs to the caller.
async fn round_trip(request: reqwest::RequestBuilder) -> Result<(StatusCode, Value), String> {
    let response = request.send().await.map_err(|err| err.to_string())?;
    let status =
        StatusCode::from_u16(response.status().as_u16()).map_err(|err| err.to_string())?;
    let payload = response.json::<Value>().await.map_err(|err| err.to_string())?;
    Ok((status, payload))
}

/// Permissive CORS on every proxy response so browser-based cross-origin
/// callers can use it, error paths included.
fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}
