use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::authz::{Permission, Principal};
use crate::errors::AppError;

pub const SESSION_COOKIE: &str = "pov_session";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl SessionConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("SESSION_SECRET")
            .map_err(|_| AppError::configuration("SESSION_SECRET not set"))?;
        let exp_hours = std::env::var("SESSION_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("SESSION_EXP_HOURS must be a valid integer"))?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
        })
    }

    pub fn encode(&self, user_id: Uuid, email: &str, perms: &[Permission]) -> Result<String, AppError> {
        use chrono::{Duration, Utc};

        let now = Utc::now();
        let exp = now + Duration::hours(self.exp_hours);

        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            perms: perms.iter().map(|p| p.to_string()).collect(),
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }

    /// Resolve the caller's identity from the request cookies.
    ///
    /// Absence of a session is a normal outcome, never an error. When the
    /// token is past half its lifetime a refreshed cookie is returned; the
    /// gate must merge it onto whatever response it produces, redirects
    /// included, or the caller loses the session on every redirect.
    pub fn resolve(&self, jar: &CookieJar) -> (Option<Principal>, Option<Cookie<'static>>) {
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return (None, None);
        };

        let claims = match self.decode(cookie.value()) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::debug!(error = %err, "session cookie rejected");
                return (None, None);
            }
        };

        let principal = claims.to_principal();

        let refreshed = if self.needs_refresh(&claims) {
            match self.encode(claims.sub, &claims.email, &principal.permissions.iter().copied().collect::<Vec<_>>()) {
                Ok(token) => Some(session_cookie(token)),
                Err(err) => {
                    // Keep the session usable on its old token.
                    tracing::warn!(error = %err, "session refresh failed");
                    None
                }
            }
        } else {
            None
        };

        (Some(principal), refreshed)
    }

    fn needs_refresh(&self, claims: &Claims) -> bool {
        let now = chrono::Utc::now().timestamp();
        let remaining = claims.exp as i64 - now;
        remaining < (self.exp_hours * 3600) / 2
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    /// Held permissions as "action:resource" strings.
    pub perms: Vec<String>,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    pub fn to_principal(&self) -> Principal {
        let perms = self.perms.iter().filter_map(|raw| {
            match raw.parse::<Permission>() {
                Ok(perm) => Some(perm),
                Err(err) => {
                    // Unknown claims from an older release are dropped, never granted.
                    tracing::debug!(raw = %raw, error = %err, "skipping unparseable permission claim");
                    None
                }
            }
        });

        Principal::new(self.sub, self.email.clone())
            .with_permissions(perms)
            .with_claims(serde_json::to_value(self).unwrap_or(serde_json::Value::Null))
    }
}

/// Build the session cookie for a freshly minted token.
pub fn session_cookie(token: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie
}

/// Expired cookie used to clear the session at sign-out.
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.make_removal();
    cookie
}
