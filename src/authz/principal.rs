use std::collections::HashSet;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde_json::Value;
use uuid::Uuid;

use super::model::{allowed, Permission};
use crate::errors::AppError;

/// Principal is the authenticated identity resolved from a session credential,
/// with its held permissions already parsed.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub permissions: HashSet<Permission>,
    /// Raw session claims, kept for handlers that need provider metadata.
    pub claims: Value,
}

impl Principal {
    pub fn new(user_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            user_id,
            email: email.into(),
            permissions: HashSet::new(),
            claims: Value::Null,
        }
    }

    pub fn with_permissions(mut self, perms: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = perms.into_iter().collect();
        self
    }

    pub fn with_claims(mut self, claims: Value) -> Self {
        self.claims = claims;
        self
    }

    pub fn can(&self, permission: Permission) -> bool {
        allowed(&self.permissions, permission)
    }

    /// Call-site guard: deny with 403 unless the permission is held.
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.can(permission) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = %self.user_id,
                permission = %permission,
                "permission denied"
            );
            Err(AppError::forbidden(format!(
                "missing permission {permission}"
            )))
        }
    }
}

/// The gate inserts the resolved principal into request extensions; handlers
/// on protected paths extract it from there.
#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("no session"))
    }
}
