use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::authz::Permission;
use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub permissions: Vec<Permission>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row; ids are TEXT and permissions a JSON array of "action:resource".
#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub permissions: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&value.id)
            .map_err(|err| AppError::internal(format!("invalid user id: {err}")))?;

        let raw: Vec<String> = serde_json::from_str(&value.permissions)
            .map_err(|err| AppError::internal(format!("invalid permissions column: {err}")))?;

        // Unknown entries are dropped, never granted.
        let permissions = raw
            .iter()
            .filter_map(|perm| perm.parse::<Permission>().ok())
            .collect();

        Ok(User {
            id,
            email: value.email,
            name: value.name,
            permissions,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}
