use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Pov record summary. Ids are opaque strings owned by the wider admin
/// application; this layer never interprets them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Pov {
    pub id: String,
    pub name: String,
    pub company: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
