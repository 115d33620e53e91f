use std::time::Duration;

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Bounded so a slow data layer cannot hold a caller's request open.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Record-scope entitlement lookup, behind a trait so tests substitute a fake.
///
/// Returns a plain bool: a lookup error and an empty result are both "not
/// entitled". The caller must never learn which one occurred.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn is_member(&self, record_id: &str, user_id: Uuid) -> bool;
}

#[derive(Debug, Clone)]
pub struct SqliteMembershipStore {
    pool: SqlitePool,
}

impl SqliteMembershipStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipStore for SqliteMembershipStore {
    async fn is_member(&self, record_id: &str, user_id: Uuid) -> bool {
        let query = sqlx::query_scalar::<_, i64>(
            "SELECT EXISTS(SELECT 1 FROM pov_members WHERE pov_id = ? AND user_id = ?)",
        )
        .bind(record_id)
        .bind(user_id.to_string())
        .fetch_one(&self.pool);

        match tokio::time::timeout(LOOKUP_TIMEOUT, query).await {
            Ok(Ok(exists)) => exists != 0,
            Ok(Err(err)) => {
                tracing::warn!(
                    record_id = %record_id,
                    user_id = %user_id,
                    error = %err,
                    "membership lookup failed, denying"
                );
                false
            }
            Err(_) => {
                tracing::warn!(
                    record_id = %record_id,
                    user_id = %user_id,
                    "membership lookup timed out, denying"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool_with_schema() -> SqlitePool {
        // One connection: each sqlite :memory: connection is its own database.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE pov_members (pov_id TEXT NOT NULL, user_id TEXT NOT NULL, PRIMARY KEY (pov_id, user_id))",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn existing_row_is_entitled() {
        let pool = pool_with_schema().await;
        let user_id = Uuid::new_v4();

        sqlx::query("INSERT INTO pov_members (pov_id, user_id) VALUES (?, ?)")
            .bind("42")
            .bind(user_id.to_string())
            .execute(&pool)
            .await
            .unwrap();

        let store = SqliteMembershipStore::new(pool);
        assert!(store.is_member("42", user_id).await);
    }

    #[tokio::test]
    async fn missing_row_is_not_entitled() {
        let pool = pool_with_schema().await;
        let store = SqliteMembershipStore::new(pool);
        assert!(!store.is_member("42", Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn other_users_row_does_not_entitle() {
        let pool = pool_with_schema().await;

        sqlx::query("INSERT INTO pov_members (pov_id, user_id) VALUES (?, ?)")
            .bind("42")
            .bind(Uuid::new_v4().to_string())
            .execute(&pool)
            .await
            .unwrap();

        let store = SqliteMembershipStore::new(pool);
        assert!(!store.is_member("42", Uuid::new_v4()).await);
    }

    #[tokio::test]
    async fn lookup_error_fails_closed() {
        // No pov_members table at all: the query errors and the store denies.
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let store = SqliteMembershipStore::new(pool);
        assert!(!store.is_member("42", Uuid::new_v4()).await);
    }
}
