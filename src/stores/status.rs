//! Presence records.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::{NotFoundKind, Result, StoreError};
use crate::model::Status;

/// Port for presence persistence.
#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn save_or_update(&self, status: &Status) -> Result<()>;

    async fn get(&self, user_id: &str) -> Result<Status>;
}

/// SQL status store.
#[derive(Clone)]
pub struct SqlStatusStore {
    pool: SqlitePool,
}

impl SqlStatusStore {
    /// Create a new [`SqlStatusStore`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusStore for SqlStatusStore {
    async fn save_or_update(&self, status: &Status) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO status (user_id, status, manual, last_activity_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (user_id) DO UPDATE SET
                    status = excluded.status,
                    manual = excluded.manual,
                    last_activity_at = excluded.last_activity_at"#,
        )
        .bind(&status.user_id)
        .bind(&status.status)
        .bind(status.manual)
        .bind(status.last_activity_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, user_id: &str) -> Result<Status> {
        sqlx::query_as::<_, Status>(
            r#"SELECT user_id, status, manual, last_activity_at FROM status WHERE user_id = ?"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(NotFoundKind::Status, user_id))
    }
}
