//! Bot accounts, the source of the `is_bot` overlay.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::cache::ProfileCache;
use crate::error::{NotFoundKind, Result, StoreError};
use crate::model::Bot;

/// Port for bot persistence.
#[async_trait]
pub trait BotStore: Send + Sync {
    /// Attach a bot to the user record sharing its id.
    async fn save(&self, bot: &Bot) -> Result<Bot>;

    async fn get(&self, user_id: &str) -> Result<Bot>;

    /// Bots among `user_ids`, keyed by user id.
    async fn get_by_ids(&self, user_ids: &[String]) -> Result<HashMap<String, Bot>>;

    async fn permanent_delete(&self, user_id: &str) -> Result<()>;
}

/// SQL bot store.
///
/// Writes drop the cached profiles of the bot user, which carry the overlay.
#[derive(Clone)]
pub struct SqlBotStore {
    pool: SqlitePool,
    cache: Arc<ProfileCache>,
}

impl SqlBotStore {
    /// Create a new [`SqlBotStore`].
    pub fn new(pool: SqlitePool, cache: Arc<ProfileCache>) -> Self {
        Self { pool, cache }
    }
}

#[async_trait]
impl BotStore for SqlBotStore {
    async fn save(&self, bot: &Bot) -> Result<Bot> {
        if bot.user_id.is_empty() {
            return Err(StoreError::invalid("user_id", "bot needs a user record"));
        }

        let now = super::now_millis();
        let bot = Bot {
            create_at: now,
            update_at: now,
            ..bot.clone()
        };

        sqlx::query(
            r#"INSERT INTO bots
                (user_id, username, display_name, description, owner_id, create_at, update_at, delete_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&bot.user_id)
        .bind(&bot.username)
        .bind(&bot.display_name)
        .bind(&bot.description)
        .bind(&bot.owner_id)
        .bind(bot.create_at)
        .bind(bot.update_at)
        .bind(bot.delete_at)
        .execute(&self.pool)
        .await?;

        self.cache.invalidate_user(&bot.user_id);

        Ok(bot)
    }

    async fn get(&self, user_id: &str) -> Result<Bot> {
        sqlx::query_as::<_, Bot>(
            r#"SELECT user_id, username, display_name, description, owner_id, create_at, update_at, delete_at
                FROM bots WHERE user_id = ?"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(NotFoundKind::Bot, user_id))
    }

    async fn get_by_ids(&self, user_ids: &[String]) -> Result<HashMap<String, Bot>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT user_id, username, display_name, description, owner_id, create_at, update_at, delete_at FROM bots WHERE user_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in user_ids {
            ids.push_bind(id.clone());
        }
        ids.push_unseparated(")");

        let bots = query
            .build_query_as::<Bot>()
            .fetch_all(&self.pool)
            .await?;

        Ok(bots
            .into_iter()
            .map(|bot| (bot.user_id.clone(), bot))
            .collect())
    }

    async fn permanent_delete(&self, user_id: &str) -> Result<()> {
        sqlx::query(r#"DELETE FROM bots WHERE user_id = ?"#)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate_user(user_id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserGetByIdsOptions;
    use crate::testing::{directory, save_user};

    #[tokio::test]
    async fn test_bot_lifecycle() {
        let dir = directory().await;
        let user = save_user(&dir, "bot", "system_user").await;
        let bot = dir
            .bots
            .save(&Bot {
                user_id: user.id.clone(),
                description: "reminders".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(dir.bots.get(&user.id).await.unwrap(), bot);
        let bots = dir
            .bots
            .get_by_ids(&[user.id.clone(), "human".to_owned()])
            .await
            .unwrap();
        assert_eq!(bots.len(), 1);
        assert!(dir.bots.get_by_ids(&[]).await.unwrap().is_empty());

        dir.bots.permanent_delete(&user.id).await.unwrap();
        assert!(dir.bots.get(&user.id).await.unwrap_err().is_not_found(NotFoundKind::Bot));
        assert!(dir.bots.save(&Bot::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_bot_writes_refresh_cached_profiles() {
        let dir = directory().await;
        let user = save_user(&dir, "bot", "system_user").await;
        let ids = [user.id.clone()];

        let cached = dir
            .users
            .get_profile_by_ids(&ids, UserGetByIdsOptions::default(), true)
            .await
            .unwrap();
        assert!(!cached[0].is_bot);

        dir.bots
            .save(&Bot {
                user_id: user.id.clone(),
                description: "reminders".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let cached = dir
            .users
            .get_profile_by_ids(&ids, UserGetByIdsOptions::default(), true)
            .await
            .unwrap();
        assert!(cached[0].is_bot);
        assert_eq!(cached[0].bot_description, "reminders");

        dir.bots.permanent_delete(&user.id).await.unwrap();
        let cached = dir
            .users
            .get_profile_by_ids(&ids, UserGetByIdsOptions::default(), true)
            .await
            .unwrap();
        assert!(!cached[0].is_bot);
    }
}
