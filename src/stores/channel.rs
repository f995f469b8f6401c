//! Channel and channel membership persistence.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::cache::ProfileCache;
use crate::error::{NotFoundKind, Result, StoreError};
use crate::id::new_id;
use crate::model::{Channel, ChannelMember};

/// Port for channel persistence.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    /// Create a channel, assigning its id.
    async fn save(&self, channel: &Channel) -> Result<Channel>;

    async fn get(&self, channel_id: &str) -> Result<Channel>;

    async fn update(&self, channel: &Channel) -> Result<Channel>;

    async fn save_member(&self, member: &ChannelMember) -> Result<ChannelMember>;

    async fn get_member(&self, channel_id: &str, user_id: &str) -> Result<ChannelMember>;

    async fn remove_member(&self, channel_id: &str, user_id: &str) -> Result<()>;
}

/// SQL channel store.
///
/// Membership writes drop the cached member map of the channel.
#[derive(Clone)]
pub struct SqlChannelStore {
    pool: SqlitePool,
    cache: Arc<ProfileCache>,
}

impl SqlChannelStore {
    /// Create a new [`SqlChannelStore`].
    pub fn new(pool: SqlitePool, cache: Arc<ProfileCache>) -> Self {
        Self { pool, cache }
    }
}

#[async_trait]
impl ChannelStore for SqlChannelStore {
    async fn save(&self, channel: &Channel) -> Result<Channel> {
        if !channel.id.is_empty() {
            return Err(StoreError::invalid("id", "must update existing channel"));
        }

        let now = super::now_millis();
        let channel = Channel {
            id: new_id(),
            create_at: now,
            update_at: now,
            ..channel.clone()
        };

        sqlx::query(
            r#"INSERT INTO channels
                (id, team_id, name, display_name, channel_type, group_constrained, create_at, update_at, delete_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&channel.id)
        .bind(&channel.team_id)
        .bind(&channel.name)
        .bind(&channel.display_name)
        .bind(channel.channel_type.as_str())
        .bind(channel.group_constrained)
        .bind(channel.create_at)
        .bind(channel.update_at)
        .bind(channel.delete_at)
        .execute(&self.pool)
        .await?;

        Ok(channel)
    }

    async fn get(&self, channel_id: &str) -> Result<Channel> {
        sqlx::query_as::<_, Channel>(
            r#"SELECT id, team_id, name, display_name, channel_type, group_constrained, create_at, update_at, delete_at
                FROM channels WHERE id = ?"#,
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(NotFoundKind::Channel, channel_id))
    }

    async fn update(&self, channel: &Channel) -> Result<Channel> {
        let channel = Channel {
            update_at: super::now_millis(),
            ..channel.clone()
        };

        let result = sqlx::query(
            r#"UPDATE channels
                SET name = ?, display_name = ?, channel_type = ?, group_constrained = ?, update_at = ?, delete_at = ?
                WHERE id = ?"#,
        )
        .bind(&channel.name)
        .bind(&channel.display_name)
        .bind(channel.channel_type.as_str())
        .bind(channel.group_constrained)
        .bind(channel.update_at)
        .bind(channel.delete_at)
        .bind(&channel.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(NotFoundKind::Channel, &channel.id));
        }

        Ok(channel)
    }

    async fn save_member(&self, member: &ChannelMember) -> Result<ChannelMember> {
        sqlx::query(
            r#"INSERT INTO channel_members
                (channel_id, user_id, roles, scheme_guest, scheme_user, scheme_admin, last_viewed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&member.channel_id)
        .bind(&member.user_id)
        .bind(&member.roles)
        .bind(member.scheme_guest)
        .bind(member.scheme_user)
        .bind(member.scheme_admin)
        .bind(member.last_viewed_at)
        .execute(&self.pool)
        .await?;

        self.cache.invalidate_channel(&member.channel_id);

        Ok(member.clone())
    }

    async fn get_member(&self, channel_id: &str, user_id: &str) -> Result<ChannelMember> {
        sqlx::query_as::<_, ChannelMember>(
            r#"SELECT channel_id, user_id, roles, scheme_guest, scheme_user, scheme_admin, last_viewed_at
                FROM channel_members WHERE channel_id = ? AND user_id = ?"#,
        )
        .bind(channel_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            StoreError::not_found(NotFoundKind::Membership, format!("{channel_id}/{user_id}"))
        })
    }

    async fn remove_member(&self, channel_id: &str, user_id: &str) -> Result<()> {
        sqlx::query(r#"DELETE FROM channel_members WHERE channel_id = ? AND user_id = ?"#)
            .bind(channel_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate_channel(channel_id);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelType;
    use crate::testing::{directory, save_channel, save_user};

    #[tokio::test]
    async fn test_update() {
        let dir = directory().await;
        let channel = save_channel(&dir, "", ChannelType::Open).await;
        assert_eq!(dir.channels.get(&channel.id).await.unwrap(), channel);

        let private = dir
            .channels
            .update(&Channel {
                channel_type: ChannelType::Private,
                ..channel.clone()
            })
            .await
            .unwrap();
        assert_eq!(
            dir.channels.get(&channel.id).await.unwrap().channel_type,
            ChannelType::Private
        );
        assert!(private.update_at >= channel.update_at);

        let err = dir.channels.get("missing").await.unwrap_err();
        assert!(err.is_not_found(NotFoundKind::Channel));
    }

    #[tokio::test]
    async fn test_membership_invalidates_channel_profiles() {
        let dir = directory().await;
        let channel = save_channel(&dir, "", ChannelType::Open).await;
        let user = save_user(&dir, "a", "system_user").await;

        dir.cache.insert_channel_profiles(
            &channel.id,
            Arc::new(Default::default()),
            dir.cache.generation(),
        );
        dir.channels
            .save_member(&ChannelMember::new(&channel.id, &user.id))
            .await
            .unwrap();
        assert!(dir.cache.channel_profiles(&channel.id).is_none());

        dir.cache.insert_channel_profiles(
            &channel.id,
            Arc::new(Default::default()),
            dir.cache.generation(),
        );
        dir.channels.remove_member(&channel.id, &user.id).await.unwrap();
        assert!(dir.cache.channel_profiles(&channel.id).is_none());

        let err = dir.channels.get_member(&channel.id, &user.id).await.unwrap_err();
        assert!(err.is_not_found(NotFoundKind::Membership));
    }
}
