//! Groups, group members and their team/channel syncables.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::{Result, StoreError};
use crate::id::new_id;
use crate::model::{Group, GroupMember, GroupSyncable, SyncableType};

/// Port for group persistence.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Create a group, assigning its id.
    async fn create(&self, group: &Group) -> Result<Group>;

    /// Add `user_id` to the group, reviving a removed membership.
    async fn upsert_member(&self, group_id: &str, user_id: &str) -> Result<GroupMember>;

    /// Soft-remove `user_id` from the group.
    async fn delete_member(&self, group_id: &str, user_id: &str) -> Result<()>;

    /// Link a group to a team or a channel.
    async fn create_group_syncable(&self, syncable: &GroupSyncable) -> Result<GroupSyncable>;

    /// Soft-remove a link.
    async fn delete_group_syncable(
        &self,
        group_id: &str,
        syncable_id: &str,
        syncable_type: SyncableType,
    ) -> Result<()>;
}

/// SQL group store.
#[derive(Clone)]
pub struct SqlGroupStore {
    pool: SqlitePool,
}

impl SqlGroupStore {
    /// Create a new [`SqlGroupStore`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupStore for SqlGroupStore {
    async fn create(&self, group: &Group) -> Result<Group> {
        if !group.id.is_empty() {
            return Err(StoreError::invalid("id", "must update existing group"));
        }

        let now = super::now_millis();
        let group = Group {
            id: new_id(),
            create_at: now,
            update_at: now,
            ..group.clone()
        };

        sqlx::query(
            r#"INSERT INTO user_groups
                (id, name, display_name, source, remote_id, create_at, update_at, delete_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&group.id)
        .bind(&group.name)
        .bind(&group.display_name)
        .bind(&group.source)
        .bind(&group.remote_id)
        .bind(group.create_at)
        .bind(group.update_at)
        .bind(group.delete_at)
        .execute(&self.pool)
        .await?;

        Ok(group)
    }

    async fn upsert_member(&self, group_id: &str, user_id: &str) -> Result<GroupMember> {
        let member = GroupMember {
            group_id: group_id.to_owned(),
            user_id: user_id.to_owned(),
            create_at: super::now_millis(),
            delete_at: 0,
        };

        sqlx::query(
            r#"INSERT INTO group_members (group_id, user_id, create_at, delete_at)
                VALUES (?, ?, ?, 0)
                ON CONFLICT (group_id, user_id) DO UPDATE SET delete_at = 0"#,
        )
        .bind(&member.group_id)
        .bind(&member.user_id)
        .bind(member.create_at)
        .execute(&self.pool)
        .await?;

        Ok(member)
    }

    async fn delete_member(&self, group_id: &str, user_id: &str) -> Result<()> {
        sqlx::query(
            r#"UPDATE group_members SET delete_at = ? WHERE group_id = ? AND user_id = ?"#,
        )
        .bind(super::now_millis())
        .bind(group_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_group_syncable(&self, syncable: &GroupSyncable) -> Result<GroupSyncable> {
        let now = super::now_millis();
        let syncable = GroupSyncable {
            create_at: now,
            update_at: now,
            delete_at: 0,
            ..syncable.clone()
        };

        sqlx::query(
            r#"INSERT INTO group_syncables
                (group_id, syncable_id, syncable_type, auto_add, create_at, update_at, delete_at)
                VALUES (?, ?, ?, ?, ?, ?, 0)
                ON CONFLICT (group_id, syncable_id, syncable_type)
                DO UPDATE SET auto_add = excluded.auto_add, update_at = excluded.update_at, delete_at = 0"#,
        )
        .bind(&syncable.group_id)
        .bind(&syncable.syncable_id)
        .bind(syncable.syncable_type.as_str())
        .bind(syncable.auto_add)
        .bind(syncable.create_at)
        .bind(syncable.update_at)
        .execute(&self.pool)
        .await?;

        Ok(syncable)
    }

    async fn delete_group_syncable(
        &self,
        group_id: &str,
        syncable_id: &str,
        syncable_type: SyncableType,
    ) -> Result<()> {
        sqlx::query(
            r#"UPDATE group_syncables SET delete_at = ?
                WHERE group_id = ? AND syncable_id = ? AND syncable_type = ?"#,
        )
        .bind(super::now_millis())
        .bind(group_id)
        .bind(syncable_id)
        .bind(syncable_type.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::GroupSyncable;
    use crate::testing::{directory, save_group, save_team, save_user};

    #[tokio::test]
    async fn test_upsert_member_revives() {
        let dir = directory().await;
        let team = save_team(&dir).await;
        let group = save_group(&dir).await;
        let user = save_user(&dir, "a", "system_user").await;
        dir.groups
            .create_group_syncable(&GroupSyncable::team(&group.id, &team.id))
            .await
            .unwrap();

        dir.groups.upsert_member(&group.id, &user.id).await.unwrap();
        assert_eq!(dir.users.get_team_group_users(&team.id).await.unwrap().len(), 1);

        dir.groups.delete_member(&group.id, &user.id).await.unwrap();
        assert!(dir.users.get_team_group_users(&team.id).await.unwrap().is_empty());

        let member = dir.groups.upsert_member(&group.id, &user.id).await.unwrap();
        assert_eq!(member.delete_at, 0);
        assert_eq!(dir.users.get_team_group_users(&team.id).await.unwrap().len(), 1);
    }
}
