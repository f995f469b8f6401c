//! Counts.

use sqlx::{QueryBuilder, Sqlite};

use crate::error::Result;
use crate::model::{SYSTEM_ADMIN_ROLE_ID, UserCountOptions};
use crate::user::{UserStore, push_role, push_team_member, push_view_restrictions};

impl UserStore {
    /// Number of users matching `options`.
    pub async fn count(&self, options: &UserCountOptions) -> Result<i64> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(DISTINCT u.id) FROM users u WHERE 1 = 1");

        if !options.include_deleted {
            query.push(" AND u.delete_at = 0");
        }
        if options.exclude_regular_users {
            query.push(" AND u.id IN (SELECT b.user_id FROM bots b)");
        } else if !options.include_bot_accounts {
            query.push(" AND u.id NOT IN (SELECT b.user_id FROM bots b)");
        }
        if let Some(team_id) = options.team_id.as_deref().filter(|id| !id.is_empty()) {
            push_team_member(&mut query, team_id);
        }
        push_view_restrictions(&mut query, options.view_restrictions.as_ref());

        self.scalar(query).await
    }

    /// Users whose presence shows activity within the last `window_millis`.
    ///
    /// Presence rows are counted even when no user record backs them.
    pub async fn analytics_active_count(
        &self,
        window_millis: i64,
        options: &UserCountOptions,
    ) -> Result<i64> {
        let since = self.stamper.now() - window_millis;

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(DISTINCT s.user_id) FROM status s WHERE s.last_activity_at >= ");
        query.push_bind(since);

        if !options.include_bot_accounts {
            query.push(" AND s.user_id NOT IN (SELECT b.user_id FROM bots b)");
        }
        if !options.include_deleted {
            query.push(" AND s.user_id NOT IN (SELECT u.id FROM users u WHERE u.delete_at != 0)");
        }

        self.scalar(query).await
    }

    /// Deactivated users.
    pub async fn analytics_get_inactive_users_count(&self) -> Result<i64> {
        self.scalar(QueryBuilder::new(
            "SELECT COUNT(u.id) FROM users u WHERE u.delete_at != 0",
        ))
        .await
    }

    /// Active system administrators.
    pub async fn analytics_get_system_admin_count(&self) -> Result<i64> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(u.id) FROM users u WHERE u.delete_at = 0");
        push_role(&mut query, SYSTEM_ADMIN_ROLE_ID);

        self.scalar(query).await
    }

    async fn scalar(&self, mut query: QueryBuilder<'_, Sqlite>) -> Result<i64> {
        let (count,): (i64,) = query.build_query_as().fetch_one(&self.pool).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use crate::id::new_id;
    use crate::model::{Bot, STATUS_ONLINE, Status, UserCountOptions, ViewRestrictions};
    use crate::stores::now_millis;
    use crate::testing::{directory, join_team, make_email, save_team, save_user};
    use crate::user::UserBuilder;

    const DAY: i64 = 24 * 60 * 60 * 1000;

    #[tokio::test]
    async fn test_count() {
        let dir = directory().await;
        let active = save_user(&dir, "a", "system_user").await;
        dir.users
            .save(&UserBuilder::new().email(make_email()).delete_at(1).build())
            .await
            .unwrap();
        let bot = save_user(&dir, "bot", "system_user").await;
        dir.bots
            .save(&Bot {
                user_id: bot.id.clone(),
                ..Default::default()
            })
            .await
            .unwrap();

        let count = |options: UserCountOptions| {
            let users = dir.users.clone();
            async move { users.count(&options).await.unwrap() }
        };

        assert_eq!(count(UserCountOptions::default()).await, 1);
        assert_eq!(
            count(UserCountOptions {
                include_bot_accounts: true,
                ..Default::default()
            })
            .await,
            2
        );
        assert_eq!(
            count(UserCountOptions {
                include_deleted: true,
                ..Default::default()
            })
            .await,
            2
        );
        assert_eq!(
            count(UserCountOptions {
                include_bot_accounts: true,
                include_deleted: true,
                ..Default::default()
            })
            .await,
            3
        );
        assert_eq!(
            count(UserCountOptions {
                exclude_regular_users: true,
                ..Default::default()
            })
            .await,
            1
        );

        let team = save_team(&dir).await;
        join_team(&dir, &team.id, &active.id).await;
        assert_eq!(
            count(UserCountOptions {
                team_id: Some(team.id.clone()),
                ..Default::default()
            })
            .await,
            1
        );
        assert_eq!(
            count(UserCountOptions {
                view_restrictions: Some(ViewRestrictions::teams([&team.id])),
                ..Default::default()
            })
            .await,
            1
        );
        assert_eq!(
            count(UserCountOptions {
                view_restrictions: Some(ViewRestrictions::default()),
                ..Default::default()
            })
            .await,
            0
        );
    }

    #[tokio::test]
    async fn test_analytics_active_count() {
        let dir = directory().await;
        let now = now_millis();

        let active = save_user(&dir, "a", "system_user").await;
        let deleted = dir
            .users
            .save(&UserBuilder::new().email(make_email()).delete_at(1).build())
            .await
            .unwrap();
        let bot = save_user(&dir, "bot", "system_user").await;
        dir.bots
            .save(&Bot {
                user_id: bot.id.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        let idle = save_user(&dir, "i", "system_user").await;

        for (user_id, activity) in [
            (active.id.as_str(), now),
            (deleted.id.as_str(), now),
            (bot.id.as_str(), now),
            (idle.id.as_str(), now - 2 * DAY),
        ] {
            dir.statuses
                .save_or_update(&Status::new(user_id, STATUS_ONLINE, activity))
                .await
                .unwrap();
        }

        let users = &dir.users;
        assert_eq!(users.analytics_active_count(DAY, &UserCountOptions::default()).await.unwrap(), 1);
        assert_eq!(
            users
                .analytics_active_count(
                    DAY,
                    &UserCountOptions {
                        include_bot_accounts: true,
                        include_deleted: true,
                        ..Default::default()
                    }
                )
                .await
                .unwrap(),
            3
        );
        assert_eq!(
            users
                .analytics_active_count(3 * DAY, &UserCountOptions::default())
                .await
                .unwrap(),
            2
        );

        // Presence rows without a user record still count.
        dir.statuses
            .save_or_update(&Status::new(new_id(), STATUS_ONLINE, now))
            .await
            .unwrap();
        assert_eq!(users.analytics_active_count(DAY, &UserCountOptions::default()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_analytics_counts() {
        let dir = directory().await;
        save_user(&dir, "a", "system_user system_admin").await;
        save_user(&dir, "b", "system_user").await;
        dir.users
            .save(
                &UserBuilder::new()
                    .email(make_email())
                    .roles("system_user system_admin")
                    .delete_at(1)
                    .build(),
            )
            .await
            .unwrap();

        assert_eq!(dir.users.analytics_get_inactive_users_count().await.unwrap(), 1);
        assert_eq!(dir.users.analytics_get_system_admin_count().await.unwrap(), 1);
    }
}
