//! Team and team membership persistence.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::{NotFoundKind, Result, StoreError};
use crate::id::new_id;
use crate::model::{Team, TeamMember};

/// Port for team persistence.
#[async_trait]
pub trait TeamStore: Send + Sync {
    /// Create a team, assigning its id.
    async fn save(&self, team: &Team) -> Result<Team>;

    async fn get(&self, team_id: &str) -> Result<Team>;

    /// Add a member. `max_users` caps active members when set.
    async fn save_member(
        &self,
        member: &TeamMember,
        max_users: Option<u32>,
    ) -> Result<TeamMember>;

    async fn get_member(&self, team_id: &str, user_id: &str) -> Result<TeamMember>;

    /// Replace roles, scheme flags and `delete_at` of a membership.
    async fn update_member(&self, member: &TeamMember) -> Result<TeamMember>;

    async fn remove_member(&self, team_id: &str, user_id: &str) -> Result<()>;
}

/// SQL team store.
#[derive(Clone)]
pub struct SqlTeamStore {
    pool: SqlitePool,
}

impl SqlTeamStore {
    /// Create a new [`SqlTeamStore`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TeamStore for SqlTeamStore {
    async fn save(&self, team: &Team) -> Result<Team> {
        if !team.id.is_empty() {
            return Err(StoreError::invalid("id", "must update existing team"));
        }

        let now = super::now_millis();
        let team = Team {
            id: new_id(),
            team_type: if team.team_type.is_empty() {
                "O".to_owned()
            } else {
                team.team_type.clone()
            },
            create_at: now,
            update_at: now,
            ..team.clone()
        };

        sqlx::query(
            r#"INSERT INTO teams
                (id, name, display_name, team_type, group_constrained, create_at, update_at, delete_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&team.id)
        .bind(&team.name)
        .bind(&team.display_name)
        .bind(&team.team_type)
        .bind(team.group_constrained)
        .bind(team.create_at)
        .bind(team.update_at)
        .bind(team.delete_at)
        .execute(&self.pool)
        .await?;

        Ok(team)
    }

    async fn get(&self, team_id: &str) -> Result<Team> {
        sqlx::query_as::<_, Team>(
            r#"SELECT id, name, display_name, team_type, group_constrained, create_at, update_at, delete_at
                FROM teams WHERE id = ?"#,
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(NotFoundKind::Team, team_id))
    }

    async fn save_member(
        &self,
        member: &TeamMember,
        max_users: Option<u32>,
    ) -> Result<TeamMember> {
        let mut tx = self.pool.begin().await?;

        if let Some(max) = max_users {
            let count: i64 = sqlx::query_scalar(
                r#"SELECT COUNT(*) FROM team_members tm
                    JOIN users u ON u.id = tm.user_id
                    WHERE tm.team_id = ? AND tm.delete_at = 0 AND u.delete_at = 0"#,
            )
            .bind(&member.team_id)
            .fetch_one(&mut *tx)
            .await?;

            if count >= i64::from(max) {
                return Err(StoreError::invalid(
                    "max_users",
                    format!("team {} is full", member.team_id),
                ));
            }
        }

        sqlx::query(
            r#"INSERT INTO team_members
                (team_id, user_id, roles, scheme_guest, scheme_user, scheme_admin, delete_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&member.team_id)
        .bind(&member.user_id)
        .bind(&member.roles)
        .bind(member.scheme_guest)
        .bind(member.scheme_user)
        .bind(member.scheme_admin)
        .bind(member.delete_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(member.clone())
    }

    async fn get_member(&self, team_id: &str, user_id: &str) -> Result<TeamMember> {
        sqlx::query_as::<_, TeamMember>(
            r#"SELECT team_id, user_id, roles, scheme_guest, scheme_user, scheme_admin, delete_at
                FROM team_members WHERE team_id = ? AND user_id = ?"#,
        )
        .bind(team_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| {
            StoreError::not_found(NotFoundKind::Membership, format!("{team_id}/{user_id}"))
        })
    }

    async fn update_member(&self, member: &TeamMember) -> Result<TeamMember> {
        let result = sqlx::query(
            r#"UPDATE team_members
                SET roles = ?, scheme_guest = ?, scheme_user = ?, scheme_admin = ?, delete_at = ?
                WHERE team_id = ? AND user_id = ?"#,
        )
        .bind(&member.roles)
        .bind(member.scheme_guest)
        .bind(member.scheme_user)
        .bind(member.scheme_admin)
        .bind(member.delete_at)
        .bind(&member.team_id)
        .bind(&member.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(
                NotFoundKind::Membership,
                format!("{}/{}", member.team_id, member.user_id),
            ));
        }

        Ok(member.clone())
    }

    async fn remove_member(&self, team_id: &str, user_id: &str) -> Result<()> {
        sqlx::query(r#"DELETE FROM team_members WHERE team_id = ? AND user_id = ?"#)
            .bind(team_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{directory, save_team, save_user};

    #[tokio::test]
    async fn test_save_member_max_users() {
        let dir = directory().await;
        let team = save_team(&dir).await;
        let u1 = save_user(&dir, "a", "system_user").await;
        let u2 = save_user(&dir, "b", "system_user").await;

        dir.teams
            .save_member(&TeamMember::new(&team.id, &u1.id), Some(1))
            .await
            .unwrap();
        let full = dir
            .teams
            .save_member(&TeamMember::new(&team.id, &u2.id), Some(1))
            .await;
        assert!(matches!(full, Err(StoreError::InvalidArgument { field: "max_users", .. })));
        assert!(dir.teams.get_member(&team.id, &u2.id).await.is_err());

        dir.teams.remove_member(&team.id, &u1.id).await.unwrap();
        dir.teams
            .save_member(&TeamMember::new(&team.id, &u2.id), Some(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_member() {
        let dir = directory().await;
        let team = save_team(&dir).await;
        let user = save_user(&dir, "a", "system_user").await;
        let member = dir
            .teams
            .save_member(&TeamMember::guest(&team.id, &user.id), None)
            .await
            .unwrap();

        let left = TeamMember {
            delete_at: 10,
            ..member
        };
        dir.teams.update_member(&left).await.unwrap();
        assert_eq!(dir.teams.get_member(&team.id, &user.id).await.unwrap(), left);

        let err = dir
            .teams
            .update_member(&TeamMember::new(&team.id, "nobody"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(NotFoundKind::Membership));
    }

    #[tokio::test]
    async fn test_get() {
        let dir = directory().await;
        let team = save_team(&dir).await;

        assert_eq!(dir.teams.get(&team.id).await.unwrap(), team);
        assert_eq!(team.team_type, "O");
        assert!(dir.teams.get("").await.unwrap_err().is_not_found(NotFoundKind::Team));
        assert!(dir.teams.save(&team).await.is_err());
    }
}
