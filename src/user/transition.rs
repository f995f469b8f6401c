//! Guest and user role transitions.

use sqlx::{Sqlite, Transaction};

use crate::error::{NotFoundKind, Result, StoreError};
use crate::model::{RoleSet, User};
use crate::telemetry::ROLE_TRANSITIONS;
use crate::user::UserStore;

const CLEAR_ROLES_BATCH: i64 = 1000;

#[derive(Debug, Clone, Copy)]
enum Transition {
    Promote,
    Demote,
}

impl Transition {
    fn apply(&self, roles: &mut RoleSet) {
        match self {
            Transition::Promote => roles.promote(),
            Transition::Demote => roles.demote(),
        }
    }

    /// `(scheme_guest, scheme_user)` of every membership afterwards.
    fn scheme(&self) -> (bool, bool) {
        match self {
            Transition::Promote => (false, true),
            Transition::Demote => (true, false),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Transition::Promote => "promote",
            Transition::Demote => "demote",
        }
    }
}

impl UserStore {
    /// Make a guest a regular user, on its record and every membership.
    pub async fn promote_guest_to_user(&self, user_id: &str) -> Result<User> {
        self.transition(user_id, Transition::Promote).await
    }

    /// Make a user a guest, on its record and every membership.
    ///
    /// The admin role is dropped.
    pub async fn demote_user_to_guest(&self, user_id: &str) -> Result<User> {
        self.transition(user_id, Transition::Demote).await
    }

    async fn transition(&self, user_id: &str, transition: Transition) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let roles: Option<String> = sqlx::query_scalar(r#"SELECT roles FROM users WHERE id = ?"#)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(roles) = roles else {
            return Err(StoreError::not_found(NotFoundKind::Account, user_id));
        };

        let mut roles = RoleSet::parse(&roles);
        transition.apply(&mut roles);
        let (scheme_guest, scheme_user) = transition.scheme();

        sqlx::query(
            r#"UPDATE users SET roles = ?, update_at = MAX(?, update_at + 1) WHERE id = ?"#,
        )
        .bind(roles.to_string())
        .bind(self.stamper.next())
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let teams = set_scheme(&mut tx, "team_members", user_id, scheme_guest, scheme_user).await?;
        let channels =
            set_scheme(&mut tx, "channel_members", user_id, scheme_guest, scheme_user).await?;

        tx.commit().await?;

        self.cache.invalidate_user(user_id);
        metrics::counter!(ROLE_TRANSITIONS, "direction" => transition.label()).increment(1);
        tracing::info!(%user_id, %roles, teams, channels, direction = transition.label(), "role transition");

        self.get(user_id).await
    }

    /// Strip every custom role token from every user.
    pub async fn clear_all_custom_role_assignments(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let mut last_id = String::new();
        let mut cleared = 0u64;

        loop {
            let batch: Vec<(String, String)> = sqlx::query_as(
                r#"SELECT id, roles FROM users WHERE id > ? ORDER BY id LIMIT ?"#,
            )
            .bind(&last_id)
            .bind(CLEAR_ROLES_BATCH)
            .fetch_all(&mut *tx)
            .await?;

            let Some((id, _)) = batch.last() else {
                break;
            };
            last_id = id.clone();

            for (id, raw) in &batch {
                let mut roles = RoleSet::parse(raw);
                roles.retain_system_roles();
                let roles = roles.to_string();

                if roles != *raw {
                    sqlx::query(
                        r#"UPDATE users SET roles = ?, update_at = MAX(?, update_at + 1) WHERE id = ?"#,
                    )
                        .bind(&roles)
                        .bind(self.stamper.next())
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                    cleared += 1;
                }
            }
        }

        tx.commit().await?;

        self.cache.clear();
        tracing::info!(cleared, "custom role assignments cleared");

        Ok(())
    }
}

async fn set_scheme(
    tx: &mut Transaction<'_, Sqlite>,
    table: &'static str,
    user_id: &str,
    scheme_guest: bool,
    scheme_user: bool,
) -> Result<u64> {
    let result = sqlx::query(&format!(
        "UPDATE {table} SET scheme_guest = ?, scheme_user = ? WHERE user_id = ?"
    ))
    .bind(scheme_guest)
    .bind(scheme_user)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}
