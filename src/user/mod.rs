mod analytics;
mod builder;
mod etag;
mod query;
mod repository;
mod search;
mod transition;

pub use builder::*;
pub use search::normalize_search_term;

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::cache::ProfileCache;
use crate::clock::Stamper;
use crate::error::{Result, StoreError};
use crate::model::{Bot, BotFilter, USER_SEARCH_DEFAULT_LIMIT, User, ViewRestrictions};
use crate::stores::BotStore;

/// Columns read into a [`User`], in table alias `u`.
pub(crate) const USER_COLUMNS: &str = "u.id, u.create_at, u.update_at, u.delete_at, u.username, \
    u.password, u.auth_data, u.auth_service, u.email, u.nickname, u.first_name, u.last_name, \
    u.roles, u.props, u.last_password_update, u.last_picture_update, u.failed_attempts, \
    u.mfa_active, u.mfa_secret";

/// User persistence, listings, search, change tags and role transitions.
#[derive(Clone)]
pub struct UserStore {
    pool: SqlitePool,
    cache: Arc<ProfileCache>,
    bots: Arc<dyn BotStore>,
    stamper: Stamper,
    search_limit: usize,
}

impl UserStore {
    /// Create a new [`UserStore`].
    pub fn new(pool: SqlitePool, cache: Arc<ProfileCache>, bots: Arc<dyn BotStore>) -> Self {
        Self {
            pool,
            cache,
            bots,
            stamper: Stamper::default(),
            search_limit: USER_SEARCH_DEFAULT_LIMIT,
        }
    }

    /// Update the timestamp source.
    pub fn stamper(mut self, stamper: Stamper) -> Self {
        self.stamper = stamper;
        self
    }

    /// Update the cap used by searches without an explicit limit.
    pub fn search_limit(mut self, limit: usize) -> Self {
        if limit > 0 {
            self.search_limit = limit;
        }
        self
    }

    /// Drop the cached member map of `channel_id`.
    pub fn invalidate_profiles_in_channel_cache(&self, channel_id: &str) {
        self.cache.invalidate_channel(channel_id);
    }

    /// Drop every cached member map containing `user_id`.
    pub fn invalidate_profiles_in_channel_cache_by_user(&self, user_id: &str) {
        self.cache.invalidate_channels_of_user(user_id);
    }

    /// Drop the cached profile of `user_id`.
    pub fn invalidate_profile_cache_for_user(&self, user_id: &str) {
        self.cache.invalidate_profile(user_id);
    }

    pub fn clear_caches(&self) {
        self.cache.clear();
    }

    /// Apply the bot overlay to full records.
    async fn decorate(&self, users: Vec<User>) -> Result<Vec<User>> {
        if users.is_empty() {
            return Ok(users);
        }

        let ids: Vec<String> = users.iter().map(|u| u.id.clone()).collect();
        let bots = self.bots.get_by_ids(&ids).await?;

        Ok(apply_bot_overlay(users, &bots))
    }

    /// Decorate then sanitize, for bulk listings.
    async fn profiles(&self, users: Vec<User>) -> Result<Vec<User>> {
        Ok(self
            .decorate(users)
            .await?
            .iter()
            .map(User::sanitize)
            .collect())
    }

    async fn fetch(&self, mut query: QueryBuilder<'_, Sqlite>) -> Result<Vec<User>> {
        Ok(query
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?)
    }
}

/// Mark users backed by a bot record.
pub fn apply_bot_overlay(users: Vec<User>, bots: &HashMap<String, Bot>) -> Vec<User> {
    users
        .into_iter()
        .map(|mut user| {
            if let Some(bot) = bots.get(&user.id) {
                user.is_bot = true;
                user.bot_description = bot.description.clone();
            }
            user
        })
        .collect()
}

/// `SELECT <user columns> FROM users u WHERE 1 = 1`, ready for `AND` clauses.
pub(crate) fn select_users<'a>() -> QueryBuilder<'a, Sqlite> {
    QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users u WHERE 1 = 1"))
}

/// Escape `LIKE` metacharacters, to be used with `ESCAPE '\'`.
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Offset and limit of a zero-based page.
pub(crate) fn page_window(page: u32, per_page: u32) -> Result<(i64, i64)> {
    if per_page == 0 {
        return Err(StoreError::invalid("per_page", "must be positive"));
    }
    Ok((i64::from(page) * i64::from(per_page), i64::from(per_page)))
}

pub(crate) fn check_limit(limit: u32) -> Result<()> {
    if limit == 0 {
        return Err(StoreError::invalid("limit", "must be positive"));
    }
    Ok(())
}

pub(crate) fn push_page(query: &mut QueryBuilder<'_, Sqlite>, offset: i64, limit: i64) {
    query.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
}

pub(crate) fn push_in_list(query: &mut QueryBuilder<'_, Sqlite>, values: &[String]) {
    query.push("(");
    let mut list = query.separated(", ");
    for value in values {
        list.push_bind(value.clone());
    }
    list.push_unseparated(")");
}

/// `u` holds the exact `role` token.
pub(crate) fn push_role(query: &mut QueryBuilder<'_, Sqlite>, role: &str) {
    query
        .push(r" AND (' ' || u.roles || ' ') LIKE ")
        .push_bind(format!("% {} %", escape_like(role)))
        .push(r" ESCAPE '\'");
}

pub(crate) fn push_team_member(query: &mut QueryBuilder<'_, Sqlite>, team_id: &str) {
    query
        .push(" AND u.id IN (SELECT tm.user_id FROM team_members tm WHERE tm.delete_at = 0 AND tm.team_id = ")
        .push_bind(team_id.to_owned())
        .push(")");
}

pub(crate) fn push_not_team_member(query: &mut QueryBuilder<'_, Sqlite>, team_id: &str) {
    query
        .push(" AND u.id NOT IN (SELECT tm.user_id FROM team_members tm WHERE tm.delete_at = 0 AND tm.team_id = ")
        .push_bind(team_id.to_owned())
        .push(")");
}

pub(crate) fn push_without_team(query: &mut QueryBuilder<'_, Sqlite>) {
    query.push(" AND u.id NOT IN (SELECT tm.user_id FROM team_members tm WHERE tm.delete_at = 0)");
}

pub(crate) fn push_channel_member(query: &mut QueryBuilder<'_, Sqlite>, channel_id: &str) {
    query
        .push(" AND u.id IN (SELECT cm.user_id FROM channel_members cm WHERE cm.channel_id = ")
        .push_bind(channel_id.to_owned())
        .push(")");
}

pub(crate) fn push_not_channel_member(query: &mut QueryBuilder<'_, Sqlite>, channel_id: &str) {
    query
        .push(" AND u.id NOT IN (SELECT cm.user_id FROM channel_members cm WHERE cm.channel_id = ")
        .push_bind(channel_id.to_owned())
        .push(")");
}

/// `u` belongs to a live group synced to the team or channel.
pub(crate) fn push_group_member_of(
    query: &mut QueryBuilder<'_, Sqlite>,
    syncable_id: &str,
    syncable_type: &'static str,
) {
    query
        .push(
            " AND u.id IN (SELECT gm.user_id FROM group_members gm \
             JOIN user_groups g ON g.id = gm.group_id \
             JOIN group_syncables gs ON gs.group_id = gm.group_id \
             WHERE gm.delete_at = 0 AND g.delete_at = 0 AND gs.delete_at = 0 \
             AND gs.syncable_type = ",
        )
        .push_bind(syncable_type)
        .push(" AND gs.syncable_id = ")
        .push_bind(syncable_id.to_owned())
        .push(")");
}

pub(crate) fn push_bots(query: &mut QueryBuilder<'_, Sqlite>, bots: BotFilter) {
    match bots {
        BotFilter::Include => {},
        BotFilter::Exclude => {
            query.push(" AND u.id NOT IN (SELECT b.user_id FROM bots b)");
        },
        BotFilter::Only => {
            query.push(" AND u.id IN (SELECT b.user_id FROM bots b)");
        },
    }
}

/// Users visible through the listed teams or channels. Nothing when both
/// lists are empty.
pub(crate) fn push_view_restrictions(
    query: &mut QueryBuilder<'_, Sqlite>,
    restrictions: Option<&ViewRestrictions>,
) {
    let Some(restrictions) = restrictions else {
        return;
    };

    if restrictions.is_empty() {
        query.push(" AND 0 = 1");
        return;
    }

    query.push(" AND (");
    if !restrictions.teams.is_empty() {
        query.push("u.id IN (SELECT tm.user_id FROM team_members tm WHERE tm.delete_at = 0 AND tm.team_id IN ");
        push_in_list(query, &restrictions.teams);
        query.push(")");
    }
    if !restrictions.teams.is_empty() && !restrictions.channels.is_empty() {
        query.push(" OR ");
    }
    if !restrictions.channels.is_empty() {
        query.push("u.id IN (SELECT cm.user_id FROM channel_members cm WHERE cm.channel_id IN ");
        push_in_list(query, &restrictions.channels);
        query.push(")");
    }
    query.push(")");
}
