//! Paginated profile listings.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite};

use crate::error::{Result, StoreError};
use crate::model::{
    STATUS_AWAY, STATUS_DND, STATUS_ONLINE, SYSTEM_ADMIN_ROLE_ID, SyncableType, User,
    UserForIndexing, UserGetByIdsOptions, UserGetOptions, ViewRestrictions,
};
use crate::user::{
    USER_COLUMNS, UserStore, check_limit, page_window, push_bots, push_channel_member,
    push_group_member_of, push_in_list, push_not_channel_member, push_not_team_member, push_page,
    push_role, push_team_member, push_view_restrictions, push_without_team, select_users,
};

impl UserStore {
    /// Profiles matching `options`, in username order.
    pub async fn get_all_profiles(&self, options: &UserGetOptions) -> Result<Vec<User>> {
        let (offset, limit) = page_window(options.page, options.per_page)?;

        let mut query = select_users();
        push_get_options(&mut query, options);
        query.push(" ORDER BY u.username ASC");
        push_page(&mut query, offset, limit);

        self.profiles(self.fetch(query).await?).await
    }

    /// Profiles of the active members of `options.in_team_id`.
    pub async fn get_profiles(&self, options: &UserGetOptions) -> Result<Vec<User>> {
        if options.in_team_id.as_deref().is_none_or(str::is_empty) {
            return Err(StoreError::invalid("in_team_id", "team scope required"));
        }
        self.get_all_profiles(options).await
    }

    /// Profiles of users without any active team membership.
    pub async fn get_profiles_without_team(&self, options: &UserGetOptions) -> Result<Vec<User>> {
        let options = UserGetOptions {
            without_team: true,
            ..options.clone()
        };
        self.get_all_profiles(&options).await
    }

    pub async fn get_profiles_in_channel(
        &self,
        channel_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<User>> {
        check_limit(limit)?;

        let mut query = select_users();
        push_channel_member(&mut query, channel_id);
        query.push(" ORDER BY u.username ASC");
        push_page(&mut query, i64::from(offset), i64::from(limit));

        self.profiles(self.fetch(query).await?).await
    }

    /// Channel members, online first, then away, then do not disturb.
    pub async fn get_profiles_in_channel_by_status(
        &self,
        channel_id: &str,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<User>> {
        check_limit(limit)?;

        let mut query = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM users u LEFT JOIN status s ON s.user_id = u.id WHERE 1 = 1"
        ));
        push_channel_member(&mut query, channel_id);
        query
            .push(" ORDER BY CASE s.status WHEN ")
            .push_bind(STATUS_ONLINE)
            .push(" THEN 1 WHEN ")
            .push_bind(STATUS_AWAY)
            .push(" THEN 2 WHEN ")
            .push_bind(STATUS_DND)
            .push(" THEN 3 ELSE 4 END, u.username ASC");
        push_page(&mut query, i64::from(offset), i64::from(limit));

        self.profiles(self.fetch(query).await?).await
    }

    /// Every member of `channel_id`, keyed by user id.
    pub async fn get_all_profiles_in_channel(
        &self,
        channel_id: &str,
        allow_from_cache: bool,
    ) -> Result<HashMap<String, User>> {
        if allow_from_cache {
            if let Some(profiles) = self.cache.channel_profiles(channel_id) {
                tracing::debug!(%channel_id, "channel profiles served from cache");
                return Ok(profiles.as_ref().clone());
            }
        }

        let seen = self.cache.generation();
        let mut query = select_users();
        push_channel_member(&mut query, channel_id);

        let profiles: HashMap<String, User> = self
            .profiles(self.fetch(query).await?)
            .await?
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect();

        self.cache
            .insert_channel_profiles(channel_id, Arc::new(profiles.clone()), seen);

        Ok(profiles)
    }

    /// Active members of `team_id` without a membership in `channel_id`.
    pub async fn get_profiles_not_in_channel(
        &self,
        team_id: &str,
        channel_id: &str,
        group_constrained: bool,
        offset: u32,
        limit: u32,
        view_restrictions: Option<&ViewRestrictions>,
    ) -> Result<Vec<User>> {
        check_limit(limit)?;

        let mut query = select_users();
        push_team_member(&mut query, team_id);
        push_not_channel_member(&mut query, channel_id);
        if group_constrained {
            push_group_member_of(&mut query, channel_id, SyncableType::Channel.as_str());
        }
        push_view_restrictions(&mut query, view_restrictions);
        query.push(" ORDER BY u.username ASC");
        push_page(&mut query, i64::from(offset), i64::from(limit));

        self.profiles(self.fetch(query).await?).await
    }

    /// Users without an active membership in `team_id`.
    pub async fn get_profiles_not_in_team(
        &self,
        team_id: &str,
        group_constrained: bool,
        offset: u32,
        limit: u32,
        view_restrictions: Option<&ViewRestrictions>,
    ) -> Result<Vec<User>> {
        check_limit(limit)?;

        let mut query = select_users();
        push_not_team_member(&mut query, team_id);
        if group_constrained {
            push_group_member_of(&mut query, team_id, SyncableType::Team.as_str());
        }
        push_view_restrictions(&mut query, view_restrictions);
        query.push(" ORDER BY u.username ASC");
        push_page(&mut query, i64::from(offset), i64::from(limit));

        self.profiles(self.fetch(query).await?).await
    }

    /// Profiles of `user_ids` updated after `options.since`.
    ///
    /// Cached profiles are filtered on the same watermark; only ids missing
    /// from the cache hit storage.
    pub async fn get_profile_by_ids(
        &self,
        user_ids: &[String],
        options: UserGetByIdsOptions,
        allow_from_cache: bool,
    ) -> Result<Vec<User>> {
        let mut users = Vec::with_capacity(user_ids.len());
        let mut remaining = Vec::new();

        for user_id in user_ids {
            let cached = if allow_from_cache {
                self.cache.profile(user_id)
            } else {
                None
            };

            match cached {
                Some(profile) if profile.update_at > options.since => users.push(profile),
                Some(_) => {},
                None => remaining.push(user_id.clone()),
            }
        }

        if !remaining.is_empty() {
            let seen = self.cache.generation();
            let mut query = select_users();
            query.push(" AND u.id IN ");
            push_in_list(&mut query, &remaining);
            if options.since > 0 {
                query.push(" AND u.update_at > ").push_bind(options.since);
            }

            for profile in self.profiles(self.fetch(query).await?).await? {
                self.cache.insert_profile(profile.clone(), seen);
                users.push(profile);
            }
        }

        users.sort_by(|a, b| a.username.cmp(&b.username));
        users.dedup_by(|a, b| a.id == b.id);

        Ok(users)
    }

    pub async fn get_profiles_by_usernames(
        &self,
        usernames: &[String],
        view_restrictions: Option<&ViewRestrictions>,
    ) -> Result<Vec<User>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let usernames: Vec<String> = usernames
            .iter()
            .map(|username| username.trim().to_lowercase())
            .collect();

        let mut query = select_users();
        query.push(" AND u.username IN ");
        push_in_list(&mut query, &usernames);
        push_view_restrictions(&mut query, view_restrictions);
        query.push(" ORDER BY u.username ASC");

        self.profiles(self.fetch(query).await?).await
    }

    /// System administrators, keyed by user id.
    pub async fn get_system_admin_profiles(&self) -> Result<HashMap<String, User>> {
        let mut query = select_users();
        push_role(&mut query, SYSTEM_ADMIN_ROLE_ID);

        Ok(self
            .profiles(self.fetch(query).await?)
            .await?
            .into_iter()
            .map(|profile| (profile.id.clone(), profile))
            .collect())
    }

    /// Team members by most recent activity.
    pub async fn get_recently_active_users_for_team(
        &self,
        team_id: &str,
        offset: u32,
        limit: u32,
        view_restrictions: Option<&ViewRestrictions>,
    ) -> Result<Vec<User>> {
        check_limit(limit)?;

        let mut query = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN status s ON s.user_id = u.id WHERE 1 = 1"
        ));
        push_team_member(&mut query, team_id);
        push_view_restrictions(&mut query, view_restrictions);
        query.push(" ORDER BY s.last_activity_at DESC, u.username ASC, u.id ASC");
        push_page(&mut query, i64::from(offset), i64::from(limit));

        self.profiles(self.fetch(query).await?).await
    }

    /// Team members, newest accounts first.
    pub async fn get_new_users_for_team(
        &self,
        team_id: &str,
        offset: u32,
        limit: u32,
        view_restrictions: Option<&ViewRestrictions>,
    ) -> Result<Vec<User>> {
        check_limit(limit)?;

        let mut query = select_users();
        push_team_member(&mut query, team_id);
        push_view_restrictions(&mut query, view_restrictions);
        query.push(" ORDER BY u.create_at DESC, u.username ASC, u.id ASC");
        push_page(&mut query, i64::from(offset), i64::from(limit));

        self.profiles(self.fetch(query).await?).await
    }

    /// Members of groups synced to `team_id`, whatever their team membership.
    pub async fn get_team_group_users(&self, team_id: &str) -> Result<Vec<User>> {
        let mut query = select_users();
        push_group_member_of(&mut query, team_id, SyncableType::Team.as_str());
        query.push(" ORDER BY u.username ASC");

        self.profiles(self.fetch(query).await?).await
    }

    /// Members of groups synced to `channel_id`, whatever their channel
    /// membership.
    pub async fn get_channel_group_users(&self, channel_id: &str) -> Result<Vec<User>> {
        let mut query = select_users();
        push_group_member_of(&mut query, channel_id, SyncableType::Channel.as_str());
        query.push(" ORDER BY u.username ASC");

        self.profiles(self.fetch(query).await?).await
    }

    /// Other members of each channel `user_id` belongs to.
    pub async fn get_profile_by_group_channel_ids_for_user(
        &self,
        user_id: &str,
        channel_ids: &[String],
    ) -> Result<HashMap<String, Vec<User>>> {
        if channel_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::new(format!(
            "SELECT {USER_COLUMNS}, cm.channel_id AS member_channel_id \
             FROM users u JOIN channel_members cm ON cm.user_id = u.id \
             WHERE cm.channel_id IN "
        ));
        push_in_list(&mut query, channel_ids);
        query
            .push(" AND u.id != ")
            .push_bind(user_id.to_owned())
            .push(" AND cm.channel_id IN (SELECT own.channel_id FROM channel_members own WHERE own.user_id = ")
            .push_bind(user_id.to_owned())
            .push(") ORDER BY u.username ASC");

        let rows: Vec<SqliteRow> = query.build().fetch_all(&self.pool).await?;

        let mut channels = Vec::with_capacity(rows.len());
        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            channels.push(row.try_get::<String, _>("member_channel_id")?);
            users.push(User::from_row(row)?);
        }

        let mut profiles: HashMap<String, Vec<User>> = HashMap::new();
        for (channel_id, profile) in channels.into_iter().zip(self.profiles(users).await?) {
            profiles.entry(channel_id).or_default().push(profile);
        }

        Ok(profiles)
    }

    /// Users created in `[start_time, end_time)` with their live team
    /// memberships and public channel memberships.
    pub async fn get_users_batch_for_indexing(
        &self,
        start_time: i64,
        end_time: i64,
        limit: u32,
    ) -> Result<Vec<UserForIndexing>> {
        check_limit(limit)?;

        let mut query = select_users();
        query
            .push(" AND u.create_at >= ")
            .push_bind(start_time)
            .push(" AND u.create_at < ")
            .push_bind(end_time)
            .push(" ORDER BY u.create_at ASC, u.id ASC LIMIT ")
            .push_bind(i64::from(limit));
        let users = self.fetch(query).await?;

        if users.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = users.iter().map(|u| u.id.clone()).collect();

        let mut teams = QueryBuilder::new(
            "SELECT tm.user_id, tm.team_id FROM team_members tm WHERE tm.delete_at = 0 AND tm.user_id IN ",
        );
        push_in_list(&mut teams, &ids);
        teams.push(" ORDER BY tm.team_id");
        let teams = memberships(teams, &self.pool).await?;

        let mut channels = QueryBuilder::new(
            "SELECT cm.user_id, cm.channel_id FROM channel_members cm \
             JOIN channels c ON c.id = cm.channel_id \
             WHERE c.channel_type = 'O' AND cm.user_id IN ",
        );
        push_in_list(&mut channels, &ids);
        channels.push(" ORDER BY cm.channel_id");
        let channels = memberships(channels, &self.pool).await?;

        Ok(users
            .into_iter()
            .map(|user| UserForIndexing {
                team_ids: teams.get(&user.id).cloned().unwrap_or_default(),
                channel_ids: channels.get(&user.id).cloned().unwrap_or_default(),
                roles: user.roles.to_string(),
                id: user.id,
                username: user.username,
                nickname: user.nickname,
                first_name: user.first_name,
                last_name: user.last_name,
                create_at: user.create_at,
                delete_at: user.delete_at,
            })
            .collect())
    }
}

/// Apply every [`UserGetOptions`] filter.
fn push_get_options(query: &mut QueryBuilder<'_, Sqlite>, options: &UserGetOptions) {
    if let Some(team_id) = options.in_team_id.as_deref() {
        push_team_member(query, team_id);
        if options.group_constrained {
            push_group_member_of(query, team_id, SyncableType::Team.as_str());
        }
    }
    if let Some(team_id) = options.not_in_team_id.as_deref() {
        push_not_team_member(query, team_id);
        if options.group_constrained {
            push_group_member_of(query, team_id, SyncableType::Team.as_str());
        }
    }
    if let Some(channel_id) = options.in_channel_id.as_deref() {
        push_channel_member(query, channel_id);
    }
    if let Some(channel_id) = options.not_in_channel_id.as_deref() {
        push_not_channel_member(query, channel_id);
        if options.group_constrained {
            push_group_member_of(query, channel_id, SyncableType::Channel.as_str());
        }
    }
    if options.without_team {
        push_without_team(query);
    }
    if options.inactive {
        query.push(" AND u.delete_at != 0");
    }
    if let Some(role) = options.role.as_deref().filter(|role| !role.is_empty()) {
        push_role(query, role);
    }
    push_bots(query, options.bots);
    push_view_restrictions(query, options.view_restrictions.as_ref());
}

/// `(user_id, other_id)` rows grouped by user.
async fn memberships(
    mut query: QueryBuilder<'_, Sqlite>,
    pool: &sqlx::SqlitePool,
) -> Result<HashMap<String, Vec<String>>> {
    let rows: Vec<(String, String)> = query.build_query_as().fetch_all(pool).await?;

    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    for (user_id, other_id) in rows {
        grouped.entry(user_id).or_default().push(other_id);
    }
    Ok(grouped)
}
