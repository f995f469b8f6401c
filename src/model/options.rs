//! Filters accepted by listings, searches and counts.

use serde::{Deserialize, Serialize};

/// Default page size of [`UserGetOptions`].
pub const DEFAULT_PER_PAGE: u32 = 60;
/// Default cap on search results.
pub const USER_SEARCH_DEFAULT_LIMIT: usize = 100;

/// Teams and channels a caller is allowed to see users through.
///
/// Both lists empty means the caller can see nobody.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRestrictions {
    pub teams: Vec<String>,
    pub channels: Vec<String>,
}

impl ViewRestrictions {
    pub fn teams(teams: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            teams: teams.into_iter().map(Into::into).collect(),
            channels: Vec::new(),
        }
    }

    pub fn channels(channels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            teams: Vec::new(),
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.teams.is_empty() && self.channels.is_empty()
    }
}

/// How bot accounts take part in a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotFilter {
    #[default]
    Include,
    Exclude,
    Only,
}

/// Paginated listing filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGetOptions {
    pub in_team_id: Option<String>,
    pub not_in_team_id: Option<String>,
    pub in_channel_id: Option<String>,
    pub not_in_channel_id: Option<String>,
    /// Only members of a group synced to the team or channel in scope.
    pub group_constrained: bool,
    pub without_team: bool,
    /// Only deactivated users.
    pub inactive: bool,
    pub role: Option<String>,
    pub bots: BotFilter,
    pub view_restrictions: Option<ViewRestrictions>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for UserGetOptions {
    fn default() -> Self {
        Self {
            in_team_id: None,
            not_in_team_id: None,
            in_channel_id: None,
            not_in_channel_id: None,
            group_constrained: false,
            without_team: false,
            inactive: false,
            role: None,
            bots: BotFilter::Include,
            view_restrictions: None,
            page: 0,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl UserGetOptions {
    /// Update `page` and `per_page` fields.
    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    /// Update `in_team_id` field.
    pub fn in_team(mut self, team_id: impl Into<String>) -> Self {
        self.in_team_id = Some(team_id.into());
        self
    }

    /// Update `not_in_team_id` field.
    pub fn not_in_team(mut self, team_id: impl Into<String>) -> Self {
        self.not_in_team_id = Some(team_id.into());
        self
    }

    /// Update `in_channel_id` field.
    pub fn in_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.in_channel_id = Some(channel_id.into());
        self
    }

    /// Update `not_in_channel_id` field.
    pub fn not_in_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.not_in_channel_id = Some(channel_id.into());
        self
    }

    /// Update `role` field.
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Only return deactivated users.
    pub fn inactive(mut self) -> Self {
        self.inactive = true;
        self
    }

    /// Only return users without any team.
    pub fn without_team(mut self) -> Self {
        self.without_team = true;
        self
    }

    /// Restrict to members of groups synced to the scope.
    pub fn group_constrained(mut self) -> Self {
        self.group_constrained = true;
        self
    }

    /// Update `bots` field.
    pub fn bots(mut self, bots: BotFilter) -> Self {
        self.bots = bots;
        self
    }

    /// Update `view_restrictions` field.
    pub fn view_restrictions(mut self, restrictions: ViewRestrictions) -> Self {
        self.view_restrictions = Some(restrictions);
        self
    }
}

/// Filters for [`crate::user::UserStore::count`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCountOptions {
    pub include_bot_accounts: bool,
    pub include_deleted: bool,
    /// Only count bots.
    pub exclude_regular_users: bool,
    pub team_id: Option<String>,
    pub view_restrictions: Option<ViewRestrictions>,
}

/// Search filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSearchOptions {
    /// Also match first name, last name and nickname.
    pub allow_full_names: bool,
    /// Also match email.
    pub allow_emails: bool,
    /// Deactivated users are eligible.
    pub allow_inactive: bool,
    pub role: Option<String>,
    pub group_constrained: bool,
    pub view_restrictions: Option<ViewRestrictions>,
    /// Zero falls back to the configured default.
    pub limit: usize,
}

impl Default for UserSearchOptions {
    fn default() -> Self {
        Self {
            allow_full_names: true,
            allow_emails: false,
            allow_inactive: false,
            role: None,
            group_constrained: false,
            view_restrictions: None,
            limit: USER_SEARCH_DEFAULT_LIMIT,
        }
    }
}

/// Options of [`crate::user::UserStore::get_profile_by_ids`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserGetByIdsOptions {
    /// Only return users updated strictly after this timestamp.
    pub since: i64,
}
