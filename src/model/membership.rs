//! Records owned by the stores the user directory composes with.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

use crate::error::{Result, StoreError};

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_AWAY: &str = "away";
pub const STATUS_DND: &str = "dnd";
pub const STATUS_OFFLINE: &str = "offline";

/// Team.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub team_type: String,
    pub group_constrained: bool,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
}

/// Membership of a user in a team.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    pub team_id: String,
    pub user_id: String,
    pub roles: String,
    pub scheme_guest: bool,
    pub scheme_user: bool,
    pub scheme_admin: bool,
    /// Non-zero once the user left the team.
    pub delete_at: i64,
}

impl TeamMember {
    /// Regular member.
    pub fn new(team_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            user_id: user_id.into(),
            roles: String::new(),
            scheme_guest: false,
            scheme_user: true,
            scheme_admin: false,
            delete_at: 0,
        }
    }

    /// Guest member.
    pub fn guest(team_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            scheme_guest: true,
            scheme_user: false,
            ..Self::new(team_id, user_id)
        }
    }
}

/// Kind of channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    Open,
    Private,
    Direct,
    Group,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Open => "O",
            ChannelType::Private => "P",
            ChannelType::Direct => "D",
            ChannelType::Group => "G",
        }
    }
}

impl std::str::FromStr for ChannelType {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "O" => Ok(ChannelType::Open),
            "P" => Ok(ChannelType::Private),
            "D" => Ok(ChannelType::Direct),
            "G" => Ok(ChannelType::Group),
            other => Err(StoreError::invalid(
                "channel_type",
                format!("unknown channel type `{other}`"),
            )),
        }
    }
}

/// Channel, optionally attached to a team.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub team_id: String,
    pub name: String,
    pub display_name: String,
    pub channel_type: ChannelType,
    pub group_constrained: bool,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
}

impl<'r> FromRow<'r, SqliteRow> for Channel {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let channel_type: String = row.try_get("channel_type")?;

        Ok(Channel {
            id: row.try_get("id")?,
            team_id: row.try_get("team_id")?,
            name: row.try_get("name")?,
            display_name: row.try_get("display_name")?,
            channel_type: channel_type
                .parse()
                .map_err(|err: StoreError| sqlx::Error::Decode(Box::new(err)))?,
            group_constrained: row.try_get("group_constrained")?,
            create_at: row.try_get("create_at")?,
            update_at: row.try_get("update_at")?,
            delete_at: row.try_get("delete_at")?,
        })
    }
}

/// Membership of a user in a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ChannelMember {
    pub channel_id: String,
    pub user_id: String,
    pub roles: String,
    pub scheme_guest: bool,
    pub scheme_user: bool,
    pub scheme_admin: bool,
    pub last_viewed_at: i64,
}

impl ChannelMember {
    /// Regular member.
    pub fn new(channel_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            roles: String::new(),
            scheme_guest: false,
            scheme_user: true,
            scheme_admin: false,
            last_viewed_at: 0,
        }
    }

    /// Guest member.
    pub fn guest(channel_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            scheme_guest: true,
            scheme_user: false,
            ..Self::new(channel_id, user_id)
        }
    }
}

/// Bot account attached to a user record of the same id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Bot {
    pub user_id: String,
    pub username: String,
    pub display_name: String,
    pub description: String,
    pub owner_id: String,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
}

/// Group synchronised from an external directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Group {
    pub id: String,
    pub name: Option<String>,
    pub display_name: String,
    pub source: String,
    pub remote_id: String,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
}

/// Membership of a user in a group.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct GroupMember {
    pub group_id: String,
    pub user_id: String,
    pub create_at: i64,
    pub delete_at: i64,
}

/// What a group is synced to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncableType {
    Team,
    Channel,
}

impl SyncableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncableType::Team => "Team",
            SyncableType::Channel => "Channel",
        }
    }
}

/// Link between a group and a team or a channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupSyncable {
    pub group_id: String,
    pub syncable_id: String,
    pub syncable_type: SyncableType,
    pub auto_add: bool,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
}

impl GroupSyncable {
    pub fn team(group_id: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self::new(group_id, team_id, SyncableType::Team)
    }

    pub fn channel(group_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self::new(group_id, channel_id, SyncableType::Channel)
    }

    fn new(
        group_id: impl Into<String>,
        syncable_id: impl Into<String>,
        syncable_type: SyncableType,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            syncable_id: syncable_id.into(),
            syncable_type,
            auto_add: true,
            create_at: 0,
            update_at: 0,
            delete_at: 0,
        }
    }
}

/// Presence of a user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Status {
    pub user_id: String,
    pub status: String,
    pub manual: bool,
    pub last_activity_at: i64,
}

impl Status {
    pub fn new(
        user_id: impl Into<String>,
        status: impl Into<String>,
        last_activity_at: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            status: status.into(),
            manual: false,
            last_activity_at,
        }
    }
}
