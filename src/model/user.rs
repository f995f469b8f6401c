use std::collections::HashMap;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use validator::Validate;

use crate::error::{Result, StoreError};
use crate::id::new_id;
use crate::model::RoleSet;

static USERNAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9.\-_]+$").ok());

/// User as saved on database.
///
/// `is_bot` and `bot_description` are never stored; they are filled from
/// the bots table after every read.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct User {
    pub id: String,
    pub create_at: i64,
    pub update_at: i64,
    pub delete_at: i64,
    #[validate(length(min = 1, max = 64))]
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub auth_data: Option<String>,
    pub auth_service: String,
    #[validate(email, length(max = 128))]
    pub email: String,
    #[validate(length(max = 64))]
    pub nickname: String,
    #[validate(length(max = 64))]
    pub first_name: String,
    #[validate(length(max = 64))]
    pub last_name: String,
    pub roles: RoleSet,
    pub props: HashMap<String, String>,
    pub last_password_update: i64,
    pub last_picture_update: i64,
    pub failed_attempts: i32,
    pub mfa_active: bool,
    #[serde(skip_serializing)]
    pub mfa_secret: String,
    pub is_bot: bool,
    pub bot_description: String,
}

/// Previous and new state of an updated [`User`].
#[derive(Clone, Debug, PartialEq)]
pub struct UserUpdate {
    pub old: User,
    pub new: User,
}

/// Flattened user with its memberships, used to feed a search index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct UserForIndexing {
    pub id: String,
    pub username: String,
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: String,
    pub create_at: i64,
    pub delete_at: i64,
    pub team_ids: Vec<String>,
    pub channel_ids: Vec<String>,
}

impl User {
    /// Profile safe to hand out in bulk listings.
    pub fn sanitize(&self) -> User {
        User {
            auth_data: Some(String::new()),
            props: HashMap::new(),
            ..self.clone()
        }
    }

    /// Drop the secrets carried by a full record.
    pub fn scrub_credentials(&mut self) {
        self.password.clear();
        self.mfa_secret.clear();
    }

    pub fn is_active(&self) -> bool {
        self.delete_at == 0
    }

    /// Account authenticated by an external provider.
    pub fn is_external(&self) -> bool {
        !self.auth_service.is_empty()
    }

    pub fn is_guest(&self) -> bool {
        self.roles.is_guest()
    }

    pub fn is_system_admin(&self) -> bool {
        self.roles.is_system_admin()
    }

    /// Normalize a record before its first write.
    pub(crate) fn pre_save(&mut self, now: i64) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        if self.username.trim().is_empty() {
            self.username = new_id();
        }
        self.normalize();

        if self.create_at == 0 {
            self.create_at = now;
        }
        self.update_at = now.max(self.create_at);
        self.last_password_update = self.create_at;
        self.mfa_active = false;
    }

    /// Normalize a record before it replaces the stored one.
    pub(crate) fn pre_update(&mut self) {
        self.normalize();
    }

    fn normalize(&mut self) {
        self.username = self.username.trim().to_lowercase();
        self.email = self.email.trim().to_lowercase();
        if self.auth_data.as_deref().is_some_and(str::is_empty) {
            self.auth_data = None;
        }
    }

    /// Check the record can be written.
    pub(crate) fn is_valid(&self) -> Result<()> {
        self.validate()?;

        let valid_username = USERNAME
            .as_ref()
            .is_some_and(|re| re.is_match(&self.username));
        if !valid_username {
            return Err(StoreError::invalid(
                "username",
                format!("`{}` contains forbidden characters", self.username),
            ));
        }

        Ok(())
    }
}

impl<'r> FromRow<'r, SqliteRow> for User {
    fn from_row(row: &'r SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let props: String = row.try_get("props")?;
        let props = if props.is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(&props)
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
        };
        let roles: String = row.try_get("roles")?;

        Ok(User {
            id: row.try_get("id")?,
            create_at: row.try_get("create_at")?,
            update_at: row.try_get("update_at")?,
            delete_at: row.try_get("delete_at")?,
            username: row.try_get("username")?,
            password: row.try_get("password")?,
            auth_data: row.try_get("auth_data")?,
            auth_service: row.try_get("auth_service")?,
            email: row.try_get("email")?,
            nickname: row.try_get("nickname")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            roles: RoleSet::parse(&roles),
            props,
            last_password_update: row.try_get("last_password_update")?,
            last_picture_update: row.try_get("last_picture_update")?,
            failed_attempts: row.try_get("failed_attempts")?,
            mfa_active: row.try_get("mfa_active")?,
            mfa_secret: row.try_get("mfa_secret")?,
            is_bot: false,
            bot_description: String::new(),
        })
    }
}
