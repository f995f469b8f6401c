//! Typed builder for User.

use std::collections::HashMap;

use crate::model::{RoleSet, User};

/// [`User`] builder. A record cannot be built without an email.
#[derive(Debug, Clone)]
pub struct UserBuilder<Email> {
    email: Email,
    username: String,
    password: String,
    nickname: String,
    first_name: String,
    last_name: String,
    roles: RoleSet,
    auth_service: String,
    auth_data: Option<String>,
    props: HashMap<String, String>,
    create_at: i64,
    delete_at: i64,
}

/// Value is missing on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`UserBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

impl UserBuilder<Missing> {
    /// Create a new [`UserBuilder`].
    pub fn new() -> Self {
        Self {
            email: Missing,
            username: String::default(),
            password: String::default(),
            nickname: String::default(),
            first_name: String::default(),
            last_name: String::default(),
            roles: RoleSet::default(),
            auth_service: String::default(),
            auth_data: None,
            props: HashMap::new(),
            create_at: 0,
            delete_at: 0,
        }
    }

    /// Update `email` field on [`UserBuilder`].
    pub fn email(self, email: impl Into<String>) -> UserBuilder<Present<String>> {
        UserBuilder {
            email: Present(email.into()),
            username: self.username,
            password: self.password,
            nickname: self.nickname,
            first_name: self.first_name,
            last_name: self.last_name,
            roles: self.roles,
            auth_service: self.auth_service,
            auth_data: self.auth_data,
            props: self.props,
            create_at: self.create_at,
            delete_at: self.delete_at,
        }
    }
}

impl Default for UserBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Email> UserBuilder<Email> {
    /// Update `username` field on [`UserBuilder`].
    pub fn username(mut self, username: impl ToString) -> Self {
        self.username = username.to_string();
        self
    }

    /// Update `password` field on [`UserBuilder`]. Expects a hash.
    pub fn password(mut self, password: impl ToString) -> Self {
        self.password = password.to_string();
        self
    }

    /// Update `nickname` field on [`UserBuilder`].
    pub fn nickname(mut self, nickname: impl ToString) -> Self {
        self.nickname = nickname.to_string();
        self
    }

    /// Update `first_name` and `last_name` fields on [`UserBuilder`].
    pub fn full_name(mut self, first_name: impl ToString, last_name: impl ToString) -> Self {
        self.first_name = first_name.to_string();
        self.last_name = last_name.to_string();
        self
    }

    /// Update `roles` field on [`UserBuilder`].
    pub fn roles(mut self, roles: &str) -> Self {
        self.roles = RoleSet::parse(roles);
        self
    }

    /// Authenticate through an external provider.
    pub fn auth(mut self, service: impl ToString, data: Option<String>) -> Self {
        self.auth_service = service.to_string();
        self.auth_data = data;
        self
    }

    /// Add a `props` entry on [`UserBuilder`].
    pub fn prop(mut self, key: impl ToString, value: impl ToString) -> Self {
        self.props.insert(key.to_string(), value.to_string());
        self
    }

    /// Update `create_at` field on [`UserBuilder`].
    pub fn create_at(mut self, create_at: i64) -> Self {
        self.create_at = create_at;
        self
    }

    /// Update `delete_at` field on [`UserBuilder`].
    pub fn delete_at(mut self, delete_at: i64) -> Self {
        self.delete_at = delete_at;
        self
    }
}

impl UserBuilder<Present<String>> {
    /// Build a [`User`] ready for [`crate::user::UserStore::save`].
    pub fn build(self) -> User {
        User {
            email: self.email.0,
            username: self.username,
            password: self.password,
            nickname: self.nickname,
            first_name: self.first_name,
            last_name: self.last_name,
            roles: self.roles,
            auth_service: self.auth_service,
            auth_data: self.auth_data,
            props: self.props,
            create_at: self.create_at,
            delete_at: self.delete_at,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build() {
        let user = UserBuilder::new()
            .username("jimbo1")
            .email("jimbo1@example.com")
            .full_name("Jim", "Bill")
            .roles("system_user system_admin")
            .prop("theme", "dark")
            .build();

        assert!(user.id.is_empty());
        assert_eq!(user.username, "jimbo1");
        assert_eq!(user.email, "jimbo1@example.com");
        assert_eq!(user.first_name, "Jim");
        assert!(user.is_system_admin());
        assert_eq!(user.props.get("theme").map(String::as_str), Some("dark"));
    }
}
