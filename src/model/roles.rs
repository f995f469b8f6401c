//! Space separated role tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const SYSTEM_GUEST_ROLE_ID: &str = "system_guest";
pub const SYSTEM_USER_ROLE_ID: &str = "system_user";
pub const SYSTEM_ADMIN_ROLE_ID: &str = "system_admin";
pub const SYSTEM_POST_ALL_ROLE_ID: &str = "system_post_all";
pub const SYSTEM_POST_ALL_PUBLIC_ROLE_ID: &str = "system_post_all_public";
pub const SYSTEM_USER_ACCESS_TOKEN_ROLE_ID: &str = "system_user_access_token";
pub const SYSTEM_USER_MANAGER_ROLE_ID: &str = "system_user_manager";
pub const SYSTEM_READ_ONLY_ADMIN_ROLE_ID: &str = "system_read_only_admin";
pub const SYSTEM_MANAGER_ROLE_ID: &str = "system_manager";

/// Built-in roles kept by [`RoleSet::retain_system_roles`].
pub const SYSTEM_ROLES: &[&str] = &[
    SYSTEM_GUEST_ROLE_ID,
    SYSTEM_USER_ROLE_ID,
    SYSTEM_ADMIN_ROLE_ID,
    SYSTEM_POST_ALL_ROLE_ID,
    SYSTEM_POST_ALL_PUBLIC_ROLE_ID,
    SYSTEM_USER_ACCESS_TOKEN_ROLE_ID,
    SYSTEM_USER_MANAGER_ROLE_ID,
    SYSTEM_READ_ONLY_ADMIN_ROLE_ID,
    SYSTEM_MANAGER_ROLE_ID,
];

/// Ordered set of role tokens.
///
/// Storage keeps the space separated form; everything else goes through
/// this type so tokens are never split or joined by hand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct RoleSet(Vec<String>);

impl RoleSet {
    /// Parse the stored representation.
    pub fn parse(raw: &str) -> Self {
        let mut set = Self::default();
        for token in raw.split_whitespace() {
            set.insert(token);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|token| token == role)
    }

    /// Append `role` unless already present.
    pub fn insert(&mut self, role: &str) -> bool {
        if role.is_empty() || self.contains(role) {
            return false;
        }
        self.0.push(role.to_owned());
        true
    }

    pub fn remove(&mut self, role: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|token| token != role);
        before != self.0.len()
    }

    /// Swap `from` for `to` keeping the token position.
    fn replace(&mut self, from: &str, to: &str) {
        if self.contains(to) {
            self.remove(from);
        } else if let Some(token) = self.0.iter_mut().find(|t| *t == from) {
            *token = to.to_owned();
        }
    }

    pub fn is_guest(&self) -> bool {
        self.contains(SYSTEM_GUEST_ROLE_ID)
    }

    pub fn is_system_admin(&self) -> bool {
        self.contains(SYSTEM_ADMIN_ROLE_ID)
    }

    /// Turn a guest into a regular user.
    pub fn promote(&mut self) {
        self.replace(SYSTEM_GUEST_ROLE_ID, SYSTEM_USER_ROLE_ID);
        self.insert(SYSTEM_USER_ROLE_ID);
    }

    /// Turn a user into a guest. Guests cannot hold the admin role.
    pub fn demote(&mut self) {
        self.replace(SYSTEM_USER_ROLE_ID, SYSTEM_GUEST_ROLE_ID);
        self.remove(SYSTEM_ADMIN_ROLE_ID);
        self.insert(SYSTEM_GUEST_ROLE_ID);
    }

    /// Drop every custom token.
    pub fn retain_system_roles(&mut self) {
        self.0.retain(|token| SYSTEM_ROLES.contains(&token.as_str()));
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" "))
    }
}

impl From<&str> for RoleSet {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for RoleSet {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<RoleSet> for String {
    fn from(roles: RoleSet) -> Self {
        roles.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dedup() {
        let roles = RoleSet::parse("  system_user  custom system_user ");
        assert_eq!(roles.to_string(), "system_user custom");
        assert!(RoleSet::parse("").is_empty());
    }

    #[test]
    fn test_promote() {
        let mut roles = RoleSet::parse("system_guest custom_role");
        roles.promote();
        assert_eq!(roles.to_string(), "system_user custom_role");

        let mut admin = RoleSet::parse("system_guest system_admin");
        admin.promote();
        assert_eq!(admin.to_string(), "system_user system_admin");

        admin.promote();
        assert_eq!(admin.to_string(), "system_user system_admin");
    }

    #[test]
    fn test_demote() {
        let mut roles = RoleSet::parse("system_user custom_role");
        roles.demote();
        assert_eq!(roles.to_string(), "system_guest custom_role");

        let mut admin = RoleSet::parse("system_user system_admin");
        admin.demote();
        assert_eq!(admin.to_string(), "system_guest");

        admin.demote();
        assert_eq!(admin.to_string(), "system_guest");
    }

    #[test]
    fn test_retain_system_roles() {
        let mut roles =
            RoleSet::parse("system_user custom_role system_admin another_custom_role");
        roles.retain_system_roles();
        assert_eq!(roles.to_string(), "system_user system_admin");

        let mut custom = RoleSet::parse("custom_only");
        custom.retain_system_roles();
        assert_eq!(custom.to_string(), "");
    }

    #[test]
    fn test_token_membership_is_exact() {
        let roles = RoleSet::parse("system_admin_like system_user");
        assert!(!roles.is_system_admin());
        assert!(roles.contains(SYSTEM_USER_ROLE_ID));
    }
}
