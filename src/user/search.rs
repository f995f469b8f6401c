//! Term based user search.
//!
//! A term is split into words; every word must prefix-match one of the
//! searchable fields. `*` separates words, a leading `@` is ignored and
//! `LIKE` metacharacters match literally.

use sqlx::{QueryBuilder, Sqlite};

use crate::error::Result;
use crate::model::{SyncableType, User, UserSearchOptions};
use crate::user::{
    UserStore, escape_like, push_channel_member, push_group_member_of, push_not_channel_member,
    push_not_team_member, push_role, push_team_member, push_view_restrictions, push_without_team,
    select_users,
};

/// Words of `term`, lowercase and `LIKE`-escaped. Empty for a browse-all
/// term.
pub fn normalize_search_term(term: &str) -> Vec<String> {
    term.replace('*', " ")
        .split_whitespace()
        .map(|word| word.trim_start_matches('@'))
        .filter(|word| !word.is_empty())
        .map(|word| escape_like(&word.to_lowercase()))
        .collect()
}

impl UserStore {
    /// Search users, within `team_id` members unless it is empty.
    pub async fn search(
        &self,
        team_id: &str,
        term: &str,
        options: &UserSearchOptions,
    ) -> Result<Vec<User>> {
        let mut query = select_users();
        if !team_id.is_empty() {
            push_team_member(&mut query, team_id);
        }
        self.run_search(query, term, options).await
    }

    /// Search members of `channel_id`.
    pub async fn search_in_channel(
        &self,
        channel_id: &str,
        term: &str,
        options: &UserSearchOptions,
    ) -> Result<Vec<User>> {
        let mut query = select_users();
        push_channel_member(&mut query, channel_id);
        self.run_search(query, term, options).await
    }

    /// Search members of `team_id` outside `channel_id`. An empty team
    /// searches every user outside the channel.
    pub async fn search_not_in_channel(
        &self,
        team_id: &str,
        channel_id: &str,
        term: &str,
        options: &UserSearchOptions,
    ) -> Result<Vec<User>> {
        let mut query = select_users();
        if !team_id.is_empty() {
            push_team_member(&mut query, team_id);
        }
        push_not_channel_member(&mut query, channel_id);
        if options.group_constrained {
            push_group_member_of(&mut query, channel_id, SyncableType::Channel.as_str());
        }
        self.run_search(query, term, options).await
    }

    /// Search users without an active membership in `team_id`.
    pub async fn search_not_in_team(
        &self,
        team_id: &str,
        term: &str,
        options: &UserSearchOptions,
    ) -> Result<Vec<User>> {
        let mut query = select_users();
        push_not_team_member(&mut query, team_id);
        if options.group_constrained {
            push_group_member_of(&mut query, team_id, SyncableType::Team.as_str());
        }
        self.run_search(query, term, options).await
    }

    /// Search users without any team.
    pub async fn search_without_team(
        &self,
        term: &str,
        options: &UserSearchOptions,
    ) -> Result<Vec<User>> {
        let mut query = select_users();
        push_without_team(&mut query);
        self.run_search(query, term, options).await
    }

    async fn run_search(
        &self,
        mut query: QueryBuilder<'_, Sqlite>,
        term: &str,
        options: &UserSearchOptions,
    ) -> Result<Vec<User>> {
        if !options.allow_inactive {
            query.push(" AND u.delete_at = 0");
        }
        if let Some(role) = options.role.as_deref().filter(|role| !role.is_empty()) {
            push_role(&mut query, role);
        }
        push_view_restrictions(&mut query, options.view_restrictions.as_ref());

        for word in normalize_search_term(term) {
            push_term(&mut query, &word, options);
        }

        let limit = if options.limit == 0 {
            self.search_limit
        } else {
            options.limit
        };
        query
            .push(" ORDER BY u.username ASC LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

        self.profiles(self.fetch(query).await?).await
    }
}

fn push_term(query: &mut QueryBuilder<'_, Sqlite>, word: &str, options: &UserSearchOptions) {
    let mut fields = vec!["u.username"];
    if options.allow_full_names {
        fields.extend(["u.first_name", "u.last_name", "u.nickname"]);
    }
    if options.allow_emails {
        fields.push("u.email");
    }

    let pattern = format!("{word}%");
    query.push(" AND (");
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            query.push(" OR ");
        }
        query
            .push(format!("LOWER({field}) LIKE "))
            .push_bind(pattern.clone())
            .push(r" ESCAPE '\'");
    }
    query.push(")");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Directory;
    use crate::model::{ChannelType, GroupSyncable};
    use crate::testing::{
        directory, join_channel, join_team, make_email, save_channel, save_group, save_team,
    };
    use crate::user::{Present, UserBuilder};

    struct Fixture {
        dir: Directory,
        jimbo1: User,
        jimbo2: User,
        hb: User,
        h_b: User,
        zeta: User,
    }

    async fn save(dir: &Directory, builder: UserBuilder<Present<String>>) -> User {
        dir.users.save(&builder.build()).await.unwrap()
    }

    async fn fixture() -> Fixture {
        let dir = directory().await;

        let jimbo1 = save(
            &dir,
            UserBuilder::new()
                .username("jimbo1")
                .email("jimsmith@example.com")
                .full_name("Tim", "Bill")
                .nickname("Rob")
                .roles("system_user system_admin"),
        )
        .await;
        let jimbo2 = save(
            &dir,
            UserBuilder::new()
                .username("jimbo2")
                .email(make_email())
                .roles("system_user")
                .delete_at(1),
        )
        .await;
        let hb = save(&dir, UserBuilder::new().username("hb").email(make_email())).await;
        let h_b = save(&dir, UserBuilder::new().username("h_b").email(make_email())).await;
        let zeta = save(
            &dir,
            UserBuilder::new()
                .username("zeta")
                .email(make_email())
                .nickname("h%nick"),
        )
        .await;

        Fixture {
            dir,
            jimbo1,
            jimbo2,
            hb,
            h_b,
            zeta,
        }
    }

    fn ids(users: &[User]) -> Vec<String> {
        users.iter().map(|user| user.id.clone()).collect()
    }

    #[test]
    fn test_normalize_search_term() {
        assert_eq!(normalize_search_term("jimb*"), vec!["jimb"]);
        assert_eq!(normalize_search_term("@Harold"), vec!["harold"]);
        assert_eq!(normalize_search_term("jim*bo  @ Smith"), vec!["jim", "bo", "smith"]);
        assert_eq!(normalize_search_term("h%"), vec![r"h\%"]);
        assert_eq!(normalize_search_term("h_"), vec![r"h\_"]);
        assert!(normalize_search_term("").is_empty());
        assert!(normalize_search_term("* ").is_empty());
    }

    #[tokio::test]
    async fn test_search_prefix() {
        let f = fixture().await;
        let options = UserSearchOptions::default();

        let users = f.dir.users.search("", "jimb*", &options).await.unwrap();
        assert_eq!(ids(&users), vec![f.jimbo1.id.clone()]);
        assert_eq!(users[0].auth_data.as_deref(), Some(""));

        let users = f.dir.users.search("", "@JIMBO1", &options).await.unwrap();
        assert_eq!(ids(&users), vec![f.jimbo1.id.clone()]);

        let inactive = UserSearchOptions {
            allow_inactive: true,
            ..Default::default()
        };
        let users = f.dir.users.search("", "jimb", &inactive).await.unwrap();
        assert_eq!(ids(&users), vec![f.jimbo1.id.clone(), f.jimbo2.id.clone()]);

        let everyone = f.dir.users.search("", "", &options).await.unwrap();
        assert_eq!(
            ids(&everyone),
            vec![f.h_b.id.clone(), f.hb.id.clone(), f.jimbo1.id.clone(), f.zeta.id.clone()]
        );
    }

    #[tokio::test]
    async fn test_search_literal_wildcards() {
        let f = fixture().await;
        let options = UserSearchOptions::default();

        let users = f.dir.users.search("", "h_", &options).await.unwrap();
        assert_eq!(ids(&users), vec![f.h_b.id.clone()]);

        let users = f.dir.users.search("", "h%", &options).await.unwrap();
        assert_eq!(ids(&users), vec![f.zeta.id.clone()]);

        let usernames_only = UserSearchOptions {
            allow_full_names: false,
            ..Default::default()
        };
        assert!(f.dir.users.search("", "h%", &usernames_only).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_fields() {
        let f = fixture().await;
        let options = UserSearchOptions::default();

        let users = f.dir.users.search("", "tim", &options).await.unwrap();
        assert_eq!(ids(&users), vec![f.jimbo1.id.clone()]);
        let users = f.dir.users.search("", "Tim Bill", &options).await.unwrap();
        assert_eq!(ids(&users), vec![f.jimbo1.id.clone()]);
        assert!(f.dir.users.search("", "tim nobody", &options).await.unwrap().is_empty());

        let usernames_only = UserSearchOptions {
            allow_full_names: false,
            ..Default::default()
        };
        assert!(f.dir.users.search("", "rob", &usernames_only).await.unwrap().is_empty());

        assert!(f.dir.users.search("", "jimsmith", &options).await.unwrap().is_empty());
        let emails = UserSearchOptions {
            allow_emails: true,
            ..Default::default()
        };
        let users = f.dir.users.search("", "jimsmith", &emails).await.unwrap();
        assert_eq!(ids(&users), vec![f.jimbo1.id.clone()]);
    }

    #[tokio::test]
    async fn test_search_role_and_limit() {
        let f = fixture().await;

        let admins = UserSearchOptions {
            role: Some("system_admin".into()),
            ..Default::default()
        };
        let users = f.dir.users.search("", "", &admins).await.unwrap();
        assert_eq!(ids(&users), vec![f.jimbo1.id.clone()]);

        let one = UserSearchOptions {
            limit: 1,
            ..Default::default()
        };
        let users = f.dir.users.search("", "", &one).await.unwrap();
        assert_eq!(ids(&users), vec![f.h_b.id.clone()]);

        let fallback = UserSearchOptions {
            limit: 0,
            ..Default::default()
        };
        assert_eq!(f.dir.users.search("", "", &fallback).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_search_memberships() {
        let f = fixture().await;
        let options = UserSearchOptions::default();
        let team = save_team(&f.dir).await;
        let channel = save_channel(&f.dir, &team.id, ChannelType::Open).await;

        join_team(&f.dir, &team.id, &f.jimbo1.id).await;
        join_team(&f.dir, &team.id, &f.hb.id).await;
        join_channel(&f.dir, &channel.id, &f.jimbo1.id).await;

        let users = f.dir.users.search(&team.id, "", &options).await.unwrap();
        assert_eq!(ids(&users), vec![f.hb.id.clone(), f.jimbo1.id.clone()]);

        let users = f.dir.users.search_in_channel(&channel.id, "ji", &options).await.unwrap();
        assert_eq!(ids(&users), vec![f.jimbo1.id.clone()]);

        let users = f
            .dir
            .users
            .search_not_in_channel(&team.id, &channel.id, "", &options)
            .await
            .unwrap();
        assert_eq!(ids(&users), vec![f.hb.id.clone()]);

        let users = f
            .dir
            .users
            .search_not_in_channel("", &channel.id, "", &options)
            .await
            .unwrap();
        assert_eq!(
            ids(&users),
            vec![f.h_b.id.clone(), f.hb.id.clone(), f.zeta.id.clone()]
        );

        let users = f.dir.users.search_not_in_team(&team.id, "", &options).await.unwrap();
        assert_eq!(ids(&users), vec![f.h_b.id.clone(), f.zeta.id.clone()]);

        let users = f.dir.users.search_without_team("z", &options).await.unwrap();
        assert_eq!(ids(&users), vec![f.zeta.id.clone()]);
    }

    #[tokio::test]
    async fn test_search_group_constrained() {
        let f = fixture().await;
        let team = save_team(&f.dir).await;
        let channel = save_channel(&f.dir, &team.id, ChannelType::Private).await;
        join_team(&f.dir, &team.id, &f.hb.id).await;
        join_team(&f.dir, &team.id, &f.jimbo1.id).await;

        let group = save_group(&f.dir).await;
        f.dir.groups.upsert_member(&group.id, &f.zeta.id).await.unwrap();
        f.dir.groups.upsert_member(&group.id, &f.hb.id).await.unwrap();
        f.dir
            .groups
            .create_group_syncable(&GroupSyncable::team(&group.id, &team.id))
            .await
            .unwrap();
        f.dir
            .groups
            .create_group_syncable(&GroupSyncable::channel(&group.id, &channel.id))
            .await
            .unwrap();

        let constrained = UserSearchOptions {
            group_constrained: true,
            ..Default::default()
        };

        let users = f.dir.users.search_not_in_team(&team.id, "", &constrained).await.unwrap();
        assert_eq!(ids(&users), vec![f.zeta.id.clone()]);

        let users = f
            .dir
            .users
            .search_not_in_channel(&team.id, &channel.id, "", &constrained)
            .await
            .unwrap();
        assert_eq!(ids(&users), vec![f.hb.id.clone()]);
    }
}
