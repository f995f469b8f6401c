use user_directory::Directory;
use user_directory::model::{
    Channel, ChannelMember, ChannelType, Team, TeamMember, User, UserCountOptions,
    UserGetOptions, UserSearchOptions,
};
use user_directory::user::UserBuilder;

async fn user(dir: &Directory, username: &str, roles: &str, delete_at: i64) -> User {
    dir.users
        .save(
            &UserBuilder::new()
                .username(username)
                .email(format!("{username}@example.com"))
                .roles(roles)
                .delete_at(delete_at)
                .build(),
        )
        .await
        .unwrap()
}

fn usernames(users: &[User]) -> Vec<&str> {
    users.iter().map(|user| user.username.as_str()).collect()
}

#[tokio::test]
async fn seven_user_directory() {
    let dir = Directory::in_memory().await.unwrap();

    let u1 = user(&dir, "u1", "system_user system_admin", 0).await;
    user(&dir, "u2", "system_user", 0).await;
    let u3 = user(&dir, "u3", "system_user system_admin", 1).await;
    user(&dir, "u4", "system_user", 0).await;
    let u5 = user(&dir, "u5", "system_guest", 0).await;
    user(&dir, "u6", "system_user", 0).await;
    user(&dir, "u7", "system_user", 0).await;

    let all = dir
        .users
        .get_all_profiles(&UserGetOptions::default().page(0, 100))
        .await
        .unwrap();
    assert_eq!(usernames(&all), ["u1", "u2", "u3", "u4", "u5", "u6", "u7"]);

    let deleted_admins = dir
        .users
        .get_all_profiles(&UserGetOptions::default().role("system_admin").inactive())
        .await
        .unwrap();
    assert_eq!(usernames(&deleted_admins), ["u3"]);
    assert_eq!(deleted_admins[0].id, u3.id);

    let team = dir
        .teams
        .save(&Team {
            name: "engineering".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let channel = dir
        .channels
        .save(&Channel {
            team_id: team.id.clone(),
            name: "town-square".into(),
            channel_type: ChannelType::Open,
            ..Default::default()
        })
        .await
        .unwrap();

    let etag = dir.users.get_etag_for_profiles(&team.id).await.unwrap();
    for member in [&u1, &u5] {
        dir.teams
            .save_member(&TeamMember::new(&team.id, &member.id), None)
            .await
            .unwrap();
        dir.channels
            .save_member(&ChannelMember::new(&channel.id, &member.id))
            .await
            .unwrap();
    }
    assert_ne!(dir.users.get_etag_for_profiles(&team.id).await.unwrap(), etag);

    let in_channel = dir
        .users
        .get_all_profiles_in_channel(&channel.id, true)
        .await
        .unwrap();
    assert_eq!(in_channel.len(), 2);

    let promoted = dir.users.promote_guest_to_user(&u5.id).await.unwrap();
    assert!(!promoted.is_guest());
    let in_channel = dir
        .users
        .get_all_profiles_in_channel(&channel.id, true)
        .await
        .unwrap();
    assert!(!in_channel[&u5.id].is_guest());

    let found = dir
        .users
        .search(&team.id, "u", &UserSearchOptions::default())
        .await
        .unwrap();
    assert_eq!(usernames(&found), ["u1", "u5"]);

    assert_eq!(dir.users.count(&UserCountOptions::default()).await.unwrap(), 6);
    assert_eq!(dir.users.analytics_get_system_admin_count().await.unwrap(), 1);
}
