//! Handle single record requests.

use sqlx::{QueryBuilder, Sqlite};

use crate::error::{NotFoundKind, Result, StoreError};
use crate::id::is_valid_id;
use crate::model::{RoleSet, User, UserUpdate};
use crate::user::{UserStore, select_users};

impl UserStore {
    /// Insert a new [`User`] into database.
    ///
    /// The id is assigned here; records carrying one must go through
    /// [`UserStore::update`].
    pub async fn save(&self, user: &User) -> Result<User> {
        if !user.id.is_empty() {
            return Err(StoreError::invalid("id", "must call update for existing user"));
        }

        let mut user = user.clone();
        user.pre_save(self.stamper.next());
        self.stamper.observe(user.update_at);
        user.is_valid()?;

        sqlx::query(
            r#"INSERT INTO users
                (id, create_at, update_at, delete_at, username, password, auth_data, auth_service,
                 email, nickname, first_name, last_name, roles, props, last_password_update,
                 last_picture_update, failed_attempts, mfa_active, mfa_secret)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&user.id)
        .bind(user.create_at)
        .bind(user.update_at)
        .bind(user.delete_at)
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.auth_data)
        .bind(&user.auth_service)
        .bind(&user.email)
        .bind(&user.nickname)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.roles.to_string())
        .bind(serde_json::to_string(&user.props)?)
        .bind(user.last_password_update)
        .bind(user.last_picture_update)
        .bind(user.failed_attempts)
        .bind(user.mfa_active)
        .bind(&user.mfa_secret)
        .execute(&self.pool)
        .await?;

        tracing::debug!(user_id = %user.id, "user saved");

        Ok(user)
    }

    /// Replace the stored record of `user.id`.
    ///
    /// Without `trusted`, email and external auth fields of externally
    /// authenticated accounts keep their stored value. Credentials, MFA
    /// and picture state are only changed by the targeted updates.
    pub async fn update(&self, user: &User, trusted: bool) -> Result<UserUpdate> {
        if !is_valid_id(&user.id) {
            return Err(StoreError::invalid("id", format!("`{}` is not a valid id", user.id)));
        }

        let mut user = user.clone();
        user.pre_update();

        let mut tx = self.pool.begin().await?;

        // take the write lock first so the stored record cannot move under us.
        let locked = sqlx::query(r#"UPDATE users SET update_at = update_at WHERE id = ?"#)
            .bind(&user.id)
            .execute(&mut *tx)
            .await?;
        if locked.rows_affected() != 1 {
            return Err(StoreError::not_found(NotFoundKind::Account, &user.id));
        }

        let mut query = select_users();
        query.push(" AND u.id = ").push_bind(user.id.clone());
        let old = query
            .build_query_as::<User>()
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::not_found(NotFoundKind::Account, &user.id))?;
        if old.id != user.id {
            return Err(StoreError::invalid("id", "stored id differs from the provided one"));
        }

        if !trusted {
            if old.is_external() {
                user.email = old.email.clone();
            }
            user.auth_data = old.auth_data.clone();
            user.auth_service = old.auth_service.clone();
        }

        user.create_at = old.create_at;
        user.password = old.password.clone();
        user.last_password_update = old.last_password_update;
        user.last_picture_update = old.last_picture_update;
        user.failed_attempts = old.failed_attempts;
        user.mfa_active = old.mfa_active;
        user.mfa_secret = old.mfa_secret.clone();
        user.update_at = self.stamper.next().max(old.update_at + 1);
        self.stamper.observe(user.update_at);
        user.is_valid()?;

        let result = sqlx::query(
            r#"UPDATE users
                SET update_at = ?, delete_at = ?, username = ?, auth_data = ?, auth_service = ?,
                    email = ?, nickname = ?, first_name = ?, last_name = ?, roles = ?, props = ?
                WHERE id = ?"#,
        )
        .bind(user.update_at)
        .bind(user.delete_at)
        .bind(&user.username)
        .bind(&user.auth_data)
        .bind(&user.auth_service)
        .bind(&user.email)
        .bind(&user.nickname)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.roles.to_string())
        .bind(serde_json::to_string(&user.props)?)
        .bind(&user.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(StoreError::not_found(NotFoundKind::Account, &user.id));
        }

        tx.commit().await?;
        self.cache.invalidate_user(&user.id);

        let mut old = old;
        let bots = self.bots.get_by_ids(std::slice::from_ref(&user.id)).await?;
        if let Some(bot) = bots.get(&user.id) {
            for record in [&mut old, &mut user] {
                record.is_bot = true;
                record.bot_description = bot.description.clone();
            }
        }
        old.scrub_credentials();
        user.scrub_credentials();

        Ok(UserUpdate { old, new: user })
    }

    /// Find a user using `id` field.
    pub async fn get(&self, id: &str) -> Result<User> {
        let mut query = select_users();
        query.push(" AND u.id = ").push_bind(id.to_owned());
        self.fetch_one(query, NotFoundKind::Account, id).await
    }

    /// Find a user using `email` field.
    pub async fn get_by_email(&self, email: &str) -> Result<User> {
        let email = email.trim().to_lowercase();
        let mut query = select_users();
        query.push(" AND u.email = ").push_bind(email.clone());
        self.fetch_one(query, NotFoundKind::Account, &email).await
    }

    /// Find a user using `username` field.
    pub async fn get_by_username(&self, username: &str) -> Result<User> {
        let username = username.trim().to_lowercase();
        let mut query = select_users();
        query.push(" AND u.username = ").push_bind(username.clone());
        self.fetch_one(query, NotFoundKind::Account, &username).await
    }

    /// Find a user using its external identity.
    pub async fn get_by_auth(&self, auth_data: Option<&str>, auth_service: &str) -> Result<User> {
        let Some(auth_data) = auth_data.filter(|data| !data.is_empty()) else {
            return Err(StoreError::not_found(NotFoundKind::AuthAccount, auth_service));
        };

        let mut query = select_users();
        query
            .push(" AND u.auth_data = ")
            .push_bind(auth_data.to_owned())
            .push(" AND u.auth_service = ")
            .push_bind(auth_service.to_owned());
        self.fetch_one(query, NotFoundKind::AuthAccount, auth_data).await
    }

    /// Resolve a login identifier to exactly one user.
    pub async fn get_for_login(
        &self,
        login_id: &str,
        allow_username: bool,
        allow_email: bool,
    ) -> Result<User> {
        if !allow_username && !allow_email {
            return Err(StoreError::invalid("login_id", "no sign-in method enabled"));
        }

        let login_id = login_id.trim().to_lowercase();
        let mut query = select_users();
        query.push(" AND (0 = 1");
        if allow_username {
            query.push(" OR u.username = ").push_bind(login_id.clone());
        }
        if allow_email {
            query.push(" OR u.email = ").push_bind(login_id.clone());
        }
        query.push(")");

        let mut users = self.decorate(self.fetch(query).await?).await?;
        match users.len() {
            0 => Err(StoreError::not_found(NotFoundKind::Account, login_id)),
            1 => Ok(users.remove(0)),
            _ => Err(StoreError::invalid("login_id", "matches several users")),
        }
    }

    /// Every full record, in username order.
    pub async fn get_all(&self) -> Result<Vec<User>> {
        let mut query = select_users();
        query.push(" ORDER BY u.username ASC");
        self.decorate(self.fetch(query).await?).await
    }

    /// Full records with an id above `after_id`, in id order.
    pub async fn get_all_after(&self, limit: u32, after_id: &str) -> Result<Vec<User>> {
        super::check_limit(limit)?;

        let mut query = select_users();
        query
            .push(" AND u.id > ")
            .push_bind(after_id.to_owned())
            .push(" ORDER BY u.id ASC LIMIT ")
            .push_bind(i64::from(limit));
        self.decorate(self.fetch(query).await?).await
    }

    /// Full records authenticated by `auth_service`.
    pub async fn get_all_using_auth_service(&self, auth_service: &str) -> Result<Vec<User>> {
        let mut query = select_users();
        query
            .push(" AND u.auth_service = ")
            .push_bind(auth_service.to_owned())
            .push(" ORDER BY u.username ASC");
        self.decorate(self.fetch(query).await?).await
    }

    /// Refresh `update_at` and return its new value.
    pub async fn update_update_at(&self, user_id: &str) -> Result<i64> {
        let stamp = self.touch(user_id, |_, _| {}).await?;
        Ok(stamp.unwrap_or_else(|| self.stamper.now()))
    }

    /// Store a new password hash. External auth is dropped.
    pub async fn update_password(&self, user_id: &str, hashed_password: &str) -> Result<()> {
        let hashed_password = hashed_password.to_owned();
        self.touch(user_id, |query, now| {
            query
                .push(", password = ")
                .push_bind(hashed_password)
                .push(", last_password_update = ")
                .push_bind(now)
                .push(", auth_data = NULL, auth_service = '', failed_attempts = 0");
        })
        .await?;
        Ok(())
    }

    /// Switch the user to an external provider. The password is cleared.
    pub async fn update_auth_data(
        &self,
        user_id: &str,
        auth_service: &str,
        auth_data: Option<&str>,
        email: &str,
        reset_mfa: bool,
    ) -> Result<String> {
        let auth_service = auth_service.to_owned();
        let auth_data = auth_data.filter(|data| !data.is_empty()).map(str::to_owned);
        let email = email.trim().to_lowercase();

        self.touch(user_id, |query, now| {
            query
                .push(", password = '', last_password_update = ")
                .push_bind(now)
                .push(", failed_attempts = 0, auth_service = ")
                .push_bind(auth_service)
                .push(", auth_data = ")
                .push_bind(auth_data);
            if !email.is_empty() {
                query.push(", email = ").push_bind(email);
            }
            if reset_mfa {
                query.push(", mfa_active = 0, mfa_secret = ''");
            }
        })
        .await?;

        Ok(user_id.to_owned())
    }

    pub async fn update_mfa_secret(&self, user_id: &str, secret: &str) -> Result<()> {
        let secret = secret.to_owned();
        self.touch(user_id, |query, _| {
            query.push(", mfa_secret = ").push_bind(secret);
        })
        .await?;
        Ok(())
    }

    pub async fn update_mfa_active(&self, user_id: &str, active: bool) -> Result<()> {
        self.touch(user_id, |query, _| {
            query.push(", mfa_active = ").push_bind(active);
        })
        .await?;
        Ok(())
    }

    pub async fn update_failed_password_attempts(&self, user_id: &str, attempts: i32) -> Result<()> {
        self.touch(user_id, |query, _| {
            query.push(", failed_attempts = ").push_bind(attempts);
        })
        .await?;
        Ok(())
    }

    /// Record a new profile picture.
    pub async fn update_last_picture_update(&self, user_id: &str) -> Result<()> {
        self.touch(user_id, |query, now| {
            query.push(", last_picture_update = ").push_bind(now);
        })
        .await?;
        Ok(())
    }

    /// Go back to the default picture.
    pub async fn reset_last_picture_update(&self, user_id: &str) -> Result<()> {
        self.touch(user_id, |query, _| {
            query.push(", last_picture_update = 0");
        })
        .await?;
        Ok(())
    }

    pub async fn update_roles(&self, user_id: &str, roles: &RoleSet) -> Result<()> {
        let roles = roles.to_string();
        self.touch(user_id, |query, _| {
            query.push(", roles = ").push_bind(roles);
        })
        .await?;
        Ok(())
    }

    /// Delete the row for good and evict it from every cache.
    pub async fn permanent_delete(&self, user_id: &str) -> Result<()> {
        sqlx::query(r#"DELETE FROM users WHERE id = ?"#)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        self.cache.invalidate_user(user_id);
        tracing::debug!(%user_id, "user permanently deleted");

        Ok(())
    }

    /// Run `UPDATE users SET update_at = <stamp><assignments> WHERE id = ?`.
    ///
    /// `assignments` gets the wall stamp and starts each column with `, `.
    /// The stored `update_at` always moves forward, whatever the local
    /// clock says. Returns it, or `None` when no user matched.
    async fn touch<F>(&self, user_id: &str, assignments: F) -> Result<Option<i64>>
    where
        F: FnOnce(&mut QueryBuilder<'_, Sqlite>, i64),
    {
        let now = self.stamper.next();

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE users SET update_at = MAX(");
        query.push_bind(now).push(", update_at + 1)");
        assignments(&mut query, now);
        query
            .push(" WHERE id = ")
            .push_bind(user_id.to_owned())
            .push(" RETURNING update_at");

        let stamp: Option<i64> = query
            .build_query_scalar()
            .fetch_optional(&self.pool)
            .await?;
        match stamp {
            Some(stamp) => self.stamper.observe(stamp),
            None => tracing::warn!(%user_id, "targeted update matched no user"),
        }

        self.cache.invalidate_user(user_id);

        Ok(stamp)
    }

    async fn fetch_one(
        &self,
        query: QueryBuilder<'_, Sqlite>,
        kind: NotFoundKind,
        key: &str,
    ) -> Result<User> {
        self.decorate(self.fetch(query).await?)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(kind, key))
    }
}
