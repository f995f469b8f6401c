//! Change tags of bulk listings.
//!
//! A tag is `<crate version>.<max update_at>.<row count>` over the listing's
//! eligible set, so it moves when a member changes or the set grows or
//! shrinks.

use sqlx::{QueryBuilder, Sqlite};

use crate::error::Result;
use crate::user::{UserStore, push_not_team_member, push_team_member};

const VERSION: &str = env!("CARGO_PKG_VERSION");

impl UserStore {
    /// Tag of [`UserStore::get_all_profiles`].
    pub async fn get_etag_for_all_profiles(&self) -> Result<String> {
        self.etag(aggregate()).await
    }

    /// Tag of the profiles of `team_id` members.
    pub async fn get_etag_for_profiles(&self, team_id: &str) -> Result<String> {
        let mut query = aggregate();
        push_team_member(&mut query, team_id);
        self.etag(query).await
    }

    /// Tag of the profiles outside `team_id`.
    ///
    /// Any update of a non-member moves it, members of other teams
    /// included.
    pub async fn get_etag_for_profiles_not_in_team(&self, team_id: &str) -> Result<String> {
        let mut query = aggregate();
        push_not_team_member(&mut query, team_id);
        self.etag(query).await
    }

    async fn etag(&self, mut query: QueryBuilder<'_, Sqlite>) -> Result<String> {
        let (max_update_at, count): (Option<i64>, i64) =
            query.build_query_as().fetch_one(&self.pool).await?;

        Ok(format!("{VERSION}.{}.{count}", max_update_at.unwrap_or_default()))
    }
}

fn aggregate<'a>() -> QueryBuilder<'a, Sqlite> {
    QueryBuilder::new("SELECT MAX(u.update_at), COUNT(u.id) FROM users u WHERE 1 = 1")
}
