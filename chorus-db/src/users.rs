use crate::{
    client::{ConstraintKind, DbClient, DbError, Result, violated_constraint},
    record::UserRecord,
};
use chorus_common::model::{
    Id,
    follow::FollowEdge,
    user::{CreateUser, User, UserHandle, UserMarker},
};
use sqlx::{query, query_as};
use tokio_util::sync::CancellationToken;
use tracing::debug;

impl DbClient {
    pub async fn fetch_user(
        &self,
        user_id: Id<UserMarker>,
        cancel: &CancellationToken,
    ) -> Result<Option<User>> {
        let record = self
            .guarded(cancel, async {
                let record = query_as::<_, UserRecord>(
                    "
                    SELECT
                        users.user_snowflake,
                        users.handle,
                        users.created_at
                    FROM
                        users.users
                    WHERE
                        users.user_snowflake = $1
                    ",
                )
                .bind(user_id.to_db())
                .fetch_optional(&self.pool)
                .await?;

                Ok(record)
            })
            .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn fetch_user_by_handle(
        &self,
        handle: &UserHandle,
        cancel: &CancellationToken,
    ) -> Result<Option<User>> {
        let record = self
            .guarded(cancel, async {
                let record = query_as::<_, UserRecord>(
                    "
                    SELECT
                        users.user_snowflake,
                        users.handle,
                        users.created_at
                    FROM
                        users.users
                    WHERE
                        users.handle = $1
                    ",
                )
                .bind(handle.get())
                .fetch_optional(&self.pool)
                .await?;

                Ok(record)
            })
            .await?;

        let user = record.map(User::try_from).transpose()?;
        Ok(user)
    }

    pub async fn create_user(
        &self,
        user: &CreateUser,
        cancel: &CancellationToken,
    ) -> Result<User> {
        let user_id: Id<UserMarker> = self.generate_id()?;

        let record = self
            .guarded(cancel, async {
                query_as::<_, UserRecord>(
                    "
                    INSERT INTO users.users (user_snowflake, handle)
                    VALUES ($1, $2)
                    RETURNING users.user_snowflake, users.handle, users.created_at
                    ",
                )
                .bind(user_id.to_db())
                .bind(user.handle.get())
                .fetch_one(&self.pool)
                .await
                .map_err(|err| match violated_constraint(&err) {
                    Some((ConstraintKind::Unique, _)) => {
                        DbError::HandleTaken(user.handle.get().to_owned())
                    }
                    _ => err.into(),
                })
            })
            .await?;

        debug!(%user_id, handle = user.handle.get(), "Created user");
        Ok(record.try_into()?)
    }

    /// Makes `edge.follower` see the posts of `edge.followee`.
    pub async fn follow(&self, edge: FollowEdge, cancel: &CancellationToken) -> Result<()> {
        self.guarded(cancel, async {
            query(
                "
                INSERT INTO users.follows (follower_snowflake, followee_snowflake)
                VALUES ($1, $2)
                ",
            )
            .bind(edge.follower.to_db())
            .bind(edge.followee.to_db())
            .execute(&self.pool)
            .await
            .map_err(|err| match violated_constraint(&err) {
                Some((ConstraintKind::Unique, _)) => DbError::AlreadyFollowing(edge),
                Some((ConstraintKind::ForeignKey, constraint))
                    if constraint.contains("follower") =>
                {
                    DbError::UserNotFound(edge.follower)
                }
                Some((ConstraintKind::ForeignKey, _)) => DbError::UserNotFound(edge.followee),
                None => err.into(),
            })
        })
        .await?;

        debug!(follower = %edge.follower, followee = %edge.followee, "Followed user");
        Ok(())
    }

    /// Removes the edge if it exists. Returns whether there was one.
    pub async fn unfollow(&self, edge: FollowEdge, cancel: &CancellationToken) -> Result<bool> {
        let rows_affected = self
            .guarded(cancel, async {
                let result = query(
                    "
                    DELETE FROM users.follows
                    WHERE follows.follower_snowflake = $1 AND follows.followee_snowflake = $2
                    ",
                )
                .bind(edge.follower.to_db())
                .bind(edge.followee.to_db())
                .execute(&self.pool)
                .await?;

                Ok(result.rows_affected())
            })
            .await?;

        debug!(follower = %edge.follower, followee = %edge.followee, rows_affected, "Unfollowed user");
        Ok(rows_affected > 0)
    }
}
