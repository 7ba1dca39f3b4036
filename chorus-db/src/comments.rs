use crate::{
    client::{ConstraintKind, DbClient, DbError, Result, violated_constraint},
    record::CommentRecord,
};
use chorus_common::model::{
    Id,
    comment::{Comment, CommentContent, CommentMarker},
    post::PostMarker,
    user::UserMarker,
};
use sqlx::query_as;
use tokio_util::sync::CancellationToken;
use tracing::debug;

impl DbClient {
    pub async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author_id: Id<UserMarker>,
        content: &CommentContent,
        cancel: &CancellationToken,
    ) -> Result<Comment> {
        content.validate()?;
        let comment_id: Id<CommentMarker> = self.generate_id()?;

        let record = self
            .guarded(cancel, async {
                query_as::<_, CommentRecord>(
                    "
                    WITH inserted AS (
                        INSERT INTO posts.comments
                            (comment_snowflake, post_snowflake, user_snowflake, body)
                        VALUES ($1, $2, $3, $4)
                        RETURNING *
                    )
                    SELECT
                        inserted.comment_snowflake,
                        inserted.post_snowflake,
                        inserted.user_snowflake,
                        users.handle,
                        inserted.body,
                        inserted.created_at
                    FROM
                        inserted
                        JOIN users.users ON users.user_snowflake = inserted.user_snowflake
                    ",
                )
                .bind(comment_id.to_db())
                .bind(post_id.to_db())
                .bind(author_id.to_db())
                .bind(&content.body)
                .fetch_one(&self.pool)
                .await
                .map_err(|err| match violated_constraint(&err) {
                    Some((ConstraintKind::ForeignKey, constraint))
                        if constraint.contains("post_snowflake") =>
                    {
                        DbError::PostNotFound(post_id)
                    }
                    Some((ConstraintKind::ForeignKey, _)) => DbError::UserNotFound(author_id),
                    _ => err.into(),
                })
            })
            .await?;

        debug!(%comment_id, %post_id, %author_id, "Created comment");
        Ok(record.try_into()?)
    }

    /// Comments of a post, newest first.
    pub async fn fetch_post_comments(
        &self,
        post_id: Id<PostMarker>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Comment>> {
        let records = self
            .guarded(cancel, async {
                let records = query_as::<_, CommentRecord>(
                    "
                    SELECT
                        comments.comment_snowflake,
                        comments.post_snowflake,
                        comments.user_snowflake,
                        users.handle,
                        comments.body,
                        comments.created_at
                    FROM
                        posts.comments
                        JOIN users.users ON users.user_snowflake = comments.user_snowflake
                    WHERE
                        comments.post_snowflake = $1
                    ORDER BY
                        comments.created_at DESC,
                        comments.comment_snowflake DESC
                    ",
                )
                .bind(post_id.to_db())
                .fetch_all(&self.pool)
                .await?;

                Ok(records)
            })
            .await?;

        records
            .into_iter()
            .map(|record| Comment::try_from(record).map_err(DbError::from))
            .collect()
    }
}
