//! Post storage with optimistic concurrency control.
//!
//! Every post carries a version that starts at 1. An update names the
//! version it was based on and is applied by one conditional statement that
//! only matches while that version is still current, so of several writers
//! racing from the same version exactly one wins. The others get
//! [`DbError::EditConflict`] and decide themselves whether to re-fetch and
//! retry.

use crate::{
    client::{ConstraintKind, DbClient, DbError, Result, violated_constraint},
    record::{POST_COLUMNS, PostRecord},
};
use chorus_common::model::{
    Id, ModelValidationError,
    post::{INITIAL_POST_VERSION, Post, PostContent, PostMarker, PostPatch, PostVersion},
    user::UserMarker,
};
use sqlx::{query, query_as, query_scalar};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

fn stored_version(version: i32) -> Result<PostVersion> {
    let version = PostVersion::try_from(version)
        .ok()
        .filter(|version| *version >= INITIAL_POST_VERSION)
        .ok_or(ModelValidationError::PostVersion(version))?;
    Ok(version)
}

impl DbClient {
    pub async fn create_post(
        &self,
        author_id: Id<UserMarker>,
        content: &PostContent,
        cancel: &CancellationToken,
    ) -> Result<Post> {
        content.validate()?;
        let post_id: Id<PostMarker> = self.generate_id()?;

        let record = self
            .guarded(cancel, async {
                query_as::<_, PostRecord>(&format!(
                    "
                    INSERT INTO posts.posts (post_snowflake, user_snowflake, title, body, tags)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING {POST_COLUMNS}
                    "
                ))
                .bind(post_id.to_db())
                .bind(author_id.to_db())
                .bind(&content.title)
                .bind(&content.body)
                .bind(&content.tags)
                .fetch_one(&self.pool)
                .await
                .map_err(|err| match violated_constraint(&err) {
                    Some((ConstraintKind::ForeignKey, _)) => DbError::UserNotFound(author_id),
                    _ => err.into(),
                })
            })
            .await?;

        debug!(%post_id, %author_id, "Created post");
        Ok(record.try_into()?)
    }

    pub async fn fetch_post(
        &self,
        post_id: Id<PostMarker>,
        cancel: &CancellationToken,
    ) -> Result<Post> {
        let record = self
            .guarded(cancel, async {
                let record = query_as::<_, PostRecord>(&format!(
                    "
                    SELECT {POST_COLUMNS}
                    FROM posts.posts
                    WHERE posts.post_snowflake = $1
                    "
                ))
                .bind(post_id.to_db())
                .fetch_optional(&self.pool)
                .await?;

                Ok(record)
            })
            .await?
            .ok_or(DbError::PostNotFound(post_id))?;

        Ok(record.try_into()?)
    }

    /// Applies `patch` if the stored version still equals
    /// `patch.expected_version`, returning the post with its version
    /// incremented by one.
    ///
    /// Fails with [`DbError::EditConflict`] if the post was changed in the
    /// meantime and with [`DbError::PostNotFound`] if it no longer exists.
    /// Invalid fields are rejected before storage is touched.
    pub async fn update_post(
        &self,
        post_id: Id<PostMarker>,
        patch: &PostPatch,
        cancel: &CancellationToken,
    ) -> Result<Post> {
        patch.validate()?;

        let record = self
            .guarded(cancel, async {
                let updated = query_as::<_, PostRecord>(&format!(
                    "
                    UPDATE posts.posts
                    SET
                        title = COALESCE($3, posts.title),
                        body = COALESCE($4, posts.body),
                        tags = COALESCE($5, posts.tags),
                        version = posts.version + 1,
                        updated_at = GREATEST(clock_timestamp(), posts.updated_at + INTERVAL '1 microsecond')
                    WHERE posts.post_snowflake = $1 AND posts.version = $2
                    RETURNING {POST_COLUMNS}
                    "
                ))
                .bind(post_id.to_db())
                .bind(i64::from(patch.expected_version))
                .bind(patch.title.as_deref())
                .bind(patch.body.as_deref())
                .bind(patch.tags.as_deref())
                .fetch_optional(&self.pool)
                .await?;

                if let Some(record) = updated {
                    return Ok(record);
                }

                // Nothing matched: either the post is gone or its version moved on.
                let current_version = query_scalar::<_, i32>(
                    "
                    SELECT posts.version
                    FROM posts.posts
                    WHERE posts.post_snowflake = $1
                    ",
                )
                .bind(post_id.to_db())
                .fetch_optional(&self.pool)
                .await?;

                match current_version {
                    Some(current) => Err(DbError::EditConflict {
                        id: post_id,
                        expected: patch.expected_version,
                        current: stored_version(current)?,
                    }),
                    None => Err(DbError::PostNotFound(post_id)),
                }
            })
            .await
            .inspect_err(|err| {
                if let DbError::EditConflict {
                    expected, current, ..
                } = err
                {
                    warn!(%post_id, expected, current, "Rejected stale post update");
                }
            })?;

        let post: Post = record.try_into()?;
        debug!(%post_id, version = post.version, "Updated post");
        Ok(post)
    }

    /// Deletes a post together with its comments.
    pub async fn delete_post(
        &self,
        post_id: Id<PostMarker>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let rows_affected = self
            .guarded(cancel, async {
                let result = query(
                    "
                    DELETE FROM posts.posts
                    WHERE posts.post_snowflake = $1
                    ",
                )
                .bind(post_id.to_db())
                .execute(&self.pool)
                .await?;

                Ok(result.rows_affected())
            })
            .await?;

        if rows_affected == 0 {
            return Err(DbError::PostNotFound(post_id));
        }

        debug!(%post_id, "Deleted post");
        Ok(())
    }
}
