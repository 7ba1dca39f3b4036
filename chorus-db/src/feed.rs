//! The viewer-scoped feed.
//!
//! A post is visible to a viewer if the viewer wrote it or follows its
//! author. Optional filters only add predicates to the query; every value
//! that came from the caller is bound as a parameter.

use crate::{
    client::{DbClient, DbError, Result},
    record::{POST_COLUMNS, PostSummaryRecord},
};
use chorus_common::model::feed::{FeedQuery, PostSummary};
use sqlx::{Postgres, QueryBuilder};
use tokio_util::sync::CancellationToken;
use tracing::debug;

impl DbClient {
    pub async fn fetch_feed(
        &self,
        query: &FeedQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<PostSummary>> {
        query.validate()?;

        let mut builder = feed_query(query);
        debug!(viewer = %query.viewer, sql = builder.sql(), "Fetching feed");

        let records = self
            .guarded(cancel, async {
                let records = builder
                    .build_query_as::<PostSummaryRecord>()
                    .fetch_all(&self.pool)
                    .await?;

                Ok(records)
            })
            .await?;

        debug!(viewer = %query.viewer, count = records.len(), "Fetched feed");

        records
            .into_iter()
            .map(|record| PostSummary::try_from(record).map_err(DbError::from))
            .collect()
    }
}

pub(crate) fn feed_query(query: &FeedQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "
        SELECT
            {POST_COLUMNS},
            users.handle,
            COUNT(comments.comment_snowflake) AS comment_count
        FROM
            posts.posts
            JOIN users.users ON users.user_snowflake = posts.user_snowflake
            LEFT JOIN posts.comments ON comments.post_snowflake = posts.post_snowflake
        WHERE
        "
    ));

    builder.push("(posts.user_snowflake = ");
    builder.push_bind(query.viewer.to_db());
    builder.push(
        " OR EXISTS (SELECT 1 FROM users.follows \
         WHERE follows.followee_snowflake = posts.user_snowflake \
         AND follows.follower_snowflake = ",
    );
    builder.push_bind(query.viewer.to_db());
    builder.push("))");

    if let Some(search) = &query.search {
        let pattern = contains_pattern(search);
        builder.push(" AND (posts.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR posts.body ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }

    for tag in &query.tags {
        builder.push(
            " AND EXISTS (SELECT 1 FROM unnest(posts.tags) AS post_tags(tag) \
             WHERE post_tags.tag ILIKE ",
        );
        builder.push_bind(contains_pattern(tag));
        builder.push(")");
    }

    if let Some(since) = query.since {
        builder.push(" AND posts.created_at >= ");
        builder.push_bind(since);
    }

    if let Some(until) = query.until {
        builder.push(" AND posts.created_at <= ");
        builder.push_bind(until);
    }

    builder.push(" GROUP BY posts.post_snowflake, users.handle");
    builder.push(" ORDER BY posts.created_at ");
    builder.push(query.sort.as_sql());
    builder.push(", posts.post_snowflake ASC");

    builder.push(" LIMIT ");
    builder.push_bind(query.limit);
    builder.push(" OFFSET ");
    builder.push_bind(query.offset);

    builder
}

/// An `ILIKE` pattern matching `needle` anywhere, with `needle`'s own
/// wildcards taken literally.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
