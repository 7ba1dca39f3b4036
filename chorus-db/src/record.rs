use chorus_common::model::{
    Id, ModelValidationError,
    comment::Comment,
    feed::PostSummary,
    post::{Post, PostContent},
    user::{User, UserHandle},
};
use sqlx::FromRow;
use time::OffsetDateTime;

/// Column list matching [`PostRecord`], qualified with the `posts` table.
pub(crate) const POST_COLUMNS: &str = "
    posts.post_snowflake,
    posts.user_snowflake,
    posts.title,
    posts.body,
    posts.tags,
    posts.version,
    posts.created_at,
    posts.updated_at";

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub user_snowflake: i64,
    pub handle: String,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub version: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostSummaryRecord {
    #[sqlx(flatten)]
    pub post: PostRecord,
    pub handle: String,
    pub comment_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub comment_snowflake: i64,
    pub post_snowflake: i64,
    pub user_snowflake: i64,
    pub handle: String,
    pub body: String,
    pub created_at: OffsetDateTime,
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.user_snowflake),
            handle: UserHandle::new(value.handle)?,
            created_at: value.created_at,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        let version = u32::try_from(value.version)
            .ok()
            .filter(|version| *version >= 1)
            .ok_or(ModelValidationError::PostVersion(value.version))?;

        let content = PostContent {
            title: value.title,
            body: value.body,
            tags: value.tags,
        };
        content.validate()?;

        Ok(Self {
            id: Id::from_db(value.post_snowflake),
            author_id: Id::from_db(value.user_snowflake),
            content,
            version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl TryFrom<PostSummaryRecord> for PostSummary {
    type Error = ModelValidationError;

    fn try_from(value: PostSummaryRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            post: value.post.try_into()?,
            author_handle: UserHandle::new(value.handle)?,
            comment_count: u64::try_from(value.comment_count)
                .map_err(|_| ModelValidationError::CommentCount(value.comment_count))?,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Id::from_db(value.comment_snowflake),
            post_id: Id::from_db(value.post_snowflake),
            author_id: Id::from_db(value.user_snowflake),
            author_handle: UserHandle::new(value.handle)?,
            body: value.body,
            created_at: value.created_at,
        })
    }
}
