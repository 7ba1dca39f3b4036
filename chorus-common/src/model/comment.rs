use crate::model::{
    Id, char_len,
    post::PostMarker,
    user::{UserHandle, UserMarker},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub const COMMENT_BODY_MAX_LEN: usize = 1000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub author_handle: UserHandle,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct CommentContent {
    pub body: String,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum CommentValidationError {
    #[error("Comment body is required")]
    EmptyBody,
    #[error("Comment has {0} characters, at most {COMMENT_BODY_MAX_LEN} are allowed")]
    BodyTooLong(usize),
}

impl CommentContent {
    pub fn validate(&self) -> Result<(), CommentValidationError> {
        if self.body.trim().is_empty() {
            return Err(CommentValidationError::EmptyBody);
        }
        let len = char_len(&self.body);
        if len > COMMENT_BODY_MAX_LEN {
            return Err(CommentValidationError::BodyTooLong(len));
        }
        Ok(())
    }
}
