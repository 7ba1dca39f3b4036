use crate::model::{Id, char_len, user::UserMarker};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = 100;
pub const POST_BODY_MAX_LEN: usize = 1000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

/// Optimistic lock token of a post. Starts at 1 and grows by one per accepted update.
pub type PostVersion = u32;

pub const INITIAL_POST_VERSION: PostVersion = 1;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    #[serde(flatten)]
    pub content: PostContent,
    pub version: PostVersion,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The user-editable part of a post.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A conditional edit of a post. Fields left as `None` keep their stored value.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostPatch {
    /// The version the editor last saw.
    #[serde(rename = "version")]
    pub expected_version: PostVersion,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum PostValidationError {
    #[error("Title is required")]
    EmptyTitle,
    #[error("Title has {0} characters, at most {POST_TITLE_MAX_LEN} are allowed")]
    TitleTooLong(usize),
    #[error("Body is required")]
    EmptyBody,
    #[error("Body has {0} characters, at most {POST_BODY_MAX_LEN} are allowed")]
    BodyTooLong(usize),
}

pub fn validate_title(title: &str) -> Result<(), PostValidationError> {
    if title.trim().is_empty() {
        return Err(PostValidationError::EmptyTitle);
    }
    let len = char_len(title);
    if len > POST_TITLE_MAX_LEN {
        return Err(PostValidationError::TitleTooLong(len));
    }
    Ok(())
}

pub fn validate_body(body: &str) -> Result<(), PostValidationError> {
    if body.trim().is_empty() {
        return Err(PostValidationError::EmptyBody);
    }
    let len = char_len(body);
    if len > POST_BODY_MAX_LEN {
        return Err(PostValidationError::BodyTooLong(len));
    }
    Ok(())
}

impl PostContent {
    pub fn validate(&self) -> Result<(), PostValidationError> {
        validate_title(&self.title)?;
        validate_body(&self.body)
    }
}

impl PostPatch {
    /// Checks only the fields that are present.
    pub fn validate(&self) -> Result<(), PostValidationError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(body) = &self.body {
            validate_body(body)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.tags.is_none()
    }
}
