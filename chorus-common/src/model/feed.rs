use crate::model::{
    Id,
    post::Post,
    user::{UserHandle, UserMarker},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub const DEFAULT_FEED_LIMIT: i64 = 20;
pub const MAX_FEED_LIMIT: i64 = 100;

/// Order of feed entries by creation time.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl Display for SortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = FeedQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(FeedQueryError::InvalidSort(s.to_owned())),
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum FeedQueryError {
    #[error("Sort must be 'asc' or 'desc', got {0:?}")]
    InvalidSort(String),
    #[error("Limit must be positive, got {0}")]
    NonPositiveLimit(i64),
    #[error("Limit must be at most {MAX_FEED_LIMIT}, got {0}")]
    LimitTooLarge(i64),
    #[error("Offset must not be negative, got {0}")]
    NegativeOffset(i64),
    #[error("{field} is not an RFC 3339 timestamp: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("'until' lies before 'since'")]
    UntilBeforeSince,
}

/// Everything that selects and windows a viewer's feed.
///
/// Build one with [`FeedQuery::for_viewer`] or [`FeedParams::into_query`] and
/// check it with [`FeedQuery::validate`] before running it.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct FeedQuery {
    pub viewer: Id<UserMarker>,
    pub limit: i64,
    pub offset: i64,
    pub sort: SortDirection,
    /// Case-insensitive substring of title or body.
    pub search: Option<String>,
    /// Every tag must be a case-insensitive substring of one of the post's tags.
    pub tags: Vec<String>,
    pub since: Option<OffsetDateTime>,
    pub until: Option<OffsetDateTime>,
}

impl FeedQuery {
    #[must_use]
    pub fn for_viewer(viewer: Id<UserMarker>) -> Self {
        Self {
            viewer,
            limit: DEFAULT_FEED_LIMIT,
            offset: 0,
            sort: SortDirection::default(),
            search: None,
            tags: Vec::new(),
            since: None,
            until: None,
        }
    }

    pub fn validate(&self) -> Result<(), FeedQueryError> {
        if self.limit <= 0 {
            return Err(FeedQueryError::NonPositiveLimit(self.limit));
        }
        if self.limit > MAX_FEED_LIMIT {
            return Err(FeedQueryError::LimitTooLarge(self.limit));
        }
        if self.offset < 0 {
            return Err(FeedQueryError::NegativeOffset(self.offset));
        }
        if let (Some(since), Some(until)) = (self.since, self.until)
            && until < since
        {
            return Err(FeedQueryError::UntilBeforeSince);
        }
        Ok(())
    }
}

/// Feed options as a caller sends them, e.g. as URL query parameters.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
pub struct FeedParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub search: Option<String>,
    /// Comma separated.
    pub tags: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

impl FeedParams {
    pub fn into_query(self, viewer: Id<UserMarker>) -> Result<FeedQuery, FeedQueryError> {
        let defaults = FeedQuery::for_viewer(viewer);

        let query = FeedQuery {
            viewer,
            limit: self.limit.unwrap_or(defaults.limit),
            offset: self.offset.unwrap_or(defaults.offset),
            sort: self
                .sort
                .as_deref()
                .map(str::parse::<SortDirection>)
                .transpose()?
                .unwrap_or(defaults.sort),
            search: self.search.filter(|search| !search.is_empty()),
            tags: self
                .tags
                .as_deref()
                .map(split_tags)
                .unwrap_or_default(),
            since: self
                .since
                .map(|since| parse_timestamp("since", since))
                .transpose()?,
            until: self
                .until
                .map(|until| parse_timestamp("until", until))
                .transpose()?,
        };

        query.validate()?;
        Ok(query)
    }
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_timestamp(field: &'static str, value: String) -> Result<OffsetDateTime, FeedQueryError> {
    OffsetDateTime::parse(&value, &Rfc3339)
        .map_err(|_| FeedQueryError::InvalidTimestamp { field, value })
}

/// One feed entry: the post plus what the feed joins onto it.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct PostSummary {
    #[serde(flatten)]
    pub post: Post,
    pub author_handle: UserHandle,
    pub comment_count: u64,
}
