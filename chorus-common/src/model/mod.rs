pub mod comment;
pub mod feed;
pub mod follow;
pub mod post;
pub mod user;

use crate::{
    model::{post::PostValidationError, user::InvalidUserHandleError},
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;
use time::{OffsetDateTime, macros::datetime};

/// Raised when data read back from storage violates a model constraint.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    UserHandle(#[from] InvalidUserHandleError),
    #[error(transparent)]
    Post(#[from] PostValidationError),
    #[error("Stored post version {0} is not positive")]
    PostVersion(i32),
    #[error("Stored comment count {0} is negative")]
    CommentCount(i64),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct ChorusEpoch;
impl Epoch for ChorusEpoch {
    const EPOCH_TIME: OffsetDateTime = datetime!(2025-01-01 00:00 UTC);
}

pub type ChorusSnowflake = Snowflake<ChorusEpoch>;
pub type ChorusSnowflakeGenerator = SnowflakeGenerator<ChorusEpoch>;

/// A snowflake tagged with the kind of entity it identifies.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(ChorusSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: ChorusSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> ChorusSnowflake {
        self.0
    }

    /// The id as stored in a signed `BIGINT` column.
    #[must_use]
    pub fn to_db(self) -> i64 {
        self.0.get().cast_signed()
    }

    #[must_use]
    pub fn from_db(value: i64) -> Self {
        value.cast_unsigned().into()
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<ChorusSnowflake> for Id<Marker> {
    fn from(value: ChorusSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(ChorusSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

/// Length in unicode scalar values, which is what every text limit counts.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, post::PostMarker};

    #[test]
    fn ids_survive_signed_storage() {
        for raw in [0_u64, 42, u64::MAX, 1 << 63] {
            let id = Id::<PostMarker>::from(raw);
            assert_eq!(Id::<PostMarker>::from_db(id.to_db()), id);
        }
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let id = Id::<PostMarker>::from(1234);
        assert_eq!(serde_json::to_string(&id).unwrap(), "1234");
        assert_eq!(serde_json::from_str::<Id<PostMarker>>("1234").unwrap(), id);
    }
}
