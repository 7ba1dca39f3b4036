use crate::model::{Id, user::UserMarker};
use serde::{Deserialize, Serialize};

/// `follower` sees the posts of `followee` in their feed.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Deserialize, Serialize)]
pub struct FollowEdge {
    pub follower: Id<UserMarker>,
    pub followee: Id<UserMarker>,
}

impl FollowEdge {
    #[must_use]
    pub fn new(follower: Id<UserMarker>, followee: Id<UserMarker>) -> Self {
        Self { follower, followee }
    }
}
