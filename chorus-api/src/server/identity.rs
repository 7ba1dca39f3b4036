//! Caller identity.
//!
//! Authentication happens in front of this service, which forwards the
//! authenticated user's id in the `X-User-Id` header and is trusted as is.

use crate::server::ServerError;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::TypedHeader;
use chorus_common::model::{Id, user::UserMarker};
use headers::{Header, HeaderName, HeaderValue};
use std::iter;

static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct XUserId(pub Id<UserMarker>);

impl Header for XUserId {
    fn name() -> &'static HeaderName {
        &X_USER_ID
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        let value = values.next().ok_or_else(headers::Error::invalid)?;
        if values.next().is_some() {
            return Err(headers::Error::invalid());
        }

        let id: u64 = value
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .ok_or_else(headers::Error::invalid)?;

        Ok(Self(Id::from(id)))
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        values.extend(iter::once(HeaderValue::from(u64::from(self.0))));
    }
}

/// The user on whose behalf a request is made.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct Caller {
    id: Id<UserMarker>,
}

impl Caller {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(XUserId(id)) = TypedHeader::<XUserId>::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidIdentityHeader)?;

        Ok(Self { id })
    }
}
