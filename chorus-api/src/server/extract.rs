use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    extract::{FromRef, FromRequest, FromRequestParts, Query as AxumQuery},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;
use std::convert::Infallible;
use tokio_util::sync::CancellationToken;

#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => (TypedHeader(ContentType::json()), json).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

#[derive(FromRequestParts, Debug, Clone, Copy, Default)]
#[from_request(via(AxumQuery), rejection(ServerError))]
pub struct Query<T>(pub T);

/// Cancellation for the storage calls of one request. Fires when the server
/// shuts down.
#[derive(Clone, Debug, Default)]
pub struct Cancel(pub CancellationToken);

impl<S> FromRequestParts<S> for Cancel
where
    CancellationToken: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(_parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(CancellationToken::from_ref(state).child_token()))
    }
}
