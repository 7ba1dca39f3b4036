use crate::server::{
    Result, ServerError, ServerRouter,
    extract::{Cancel, Json},
    identity::Caller,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use chorus_common::model::{
    Id,
    follow::FollowEdge,
    user::{CreateUser, User, UserMarker},
};
use chorus_db::DbClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_user)
        .typed_get(get_user)
        .typed_put(follow)
        .typed_put(unfollow)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users", rejection(ServerError))]
struct UsersPath();

async fn create_user(
    UsersPath(): UsersPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
    Json(user): Json<CreateUser>,
) -> Result<(StatusCode, Json<User>)> {
    let user = db.create_user(&user, &cancel).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}", rejection(ServerError))]
struct UserPath {
    id: Id<UserMarker>,
}

async fn get_user(
    UserPath { id }: UserPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
) -> Result<Json<User>> {
    let user = db
        .fetch_user(id, &cancel)
        .await?
        .ok_or(ServerError::UserByIdNotFound(id))?;

    Ok(Json(user))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/follow", rejection(ServerError))]
struct FollowPath {
    id: Id<UserMarker>,
}

async fn follow(
    FollowPath { id }: FollowPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
    caller: Caller,
) -> Result<StatusCode> {
    db.follow(FollowEdge::new(caller.user_id(), id), &cancel)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/users/{id}/unfollow", rejection(ServerError))]
struct UnfollowPath {
    id: Id<UserMarker>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Serialize)]
struct Unfollowed {
    was_following: bool,
}

/// Succeeds whether or not the caller followed the user.
async fn unfollow(
    UnfollowPath { id }: UnfollowPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
    caller: Caller,
) -> Result<Json<Unfollowed>> {
    let was_following = db
        .unfollow(FollowEdge::new(caller.user_id(), id), &cancel)
        .await?;

    Ok(Json(Unfollowed { was_following }))
}
