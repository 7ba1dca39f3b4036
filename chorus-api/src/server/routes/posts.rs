use crate::server::{
    Result, ServerError, ServerRouter,
    extract::{Cancel, Json},
    identity::Caller,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use chorus_common::model::{
    Id,
    comment::{Comment, CommentContent},
    post::{Post, PostContent, PostMarker, PostPatch},
};
use chorus_db::DbClient;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_post(create_post)
        .typed_get(get_post)
        .typed_patch(update_post)
        .typed_delete(delete_post)
        .typed_get(get_comments)
        .typed_post(create_comment)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts", rejection(ServerError))]
struct PostsPath();

async fn create_post(
    PostsPath(): PostsPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
    caller: Caller,
    Json(content): Json<PostContent>,
) -> Result<(StatusCode, Json<Post>)> {
    let post = db
        .create_post(caller.user_id(), &content, &cancel)
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}", rejection(ServerError))]
struct PostPath {
    id: Id<PostMarker>,
}

async fn get_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
) -> Result<Json<Post>> {
    let post = db.fetch_post(id, &cancel).await?;

    Ok(Json(post))
}

/// The body names the version it was based on. A stale version is answered
/// with 409 and the client is expected to re-fetch before retrying.
async fn update_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
    _caller: Caller,
    Json(patch): Json<PostPatch>,
) -> Result<Json<Post>> {
    let post = db.update_post(id, &patch, &cancel).await?;

    Ok(Json(post))
}

async fn delete_post(
    PostPath { id }: PostPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
    _caller: Caller,
) -> Result<StatusCode> {
    db.delete_post(id, &cancel).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/posts/{id}/comments", rejection(ServerError))]
struct PostCommentsPath {
    id: Id<PostMarker>,
}

async fn get_comments(
    PostCommentsPath { id }: PostCommentsPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
) -> Result<Json<Vec<Comment>>> {
    // An empty list is ambiguous, so check that the post exists first.
    db.fetch_post(id, &cancel).await?;
    let comments = db.fetch_post_comments(id, &cancel).await?;

    Ok(Json(comments))
}

async fn create_comment(
    PostCommentsPath { id }: PostCommentsPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
    caller: Caller,
    Json(content): Json<CommentContent>,
) -> Result<(StatusCode, Json<Comment>)> {
    let comment = db
        .create_comment(id, caller.user_id(), &content, &cancel)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}
