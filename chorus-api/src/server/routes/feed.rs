use crate::server::{
    Result, ServerError, ServerRouter,
    extract::{Cancel, Json, Query},
    identity::Caller,
};
use axum::extract::State;
use axum_extra::routing::{RouterExt, TypedPath};
use chorus_common::model::feed::{FeedParams, PostSummary};
use chorus_db::DbClient;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(get_feed)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/feed", rejection(ServerError))]
struct FeedPath();

/// `GET /feed?limit=&offset=&sort=&search=&tags=a,b&since=&until=`
async fn get_feed(
    FeedPath(): FeedPath,
    State(db): State<Arc<DbClient>>,
    Cancel(cancel): Cancel,
    caller: Caller,
    Query(params): Query<FeedParams>,
) -> Result<Json<Vec<PostSummary>>> {
    let query = params.into_query(caller.user_id())?;
    debug!(?query, "Parsed feed query");

    let feed = db.fetch_feed(&query, &cancel).await?;

    Ok(Json(feed))
}
