#![allow(dead_code)]

use chorus_common::{
    model::{
        Id,
        post::{Post, PostContent},
        user::{CreateUser, User, UserHandle, UserMarker},
    },
    snowflake::{ProcessId, WorkerId},
    util::PositiveDuration,
};
use chorus_db::DbClient;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

pub fn client(pool: PgPool) -> DbClient {
    DbClient::new(
        pool,
        WorkerId::new(1).unwrap(),
        ProcessId::new(1).unwrap(),
        PositiveDuration::from_millis(5_000).unwrap(),
    )
}

pub async fn user(db: &DbClient, handle: &str) -> User {
    let user = CreateUser {
        handle: UserHandle::new(handle.to_owned()).unwrap(),
    };
    db.create_user(&user, &CancellationToken::new()).await.unwrap()
}

pub async fn post(db: &DbClient, author: Id<UserMarker>, title: &str, tags: &[&str]) -> Post {
    let content = PostContent {
        title: title.to_owned(),
        body: format!("Body of {title}"),
        tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
    };
    db.create_post(author, &content, &CancellationToken::new())
        .await
        .unwrap()
}
