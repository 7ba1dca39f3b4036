mod common;

use chorus_common::model::feed::FeedQuery;
use chorus_db::seed::{SeedData, SeedPlan};
use common::client;
use rand::{SeedableRng, rngs::StdRng};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn seeding_writes_everything(pool: PgPool) {
    let db = client(pool);
    let cancel = CancellationToken::new();
    let data = SeedData::generate(SeedPlan::new(10, 40), &mut StdRng::seed_from_u64(1)).unwrap();

    let report = db.seed(&data, &cancel).await.unwrap();
    assert_eq!(report.users, 10);
    assert_eq!(report.posts, 40);
    assert_eq!(report.comments, 80);

    let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts.posts")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(posts, 40);

    let first_user = db
        .fetch_user_by_handle(&data.users()[0].handle, &cancel)
        .await
        .unwrap()
        .unwrap();
    db.fetch_feed(&FeedQuery::for_viewer(first_user.id), &cancel)
        .await
        .unwrap();
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn failed_seed_leaves_nothing_behind(pool: PgPool) {
    let db = client(pool);
    let cancel = CancellationToken::new();
    let data = SeedData::generate(SeedPlan::new(3, 5), &mut StdRng::seed_from_u64(2)).unwrap();

    db.seed(&data, &cancel).await.unwrap();
    // Same handles again: the user insert fails and the whole second seed rolls back.
    assert!(db.seed(&data, &cancel).await.is_err());

    let posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts.posts")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(posts, 5);
}
