mod common;

use chorus_common::model::{
    Id,
    comment::CommentContent,
    post::{PostContent, PostPatch, PostValidationError},
};
use chorus_db::{DbError, DbErrorKind};
use common::{client, post, user};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn title_patch(version: u32, title: &str) -> PostPatch {
    PostPatch {
        expected_version: version,
        title: Some(title.to_owned()),
        ..PostPatch::default()
    }
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn created_posts_start_at_version_one(pool: PgPool) {
    let db = client(pool);
    let alice = user(&db, "alice").await;

    let created = post(&db, alice.id, "A", &["rust", "web"]).await;

    assert_eq!(created.version, 1);
    assert_eq!(created.updated_at, created.created_at);
    assert_eq!(created.author_id, alice.id);
    assert_eq!(created.content.tags, vec!["rust".to_owned(), "web".to_owned()]);

    let fetched = db
        .fetch_post(created.id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(fetched, created);
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn stale_update_is_rejected_without_changes(pool: PgPool) {
    let db = client(pool);
    let cancel = CancellationToken::new();
    let alice = user(&db, "alice").await;
    let created = post(&db, alice.id, "A", &[]).await;

    let updated = db
        .update_post(created.id, &title_patch(1, "A2"), &cancel)
        .await
        .unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.content.title, "A2");
    assert_eq!(updated.content.body, created.content.body);
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.created_at, created.created_at);

    let retry = db
        .update_post(created.id, &title_patch(1, "A3"), &cancel)
        .await;
    assert!(matches!(
        retry,
        Err(DbError::EditConflict {
            expected: 1,
            current: 2,
            ..
        })
    ));

    let stored = db.fetch_post(created.id, &cancel).await.unwrap();
    assert_eq!(stored, updated);
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn every_update_bumps_version_and_timestamp(pool: PgPool) {
    let db = client(pool);
    let cancel = CancellationToken::new();
    let alice = user(&db, "alice").await;
    let mut current = post(&db, alice.id, "A", &[]).await;

    for round in 0..5 {
        let patch = PostPatch {
            expected_version: current.version,
            tags: Some(vec![format!("round-{round}")]),
            ..PostPatch::default()
        };
        let next = db.update_post(current.id, &patch, &cancel).await.unwrap();

        assert_eq!(next.version, current.version + 1);
        assert!(next.updated_at > current.updated_at);
        assert_eq!(next.content.title, "A");
        current = next;
    }
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn invalid_patches_never_reach_storage(pool: PgPool) {
    let db = client(pool);
    let cancel = CancellationToken::new();
    let alice = user(&db, "alice").await;
    let created = post(&db, alice.id, "A", &[]).await;

    let result = db
        .update_post(created.id, &title_patch(1, "   "), &cancel)
        .await;
    assert!(matches!(
        result,
        Err(DbError::InvalidPost(PostValidationError::EmptyTitle))
    ));

    let stored = db.fetch_post(created.id, &cancel).await.unwrap();
    assert_eq!(stored.version, 1);
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn missing_posts_are_not_found(pool: PgPool) {
    let db = client(pool);
    let cancel = CancellationToken::new();
    let missing = Id::from(987_654_321);

    assert!(matches!(
        db.fetch_post(missing, &cancel).await,
        Err(DbError::PostNotFound(id)) if id == missing
    ));
    assert!(matches!(
        db.update_post(missing, &title_patch(1, "A"), &cancel).await,
        Err(DbError::PostNotFound(_))
    ));
    assert!(matches!(
        db.delete_post(missing, &cancel).await,
        Err(DbError::PostNotFound(_))
    ));
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn deleting_removes_post_and_comments(pool: PgPool) {
    let db = client(pool);
    let cancel = CancellationToken::new();
    let alice = user(&db, "alice").await;
    let bob = user(&db, "bob").await;
    let created = post(&db, alice.id, "A", &[]).await;

    let comment = CommentContent {
        body: "Nice".to_owned(),
    };
    db.create_comment(created.id, bob.id, &comment, &cancel)
        .await
        .unwrap();

    db.delete_post(created.id, &cancel).await.unwrap();

    assert!(matches!(
        db.fetch_post(created.id, &cancel).await,
        Err(DbError::PostNotFound(_))
    ));
    assert!(
        db.fetch_post_comments(created.id, &cancel)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        db.delete_post(created.id, &cancel).await,
        Err(DbError::PostNotFound(_))
    ));
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn posts_need_an_existing_author(pool: PgPool) {
    let db = client(pool);
    let content = PostContent {
        title: "A".to_owned(),
        body: "b".to_owned(),
        tags: Vec::new(),
    };

    let result = db
        .create_post(Id::from(42), &content, &CancellationToken::new())
        .await;
    assert!(matches!(result, Err(DbError::UserNotFound(id)) if id == Id::from(42)));
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn exactly_one_concurrent_update_wins(pool: PgPool) {
    const WRITERS: usize = 8;

    let db = Arc::new(client(pool));
    let alice = user(&db, "alice").await;
    let created = post(&db, alice.id, "A", &[]).await;

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                db.update_post(
                    created.id,
                    &title_patch(1, &format!("writer {writer}")),
                    &CancellationToken::new(),
                )
                .await
            })
        })
        .collect();

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(post) => winners.push(post),
            Err(err) => {
                assert_eq!(err.kind(), DbErrorKind::EditConflict, "{err}");
                conflicts += 1;
            }
        }
    }

    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, WRITERS - 1);

    let stored = db
        .fetch_post(created.id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored, winners[0]);
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn cancelled_operations_do_not_run(pool: PgPool) {
    let db = client(pool);
    let alice = user(&db, "alice").await;
    let created = post(&db, alice.id, "A", &[]).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = db.update_post(created.id, &title_patch(1, "A2"), &cancel).await;
    assert!(matches!(result, Err(DbError::Cancelled)));

    let stored = db
        .fetch_post(created.id, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stored.version, 1);
}

#[sqlx::test(migrator = "chorus_db::MIGRATOR")]
#[ignore = "requires a PostgreSQL database (DATABASE_URL)"]
async fn comments_are_listed_newest_first(pool: PgPool) {
    let db = client(pool);
    let cancel = CancellationToken::new();
    let alice = user(&db, "alice").await;
    let created = post(&db, alice.id, "A", &[]).await;

    for body in ["first", "second", "third"] {
        let comment = CommentContent {
            body: body.to_owned(),
        };
        db.create_comment(created.id, alice.id, &comment, &cancel)
            .await
            .unwrap();
    }

    let comments = db.fetch_post_comments(created.id, &cancel).await.unwrap();
    let bodies: Vec<_> = comments.iter().map(|comment| comment.body.as_str()).collect();
    assert_eq!(bodies, ["third", "second", "first"]);
    assert!(comments.iter().all(|comment| comment.author_handle.get() == "alice"));

    let orphan = db
        .create_comment(Id::from(5), alice.id, &CommentContent { body: "x".into() }, &cancel)
        .await;
    assert!(matches!(orphan, Err(DbError::PostNotFound(_))));
}
