use chorus_common::{
    model::{
        ChorusSnowflakeGenerator, Id, ModelValidationError,
        comment::CommentValidationError,
        feed::FeedQueryError,
        follow::FollowEdge,
        post::{PostMarker, PostValidationError, PostVersion},
        user::UserMarker,
    },
    snowflake::{ProcessId, SnowflakeTimestampError, WorkerId},
    util::PositiveDuration,
};
use sqlx::PgPool;
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Post is invalid: {0}")]
    InvalidPost(#[from] PostValidationError),
    #[error("Comment is invalid: {0}")]
    InvalidComment(#[from] CommentValidationError),
    #[error("Feed query is invalid: {0}")]
    InvalidFeedQuery(#[from] FeedQueryError),
    #[error("Post with id {0} was not found.")]
    PostNotFound(Id<PostMarker>),
    #[error("User with id {0} was not found.")]
    UserNotFound(Id<UserMarker>),
    #[error("Post {id} was modified concurrently: expected version {expected}, stored version is {current}")]
    EditConflict {
        id: Id<PostMarker>,
        expected: PostVersion,
        current: PostVersion,
    },
    #[error("The handle {0:?} is already taken")]
    HandleTaken(String),
    #[error("User {} already follows user {}", .0.follower, .0.followee)]
    AlreadyFollowing(FollowEdge),
    #[error("The operation was cancelled")]
    Cancelled,
    #[error("The operation did not finish within {0:?}")]
    Timeout(Duration),
    #[error("Could not generate an id: {0}")]
    IdGeneration(#[from] SnowflakeTimestampError),
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Coarse classification of a [`DbError`], for callers that only need to
/// decide how to react (e.g. which status code to answer with).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum DbErrorKind {
    /// The input broke a stated constraint. Storage was not touched.
    Validation,
    NotFound,
    /// The expected version of a post was stale. Re-fetch and retry.
    EditConflict,
    /// A uniqueness constraint rejected the write.
    Conflict,
    Cancelled,
    Timeout,
    Storage,
}

impl DbError {
    #[must_use]
    pub fn kind(&self) -> DbErrorKind {
        match self {
            DbError::InvalidPost(_) | DbError::InvalidComment(_) | DbError::InvalidFeedQuery(_) => {
                DbErrorKind::Validation
            }
            DbError::PostNotFound(_) | DbError::UserNotFound(_) => DbErrorKind::NotFound,
            DbError::EditConflict { .. } => DbErrorKind::EditConflict,
            DbError::HandleTaken(_) | DbError::AlreadyFollowing(_) => DbErrorKind::Conflict,
            DbError::Cancelled => DbErrorKind::Cancelled,
            DbError::Timeout(_) => DbErrorKind::Timeout,
            DbError::IdGeneration(_) | DbError::Data(_) | DbError::Sqlx(_) => DbErrorKind::Storage,
        }
    }
}

#[derive(Debug)]
pub struct DbClient {
    pub(crate) pool: PgPool,
    snowflake_generator: Mutex<ChorusSnowflakeGenerator>,
    query_timeout: PositiveDuration,
}

impl DbClient {
    #[must_use]
    pub fn new(
        pool: PgPool,
        worker_id: WorkerId,
        process_id: ProcessId,
        query_timeout: PositiveDuration,
    ) -> Self {
        let snowflake_generator =
            Mutex::new(ChorusSnowflakeGenerator::new(worker_id, process_id));

        Self {
            pool,
            snowflake_generator,
            query_timeout,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn query_timeout(&self) -> PositiveDuration {
        self.query_timeout
    }

    pub(crate) fn generate_id<Marker>(&self) -> Result<Id<Marker>> {
        let snowflake = self
            .snowflake_generator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generate()?;

        Ok(snowflake.into())
    }

    /// Runs one storage operation under the caller's cancellation token and
    /// the configured query timeout.
    pub(crate) async fn guarded<T>(
        &self,
        cancel: &CancellationToken,
        operation: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        guard(cancel, self.query_timeout.to_std(), operation).await
    }
}

pub(crate) async fn guard<T>(
    cancel: &CancellationToken,
    timeout: Duration,
    operation: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(DbError::Cancelled),
        outcome = tokio::time::timeout(timeout, operation) => match outcome {
            Ok(result) => result,
            Err(_elapsed) => Err(DbError::Timeout(timeout)),
        },
    }
}

/// Name of the constraint a database error was raised for, if any.
pub(crate) fn violated_constraint(error: &sqlx::Error) -> Option<(ConstraintKind, &str)> {
    let sqlx::Error::Database(database_error) = error else {
        return None;
    };

    let kind = if database_error.is_unique_violation() {
        ConstraintKind::Unique
    } else if database_error.is_foreign_key_violation() {
        ConstraintKind::ForeignKey
    } else {
        return None;
    };

    Some((kind, database_error.constraint().unwrap_or_default()))
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum ConstraintKind {
    Unique,
    ForeignKey,
}

#[cfg(test)]
mod tests {
    use crate::client::{DbError, DbErrorKind, guard};
    use chorus_common::model::{Id, feed::FeedQueryError};
    use std::{
        future,
        sync::atomic::{AtomicBool, Ordering},
        time::Duration,
    };
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn guard_passes_results_through() {
        let cancel = CancellationToken::new();
        let result = guard(&cancel, Duration::from_secs(1), async { Ok::<_, DbError>(5) }).await;
        assert_eq!(result.unwrap(), 5);
    }

    #[tokio::test]
    async fn guard_reports_cancellation_before_running() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let ran = AtomicBool::new(false);
        let result = guard(&cancel, Duration::from_secs(1), async {
            ran.store(true, Ordering::SeqCst);
            Ok::<_, DbError>(())
        })
        .await;

        assert!(matches!(result, Err(DbError::Cancelled)));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn guard_aborts_pending_work_when_cancelled() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = guard(
            &cancel,
            Duration::from_secs(60),
            future::pending::<Result<(), DbError>>(),
        )
        .await;

        assert!(matches!(result, Err(DbError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn guard_times_out() {
        let cancel = CancellationToken::new();
        let result = guard(
            &cancel,
            Duration::from_millis(50),
            future::pending::<Result<(), DbError>>(),
        )
        .await;

        assert!(matches!(result, Err(DbError::Timeout(timeout)) if timeout == Duration::from_millis(50)));
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            DbError::InvalidFeedQuery(FeedQueryError::NegativeOffset(-1)).kind(),
            DbErrorKind::Validation
        );
        assert_eq!(
            DbError::PostNotFound(Id::from(1)).kind(),
            DbErrorKind::NotFound
        );
        assert_eq!(
            DbError::EditConflict {
                id: Id::from(1),
                expected: 1,
                current: 2
            }
            .kind(),
            DbErrorKind::EditConflict
        );
        assert_eq!(DbError::Cancelled.kind(), DbErrorKind::Cancelled);
        assert_eq!(
            DbError::Sqlx(sqlx::Error::PoolTimedOut).kind(),
            DbErrorKind::Storage
        );
    }
}
