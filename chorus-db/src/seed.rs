//! Demo data for a fresh database.
//!
//! [`SeedData::generate`] is pure and refers to users and posts by index, so
//! it can be checked without a database. [`DbClient::seed`] assigns ids and
//! writes everything in one transaction; if any statement fails nothing is
//! kept.

use crate::client::{DbClient, Result};
use chorus_common::model::{
    Id, ModelValidationError,
    comment::CommentMarker,
    post::{PostContent, PostMarker},
    user::{UserHandle, UserMarker},
};
use rand::{
    Rng,
    seq::{IndexedRandom, index},
};
use sqlx::{Postgres, QueryBuilder};
use time::{Duration, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Rows per multi-row `INSERT`, well below the bind parameter limit.
const INSERT_CHUNK: usize = 500;

const MAX_TAGS_PER_POST: usize = 3;
const USER_AGE: Duration = Duration::days(60);
const MAX_POST_AGE_SECONDS: i64 = 30 * 24 * 60 * 60;

const NAMES: &[&str] = &[
    "alice", "bob", "charlie", "dave", "eve", "frank", "grace", "heidi", "ivan", "judy", "ken",
    "laura", "mallory", "nancy", "oscar", "peggy", "quinn", "ruth", "sam", "trent", "ursula",
    "victor", "wendy", "xavier", "yvonne", "zack",
];

const TITLES: &[&str] = &[
    "Mastering the Art of Focus",
    "Why Simplicity Wins Every Time",
    "The Power of Small Habits",
    "Building Resilient Systems",
    "Scaling Without Losing Control",
    "Lessons from Failed Projects",
    "Designing for Humans, Not Machines",
    "How Open Source Changed My Career",
    "A Beginner's Guide to APIs",
    "What I Learned from Debugging All Night",
    "Why Documentation Matters",
    "The Hidden Cost of Technical Debt",
];

const BODIES: &[&str] = &[
    "Small, consistent improvements often lead to the biggest results.",
    "Building systems that scale starts with understanding the trade-offs between performance and maintainability.",
    "Design is about how people experience your product every day.",
    "Automation is powerful, but only when you automate the right things.",
    "Good documentation saves more time than any single line of code.",
    "Failing fast is great, but learning fast is better.",
    "Debugging is like detective work: every clue brings you closer to the truth.",
    "A solid architecture grows with your product; a rigid one eventually breaks it.",
];

const TAGS: &[&str] = &[
    "rust",
    "rust-lang",
    "webdev",
    "productivity",
    "design",
    "cloud",
    "opensource",
    "devops",
    "security",
    "databases",
    "testing",
    "clean-code",
];

const COMMENTS: &[&str] = &[
    "Great insights! Thanks for sharing.",
    "I never thought about it that way before.",
    "Can you share more about your approach to this?",
    "Totally agree with your point about consistency.",
    "Could you expand on the scaling part?",
    "I learned something new today, thank you!",
];

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SeedPlan {
    pub users: usize,
    pub posts: usize,
    pub comments: usize,
    pub max_follows_per_user: usize,
}

impl SeedPlan {
    #[must_use]
    pub fn new(users: usize, posts: usize) -> Self {
        Self {
            users,
            posts,
            comments: posts.saturating_mul(2),
            max_follows_per_user: 5,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SeedUser {
    pub handle: UserHandle,
    /// How long before the seed time the user was created.
    pub age: Duration,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct SeedFollow {
    pub follower: usize,
    pub followee: usize,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SeedPost {
    pub author: usize,
    pub content: PostContent,
    pub age: Duration,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct SeedComment {
    pub post: usize,
    pub author: usize,
    pub body: String,
    pub age: Duration,
}

/// Only built by [`SeedData::generate`], so every index refers to an entry
/// of the same data.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SeedData {
    users: Vec<SeedUser>,
    follows: Vec<SeedFollow>,
    posts: Vec<SeedPost>,
    comments: Vec<SeedComment>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct SeedReport {
    pub users: usize,
    pub follows: usize,
    pub posts: usize,
    pub comments: usize,
}

fn pick<'a>(rng: &mut impl Rng, items: &[&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

impl SeedData {
    #[must_use]
    pub fn users(&self) -> &[SeedUser] {
        &self.users
    }

    #[must_use]
    pub fn follows(&self) -> &[SeedFollow] {
        &self.follows
    }

    #[must_use]
    pub fn posts(&self) -> &[SeedPost] {
        &self.posts
    }

    #[must_use]
    pub fn comments(&self) -> &[SeedComment] {
        &self.comments
    }

    /// Posts and follows need users and comments need posts, so a plan
    /// without users produces no data at all.
    pub fn generate(plan: SeedPlan, rng: &mut impl Rng) -> Result<Self> {
        let mut data = SeedData::default();

        for i in 0..plan.users {
            let handle = UserHandle::new(format!("{}{i}", NAMES[i % NAMES.len()]))
                .map_err(ModelValidationError::from)?;
            data.users.push(SeedUser {
                handle,
                age: USER_AGE,
            });
        }

        if plan.users == 0 {
            return Ok(data);
        }

        let max_follows = plan.max_follows_per_user.min(plan.users - 1);
        for follower in 0..plan.users {
            let count = rng.random_range(0..=max_follows);
            // Sample among everyone else, then shift past the follower's own index.
            for other in index::sample(rng, plan.users - 1, count) {
                let followee = if other >= follower { other + 1 } else { other };
                data.follows.push(SeedFollow { follower, followee });
            }
        }

        for _ in 0..plan.posts {
            let tag_count = rng.random_range(0..=MAX_TAGS_PER_POST);
            let content = PostContent {
                title: pick(rng, TITLES).to_owned(),
                body: pick(rng, BODIES).to_owned(),
                tags: TAGS
                    .choose_multiple(rng, tag_count)
                    .map(|tag| (*tag).to_owned())
                    .collect(),
            };
            content.validate()?;

            data.posts.push(SeedPost {
                author: rng.random_range(0..plan.users),
                content,
                age: Duration::seconds(rng.random_range(0..=MAX_POST_AGE_SECONDS)),
            });
        }

        if data.posts.is_empty() {
            return Ok(data);
        }

        for _ in 0..plan.comments {
            let post = rng.random_range(0..data.posts.len());
            let post_age = data.posts[post].age.whole_seconds();

            data.comments.push(SeedComment {
                post,
                author: rng.random_range(0..plan.users),
                body: pick(rng, COMMENTS).to_owned(),
                age: Duration::seconds(rng.random_range(0..=post_age)),
            });
        }

        Ok(data)
    }
}

impl DbClient {
    /// Writes `data` inside a single transaction.
    pub async fn seed(&self, data: &SeedData, cancel: &CancellationToken) -> Result<SeedReport> {
        let now = OffsetDateTime::now_utc();

        let user_ids = data
            .users
            .iter()
            .map(|_| self.generate_id::<UserMarker>())
            .collect::<Result<Vec<_>>>()?;
        let post_ids = data
            .posts
            .iter()
            .map(|_| self.generate_id::<PostMarker>())
            .collect::<Result<Vec<_>>>()?;
        let comment_ids = data
            .comments
            .iter()
            .map(|_| self.generate_id::<CommentMarker>())
            .collect::<Result<Vec<Id<CommentMarker>>>>()?;

        let mut transaction = self
            .guarded(cancel, async { Ok(self.pool.begin().await?) })
            .await?;

        let users: Vec<_> = user_ids.iter().zip(&data.users).collect();
        for chunk in users.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO users.users (user_snowflake, handle, created_at) ");
            builder.push_values(chunk, |mut row, (id, user)| {
                row.push_bind(id.to_db())
                    .push_bind(user.handle.get())
                    .push_bind(now - user.age);
            });

            self.guarded(cancel, async {
                builder.build().execute(&mut *transaction).await?;
                Ok(())
            })
            .await?;
        }
        debug!(count = users.len(), "Seeded users");

        for chunk in data.follows.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO users.follows (follower_snowflake, followee_snowflake) ",
            );
            builder.push_values(chunk, |mut row, follow| {
                row.push_bind(user_ids[follow.follower].to_db())
                    .push_bind(user_ids[follow.followee].to_db());
            });
            builder.push(" ON CONFLICT DO NOTHING");

            self.guarded(cancel, async {
                builder.build().execute(&mut *transaction).await?;
                Ok(())
            })
            .await?;
        }
        debug!(count = data.follows.len(), "Seeded follows");

        let posts: Vec<_> = post_ids.iter().zip(&data.posts).collect();
        for chunk in posts.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO posts.posts \
                 (post_snowflake, user_snowflake, title, body, tags, created_at, updated_at) ",
            );
            builder.push_values(chunk, |mut row, (id, post)| {
                let created_at = now - post.age;
                row.push_bind(id.to_db())
                    .push_bind(user_ids[post.author].to_db())
                    .push_bind(post.content.title.as_str())
                    .push_bind(post.content.body.as_str())
                    .push_bind(post.content.tags.as_slice())
                    .push_bind(created_at)
                    .push_bind(created_at);
            });

            self.guarded(cancel, async {
                builder.build().execute(&mut *transaction).await?;
                Ok(())
            })
            .await?;
        }
        debug!(count = posts.len(), "Seeded posts");

        let comments: Vec<_> = comment_ids.iter().zip(&data.comments).collect();
        for chunk in comments.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO posts.comments \
                 (comment_snowflake, post_snowflake, user_snowflake, body, created_at) ",
            );
            builder.push_values(chunk, |mut row, (id, comment)| {
                row.push_bind(id.to_db())
                    .push_bind(post_ids[comment.post].to_db())
                    .push_bind(user_ids[comment.author].to_db())
                    .push_bind(comment.body.as_str())
                    .push_bind(now - comment.age);
            });

            self.guarded(cancel, async {
                builder.build().execute(&mut *transaction).await?;
                Ok(())
            })
            .await?;
        }
        debug!(count = comments.len(), "Seeded comments");

        self.guarded(cancel, async { Ok(transaction.commit().await?) })
            .await?;

        let report = SeedReport {
            users: users.len(),
            follows: data.follows.len(),
            posts: posts.len(),
            comments: comments.len(),
        };
        info!(?report, "Seeded database");
        Ok(report)
    }
}
