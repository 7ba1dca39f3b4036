//! Fills the configured database with demo users, follows, posts and
//! comments.

use chorus_api::env::{self, DatabaseEnv, InitError, SeedEnv};
use chorus_db::seed::{SeedData, SeedPlan};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), InitError> {
    env::install_tracing();
    env::load_dotenv()?;
    let database_env: DatabaseEnv = env::from_env()?;
    let seed_env: SeedEnv = env::from_env()?;

    let db_client = env::connect_db(&database_env).await?;

    let plan = SeedPlan::new(seed_env.seed_users, seed_env.seed_posts);
    let data = SeedData::generate(plan, &mut rand::rng())?;
    info!(?plan, "Seeding database");

    let cancel = CancellationToken::new();
    let report = db_client.seed(&data, &cancel).await?;
    info!(
        users = report.users,
        follows = report.follows,
        posts = report.posts,
        comments = report.comments,
        "Done"
    );

    Ok(())
}
