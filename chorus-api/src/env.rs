//! Process setup: `.env` loading, typed environment, tracing and the
//! database connection.

use chorus_common::{
    snowflake::{ProcessId, WorkerId},
    util::{NonPositiveDurationError, PositiveDuration},
};
use chorus_db::{DbClient, MIGRATOR};
use serde::{Deserialize, de::DeserializeOwned};
use sqlx::postgres::PgPoolOptions;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Error)]
pub enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid query timeout: {0}")]
    QueryTimeout(#[from] NonPositiveDurationError),
    #[error("Error connecting to the database: {0}")]
    DbConnect(sqlx::Error),
    #[error("Error running migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Error installing signal handler: {0}")]
    Signal(std::io::Error),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
    #[error("Error seeding the database: {0}")]
    Seed(#[from] chorus_db::DbError),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct ServerEnv {
    pub server_address: IpAddr,
    pub server_port: u16,
}

impl ServerEnv {
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        SocketAddr::new(self.server_address, self.server_port)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct DatabaseEnv {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
    #[serde(default)]
    pub worker_id: WorkerId,
    #[serde(default)]
    pub process_id: ProcessId,
}

fn default_max_connections() -> u32 {
    30
}

fn default_query_timeout_ms() -> u64 {
    5_000
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct SeedEnv {
    #[serde(default = "default_seed_users")]
    pub seed_users: usize,
    #[serde(default = "default_seed_posts")]
    pub seed_posts: usize,
}

fn default_seed_users() -> usize {
    50
}

fn default_seed_posts() -> usize {
    200
}

pub fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chorus_api=debug,\
                chorus_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Loads `.env` into the process environment if there is one.
pub fn load_dotenv() -> Result<(), InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    Ok(())
}

pub fn from_env<T: DeserializeOwned>() -> Result<T, InitError> {
    envy::from_env().map_err(InitError::from)
}

/// Connects to the database, applies pending migrations and wraps the pool.
pub async fn connect_db(env: &DatabaseEnv) -> Result<DbClient, InitError> {
    let query_timeout = PositiveDuration::from_millis(env.query_timeout_ms)?;

    let pool = PgPoolOptions::new()
        .max_connections(env.database_max_connections)
        .connect(&env.database_url)
        .await
        .map_err(InitError::DbConnect)?;

    MIGRATOR.run(&pool).await?;
    info!(
        max_connections = env.database_max_connections,
        query_timeout_ms = env.query_timeout_ms,
        "Connected to database"
    );

    Ok(DbClient::new(
        pool,
        env.worker_id,
        env.process_id,
        query_timeout,
    ))
}
