//! PostgreSQL storage for posts, users, follows and comments.

pub mod client;
mod comments;
mod feed;
mod posts;
mod record;
pub mod seed;
mod users;

pub use client::{DbClient, DbError, DbErrorKind};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
