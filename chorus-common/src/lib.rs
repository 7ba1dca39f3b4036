//! Domain model shared by the storage client and the HTTP service.

pub mod model;
pub mod snowflake;
pub mod util;
