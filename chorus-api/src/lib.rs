//! HTTP surface and process setup shared by the server and seed binaries.

pub mod env;
pub mod server;
