//! `PostgreSQL` adapters for bridge lifecycle persistence.

mod models;
mod schema;
mod store;

pub use store::{BridgePgPool, PostgresBridgeStore};
