//! Adapters implementing the bridge ports.

pub mod http;
pub mod matchmaking;
pub mod memory;
pub mod postgres;
