//! Translation bridge broker.
//!
//! This crate lets a consumer reach a provider whose interface protocol or
//! payload data model it does not speak, by placing an interface translator
//! (and optionally data model translators) between them.
//!
//! # Architecture
//!
//! The broker follows hexagonal architecture principles:
//!
//! - **Domain**: Pure bridge lifecycle logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for the store, core systems and translators
//! - **Adapters**: Concrete implementations of ports (in-memory, `PostgreSQL`, HTTP)
//!
//! # Modules
//!
//! - [`bridge`]: Discovery, negotiation, abort, reports and queries
//! - [`config`]: Broker settings

pub mod bridge;
pub mod config;
