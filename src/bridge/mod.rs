//! Translation bridge lifecycle management.
//!
//! A bridge connects a consumer to a provider that speaks a different
//! interface or data model. The broker discovers interface translators able
//! to serve a request, negotiates one chosen candidate into a live bridge,
//! tracks translator reports and aborts bridges on request. The module
//! follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
