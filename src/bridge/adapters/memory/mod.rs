//! In-memory adapters for bridge ports.

mod core_systems;
mod store;
mod translator;

pub use core_systems::InMemoryCoreSystems;
pub use store::InMemoryBridgeStore;
pub use translator::{InMemoryTranslatorClient, InitializationGate};
