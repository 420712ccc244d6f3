//! HTTP adapters for core services and interface translators.

mod core_systems;
mod translator;
mod wire;

pub use core_systems::HttpCoreSystems;
pub use translator::{HttpTranslatorClient, TranslatorEndpoint, resolve_endpoint};
