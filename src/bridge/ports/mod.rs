//! Port contracts for the bridge context.

pub mod core_systems;
pub mod factory;
pub mod matchmaker;
pub mod store;
pub mod translator;

pub use core_systems::{
    BlacklistPolicy, CoreSystems, CoreSystemsError, CoreSystemsResult, TargetTokenRequest,
    TranslatorLookup,
};
pub use factory::{DataModelTranslatorFactory, FactoryError, FactoryResult};
pub use matchmaker::Matchmaker;
pub use store::{BridgeStore, BridgeStoreError, BridgeStoreResult};
pub use translator::{
    BridgeInitializationRequest, InterfaceTranslatorClient, TranslatorAccess,
    TranslatorClientError, TranslatorClientResult,
};
