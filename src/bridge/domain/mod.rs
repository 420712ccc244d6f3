//! Domain model for translation bridges.

mod descriptor;
mod error;
mod flags;
mod header;
mod ids;
mod metadata;
mod model;
mod query;
mod records;
mod service_instance;
mod status;

pub use descriptor::{DataModelTranslationDescriptor, InterfaceTranslationDescriptor};
pub use error::{BridgeDomainError, ParseBridgeStatusError};
pub use flags::DiscoveryFlags;
pub use header::{BridgeHeader, BridgeReport, PersistedBridgeHeaderData};
pub use ids::{
    BridgeId, DataModelId, InterfaceTemplateName, OperationName, ServiceDefinitionName,
    ServiceInstanceId, SystemName,
};
pub use metadata::{
    ACCESS_ADDRESSES_KEY, ACCESS_PORT_KEY, BASE_PATH_KEY, BRIDGE_FROM_KEY, BRIDGE_TO_KEY,
    DATA_MODEL_IDS_KEY, DATA_MODELS_KEY, DeclaredDataModels, INPUT_KEY, INTERFACE_BRIDGE_KEY,
    Metadata, MetadataOperator, MetadataPredicate, MetadataRequirement, OPERATIONS_KEY,
    OUTPUT_KEY, OperationOverride,
};
pub use model::{DataModelTranslatorChoice, InterfaceTranslatorChoice, TranslationDiscoveryModel};
pub use query::{
    BaseFilter, BridgeQuery, Page, PageRequest, SortDirection, SortField, TimeRange,
};
pub use records::{AbortOutcome, BridgeDetails, BridgeDiscovery, BridgeRecord};
pub use service_instance::{InterfacePolicy, ServiceInstance, ServiceInterface};
pub use status::{BridgeEventState, BridgeStatus};
