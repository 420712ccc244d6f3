//! Interface translator client port.

use crate::bridge::domain::{
    BridgeId, DataModelTranslationDescriptor, InterfaceTemplateName, Metadata, OperationName,
    ServiceInstance, ServiceInterface, SystemName,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Operation name asking a translator which targets it can reach.
pub const CHECK_TARGETS_OPERATION: &str = "check-targets";
/// Operation name asking a translator to set up a bridge.
pub const INITIALIZE_BRIDGE_OPERATION: &str = "initialize-bridge";
/// Operation name asking a translator to tear down a bridge.
pub const ABORT_BRIDGE_OPERATION: &str = "abort-bridge";

/// Result type for translator client operations.
pub type TranslatorClientResult<T> = Result<T, TranslatorClientError>;

/// How to reach one interface translator instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorAccess {
    /// Translator system name.
    pub name: SystemName,
    /// Management interface properties (addresses, port, operation overrides).
    pub properties: Metadata,
    /// Management token, when the translator requires one.
    pub token: Option<String>,
}

/// Payload of a bridge initialization call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeInitializationRequest {
    /// Bridge identifier.
    pub bridge_id: BridgeId,
    /// Interface template the consumer will use.
    pub input_interface: InterfaceTemplateName,
    /// Interface template the translator will use towards the target.
    pub target_interface: InterfaceTemplateName,
    /// Request payload translation, when required.
    pub input_data_model_translator: Option<DataModelTranslationDescriptor>,
    /// Response payload translation, when required.
    pub result_data_model_translator: Option<DataModelTranslationDescriptor>,
    /// Target interface properties.
    pub target_interface_properties: Metadata,
    /// Target operation.
    pub operation: OperationName,
    /// Token for calling the target, when its policy requires one.
    pub token: Option<String>,
    /// Operator settings for the translator.
    pub interface_translator_settings: Option<Map<String, Value>>,
}

/// Direct calls to interface translator instances.
#[async_trait]
pub trait InterfaceTranslatorClient: Send + Sync {
    /// Returns the subset of `targets` the translator confirms it can bridge
    /// to for `operation`.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslatorClientError`] when the call fails.
    async fn check_targets(
        &self,
        access: &TranslatorAccess,
        operation: &OperationName,
        targets: &[ServiceInstance],
    ) -> TranslatorClientResult<Vec<ServiceInstance>>;

    /// Asks the translator to set up a bridge and returns the interface the
    /// consumer has to call.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslatorClientError`] when the call fails.
    async fn initialize_bridge(
        &self,
        access: &TranslatorAccess,
        request: &BridgeInitializationRequest,
    ) -> TranslatorClientResult<ServiceInterface>;

    /// Asks the translator to tear down a bridge.
    ///
    /// # Errors
    ///
    /// Returns a [`TranslatorClientError`] when the call fails.
    async fn abort_bridge(
        &self,
        access: &TranslatorAccess,
        bridge_id: BridgeId,
    ) -> TranslatorClientResult<()>;
}

/// Errors returned by translator client implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranslatorClientError {
    /// The translator's properties do not describe a reachable endpoint.
    #[error("invalid translator endpoint for {translator}: {reason}")]
    InvalidEndpoint {
        /// Translator system name.
        translator: SystemName,
        /// What is missing or malformed.
        reason: String,
    },

    /// The translator could not be reached.
    #[error("translator {translator} unreachable: {reason}")]
    Unreachable {
        /// Translator system name.
        translator: SystemName,
        /// Transport failure description.
        reason: String,
    },

    /// The translator answered with an error status.
    #[error("translator {translator} rejected request with status {status}: {message}")]
    Rejected {
        /// Translator system name.
        translator: SystemName,
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The translator's response could not be interpreted.
    #[error("invalid response from translator {translator}: {reason}")]
    InvalidResponse {
        /// Translator system name.
        translator: SystemName,
        /// Decoding failure description.
        reason: String,
    },
}
