//! Error types for bridge domain validation and parsing.

use super::BridgeStatus;
use thiserror::Error;

/// Errors returned while constructing or mutating bridge domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeDomainError {
    /// The bridge identifier is not a valid UUID.
    #[error("invalid bridge identifier: {0}")]
    InvalidBridgeId(String),

    /// The system name does not follow the system naming convention.
    #[error("invalid system name: '{0}'")]
    InvalidSystemName(String),

    /// The service definition name does not follow the naming convention.
    #[error("invalid service definition name: '{0}'")]
    InvalidServiceDefinition(String),

    /// The operation name does not follow the kebab-case convention.
    #[error("invalid operation name: '{0}'")]
    InvalidOperation(String),

    /// The interface template name does not follow the snake_case convention.
    #[error("invalid interface template name: '{0}'")]
    InvalidInterfaceTemplate(String),

    /// The data model identifier contains unsupported characters.
    #[error("invalid data model identifier: '{0}'")]
    InvalidDataModelId(String),

    /// The service instance identifier is not `Provider|serviceDefinition|version`.
    #[error("invalid service instance identifier: '{0}'")]
    InvalidInstanceId(String),

    /// The interface policy is unknown.
    #[error("unknown interface policy: {0}")]
    UnknownInterfacePolicy(String),

    /// The report event state is unknown.
    #[error("unknown bridge event state: {0}")]
    UnknownEventState(String),

    /// The requested lifecycle transition is not permitted.
    #[error("invalid bridge status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: BridgeStatus,
        /// Requested status.
        to: BridgeStatus,
    },
}

/// Error returned while parsing bridge statuses from persistence or requests.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown bridge status: {0}")]
pub struct ParseBridgeStatusError(pub String);
