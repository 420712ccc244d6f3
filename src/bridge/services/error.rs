//! Caller-facing errors of the broker services.

use crate::bridge::{
    domain::BridgeDomainError,
    ports::{BridgeStoreError, CoreSystemsError, FactoryError, TranslatorClientError},
};
use std::fmt;
use thiserror::Error;

/// Result type for broker service operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Broker operation an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerOperation {
    /// Candidate discovery.
    Discovery,
    /// Bridge negotiation.
    Negotiation,
    /// Bridge abort.
    Abort,
    /// Translator report.
    Report,
    /// Bridge query.
    Query,
    /// Stale discovery cleanup.
    Cleanup,
}

impl BrokerOperation {
    /// Returns the operation name used in logs and error messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discovery => "discovery",
            Self::Negotiation => "negotiation",
            Self::Abort => "abort",
            Self::Report => "report",
            Self::Query => "query",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for BrokerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a broker error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrokerErrorKind {
    /// The request is malformed or asks for an illegal transition.
    InvalidParameter,
    /// The caller is not allowed to do what it asked.
    Forbidden,
    /// The request names a bridge or target that does not exist.
    InvalidReference,
    /// A required remote service failed.
    ExternalService,
    /// Unexpected failure, typically persistence.
    Internal,
}

/// Error reported to broker callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct BrokerError {
    kind: BrokerErrorKind,
    message: String,
    origin: Option<BrokerOperation>,
}

impl BrokerError {
    /// Creates an error of `kind`.
    #[must_use]
    pub fn new(kind: BrokerErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            origin: None,
        }
    }

    /// Creates an [`BrokerErrorKind::InvalidParameter`] error.
    #[must_use]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorKind::InvalidParameter, message)
    }

    /// Creates a [`BrokerErrorKind::Forbidden`] error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorKind::Forbidden, message)
    }

    /// Creates an [`BrokerErrorKind::ExternalService`] error.
    #[must_use]
    pub fn external_service(message: impl Into<String>) -> Self {
        Self::new(BrokerErrorKind::ExternalService, message)
    }

    /// Tags the error with the operation it surfaced from, keeping an
    /// earlier tag.
    #[must_use]
    pub fn with_origin(mut self, origin: BrokerOperation) -> Self {
        self.origin.get_or_insert(origin);
        self
    }

    /// Returns the error category.
    #[must_use]
    pub const fn kind(&self) -> BrokerErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the originating operation, when tagged.
    #[must_use]
    pub const fn origin(&self) -> Option<BrokerOperation> {
        self.origin
    }
}

impl From<BridgeDomainError> for BrokerError {
    fn from(err: BridgeDomainError) -> Self {
        Self::invalid_parameter(err.to_string())
    }
}

impl From<BridgeStoreError> for BrokerError {
    fn from(err: BridgeStoreError) -> Self {
        let kind = match &err {
            BridgeStoreError::UnknownBridge(_)
            | BridgeStoreError::UnknownTarget { .. }
            | BridgeStoreError::MissingDetails(_) => BrokerErrorKind::InvalidReference,
            BridgeStoreError::Transition(_) => BrokerErrorKind::InvalidParameter,
            BridgeStoreError::AbortForbidden(_) | BridgeStoreError::ReportForbidden { .. } => {
                BrokerErrorKind::Forbidden
            }
            BridgeStoreError::Persistence(_) => BrokerErrorKind::Internal,
        };
        Self::new(kind, err.to_string())
    }
}

impl From<CoreSystemsError> for BrokerError {
    fn from(err: CoreSystemsError) -> Self {
        Self::external_service(err.to_string())
    }
}

impl From<TranslatorClientError> for BrokerError {
    fn from(err: TranslatorClientError) -> Self {
        Self::external_service(err.to_string())
    }
}

impl From<FactoryError> for BrokerError {
    fn from(err: FactoryError) -> Self {
        Self::external_service(err.to_string())
    }
}
