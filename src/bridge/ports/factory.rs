//! Data model translator factory port.
//!
//! Factories instantiate data model translators on demand when no running
//! translator supports a required data model pair. The engine treats an
//! absent factory as "unavailable".

use crate::bridge::domain::{DataModelId, DataModelTranslatorChoice, SystemName};
use async_trait::async_trait;
use thiserror::Error;

/// Result type for factory operations.
pub type FactoryResult<T> = Result<T, FactoryError>;

/// On-demand data model translator provisioning.
#[async_trait]
pub trait DataModelTranslatorFactory: Send + Sync {
    /// Returns a factory-backed translator placeholder for `from -> to`, when
    /// a factory can produce one.
    ///
    /// # Errors
    ///
    /// Returns a [`FactoryError`] when the factory lookup fails.
    async fn find(
        &self,
        from: &DataModelId,
        to: &DataModelId,
    ) -> FactoryResult<Option<DataModelTranslatorChoice>>;

    /// Instantiates the translator announced by `placeholder`.
    ///
    /// # Errors
    ///
    /// Returns a [`FactoryError`] when instantiation fails.
    async fn instantiate(
        &self,
        placeholder: &DataModelTranslatorChoice,
        from: &DataModelId,
        to: &DataModelId,
    ) -> FactoryResult<DataModelTranslatorChoice>;
}

/// Errors returned by factory implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FactoryError {
    /// The factory could not produce a translator.
    #[error("factory {factory} failed: {reason}")]
    Failed {
        /// Factory system name.
        factory: SystemName,
        /// Failure description.
        reason: String,
    },
}
