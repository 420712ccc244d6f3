//! Bridge state store port: the only component that mutates bridge status.

use crate::bridge::domain::{
    AbortOutcome, BridgeDetails, BridgeDiscovery, BridgeDomainError, BridgeHeader, BridgeId,
    BridgeQuery, BridgeRecord, BridgeReport, Page, PageRequest, ServiceInstanceId, SystemName,
    TranslationDiscoveryModel,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for bridge store operations.
pub type BridgeStoreResult<T> = Result<T, BridgeStoreError>;

/// Message recorded on discovered bridges closed by the cleaner.
pub const OBSOLETE_DISCOVERY_MESSAGE: &str = "Closed because of inactivity";

/// Durable bridge lifecycle storage.
///
/// Every mutating operation is one atomic unit. Implementations serialize
/// mutations so that no caller observes a header whose status disagrees with
/// its discovery and details rows.
#[async_trait]
pub trait BridgeStore: Send + Sync {
    /// Creates the header, stores one discovery row per model and moves the
    /// header to `DISCOVERED`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::Persistence`] when storage fails.
    async fn store_discoveries(
        &self,
        bridge_id: BridgeId,
        created_by: &SystemName,
        models: &[TranslationDiscoveryModel],
    ) -> BridgeStoreResult<(BridgeHeader, Vec<BridgeDiscovery>)>;

    /// Selects the candidate for `target`, moves the header to `PENDING`,
    /// drops every discovery row and creates the details row.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::UnknownBridge`] for unknown bridges,
    /// [`BridgeStoreError::Transition`] when the header cannot become
    /// `PENDING`, and [`BridgeStoreError::UnknownTarget`] when `target` was not
    /// a candidate.
    async fn select_from_discoveries(
        &self,
        bridge_id: BridgeId,
        target: &ServiceInstanceId,
    ) -> BridgeStoreResult<(TranslationDiscoveryModel, BridgeDetails)>;

    /// Persists translator settings onto the details row.
    ///
    /// Returns `true`, without writing, when the header already reached an
    /// end state.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::UnknownBridge`] or
    /// [`BridgeStoreError::MissingDetails`] when there is nothing to update.
    async fn update_details(&self, details: &BridgeDetails) -> BridgeStoreResult<bool>;

    /// Moves the header from `PENDING` to `INITIALIZED`.
    ///
    /// Returns `true` when the header already reached an end state.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::Transition`] when the header is in any
    /// other state.
    async fn mark_initialized(&self, bridge_id: BridgeId) -> BridgeStoreResult<bool>;

    /// Moves the header to `ERROR` with `message` when that is still legal.
    ///
    /// Never fails; storage problems are logged.
    async fn record_problem(&self, bridge_id: BridgeId, message: &str);

    /// Aborts a bridge.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::AbortForbidden`] when `required_creator` is
    /// given and differs from the bridge creator.
    async fn abort(
        &self,
        bridge_id: BridgeId,
        required_creator: Option<&SystemName>,
    ) -> BridgeStoreResult<AbortOutcome>;

    /// Applies a translator report and returns the updated header.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::UnknownBridge`] when the bridge or its
    /// details are unknown, [`BridgeStoreError::ReportForbidden`] when the
    /// requester is not the bridge's interface translator, and
    /// [`BridgeStoreError::Transition`] when the bridge is not active or the
    /// reported state is unreachable.
    async fn record_report(&self, report: &BridgeReport) -> BridgeStoreResult<BridgeHeader>;

    /// Returns discovery rows created before `threshold`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::Persistence`] when storage fails.
    async fn discoveries_created_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> BridgeStoreResult<Vec<BridgeDiscovery>>;

    /// Closes the header of an obsolete discovery row unless it is active or
    /// ended, then deletes the row.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::Persistence`] when storage fails.
    async fn close_obsolete(&self, discovery: &BridgeDiscovery) -> BridgeStoreResult<()>;

    /// Returns one page of negotiated bridges matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::Persistence`] when storage fails.
    async fn query_details(
        &self,
        query: &BridgeQuery,
        page: PageRequest,
    ) -> BridgeStoreResult<Page<BridgeRecord>>;

    /// Finds a header by bridge identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::Persistence`] when storage fails.
    async fn find_header(&self, bridge_id: BridgeId) -> BridgeStoreResult<Option<BridgeHeader>>;

    /// Returns the discovery rows of a bridge.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::Persistence`] when storage fails.
    async fn find_discoveries(
        &self,
        bridge_id: BridgeId,
    ) -> BridgeStoreResult<Vec<BridgeDiscovery>>;

    /// Returns the details row of a bridge.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeStoreError::Persistence`] when storage fails.
    async fn find_details(&self, bridge_id: BridgeId) -> BridgeStoreResult<Option<BridgeDetails>>;
}

/// Errors returned by bridge store implementations.
#[derive(Debug, Clone, Error)]
pub enum BridgeStoreError {
    /// No header exists for the bridge identifier.
    #[error("invalid bridge id: {0}")]
    UnknownBridge(BridgeId),

    /// The target was not among the bridge's discovery candidates.
    #[error("invalid bridge identifier: {target} is not a candidate of bridge {bridge_id}")]
    UnknownTarget {
        /// Bridge identifier.
        bridge_id: BridgeId,
        /// Requested target instance.
        target: ServiceInstanceId,
    },

    /// The bridge has no details row.
    #[error("bridge {0} has not been negotiated")]
    MissingDetails(BridgeId),

    /// The requested status change is illegal.
    #[error(transparent)]
    Transition(#[from] BridgeDomainError),

    /// The requester did not create the bridge.
    #[error("no permission to abort bridge: {0}")]
    AbortForbidden(BridgeId),

    /// The reporting system is not the bridge's interface translator.
    #[error("{requester} is not the interface translator of bridge {bridge_id}")]
    ReportForbidden {
        /// Bridge identifier.
        bridge_id: BridgeId,
        /// Reporting system.
        requester: SystemName,
    },

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl BridgeStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
