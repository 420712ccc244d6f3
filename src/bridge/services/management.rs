//! Privileged operations performed on behalf of other systems.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::engine::{DiscoveryResponse, NegotiationEngine};
use super::validation::{
    DiscoveryPayload, QueryPayload, validate_bridge_ids, validate_consumer, validate_discovery,
    validate_query,
};
use super::{BrokerError, BrokerOperation, BrokerResult};
use crate::bridge::{
    domain::{BridgeId, BridgeRecord, Page, SystemName},
    ports::{BridgeStore, CoreSystems, InterfaceTranslatorClient},
};
use crate::config::BrokerConfig;

/// Management discovery, bulk abort and query.
pub struct BridgeManagementService<S, K, T>
where
    S: BridgeStore,
    K: CoreSystems,
    T: InterfaceTranslatorClient,
{
    engine: NegotiationEngine<S, K, T>,
    config: Arc<BrokerConfig>,
}

impl<S, K, T> BridgeManagementService<S, K, T>
where
    S: BridgeStore,
    K: CoreSystems,
    T: InterfaceTranslatorClient,
{
    /// Creates the service.
    #[must_use]
    pub const fn new(engine: NegotiationEngine<S, K, T>, config: Arc<BrokerConfig>) -> Self {
        Self { engine, config }
    }

    /// Discovers bridges for the payload's consumer; `requester` becomes the
    /// creator. Requested flags are capped by the system settings.
    ///
    /// # Errors
    ///
    /// Returns an invalid-parameter error for malformed payloads and
    /// propagates engine errors.
    pub async fn discovery(
        &self,
        requester: &SystemName,
        payload: DiscoveryPayload,
    ) -> BrokerResult<DiscoveryResponse> {
        let tagged = |err: BrokerError| err.with_origin(BrokerOperation::Discovery);
        let consumer = validate_consumer(&payload).map_err(tagged)?;
        let flags = self.config.effective_discovery_flags(payload.flags);
        let request = validate_discovery(payload, requester, consumer, flags).map_err(tagged)?;
        self.engine.discover(&request).await
    }

    /// Aborts every listed bridge regardless of its creator.
    ///
    /// # Errors
    ///
    /// Returns an invalid-parameter error for malformed ids and an internal
    /// error when the store fails.
    pub async fn abort(&self, bridge_ids: &[String]) -> BrokerResult<BTreeMap<BridgeId, bool>> {
        let parsed = validate_bridge_ids(bridge_ids)
            .map_err(|err| err.with_origin(BrokerOperation::Abort))?;
        self.engine.abort(&parsed, None).await
    }

    /// Returns one page of negotiated bridges matching the payload.
    ///
    /// # Errors
    ///
    /// Returns an invalid-parameter error for malformed filters and an
    /// internal error when the store fails.
    pub async fn query(&self, payload: &QueryPayload) -> BrokerResult<Page<BridgeRecord>> {
        let tagged = |err: BrokerError| err.with_origin(BrokerOperation::Query);
        let (query, page) = validate_query(payload, self.config.max_page_size).map_err(tagged)?;
        self.engine
            .store()
            .query_details(&query, page)
            .await
            .map_err(|err| tagged(err.into()))
    }
}
