//! Operations consumers call for themselves.

use std::sync::Arc;
use tracing::debug;

use super::engine::{DiscoveryResponse, NegotiationEngine, NegotiationResponse};
use super::validation::{
    DiscoveryPayload, NegotiationPayload, NegotiationPlan, validate_discovery,
    validate_negotiation,
};
use super::{BrokerError, BrokerOperation, BrokerResult};
use crate::bridge::{
    domain::{BridgeId, DiscoveryFlags, SystemName},
    ports::{BridgeStore, CoreSystems, InterfaceTranslatorClient},
};
use crate::config::BrokerConfig;

/// Self-service bridge operations: the requester is the consumer.
pub struct BridgeService<S, K, T>
where
    S: BridgeStore,
    K: CoreSystems,
    T: InterfaceTranslatorClient,
{
    engine: NegotiationEngine<S, K, T>,
    config: Arc<BrokerConfig>,
}

impl<S, K, T> BridgeService<S, K, T>
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

    fn flags(&self) -> DiscoveryFlags {
        DiscoveryFlags {
            consumer_blacklist_check: false,
            ..self.config.default_discovery_flags()
        }
    }

    /// Discovers bridges for `requester`.
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
        let request = validate_discovery(payload, requester, requester.clone(), self.flags())
            .map_err(|err| err.with_origin(BrokerOperation::Discovery))?;
        self.engine.discover(&request).await
    }

    /// Negotiates a bridge, discovering inline when the payload carries no
    /// bridge id.
    ///
    /// Returns the all-empty response when the inline discovery finds
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns an invalid-parameter error for malformed payloads and
    /// propagates engine errors.
    pub async fn negotiation(
        &self,
        requester: &SystemName,
        payload: NegotiationPayload,
    ) -> BrokerResult<NegotiationResponse> {
        let plan = validate_negotiation(payload, requester, self.flags())
            .map_err(|err| err.with_origin(BrokerOperation::Negotiation))?;
        match plan {
            NegotiationPlan::Prepared { bridge_id, target } => {
                self.engine.negotiate(bridge_id, &target).await
            }
            NegotiationPlan::Inline(request) => {
                let discovered = self.engine.discover(&request).await?;
                let (Some(bridge_id), Some(candidate)) =
                    (discovered.bridge_id, discovered.candidates.first())
                else {
                    debug!(requester = %requester, "inline discovery found no bridge");
                    return Ok(NegotiationResponse::empty());
                };
                self.engine
                    .negotiate(bridge_id, &candidate.target_instance_id)
                    .await
            }
        }
    }

    /// Aborts a bridge `requester` created.
    ///
    /// Returns `false` for unknown bridges.
    ///
    /// # Errors
    ///
    /// Returns an invalid-parameter error for malformed ids and a forbidden
    /// error when `requester` did not create the bridge.
    pub async fn abort(&self, requester: &SystemName, bridge_id: &str) -> BrokerResult<bool> {
        let parsed = BridgeId::parse(bridge_id)
            .map_err(|err| BrokerError::from(err).with_origin(BrokerOperation::Abort))?;
        let results = self.engine.abort(&[parsed], Some(requester)).await?;
        Ok(results.get(&parsed).copied().unwrap_or_default())
    }
}
