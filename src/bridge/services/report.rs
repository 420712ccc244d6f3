//! Lifecycle reports from interface translators.

use mockable::Clock;
use std::sync::Arc;
use tracing::info;

use super::validation::{ReportPayload, validate_report};
use super::{BrokerError, BrokerOperation, BrokerResult};
use crate::bridge::{
    domain::{BridgeHeader, SystemName},
    ports::BridgeStore,
};

/// Applies translator reports to bridge headers.
#[derive(Clone)]
pub struct BridgeReportService<S, C>
where
    S: BridgeStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
}

impl<S, C> BridgeReportService<S, C>
where
    S: BridgeStore,
    C: Clock + Send + Sync,
{
    /// Creates a report service.
    #[must_use]
    pub const fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self { store, clock }
    }

    /// Validates and applies a report sent by `requester`.
    ///
    /// # Errors
    ///
    /// Returns an invalid-parameter error for malformed reports or illegal
    /// transitions, a forbidden error when `requester` is not the bridge's
    /// interface translator, and an invalid-reference error for unknown
    /// bridges.
    pub async fn report(
        &self,
        requester: &SystemName,
        payload: ReportPayload,
    ) -> BrokerResult<BridgeHeader> {
        let tagged = |err: BrokerError| err.with_origin(BrokerOperation::Report);
        let report = validate_report(payload, requester, self.clock.utc()).map_err(tagged)?;
        let header = self
            .store
            .record_report(&report)
            .await
            .map_err(|err| tagged(err.into()))?;
        info!(
            bridge_id = %report.bridge_id,
            state = %report.state,
            usage = header.usage_report_count(),
            "applied bridge report"
        );
        Ok(header)
    }
}
