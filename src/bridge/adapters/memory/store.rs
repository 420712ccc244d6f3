//! In-memory bridge state store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, error, warn};

use crate::bridge::{
    domain::{
        AbortOutcome, BridgeDetails, BridgeDiscovery, BridgeHeader, BridgeId,
        BridgeQuery, BridgeRecord, BridgeReport, BridgeStatus, Page, PageRequest,
        ServiceInstanceId, SystemName, TranslationDiscoveryModel,
    },
    ports::{
        BridgeStore, BridgeStoreError, BridgeStoreResult, store::OBSOLETE_DISCOVERY_MESSAGE,
    },
};

/// Thread-safe in-memory bridge store.
///
/// The write half of the lock is the store's serialization point: every
/// mutating operation runs entirely under it.
pub struct InMemoryBridgeStore<C = DefaultClock> {
    state: Arc<RwLock<InMemoryBridgeState>>,
    clock: Arc<C>,
}

#[derive(Debug, Default)]
struct InMemoryBridgeState {
    last_header_id: i64,
    headers: HashMap<BridgeId, BridgeHeader>,
    discoveries: HashMap<BridgeId, Vec<BridgeDiscovery>>,
    details: HashMap<BridgeId, BridgeDetails>,
}

impl InMemoryBridgeStore<DefaultClock> {
    /// Creates an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl Default for InMemoryBridgeStore<DefaultClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InMemoryBridgeStore<C> {
    /// Creates an empty store using `clock` for audit timestamps.
    #[must_use]
    pub fn with_clock(clock: Arc<C>) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryBridgeState::default())),
            clock,
        }
    }
}

impl<C> Clone for InMemoryBridgeStore<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            clock: Arc::clone(&self.clock),
        }
    }
}

fn lock_error(err: impl ToString) -> BridgeStoreError {
    BridgeStoreError::persistence(std::io::Error::other(err.to_string()))
}

#[async_trait]
impl<C> BridgeStore for InMemoryBridgeStore<C>
where
    C: Clock + Send + Sync,
{
    async fn store_discoveries(
        &self,
        bridge_id: BridgeId,
        created_by: &SystemName,
        models: &[TranslationDiscoveryModel],
    ) -> BridgeStoreResult<(BridgeHeader, Vec<BridgeDiscovery>)> {
        let clock = &*self.clock;
        let mut state = self.state.write().map_err(lock_error)?;
        if state.headers.contains_key(&bridge_id) {
            return Err(BridgeStoreError::persistence(std::io::Error::other(
                format!("duplicate bridge id: {bridge_id}"),
            )));
        }

        state.last_header_id += 1;
        let mut header =
            BridgeHeader::new(bridge_id, created_by.clone(), clock).with_id(state.last_header_id);
        let rows: Vec<BridgeDiscovery> = models
            .iter()
            .map(|model| BridgeDiscovery::new(bridge_id, model.clone(), clock))
            .collect();
        header.transition_to(BridgeStatus::Discovered, clock)?;

        state.headers.insert(bridge_id, header.clone());
        state.discoveries.insert(bridge_id, rows.clone());
        Ok((header, rows))
    }

    async fn select_from_discoveries(
        &self,
        bridge_id: BridgeId,
        target: &ServiceInstanceId,
    ) -> BridgeStoreResult<(TranslationDiscoveryModel, BridgeDetails)> {
        let clock = &*self.clock;
        let mut guard = self.state.write().map_err(lock_error)?;
        let state = &mut *guard;

        let header = state
            .headers
            .get_mut(&bridge_id)
            .ok_or(BridgeStoreError::UnknownBridge(bridge_id))?;
        header.ensure_transition(BridgeStatus::Pending)?;

        let model = state
            .discoveries
            .get(&bridge_id)
            .and_then(|rows| {
                rows.iter()
                    .find(|row| &row.model.target_instance_id == target)
            })
            .map(|row| row.model.clone())
            .ok_or_else(|| BridgeStoreError::UnknownTarget {
                bridge_id,
                target: target.clone(),
            })?;

        header.transition_to(BridgeStatus::Pending, clock)?;
        state.discoveries.remove(&bridge_id);
        let details = BridgeDetails::from_model(bridge_id, &model, clock);
        state.details.insert(bridge_id, details.clone());
        Ok((model, details))
    }

    async fn update_details(&self, details: &BridgeDetails) -> BridgeStoreResult<bool> {
        let mut state = self.state.write().map_err(lock_error)?;
        let header = state
            .headers
            .get(&details.bridge_id)
            .ok_or(BridgeStoreError::UnknownBridge(details.bridge_id))?;
        if header.status().is_end() {
            return Ok(true);
        }

        let stored = state
            .details
            .get_mut(&details.bridge_id)
            .ok_or(BridgeStoreError::MissingDetails(details.bridge_id))?;
        *stored = details.clone();
        stored.updated_at = self.clock.utc();
        Ok(false)
    }

    async fn mark_initialized(&self, bridge_id: BridgeId) -> BridgeStoreResult<bool> {
        let mut state = self.state.write().map_err(lock_error)?;
        let header = state
            .headers
            .get_mut(&bridge_id)
            .ok_or(BridgeStoreError::UnknownBridge(bridge_id))?;
        if header.status().is_end() {
            return Ok(true);
        }
        header.transition_to(BridgeStatus::Initialized, &*self.clock)?;
        Ok(false)
    }

    async fn record_problem(&self, bridge_id: BridgeId, message: &str) {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(err) => {
                error!(%bridge_id, error = %err, "failed to record bridge problem");
                return;
            }
        };
        let Some(header) = state.headers.get_mut(&bridge_id) else {
            debug!(%bridge_id, "problem reported for unknown bridge");
            return;
        };
        if let Err(err) =
            header.transition_with_message(BridgeStatus::Error, message, &*self.clock)
        {
            debug!(%bridge_id, error = %err, "bridge problem not recorded");
        }
    }

    async fn abort(
        &self,
        bridge_id: BridgeId,
        required_creator: Option<&SystemName>,
    ) -> BridgeStoreResult<AbortOutcome> {
        let mut guard = self.state.write().map_err(lock_error)?;
        let state = &mut *guard;
        let Some(header) = state.headers.get_mut(&bridge_id) else {
            return Ok(AbortOutcome::unknown());
        };
        if required_creator.is_some_and(|creator| creator != header.created_by()) {
            return Err(BridgeStoreError::AbortForbidden(bridge_id));
        }

        let previous_status = header.status();
        if !previous_status.can_transition_to(BridgeStatus::Aborted) {
            return Ok(AbortOutcome {
                happened: false,
                previous_status: Some(previous_status),
                details: None,
            });
        }

        state.discoveries.remove(&bridge_id);
        header.transition_to(BridgeStatus::Aborted, &*self.clock)?;
        Ok(AbortOutcome {
            happened: true,
            previous_status: Some(previous_status),
            details: state.details.get(&bridge_id).cloned(),
        })
    }

    async fn record_report(&self, report: &BridgeReport) -> BridgeStoreResult<BridgeHeader> {
        let mut guard = self.state.write().map_err(lock_error)?;
        let state = &mut *guard;
        let bridge_id = report.bridge_id;
        let header = state
            .headers
            .get_mut(&bridge_id)
            .ok_or(BridgeStoreError::UnknownBridge(bridge_id))?;
        let details = state
            .details
            .get(&bridge_id)
            .ok_or(BridgeStoreError::UnknownBridge(bridge_id))?;
        if details.interface_translator != report.requester {
            return Err(BridgeStoreError::ReportForbidden {
                bridge_id,
                requester: report.requester.clone(),
            });
        }

        header.apply_report(report, &*self.clock)?;
        Ok(header.clone())
    }

    async fn discoveries_created_before(
        &self,
        threshold: DateTime<Utc>,
    ) -> BridgeStoreResult<Vec<BridgeDiscovery>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .discoveries
            .values()
            .flatten()
            .filter(|row| row.created_at < threshold)
            .cloned()
            .collect())
    }

    async fn close_obsolete(&self, discovery: &BridgeDiscovery) -> BridgeStoreResult<()> {
        let mut guard = self.state.write().map_err(lock_error)?;
        let state = &mut *guard;
        let bridge_id = discovery.bridge_id;

        if let Some(header) = state.headers.get_mut(&bridge_id) {
            let status = header.status();
            if !status.is_active() && !status.is_end() {
                if let Err(err) = header.transition_with_message(
                    BridgeStatus::Closed,
                    OBSOLETE_DISCOVERY_MESSAGE,
                    &*self.clock,
                ) {
                    warn!(%bridge_id, error = %err, "obsolete bridge could not be closed");
                }
            }
        }

        if let Some(rows) = state.discoveries.get_mut(&bridge_id) {
            rows.retain(|row| row.id != discovery.id);
            if rows.is_empty() {
                state.discoveries.remove(&bridge_id);
            }
        }
        Ok(())
    }

    async fn query_details(
        &self,
        query: &BridgeQuery,
        page: PageRequest,
    ) -> BridgeStoreResult<Page<BridgeRecord>> {
        let state = self.state.read().map_err(lock_error)?;
        let records: Vec<BridgeRecord> = state
            .details
            .values()
            .filter_map(|details| {
                state
                    .headers
                    .get(&details.bridge_id)
                    .map(|header| BridgeRecord {
                        header: header.clone(),
                        details: details.clone(),
                    })
            })
            .filter(|record| query.matches(record))
            .collect();
        Ok(page.apply(records))
    }

    async fn find_header(&self, bridge_id: BridgeId) -> BridgeStoreResult<Option<BridgeHeader>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.headers.get(&bridge_id).cloned())
    }

    async fn find_discoveries(
        &self,
        bridge_id: BridgeId,
    ) -> BridgeStoreResult<Vec<BridgeDiscovery>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.discoveries.get(&bridge_id).cloned().unwrap_or_default())
    }

    async fn find_details(&self, bridge_id: BridgeId) -> BridgeStoreResult<Option<BridgeDetails>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.details.get(&bridge_id).cloned())
    }
}
