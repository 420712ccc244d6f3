//! In-memory interface translators.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Notify;

use crate::bridge::{
    domain::{
        BridgeId, InterfacePolicy, Metadata, OperationName, ServiceInstance, ServiceInstanceId,
        ServiceInterface, SystemName,
    },
    ports::{
        BridgeInitializationRequest, InterfaceTranslatorClient, TranslatorAccess,
        TranslatorClientError, TranslatorClientResult,
    },
};

/// Pauses bridge initialization until the test releases it.
#[derive(Debug, Clone, Default)]
pub struct InitializationGate {
    started: Arc<Notify>,
    release: Arc<Notify>,
}

impl InitializationGate {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until an initialization call reached the gate.
    pub async fn wait_until_reached(&self) {
        self.started.notified().await;
    }

    /// Lets the paused initialization call continue.
    pub fn open(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        self.started.notify_one();
        self.release.notified().await;
    }
}

/// Thread-safe in-memory [`InterfaceTranslatorClient`].
///
/// Translators confirm every target and initialize every bridge unless told
/// otherwise. Calls are recorded for inspection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTranslatorClient {
    state: Arc<RwLock<TranslatorState>>,
}

#[derive(Debug, Default)]
struct TranslatorState {
    reachable: HashMap<SystemName, HashSet<ServiceInstanceId>>,
    unreachable: HashSet<SystemName>,
    failing_initialization: HashSet<SystemName>,
    gate: Option<InitializationGate>,
    checked: Vec<(SystemName, Option<String>)>,
    initialized: Vec<(SystemName, BridgeInitializationRequest)>,
    aborted: Vec<(SystemName, BridgeId)>,
}

fn lock_error(translator: &SystemName, err: impl ToString) -> TranslatorClientError {
    TranslatorClientError::Unreachable {
        translator: translator.clone(),
        reason: err.to_string(),
    }
}

impl InMemoryTranslatorClient {
    /// Creates translators that accept everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, apply: impl FnOnce(&mut TranslatorState)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut state);
    }

    fn read<T>(&self, inspect: impl FnOnce(&TranslatorState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        inspect(&state)
    }

    /// Restricts `translator` to confirming only `targets`.
    pub fn restrict_targets(&self, translator: &SystemName, targets: &[ServiceInstanceId]) {
        self.update(|state| {
            state
                .reachable
                .insert(translator.clone(), targets.iter().cloned().collect());
        });
    }

    /// Makes every call to `translator` fail as unreachable.
    pub fn make_unreachable(&self, translator: &SystemName) {
        self.update(|state| {
            state.unreachable.insert(translator.clone());
        });
    }

    /// Makes bridge initialization on `translator` fail.
    pub fn fail_initialization(&self, translator: &SystemName) {
        self.update(|state| {
            state.failing_initialization.insert(translator.clone());
        });
    }

    /// Pauses every subsequent initialization at `gate`.
    pub fn pause_initialization(&self, gate: InitializationGate) {
        self.update(|state| state.gate = Some(gate));
    }

    /// Returns the translators asked to check targets, with the token used.
    #[must_use]
    pub fn checked(&self) -> Vec<(SystemName, Option<String>)> {
        self.read(|state| state.checked.clone())
    }

    /// Returns the initialization requests received so far.
    #[must_use]
    pub fn initialized(&self) -> Vec<(SystemName, BridgeInitializationRequest)> {
        self.read(|state| state.initialized.clone())
    }

    /// Returns the abort requests received so far.
    #[must_use]
    pub fn aborted(&self) -> Vec<(SystemName, BridgeId)> {
        self.read(|state| state.aborted.clone())
    }

    fn ensure_reachable(&self, translator: &SystemName) -> TranslatorClientResult<()> {
        let unreachable = self
            .state
            .read()
            .map_err(|err| lock_error(translator, err))?
            .unreachable
            .contains(translator);
        if unreachable {
            return Err(TranslatorClientError::Unreachable {
                translator: translator.clone(),
                reason: "connection refused".to_owned(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl InterfaceTranslatorClient for InMemoryTranslatorClient {
    async fn check_targets(
        &self,
        access: &TranslatorAccess,
        _operation: &OperationName,
        targets: &[ServiceInstance],
    ) -> TranslatorClientResult<Vec<ServiceInstance>> {
        self.ensure_reachable(&access.name)?;
        let mut state = self
            .state
            .write()
            .map_err(|err| lock_error(&access.name, err))?;
        state
            .checked
            .push((access.name.clone(), access.token.clone()));
        Ok(state.reachable.get(&access.name).map_or_else(
            || targets.to_vec(),
            |reachable| {
                targets
                    .iter()
                    .filter(|target| reachable.contains(&target.instance_id))
                    .cloned()
                    .collect()
            },
        ))
    }

    async fn initialize_bridge(
        &self,
        access: &TranslatorAccess,
        request: &BridgeInitializationRequest,
    ) -> TranslatorClientResult<ServiceInterface> {
        self.ensure_reachable(&access.name)?;
        let (paused_at, failing) = {
            let mut state = self
                .state
                .write()
                .map_err(|err| lock_error(&access.name, err))?;
            state
                .initialized
                .push((access.name.clone(), request.clone()));
            (
                state.gate.clone(),
                state.failing_initialization.contains(&access.name),
            )
        };
        if let Some(gate) = paused_at {
            gate.pass().await;
        }
        if failing {
            return Err(TranslatorClientError::Rejected {
                translator: access.name.clone(),
                status: 500,
                message: "bridge initialization failed".to_owned(),
            });
        }
        let properties = Metadata::new()
            .with("bridgeId", request.bridge_id.to_string())
            .with("translator", access.name.as_str());
        Ok(
            ServiceInterface::new(request.input_interface.clone(), InterfacePolicy::None)
                .with_properties(properties),
        )
    }

    async fn abort_bridge(
        &self,
        access: &TranslatorAccess,
        bridge_id: BridgeId,
    ) -> TranslatorClientResult<()> {
        self.ensure_reachable(&access.name)?;
        let mut state = self
            .state
            .write()
            .map_err(|err| lock_error(&access.name, err))?;
        state.aborted.push((access.name.clone(), bridge_id));
        Ok(())
    }
}
