//! In-memory core systems: a registry, a blacklist and an authorization table
//! held in process.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::bridge::{
    domain::{
        InterfaceTemplateName, OperationName, ServiceDefinitionName, ServiceInstance, SystemName,
        TranslationDiscoveryModel,
    },
    ports::{
        BlacklistPolicy, CoreSystems, CoreSystemsError, CoreSystemsResult, TargetTokenRequest,
        TranslatorLookup, core_systems::token_requiring_translators,
    },
};

/// Thread-safe in-memory [`CoreSystems`] implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCoreSystems {
    state: Arc<RwLock<CoreSystemsState>>,
    policy: BlacklistPolicy,
    certificate_authentication: bool,
}

#[derive(Debug, Default)]
struct CoreSystemsState {
    registry: Vec<ServiceInstance>,
    blacklisted: HashSet<SystemName>,
    blacklist_failure: Option<CoreSystemsError>,
    denials: HashSet<(SystemName, SystemName, ServiceDefinitionName)>,
    configurations: HashMap<SystemName, Map<String, Value>>,
    issued_target_tokens: Vec<TargetTokenRequest>,
    management_token_batches: usize,
}

fn lock_error(err: impl ToString) -> CoreSystemsError {
    CoreSystemsError::Unavailable(err.to_string())
}

impl InMemoryCoreSystems {
    /// Creates empty core systems with a fail-open blacklist.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how blacklist outages are resolved.
    #[must_use]
    pub fn with_blacklist_policy(mut self, policy: BlacklistPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Accepts certificate-authenticated data model translators.
    #[must_use]
    pub const fn with_certificate_authentication(mut self, enabled: bool) -> Self {
        self.certificate_authentication = enabled;
        self
    }

    /// Registers a service instance.
    ///
    /// # Errors
    ///
    /// Returns [`CoreSystemsError::Unavailable`] when the state lock is poisoned.
    pub fn register(&self, instance: ServiceInstance) -> CoreSystemsResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.registry.push(instance);
        Ok(())
    }

    /// Adds `system` to the blacklist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreSystemsError::Unavailable`] when the state lock is poisoned.
    pub fn blacklist(&self, system: &SystemName) -> CoreSystemsResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.blacklisted.insert(system.clone());
        Ok(())
    }

    /// Makes every subsequent blacklist lookup fail with `failure`; `None`
    /// restores the blacklist.
    ///
    /// # Errors
    ///
    /// Returns [`CoreSystemsError::Unavailable`] when the state lock is poisoned.
    pub fn fail_blacklist(&self, failure: Option<CoreSystemsError>) -> CoreSystemsResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.blacklist_failure = failure;
        Ok(())
    }

    /// Denies `consumer` access to `provider`'s `service_definition`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreSystemsError::Unavailable`] when the state lock is poisoned.
    pub fn deny(
        &self,
        consumer: &SystemName,
        provider: &SystemName,
        service_definition: &ServiceDefinitionName,
    ) -> CoreSystemsResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.denials.insert((
            consumer.clone(),
            provider.clone(),
            service_definition.clone(),
        ));
        Ok(())
    }

    /// Stores operator settings for `system`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreSystemsError::Unavailable`] when the state lock is poisoned.
    pub fn configure(
        &self,
        system: &SystemName,
        settings: Map<String, Value>,
    ) -> CoreSystemsResult<()> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.configurations.insert(system.clone(), settings);
        Ok(())
    }

    /// Returns the target token requests served so far.
    ///
    /// # Errors
    ///
    /// Returns [`CoreSystemsError::Unavailable`] when the state lock is poisoned.
    pub fn issued_target_tokens(&self) -> CoreSystemsResult<Vec<TargetTokenRequest>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.issued_target_tokens.clone())
    }

    /// Returns how many bulk management token requests were served.
    ///
    /// # Errors
    ///
    /// Returns [`CoreSystemsError::Unavailable`] when the state lock is poisoned.
    pub fn management_token_batches(&self) -> CoreSystemsResult<usize> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.management_token_batches)
    }

    fn lookup(&self, lookup: &TranslatorLookup) -> CoreSystemsResult<Vec<ServiceInstance>> {
        if lookup.is_void() {
            return Ok(Vec::new());
        }
        let state = self.state.read().map_err(lock_error)?;
        Ok(state
            .registry
            .iter()
            .filter(|instance| lookup.matches(instance))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CoreSystems for InMemoryCoreSystems {
    async fn filter_out_blacklisted(
        &self,
        names: &[SystemName],
    ) -> CoreSystemsResult<Vec<SystemName>> {
        let to_check = self.policy.names_to_check(names);
        if to_check.is_empty() {
            return Ok(names.to_vec());
        }
        let state = self.state.read().map_err(lock_error)?;
        if let Some(failure) = &state.blacklist_failure {
            return self.policy.on_failure(names, failure.clone());
        }
        let blacklisted: HashSet<SystemName> = to_check
            .into_iter()
            .filter(|name| state.blacklisted.contains(name))
            .collect();
        Ok(BlacklistPolicy::retain_allowed(names, &blacklisted))
    }

    async fn filter_unauthorized_providers(
        &self,
        providers: &[SystemName],
        consumer: &SystemName,
        service_definition: &ServiceDefinitionName,
        _operation: Option<&OperationName>,
    ) -> CoreSystemsResult<Vec<SystemName>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(providers
            .iter()
            .filter(|provider| {
                !state.denials.contains(&(
                    consumer.clone(),
                    (*provider).clone(),
                    service_definition.clone(),
                ))
            })
            .cloned()
            .collect())
    }

    async fn generate_management_tokens(
        &self,
        translators: &[ServiceInstance],
    ) -> CoreSystemsResult<HashMap<SystemName, String>> {
        let needed = token_requiring_translators(translators);
        if needed.is_empty() {
            return Ok(HashMap::new());
        }
        let mut state = self.state.write().map_err(lock_error)?;
        state.management_token_batches += 1;
        Ok(needed
            .into_iter()
            .map(|(name, policy)| {
                let token = format!("management-{}-{name}", policy.as_str().to_lowercase());
                (name, token)
            })
            .collect())
    }

    async fn generate_target_token(
        &self,
        request: &TargetTokenRequest,
    ) -> CoreSystemsResult<Option<String>> {
        if !request.policy.requires_token() {
            return Ok(None);
        }
        let mut state = self.state.write().map_err(lock_error)?;
        state.issued_target_tokens.push(request.clone());
        Ok(Some(format!(
            "target-{}-{}-{}",
            request.consumer, request.provider, request.operation
        )))
    }

    async fn lookup_interface_translators(
        &self,
        consumer_templates: &[InterfaceTemplateName],
        targets: &[ServiceInstance],
    ) -> CoreSystemsResult<Vec<ServiceInstance>> {
        self.lookup(&TranslatorLookup::interface_translators(
            consumer_templates,
            targets,
        ))
    }

    async fn lookup_data_model_translators(
        &self,
        models: &[TranslationDiscoveryModel],
    ) -> CoreSystemsResult<Vec<ServiceInstance>> {
        self.lookup(&TranslatorLookup::data_model_translators(
            models,
            self.certificate_authentication,
        ))
    }

    async fn custom_configuration(
        &self,
        system: &SystemName,
    ) -> CoreSystemsResult<Option<Map<String, Value>>> {
        let state = self.state.read().map_err(lock_error)?;
        Ok(state.configurations.get(system).cloned())
    }
}
