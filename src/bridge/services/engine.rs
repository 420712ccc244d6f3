//! Discovery, negotiation and abort orchestration.
//!
//! The engine coordinates the core systems, the interface translators and
//! the bridge store. Every status change goes through the store; the engine
//! only decides which change to ask for and which remote calls compensate
//! for a lost race.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::candidates::{
    Confirmation, ConsumerProfile, assemble_model, bridges_into, filter_interfaces, providers_of,
    selection_context,
};
use super::{BrokerError, BrokerOperation, BrokerResult};
use crate::bridge::{
    adapters::matchmaking::RandomMatchmaker,
    domain::{
        AbortOutcome, BridgeDetails, BridgeId, BridgeStatus, DataModelId,
        DataModelTranslationDescriptor, DataModelTranslatorChoice, DiscoveryFlags,
        InterfaceTemplateName, InterfaceTranslationDescriptor, OperationName,
        ServiceDefinitionName, ServiceInstance, ServiceInstanceId, ServiceInterface, SystemName,
        TranslationDiscoveryModel,
    },
    ports::{
        BridgeInitializationRequest, BridgeStore, CoreSystems, DataModelTranslatorFactory,
        InterfaceTranslatorClient, Matchmaker, TargetTokenRequest, TranslatorAccess,
        core_systems::DATA_MODEL_TRANSLATION_SERVICE,
    },
};

const ALREADY_ENDED_MESSAGE: &str = "Bridge is already in an end state";

/// Input of a discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryRequest {
    /// System asking for the discovery; recorded as the bridge creator.
    pub requester: SystemName,
    /// System that will call the bridge.
    pub consumer: SystemName,
    /// Target candidates with their declared interfaces.
    pub candidates: Vec<ServiceInstance>,
    /// Target operation.
    pub operation: OperationName,
    /// Interface templates the consumer accepts.
    pub interface_templates: Vec<InterfaceTemplateName>,
    /// Data model of the request payload, if any.
    pub input_data_model: Option<DataModelId>,
    /// Data model the consumer expects back, if any.
    pub output_data_model: Option<DataModelId>,
    /// Security checks to run.
    pub flags: DiscoveryFlags,
}

impl DiscoveryRequest {
    fn profile(&self) -> ConsumerProfile<'_> {
        ConsumerProfile {
            consumer: &self.consumer,
            operation: &self.operation,
            templates: &self.interface_templates,
            input: self.input_data_model.as_ref(),
            output: self.output_data_model.as_ref(),
        }
    }
}

/// One target a discovery found a bridge for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredCandidate {
    /// Registry identifier of the target.
    pub target_instance_id: ServiceInstanceId,
    /// Interface template the consumer has to use.
    pub interface_template: InterfaceTemplateName,
}

/// Result of a discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResponse {
    /// Identifier of the stored candidate set; `None` when nothing matched.
    pub bridge_id: Option<BridgeId>,
    /// Targets reachable through a bridge.
    pub candidates: Vec<DiscoveredCandidate>,
}

impl DiscoveryResponse {
    /// The "no match" response.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            bridge_id: None,
            candidates: Vec::new(),
        }
    }
}

/// Result of a negotiation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResponse {
    /// The initialized bridge.
    pub bridge_id: Option<BridgeId>,
    /// Interface the consumer has to call.
    pub interface: Option<ServiceInterface>,
}

impl NegotiationResponse {
    /// The response of a negotiation that found no bridge.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            bridge_id: None,
            interface: None,
        }
    }
}

fn nothing_found(stage: &str) -> DiscoveryResponse {
    debug!(stage, "discovery found no candidates");
    DiscoveryResponse::empty()
}

fn already_ended() -> BrokerError {
    BrokerError::invalid_parameter(ALREADY_ENDED_MESSAGE)
}

/// Orchestrates discovery, negotiation and abort.
pub struct NegotiationEngine<S, K, T>
where
    S: BridgeStore,
    K: CoreSystems,
    T: InterfaceTranslatorClient,
{
    store: Arc<S>,
    core: Arc<K>,
    translators: Arc<T>,
    interface_matchmaker: Arc<dyn Matchmaker>,
    data_model_matchmaker: Arc<dyn Matchmaker>,
    factory: Option<Arc<dyn DataModelTranslatorFactory>>,
    custom_configuration_enabled: bool,
}

impl<S, K, T> Clone for NegotiationEngine<S, K, T>
where
    S: BridgeStore,
    K: CoreSystems,
    T: InterfaceTranslatorClient,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            core: Arc::clone(&self.core),
            translators: Arc::clone(&self.translators),
            interface_matchmaker: Arc::clone(&self.interface_matchmaker),
            data_model_matchmaker: Arc::clone(&self.data_model_matchmaker),
            factory: self.factory.clone(),
            custom_configuration_enabled: self.custom_configuration_enabled,
        }
    }
}

impl<S, K, T> NegotiationEngine<S, K, T>
where
    S: BridgeStore,
    K: CoreSystems,
    T: InterfaceTranslatorClient,
{
    /// Creates an engine with random matchmaking, no translator factory and
    /// no custom translator configuration.
    #[must_use]
    pub fn new(store: Arc<S>, core: Arc<K>, translators: Arc<T>) -> Self {
        Self {
            store,
            core,
            translators,
            interface_matchmaker: Arc::new(RandomMatchmaker),
            data_model_matchmaker: Arc::new(RandomMatchmaker),
            factory: None,
            custom_configuration_enabled: false,
        }
    }

    /// Sets the matchmaker choosing among interface translators.
    #[must_use]
    pub fn with_interface_matchmaker(mut self, matchmaker: Arc<dyn Matchmaker>) -> Self {
        self.interface_matchmaker = matchmaker;
        self
    }

    /// Sets the matchmaker choosing among data model translators.
    #[must_use]
    pub fn with_data_model_matchmaker(mut self, matchmaker: Arc<dyn Matchmaker>) -> Self {
        self.data_model_matchmaker = matchmaker;
        self
    }

    /// Sets the factory used when no running data model translator fits.
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn DataModelTranslatorFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Enables handing operator settings to translators.
    #[must_use]
    pub const fn with_custom_configuration(mut self, enabled: bool) -> Self {
        self.custom_configuration_enabled = enabled;
        self
    }

    /// Returns the bridge store.
    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Finds targets the consumer can reach through translators and stores
    /// them as the candidate set of a fresh bridge.
    ///
    /// An empty response means nothing matched; it is not an error.
    ///
    /// # Errors
    ///
    /// Returns a forbidden error when the consumer is blacklisted, an
    /// invalid-parameter error when a target's registry entry is malformed,
    /// and an external-service error when a load-bearing core system fails.
    pub async fn discover(&self, request: &DiscoveryRequest) -> BrokerResult<DiscoveryResponse> {
        self.run_discovery(request)
            .await
            .map_err(|err| err.with_origin(BrokerOperation::Discovery))
    }

    async fn run_discovery(&self, request: &DiscoveryRequest) -> BrokerResult<DiscoveryResponse> {
        let flags = request.flags;
        if flags.consumer_blacklist_check && self.core.is_blacklisted(&request.consumer).await? {
            return Err(BrokerError::forbidden(format!(
                "{} is blacklisted",
                request.consumer
            )));
        }

        let profile = request.profile();
        let appropriate = filter_interfaces(&request.candidates, &profile);
        if appropriate.is_empty() {
            return Ok(nothing_found("interface filter"));
        }
        let permitted = self.permitted_targets(appropriate, request).await?;
        if permitted.is_empty() {
            return Ok(nothing_found("candidate checks"));
        }

        let found = self
            .core
            .lookup_interface_translators(&request.interface_templates, &permitted)
            .await?;
        let translators = if flags.translators_blacklist_check {
            self.without_blacklisted(found).await?
        } else {
            found
        };
        if translators.is_empty() {
            return Ok(nothing_found("interface translator lookup"));
        }

        let tokens = self.core.generate_management_tokens(&translators).await?;
        let confirmations = self
            .confirm_targets(&translators, &tokens, &permitted, &request.operation)
            .await;
        if confirmations.is_empty() {
            return Ok(nothing_found("target confirmation"));
        }

        let models = self.build_models(&profile, &permitted, &confirmations, &tokens)?;
        let complete = if models
            .iter()
            .any(TranslationDiscoveryModel::needs_data_model_translation)
        {
            self.attach_data_model_translators(models, flags).await?
        } else {
            models
        };
        if complete.is_empty() {
            return Ok(nothing_found("data model translators"));
        }

        let bridge_id = BridgeId::new();
        self.store
            .store_discoveries(bridge_id, &request.requester, &complete)
            .await?;
        info!(
            %bridge_id,
            consumer = %request.consumer,
            candidates = complete.len(),
            "stored discovery results"
        );
        Ok(DiscoveryResponse {
            bridge_id: Some(bridge_id),
            candidates: complete
                .iter()
                .map(|model| DiscoveredCandidate {
                    target_instance_id: model.target_instance_id.clone(),
                    interface_template: model.from_interface_template.clone(),
                })
                .collect(),
        })
    }

    async fn permitted_targets(
        &self,
        candidates: Vec<ServiceInstance>,
        request: &DiscoveryRequest,
    ) -> BrokerResult<Vec<ServiceInstance>> {
        let Some(first) = candidates.first() else {
            return Ok(Vec::new());
        };
        let service_definition = first.service_definition.clone();
        let mut providers = providers_of(&candidates);
        if request.flags.candidates_blacklist_check {
            providers = self.core.filter_out_blacklisted(&providers).await?;
        }
        if request.flags.candidates_auth_check && !providers.is_empty() {
            providers = self
                .core
                .filter_unauthorized_providers(
                    &providers,
                    &request.consumer,
                    &service_definition,
                    Some(&request.operation),
                )
                .await?;
        }
        Ok(candidates
            .into_iter()
            .filter(|candidate| providers.contains(&candidate.provider))
            .collect())
    }

    async fn without_blacklisted(
        &self,
        instances: Vec<ServiceInstance>,
    ) -> BrokerResult<Vec<ServiceInstance>> {
        if instances.is_empty() {
            return Ok(instances);
        }
        let allowed = self
            .core
            .filter_out_blacklisted(&providers_of(&instances))
            .await?;
        Ok(instances
            .into_iter()
            .filter(|instance| allowed.contains(&instance.provider))
            .collect())
    }

    async fn confirm_targets(
        &self,
        translators: &[ServiceInstance],
        tokens: &HashMap<SystemName, String>,
        targets: &[ServiceInstance],
        operation: &OperationName,
    ) -> Vec<Confirmation> {
        let mut confirmations = Vec::new();
        for translator in translators {
            let Some(interface) = translator.primary_interface() else {
                warn!(translator = %translator.provider, "translator has no management interface");
                continue;
            };
            let relevant: Vec<ServiceInstance> = targets
                .iter()
                .filter(|target| bridges_into(translator, target))
                .cloned()
                .collect();
            if relevant.is_empty() {
                continue;
            }
            let access = TranslatorAccess {
                name: translator.provider.clone(),
                properties: interface.properties.clone(),
                token: tokens.get(&translator.provider).cloned(),
            };
            let confirmed = self
                .translators
                .check_targets(&access, operation, &relevant)
                .await
                .unwrap_or_else(|err| {
                    warn!(
                        translator = %translator.provider,
                        %err,
                        "translator could not check targets, skipping it"
                    );
                    Vec::new()
                });
            confirmations.extend(confirmed.into_iter().map(|target| Confirmation {
                translator: translator.clone(),
                target,
            }));
        }
        confirmations
    }

    fn build_models(
        &self,
        profile: &ConsumerProfile<'_>,
        targets: &[ServiceInstance],
        confirmations: &[Confirmation],
        tokens: &HashMap<SystemName, String>,
    ) -> BrokerResult<Vec<TranslationDiscoveryModel>> {
        let mut models = Vec::new();
        for target in targets {
            let confirmed: Vec<&Confirmation> = confirmations
                .iter()
                .filter(|confirmation| {
                    confirmation.target.instance_id == target.instance_id
                        && bridges_into(&confirmation.translator, &confirmation.target)
                })
                .collect();
            let eligible: Vec<ServiceInstance> = confirmed
                .iter()
                .map(|confirmation| confirmation.translator.clone())
                .collect();
            let context = selection_context(profile.consumer, &target.provider, profile.operation);
            let Some(selected) = self.interface_matchmaker.select(&eligible, &context) else {
                continue;
            };
            let Some(confirmation) = confirmed
                .iter()
                .find(|confirmation| confirmation.translator.instance_id == selected.instance_id)
            else {
                continue;
            };
            if let Some(model) =
                assemble_model(profile, &confirmation.target, &selected, tokens)?
            {
                models.push(model);
            }
        }
        Ok(models)
    }

    async fn attach_data_model_translators(
        &self,
        models: Vec<TranslationDiscoveryModel>,
        flags: DiscoveryFlags,
    ) -> BrokerResult<Vec<TranslationDiscoveryModel>> {
        let found = self.core.lookup_data_model_translators(&models).await?;
        let available = if flags.translators_blacklist_check {
            self.without_blacklisted(found).await?
        } else {
            found
        };

        let mut kept = Vec::with_capacity(models.len());
        for mut model in models {
            let input_pair = model
                .input_translation()
                .map(|(from, to)| (from.clone(), to.clone()));
            if let Some((from, to)) = input_pair {
                let Some(choice) = self
                    .choose_data_model_translator(&available, &model, &from, &to, flags)
                    .await?
                else {
                    warn!(
                        target = %model.target_instance_id,
                        %from,
                        %to,
                        "no input data model translator, dropping candidate"
                    );
                    continue;
                };
                model.input_data_model_translator = Some(choice);
            }
            let output_pair = model
                .output_translation()
                .map(|(from, to)| (from.clone(), to.clone()));
            if let Some((from, to)) = output_pair {
                let Some(choice) = self
                    .choose_data_model_translator(&available, &model, &from, &to, flags)
                    .await?
                else {
                    warn!(
                        target = %model.target_instance_id,
                        %from,
                        %to,
                        "no output data model translator, dropping candidate"
                    );
                    continue;
                };
                model.output_data_model_translator = Some(choice);
            }
            kept.push(model);
        }
        Ok(kept)
    }

    async fn choose_data_model_translator(
        &self,
        available: &[ServiceInstance],
        model: &TranslationDiscoveryModel,
        from: &DataModelId,
        to: &DataModelId,
        flags: DiscoveryFlags,
    ) -> BrokerResult<Option<DataModelTranslatorChoice>> {
        let supporting: Vec<ServiceInstance> = available
            .iter()
            .filter(|translator| translator.metadata.supports_data_model_pair(from, to))
            .cloned()
            .collect();
        let authorized = if flags.translators_auth_check && !supporting.is_empty() {
            let service_definition = ServiceDefinitionName::new(DATA_MODEL_TRANSLATION_SERVICE)?;
            let allowed = self
                .core
                .filter_unauthorized_providers(
                    &providers_of(&supporting),
                    &model.interface_translator.name,
                    &service_definition,
                    None,
                )
                .await?;
            if allowed.is_empty() {
                warn!(
                    translator = %model.interface_translator.name,
                    "interface translator may not call any data model translator"
                );
            }
            supporting
                .into_iter()
                .filter(|translator| allowed.contains(&translator.provider))
                .collect()
        } else {
            supporting
        };

        let context = selection_context(
            &model.interface_translator.name,
            &model.provider,
            &model.operation,
        );
        if let Some(selected) = self.data_model_matchmaker.select(&authorized, &context) {
            return Ok(Some(DataModelTranslatorChoice {
                properties: selected
                    .primary_interface()
                    .map(|interface| interface.properties.clone())
                    .unwrap_or_default(),
                name: selected.provider,
                factory: false,
            }));
        }
        let Some(factory) = &self.factory else {
            return Ok(None);
        };
        Ok(factory.find(from, to).await.unwrap_or_else(|err| {
            warn!(%from, %to, %err, "data model translator factory lookup failed");
            None
        }))
    }

    /// Initializes the bridge to `target` out of the candidate set stored
    /// under `bridge_id`.
    ///
    /// Any failure after the candidate was selected is recorded on the
    /// bridge before it is returned.
    ///
    /// # Errors
    ///
    /// Returns an invalid-reference error for unknown bridges or targets, an
    /// invalid-parameter error when the bridge already ended, and an
    /// external-service error when a translator or core system fails.
    pub async fn negotiate(
        &self,
        bridge_id: BridgeId,
        target: &ServiceInstanceId,
    ) -> BrokerResult<NegotiationResponse> {
        let (model, details) = self
            .store
            .select_from_discoveries(bridge_id, target)
            .await
            .map_err(|err| BrokerError::from(err).with_origin(BrokerOperation::Negotiation))?;
        let outcome = self.provision(bridge_id, &model, details).await;
        if let Err(err) = &outcome {
            warn!(%bridge_id, %err, "bridge negotiation failed");
            self.store.record_problem(bridge_id, err.message()).await;
        }
        outcome.map_err(|err| err.with_origin(BrokerOperation::Negotiation))
    }

    async fn provision(
        &self,
        bridge_id: BridgeId,
        model: &TranslationDiscoveryModel,
        mut details: BridgeDetails,
    ) -> BrokerResult<NegotiationResponse> {
        let translator = &model.interface_translator;
        let interface_settings = self.settings_for(&translator.name).await?;
        details.interface_translator_data = Some(InterfaceTranslationDescriptor {
            from_interface_template: model.from_interface_template.clone(),
            to_interface_template: model.to_interface_template.clone(),
            token: translator.token.clone(),
            interface_properties: translator.properties.clone(),
            settings: interface_settings.clone(),
        });
        if let Some((chosen, descriptor)) = self
            .data_model_descriptor(
                model.input_translation(),
                model.input_data_model_translator.as_ref(),
            )
            .await?
        {
            details.input_dm_translator = Some(chosen.name);
            details.input_dm_translator_data = Some(descriptor);
        }
        if let Some((chosen, descriptor)) = self
            .data_model_descriptor(
                model.output_translation(),
                model.output_data_model_translator.as_ref(),
            )
            .await?
        {
            details.result_dm_translator = Some(chosen.name);
            details.result_dm_translator_data = Some(descriptor);
        }
        if self.store.update_details(&details).await? {
            return Err(already_ended());
        }

        let target_token = if model.target_policy.requires_token() {
            self.core
                .generate_target_token(&TargetTokenRequest {
                    policy: model.target_policy,
                    consumer: translator.name.clone(),
                    provider: model.provider.clone(),
                    service_definition: model.service_definition.clone(),
                    operation: model.operation.clone(),
                })
                .await?
        } else {
            None
        };

        let access = TranslatorAccess {
            name: translator.name.clone(),
            properties: translator.properties.clone(),
            token: translator.token.clone(),
        };
        let initialization = BridgeInitializationRequest {
            bridge_id,
            input_interface: model.from_interface_template.clone(),
            target_interface: model.to_interface_template.clone(),
            input_data_model_translator: details.input_dm_translator_data.clone(),
            result_data_model_translator: details.result_dm_translator_data.clone(),
            target_interface_properties: model.target_properties.clone(),
            operation: model.operation.clone(),
            token: target_token,
            interface_translator_settings: interface_settings,
        };
        let interface = self
            .translators
            .initialize_bridge(&access, &initialization)
            .await?;

        if self.store.mark_initialized(bridge_id).await? {
            warn!(%bridge_id, translator = %access.name, "bridge ended during initialization");
            self.abort_translator_bridge(&access, bridge_id).await;
            return Err(already_ended());
        }
        info!(%bridge_id, translator = %access.name, "bridge initialized");
        Ok(NegotiationResponse {
            bridge_id: Some(bridge_id),
            interface: Some(interface),
        })
    }

    async fn data_model_descriptor(
        &self,
        pair: Option<(&DataModelId, &DataModelId)>,
        choice: Option<&DataModelTranslatorChoice>,
    ) -> BrokerResult<Option<(DataModelTranslatorChoice, DataModelTranslationDescriptor)>> {
        let (Some((from, to)), Some(chosen)) = (pair, choice) else {
            return Ok(None);
        };
        let (translator, settings) = if chosen.factory {
            let Some(factory) = &self.factory else {
                return Err(BrokerError::external_service(format!(
                    "no data model translator factory available for {from} -> {to}"
                )));
            };
            (factory.instantiate(chosen, from, to).await?, None)
        } else {
            (chosen.clone(), self.settings_for(&chosen.name).await?)
        };
        let descriptor = DataModelTranslationDescriptor {
            from_model_id: from.clone(),
            to_model_id: to.clone(),
            interface_properties: translator.properties.clone(),
            settings,
        };
        Ok(Some((translator, descriptor)))
    }

    async fn settings_for(&self, system: &SystemName) -> BrokerResult<Option<Map<String, Value>>> {
        if !self.custom_configuration_enabled {
            return Ok(None);
        }
        Ok(self.core.custom_configuration(system).await?)
    }

    /// Aborts every bridge in `bridge_ids` and reports, per bridge, whether
    /// it is now aborted or otherwise ended.
    ///
    /// With `required_creator`, only bridges created by that system may be
    /// aborted.
    ///
    /// # Errors
    ///
    /// Returns a forbidden error when `required_creator` did not create one
    /// of the bridges, or an internal error when the store fails.
    pub async fn abort(
        &self,
        bridge_ids: &[BridgeId],
        required_creator: Option<&SystemName>,
    ) -> BrokerResult<BTreeMap<BridgeId, bool>> {
        let mut results = BTreeMap::new();
        for bridge_id in bridge_ids {
            let outcome = self
                .store
                .abort(*bridge_id, required_creator)
                .await
                .map_err(|err| BrokerError::from(err).with_origin(BrokerOperation::Abort))?;
            if outcome.happened {
                info!(%bridge_id, previous = ?outcome.previous_status, "bridge aborted");
                self.abort_remote(*bridge_id, &outcome).await;
            }
            results.insert(*bridge_id, outcome.is_satisfied());
        }
        Ok(results)
    }

    async fn abort_remote(&self, bridge_id: BridgeId, outcome: &AbortOutcome) {
        let reached_translator = outcome
            .previous_status
            .is_some_and(|status| status == BridgeStatus::Pending || status.is_active());
        if !reached_translator {
            return;
        }
        let Some(details) = &outcome.details else {
            return;
        };
        let Some(descriptor) = &details.interface_translator_data else {
            return;
        };
        let access = TranslatorAccess {
            name: details.interface_translator.clone(),
            properties: descriptor.interface_properties.clone(),
            token: descriptor.token.clone(),
        };
        self.abort_translator_bridge(&access, bridge_id).await;
    }

    async fn abort_translator_bridge(&self, access: &TranslatorAccess, bridge_id: BridgeId) {
        if let Err(err) = self.translators.abort_bridge(access, bridge_id).await {
            warn!(%bridge_id, translator = %access.name, %err, "translator could not abort bridge");
        }
    }
}
