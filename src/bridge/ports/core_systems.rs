//! Core-systems port: blacklist, authorization, token issuance and the
//! service registry.

use crate::bridge::domain::{
    BRIDGE_FROM_KEY, BRIDGE_TO_KEY, INTERFACE_BRIDGE_KEY, InterfacePolicy, InterfaceTemplateName,
    MetadataOperator, MetadataRequirement, OperationName, ServiceDefinitionName, ServiceInstance,
    SystemName, TranslationDiscoveryModel,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasher;
use std::slice;
use thiserror::Error;
use tracing::warn;

/// Service definition of the interface translators' management service.
pub const INTERFACE_BRIDGE_MANAGEMENT_SERVICE: &str = "interfaceBridgeManagement";
/// Service definition of data model translators.
pub const DATA_MODEL_TRANSLATION_SERVICE: &str = "dataModelTranslation";
/// Interface templates interface translators are reachable through.
pub const TRANSLATOR_INTERFACE_TEMPLATES: [&str; 2] = ["generic_http", "generic_https"];
/// Lifetime of management tokens, in hours.
pub const MANAGEMENT_TOKEN_HOURS: i64 = 24;
/// Usage budget of management tokens.
pub const MANAGEMENT_TOKEN_USAGE_LIMIT: u32 = 100;

/// Result type for core-systems operations.
pub type CoreSystemsResult<T> = Result<T, CoreSystemsError>;

/// Remote core services the broker depends on.
#[async_trait]
pub trait CoreSystems: Send + Sync {
    /// Returns `names` without the blacklisted systems.
    ///
    /// Blacklist lookups are advisory: implementations apply the configured
    /// [`BlacklistPolicy`] when the blacklist service is unavailable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreSystemsError::Forbidden`] or
    /// [`CoreSystemsError::Unauthorized`] when the broker itself is refused.
    async fn filter_out_blacklisted(
        &self,
        names: &[SystemName],
    ) -> CoreSystemsResult<Vec<SystemName>>;

    /// Returns whether `name` is blacklisted.
    ///
    /// # Errors
    ///
    /// Propagates errors of [`CoreSystems::filter_out_blacklisted`].
    async fn is_blacklisted(&self, name: &SystemName) -> CoreSystemsResult<bool> {
        let allowed = self.filter_out_blacklisted(slice::from_ref(name)).await?;
        Ok(allowed.is_empty())
    }

    /// Returns the providers `consumer` may call, excluding explicit denials.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreSystemsError`] when the authorization service fails.
    async fn filter_unauthorized_providers(
        &self,
        providers: &[SystemName],
        consumer: &SystemName,
        service_definition: &ServiceDefinitionName,
        operation: Option<&OperationName>,
    ) -> CoreSystemsResult<Vec<SystemName>>;

    /// Issues management tokens for the translators whose interface policy
    /// requires one, keyed by translator name.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreSystemsError`] when token generation fails.
    async fn generate_management_tokens(
        &self,
        translators: &[ServiceInstance],
    ) -> CoreSystemsResult<HashMap<SystemName, String>>;

    /// Issues a token allowing a translator to call one target operation.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreSystemsError`] when token generation fails.
    async fn generate_target_token(
        &self,
        request: &TargetTokenRequest,
    ) -> CoreSystemsResult<Option<String>>;

    /// Looks up interface translators able to bridge from one of
    /// `consumer_templates` to the interfaces of `targets`.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreSystemsError`] when the registry lookup fails.
    async fn lookup_interface_translators(
        &self,
        consumer_templates: &[InterfaceTemplateName],
        targets: &[ServiceInstance],
    ) -> CoreSystemsResult<Vec<ServiceInstance>>;

    /// Looks up data model translators for the payload translations the
    /// models need.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreSystemsError`] when the registry lookup fails.
    async fn lookup_data_model_translators(
        &self,
        models: &[TranslationDiscoveryModel],
    ) -> CoreSystemsResult<Vec<ServiceInstance>>;

    /// Returns operator settings for `system`, when any exist.
    ///
    /// # Errors
    ///
    /// Returns a [`CoreSystemsError`] when configuration lookup fails.
    async fn custom_configuration(
        &self,
        system: &SystemName,
    ) -> CoreSystemsResult<Option<Map<String, Value>>>;
}

/// Request for a token scoped to one target operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTokenRequest {
    /// Policy of the target interface.
    pub policy: InterfacePolicy,
    /// Interface translator that will call the target.
    pub consumer: SystemName,
    /// Target provider.
    pub provider: SystemName,
    /// Target service definition.
    pub service_definition: ServiceDefinitionName,
    /// Target operation.
    pub operation: OperationName,
}

/// Errors returned by core-systems implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreSystemsError {
    /// The broker is not allowed to use the service.
    #[error("forbidden by core system: {0}")]
    Forbidden(String),

    /// The broker could not authenticate.
    #[error("not authenticated by core system: {0}")]
    Unauthorized(String),

    /// The service could not be reached.
    #[error("core system unavailable: {0}")]
    Unavailable(String),

    /// The service answered with an unexpected status.
    #[error("core system rejected request with status {status}: {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The response could not be interpreted.
    #[error("invalid core system response: {0}")]
    InvalidResponse(String),
}

/// Behaviour of blacklist filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlacklistPolicy {
    /// Treat every system as blacklisted when the blacklist is unavailable.
    pub forced: bool,
    /// Systems never checked against the blacklist.
    pub exempt: Vec<SystemName>,
}

impl BlacklistPolicy {
    /// Returns the names that have to be checked remotely.
    #[must_use]
    pub fn names_to_check(&self, names: &[SystemName]) -> Vec<SystemName> {
        names
            .iter()
            .filter(|name| !self.exempt.contains(name))
            .cloned()
            .collect()
    }

    /// Returns `names` without the `blacklisted` ones, preserving order.
    #[must_use]
    pub fn retain_allowed<S: BuildHasher>(
        names: &[SystemName],
        blacklisted: &HashSet<SystemName, S>,
    ) -> Vec<SystemName> {
        names
            .iter()
            .filter(|name| !blacklisted.contains(*name))
            .cloned()
            .collect()
    }

    /// Resolves a failed blacklist lookup.
    ///
    /// Fails closed (nothing allowed) when forced, otherwise fails open.
    ///
    /// # Errors
    ///
    /// Returns `error` unchanged when the broker itself was refused.
    pub fn on_failure(
        &self,
        names: &[SystemName],
        error: CoreSystemsError,
    ) -> CoreSystemsResult<Vec<SystemName>> {
        if matches!(
            error,
            CoreSystemsError::Forbidden(_) | CoreSystemsError::Unauthorized(_)
        ) {
            return Err(error);
        }
        if self.forced {
            warn!(%error, "blacklist unavailable, treating every system as blacklisted");
            Ok(Vec::new())
        } else {
            warn!(%error, "blacklist unavailable, skipping blacklist filtering");
            Ok(names.to_vec())
        }
    }
}

/// Registry query selecting translator instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorLookup {
    /// Service definition translators provide.
    pub service_definition: &'static str,
    /// Accepted interface templates; empty means any.
    pub interface_templates: Vec<String>,
    /// Accepted interface policies; empty means any.
    pub policies: Vec<InterfacePolicy>,
    /// Metadata requirements, any of which has to hold.
    pub requirements: Vec<MetadataRequirement>,
}

impl TranslatorLookup {
    /// Lookup for interface translators: one requirement per target, each
    /// demanding that the translator accepts one of the consumer templates
    /// and speaks only templates the target offers.
    #[must_use]
    pub fn interface_translators(
        consumer_templates: &[InterfaceTemplateName],
        targets: &[ServiceInstance],
    ) -> Self {
        let accepted = template_values(consumer_templates);
        let mut requirements: Vec<MetadataRequirement> = Vec::new();
        for target in targets {
            let requirement = MetadataRequirement::new()
                .with(
                    format!("{INTERFACE_BRIDGE_KEY}.{BRIDGE_FROM_KEY}"),
                    MetadataOperator::ContainsAny,
                    accepted.clone(),
                )
                .with(
                    format!("{INTERFACE_BRIDGE_KEY}.{BRIDGE_TO_KEY}"),
                    MetadataOperator::In,
                    template_values(&target.template_names()),
                );
            if !requirements.contains(&requirement) {
                requirements.push(requirement);
            }
        }
        Self {
            service_definition: INTERFACE_BRIDGE_MANAGEMENT_SERVICE,
            interface_templates: translator_templates(),
            policies: Vec::new(),
            requirements,
        }
    }

    /// Lookup for data model translators: one requirement per needed
    /// translation direction, de-duplicated across models.
    #[must_use]
    pub fn data_model_translators(
        models: &[TranslationDiscoveryModel],
        certificate_authentication: bool,
    ) -> Self {
        let mut requirements: Vec<MetadataRequirement> = Vec::new();
        for model in models {
            let pairs = [model.input_translation(), model.output_translation()];
            for (from, to) in pairs.into_iter().flatten() {
                let requirement = MetadataRequirement::data_model_pair(from, to);
                if !requirements.contains(&requirement) {
                    requirements.push(requirement);
                }
            }
        }
        let policies = if certificate_authentication {
            vec![InterfacePolicy::CertAuth, InterfacePolicy::None]
        } else {
            vec![InterfacePolicy::None]
        };
        Self {
            service_definition: DATA_MODEL_TRANSLATION_SERVICE,
            interface_templates: translator_templates(),
            policies,
            requirements,
        }
    }

    /// Narrows the accepted templates to the one matching the transport.
    #[must_use]
    pub fn for_transport(mut self, ssl_enabled: bool) -> Self {
        let [plain, secure] = TRANSLATOR_INTERFACE_TEMPLATES;
        let wanted = if ssl_enabled { secure } else { plain };
        self.interface_templates
            .retain(|template| template.as_str() == wanted);
        self
    }

    /// Returns whether the lookup cannot match anything.
    #[must_use]
    pub fn is_void(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Returns whether `instance` satisfies the lookup.
    #[must_use]
    pub fn matches(&self, instance: &ServiceInstance) -> bool {
        instance.service_definition.as_str() == self.service_definition
            && instance.interfaces.iter().any(|interface| {
                (self.interface_templates.is_empty()
                    || self
                        .interface_templates
                        .iter()
                        .any(|template| template == interface.template_name.as_str()))
                    && (self.policies.is_empty() || self.policies.contains(&interface.policy))
            })
            && self
                .requirements
                .iter()
                .any(|requirement| requirement.matches(&instance.metadata))
    }
}

/// Returns the translators needing a management token with their policy.
#[must_use]
pub fn token_requiring_translators(
    translators: &[ServiceInstance],
) -> Vec<(SystemName, InterfacePolicy)> {
    let mut result: Vec<(SystemName, InterfacePolicy)> = Vec::new();
    for translator in translators {
        let Some(interface) = translator.primary_interface() else {
            continue;
        };
        if interface.policy.requires_token()
            && !result.iter().any(|(name, _)| name == &translator.provider)
        {
            result.push((translator.provider.clone(), interface.policy));
        }
    }
    result
}

fn translator_templates() -> Vec<String> {
    TRANSLATOR_INTERFACE_TEMPLATES
        .iter()
        .map(|template| (*template).to_owned())
        .collect()
}

fn template_values(templates: &[InterfaceTemplateName]) -> Value {
    Value::from(
        templates
            .iter()
            .map(InterfaceTemplateName::as_str)
            .collect::<Vec<_>>(),
    )
}
