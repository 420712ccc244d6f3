//! Pure candidate filtering and model assembly used by discovery.

use crate::bridge::domain::{
    DataModelId, InterfaceTemplateName, InterfaceTranslatorChoice,
    OperationName, ServiceInstance, ServiceInterface, SystemName, TranslationDiscoveryModel,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::hash::BuildHasher;
use tracing::debug;

use super::{BrokerError, BrokerResult};

/// What the consumer can speak and which payloads it uses.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerProfile<'a> {
    /// Consumer system.
    pub consumer: &'a SystemName,
    /// Target operation.
    pub operation: &'a OperationName,
    /// Interface templates the consumer accepts.
    pub templates: &'a [InterfaceTemplateName],
    /// Data model of the request payload, if any.
    pub input: Option<&'a DataModelId>,
    /// Data model the consumer expects back, if any.
    pub output: Option<&'a DataModelId>,
}

/// A target an interface translator confirmed it can reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    /// The confirming interface translator.
    pub translator: ServiceInstance,
    /// The target, restricted to the interfaces the translator confirmed.
    pub target: ServiceInstance,
}

/// Keeps only the interfaces that need translating, normalizing their data
/// model declarations to `profile.operation`. Candidates left without
/// interfaces are dropped.
#[must_use]
pub fn filter_interfaces(
    candidates: &[ServiceInstance],
    profile: &ConsumerProfile<'_>,
) -> Vec<ServiceInstance> {
    candidates
        .iter()
        .filter_map(|candidate| {
            let interfaces: Vec<ServiceInterface> = candidate
                .interfaces
                .iter()
                .filter_map(|interface| translatable_interface(candidate, interface, profile))
                .collect();
            if interfaces.is_empty() {
                debug!(instance = %candidate.instance_id, "candidate has no translatable interface");
                return None;
            }
            let mut kept = candidate.clone();
            kept.interfaces = interfaces;
            Some(kept)
        })
        .collect()
}

fn translatable_interface(
    candidate: &ServiceInstance,
    interface: &ServiceInterface,
    profile: &ConsumerProfile<'_>,
) -> Option<ServiceInterface> {
    let declared = interface
        .properties
        .declared_data_models(profile.operation)
        .inspect_err(|err| {
            debug!(
                instance = %candidate.instance_id,
                template = %interface.template_name,
                %err,
                "ignoring interface with invalid data model declaration"
            );
        })
        .ok()?;
    if profile.input.is_some() != declared.input.is_some()
        || profile.output.is_some() != declared.output.is_some()
    {
        return None;
    }
    let native = profile.templates.contains(&interface.template_name)
        && profile.input == declared.input.as_ref()
        && profile.output == declared.output.as_ref();
    if native {
        return None;
    }
    let mut normalized = interface.clone();
    normalized.properties = interface
        .properties
        .with_declared_data_models(profile.operation, &declared);
    Some(normalized)
}

/// Returns the distinct providers of `instances`, in first-seen order.
#[must_use]
pub fn providers_of(instances: &[ServiceInstance]) -> Vec<SystemName> {
    let mut providers: Vec<SystemName> = Vec::new();
    for instance in instances {
        if !providers.contains(&instance.provider) {
            providers.push(instance.provider.clone());
        }
    }
    providers
}

/// Returns whether `translator` bridges into one of `target`'s interfaces.
#[must_use]
pub fn bridges_into(translator: &ServiceInstance, target: &ServiceInstance) -> bool {
    let bridge_to = translator.metadata.bridge_to();
    target
        .interfaces
        .iter()
        .any(|interface| bridge_to.contains(&interface.template_name))
}

/// Context handed to matchmakers.
#[must_use]
pub fn selection_context(
    consumer: &SystemName,
    provider: &SystemName,
    operation: &OperationName,
) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("consumer".to_owned(), Value::from(consumer.as_str()));
    context.insert("provider".to_owned(), Value::from(provider.as_str()));
    context.insert("operation".to_owned(), Value::from(operation.as_str()));
    context
}

/// Assembles the discovery model of `target` bridged by `translator`.
///
/// Returns `None` when the translator shares no template with the consumer
/// or the target.
///
/// # Errors
///
/// Returns an invalid-parameter error when the target does not declare a
/// data model the consumer requires.
pub fn assemble_model<S: BuildHasher>(
    profile: &ConsumerProfile<'_>,
    target: &ServiceInstance,
    translator: &ServiceInstance,
    tokens: &HashMap<SystemName, String, S>,
) -> BrokerResult<Option<TranslationDiscoveryModel>> {
    let bridge_from = translator.metadata.bridge_from();
    let bridge_to = translator.metadata.bridge_to();
    let Some(from_template) = profile
        .templates
        .iter()
        .find(|template| bridge_from.contains(template))
    else {
        return Ok(None);
    };
    let Some(target_interface) = target
        .interfaces
        .iter()
        .find(|interface| bridge_to.contains(&interface.template_name))
    else {
        return Ok(None);
    };
    let Some(management) = translator.primary_interface() else {
        return Ok(None);
    };
    let declared = target_interface
        .properties
        .declared_data_models(profile.operation)
        .map_err(BrokerError::from)?;
    if profile.input.is_some() && declared.input.is_none() {
        return Err(missing_data_model(target, "input", profile.operation));
    }
    if profile.output.is_some() && declared.output.is_none() {
        return Err(missing_data_model(target, "output", profile.operation));
    }
    Ok(Some(TranslationDiscoveryModel {
        target_instance_id: target.instance_id.clone(),
        provider: target.provider.clone(),
        service_definition: target.service_definition.clone(),
        operation: profile.operation.clone(),
        consumer: profile.consumer.clone(),
        input_data_model_requirement: profile.input.cloned(),
        output_data_model_requirement: profile.output.cloned(),
        from_interface_template: from_template.clone(),
        to_interface_template: target_interface.template_name.clone(),
        interface_translator: InterfaceTranslatorChoice {
            name: translator.provider.clone(),
            policy: management.policy,
            properties: management.properties.clone(),
            token: tokens.get(&translator.provider).cloned(),
        },
        target_policy: target_interface.policy,
        target_properties: target_interface.properties.clone(),
        target_input_data_model_id: declared.input,
        target_output_data_model_id: declared.output,
        input_data_model_translator: None,
        output_data_model_translator: None,
    }))
}

fn missing_data_model(
    target: &ServiceInstance,
    direction: &str,
    operation: &OperationName,
) -> BrokerError {
    BrokerError::invalid_parameter(format!(
        "{} declares no {direction} data model for operation {operation}",
        target.instance_id
    ))
}
