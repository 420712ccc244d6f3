//! Fully resolved translation candidates produced by discovery.

use super::{
    DataModelId, InterfacePolicy, InterfaceTemplateName, Metadata, OperationName,
    ServiceDefinitionName, ServiceInstanceId, SystemName,
};
use serde::{Deserialize, Serialize};

/// The interface translator chosen for a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceTranslatorChoice {
    /// Translator system name.
    pub name: SystemName,
    /// Policy of the translator's management interface.
    pub policy: InterfacePolicy,
    /// Properties of the translator's management interface.
    pub properties: Metadata,
    /// Management token issued for the broker, when the policy requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// A data model translator chosen for one translation direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModelTranslatorChoice {
    /// Translator system name.
    pub name: SystemName,
    /// Properties of the translator's interface.
    pub properties: Metadata,
    /// Whether the translator still has to be instantiated by a factory.
    #[serde(default)]
    pub factory: bool,
}

/// One candidate bridge: a target instance plus the translators that reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationDiscoveryModel {
    /// Registry identifier of the target instance.
    pub target_instance_id: ServiceInstanceId,
    /// Provider of the target instance.
    pub provider: SystemName,
    /// Service definition of the target instance.
    pub service_definition: ServiceDefinitionName,
    /// Operation the consumer wants to call.
    pub operation: OperationName,
    /// Consumer system.
    pub consumer: SystemName,
    /// Input data model the consumer sends, if any.
    #[serde(default)]
    pub input_data_model_requirement: Option<DataModelId>,
    /// Output data model the consumer expects, if any.
    #[serde(default)]
    pub output_data_model_requirement: Option<DataModelId>,
    /// Interface template the consumer uses towards the translator.
    pub from_interface_template: InterfaceTemplateName,
    /// Interface template the translator uses towards the target.
    pub to_interface_template: InterfaceTemplateName,
    /// Selected interface translator.
    pub interface_translator: InterfaceTranslatorChoice,
    /// Policy of the target interface.
    pub target_policy: InterfacePolicy,
    /// Properties of the target interface.
    pub target_properties: Metadata,
    /// Input data model the target declares.
    #[serde(default)]
    pub target_input_data_model_id: Option<DataModelId>,
    /// Output data model the target declares.
    #[serde(default)]
    pub target_output_data_model_id: Option<DataModelId>,
    /// Translator for the request payload.
    #[serde(default)]
    pub input_data_model_translator: Option<DataModelTranslatorChoice>,
    /// Translator for the response payload.
    #[serde(default)]
    pub output_data_model_translator: Option<DataModelTranslatorChoice>,
}

impl TranslationDiscoveryModel {
    /// Returns `(from, to)` when the request payload needs translating.
    #[must_use]
    pub fn input_translation(&self) -> Option<(&DataModelId, &DataModelId)> {
        translation_pair(
            self.input_data_model_requirement.as_ref(),
            self.target_input_data_model_id.as_ref(),
        )
    }

    /// Returns `(from, to)` when the response payload needs translating.
    #[must_use]
    pub fn output_translation(&self) -> Option<(&DataModelId, &DataModelId)> {
        translation_pair(
            self.target_output_data_model_id.as_ref(),
            self.output_data_model_requirement.as_ref(),
        )
    }

    /// Returns whether any payload translation is needed.
    #[must_use]
    pub fn needs_data_model_translation(&self) -> bool {
        self.input_translation().is_some() || self.output_translation().is_some()
    }
}

fn translation_pair<'a>(
    from: Option<&'a DataModelId>,
    to: Option<&'a DataModelId>,
) -> Option<(&'a DataModelId, &'a DataModelId)> {
    match (from, to) {
        (Some(source), Some(target)) if source != target => Some((source, target)),
        _ => None,
    }
}
