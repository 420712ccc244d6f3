//! Translation data descriptors handed to translators during negotiation.

use super::{DataModelId, InterfaceTemplateName, Metadata};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Configuration of the interface translator for one bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceTranslationDescriptor {
    /// Consumer-side interface template.
    pub from_interface_template: InterfaceTemplateName,
    /// Target-side interface template.
    pub to_interface_template: InterfaceTemplateName,
    /// Management token for the translator, when required.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Management interface properties of the translator.
    pub interface_properties: Metadata,
    /// Operator settings for the translator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Map<String, Value>>,
}

/// Configuration of a data model translator for one direction of a bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModelTranslationDescriptor {
    /// Source data model.
    pub from_model_id: DataModelId,
    /// Target data model.
    pub to_model_id: DataModelId,
    /// Interface properties of the data model translator.
    pub interface_properties: Metadata,
    /// Operator settings for the translator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Map<String, Value>>,
}
