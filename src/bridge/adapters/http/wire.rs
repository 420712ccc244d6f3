//! JSON bodies exchanged with core services and translator instances.

use crate::bridge::domain::{
    InterfacePolicy, MetadataRequirement, OperationName, ServiceInstance, ServiceInstanceId,
    ServiceInterface, SystemName,
};
use serde::{Deserialize, Serialize};

/// Authorization target type of service-definition level rules.
pub(super) const SERVICE_DEF_TARGET_TYPE: &str = "SERVICE_DEF";
/// Cloud identifier of the local cloud.
pub(super) const LOCAL_CLOUD: &str = "LOCAL";
/// Query parameter asking for tokens not bound to the caller.
pub(super) const UNBOUND_QUERY: [(&str, &str); 1] = [("unbound", "true")];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PageDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BlacklistQueryRequest<'a> {
    pub pagination: PageDto,
    pub system_names: Vec<&'a str>,
    pub alives_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BlacklistEntry {
    pub system_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BlacklistQueryResponse {
    #[serde(default)]
    pub entries: Vec<BlacklistEntry>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct VerifyEntry<'a> {
    pub provider: &'a str,
    pub consumer: &'a str,
    pub cloud: Option<&'a str>,
    pub target_type: &'static str,
    pub target: &'a str,
    pub scope: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(super) struct VerifyRequest<'a> {
    pub entries: Vec<VerifyEntry<'a>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct VerifyResult {
    pub provider: String,
    pub granted: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct VerifyResponse {
    #[serde(default)]
    pub entries: Vec<VerifyResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TokenGenerationEntry<'a> {
    pub token_variant: InterfacePolicy,
    pub target_type: &'static str,
    pub cloud: &'static str,
    pub consumer: &'a str,
    pub provider: &'a str,
    pub target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub(super) struct TokenGenerationRequest<'a> {
    pub entries: Vec<TokenGenerationEntry<'a>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct IssuedToken {
    pub provider: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenGenerationResponse {
    #[serde(default)]
    pub entries: Vec<IssuedToken>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct LookupRequest<'a> {
    pub service_definition_names: [&'static str; 1],
    pub interface_template_names: &'a [String],
    #[serde(skip_serializing_if = "<[InterfacePolicy]>::is_empty")]
    pub policies: &'a [InterfacePolicy],
    pub metadata_requirements_list: &'a [MetadataRequirement],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alives_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct LookupResponse {
    #[serde(default)]
    pub entries: Vec<ServiceInstance>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CheckedTargetDto<'a> {
    pub instance_id: &'a ServiceInstanceId,
    pub interfaces: &'a [ServiceInterface],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CheckTargetsRequest<'a> {
    pub target_operation: &'a OperationName,
    pub targets: Vec<CheckedTargetDto<'a>>,
}

impl<'a> CheckTargetsRequest<'a> {
    pub(super) fn new(operation: &'a OperationName, targets: &'a [ServiceInstance]) -> Self {
        Self {
            target_operation: operation,
            targets: targets
                .iter()
                .map(|target| CheckedTargetDto {
                    instance_id: &target.instance_id,
                    interfaces: &target.interfaces,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ConfirmedTarget {
    pub instance_id: ServiceInstanceId,
    #[serde(default)]
    pub interfaces: Vec<ServiceInterface>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct CheckTargetsResponse {
    #[serde(default)]
    pub targets: Vec<ConfirmedTarget>,
}

impl CheckTargetsResponse {
    /// Returns the requested targets the translator confirmed, restricted to
    /// the interfaces it confirmed when it named any.
    pub(super) fn confirmed(self, requested: &[ServiceInstance]) -> Vec<ServiceInstance> {
        self.targets
            .into_iter()
            .filter_map(|confirmed| {
                let original = requested
                    .iter()
                    .find(|target| target.instance_id == confirmed.instance_id)?;
                let mut target = original.clone();
                if !confirmed.interfaces.is_empty() {
                    target.interfaces = confirmed.interfaces;
                }
                Some(target)
            })
            .collect()
    }
}

/// Providers kept after a bulk verification: everyone not explicitly denied,
/// or nobody when the service returned no verdicts.
pub(super) fn authorized_providers(
    providers: &[SystemName],
    verdicts: &[VerifyResult],
) -> Vec<SystemName> {
    if verdicts.is_empty() {
        return Vec::new();
    }
    providers
        .iter()
        .filter(|provider| {
            !verdicts
                .iter()
                .any(|verdict| verdict.provider == provider.as_str() && !verdict.granted)
        })
        .cloned()
        .collect()
}
