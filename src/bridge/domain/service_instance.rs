//! Registry view of service instances and their interfaces.

use super::{
    BridgeDomainError, InterfaceTemplateName, Metadata, ServiceDefinitionName, ServiceInstanceId,
    SystemName,
};
use serde::{Deserialize, Serialize};
use std::fmt;

const TOKEN_POLICY_SUFFIX: &str = "_TOKEN_AUTH";

/// Security policy declared by a service interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterfacePolicy {
    /// No authentication.
    None,
    /// Mutual TLS certificate authentication.
    CertAuth,
    /// Token valid for a limited time.
    TimeLimitedTokenAuth,
    /// Token valid for a limited number of uses.
    UsageLimitedTokenAuth,
    /// Self-contained base64 token.
    Base64SelfContainedTokenAuth,
    /// JSON web token signed with RSA-SHA256.
    RsaSha256JsonWebTokenAuth,
    /// JSON web token signed with RSA-SHA512.
    RsaSha512JsonWebTokenAuth,
    /// Token issued for a translation bridge.
    TranslationBridgeTokenAuth,
}

impl InterfacePolicy {
    const ALL: [Self; 8] = [
        Self::None,
        Self::CertAuth,
        Self::TimeLimitedTokenAuth,
        Self::UsageLimitedTokenAuth,
        Self::Base64SelfContainedTokenAuth,
        Self::RsaSha256JsonWebTokenAuth,
        Self::RsaSha512JsonWebTokenAuth,
        Self::TranslationBridgeTokenAuth,
    ];

    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::CertAuth => "CERT_AUTH",
            Self::TimeLimitedTokenAuth => "TIME_LIMITED_TOKEN_AUTH",
            Self::UsageLimitedTokenAuth => "USAGE_LIMITED_TOKEN_AUTH",
            Self::Base64SelfContainedTokenAuth => "BASE64_SELF_CONTAINED_TOKEN_AUTH",
            Self::RsaSha256JsonWebTokenAuth => "RSA_SHA256_JSON_WEB_TOKEN_AUTH",
            Self::RsaSha512JsonWebTokenAuth => "RSA_SHA512_JSON_WEB_TOKEN_AUTH",
            Self::TranslationBridgeTokenAuth => "TRANSLATION_BRIDGE_TOKEN_AUTH",
        }
    }

    /// Returns whether callers must present a token issued by the
    /// authorization service.
    #[must_use]
    pub fn requires_token(self) -> bool {
        self.as_str().ends_with(TOKEN_POLICY_SUFFIX)
    }
}

impl fmt::Display for InterfacePolicy {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for InterfacePolicy {
    type Error = BridgeDomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|policy| policy.as_str() == normalized)
            .ok_or_else(|| BridgeDomainError::UnknownInterfacePolicy(value.to_owned()))
    }
}

/// One interface through which a service instance can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInterface {
    /// Interface template the interface instantiates.
    pub template_name: InterfaceTemplateName,
    /// Transport protocol, when declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Security policy.
    pub policy: InterfacePolicy,
    /// Template-specific properties such as addresses and data models.
    #[serde(default)]
    pub properties: Metadata,
}

impl ServiceInterface {
    /// Creates an interface with empty properties.
    #[must_use]
    pub fn new(template_name: InterfaceTemplateName, policy: InterfacePolicy) -> Self {
        Self {
            template_name,
            protocol: None,
            policy,
            properties: Metadata::new(),
        }
    }

    /// Sets the interface properties.
    #[must_use]
    pub fn with_properties(mut self, properties: Metadata) -> Self {
        self.properties = properties;
        self
    }

    /// Sets the transport protocol.
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }
}

/// A registered service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    /// Registry identifier.
    pub instance_id: ServiceInstanceId,
    /// Providing system.
    pub provider: SystemName,
    /// Service definition the instance implements.
    pub service_definition: ServiceDefinitionName,
    /// Instance metadata, including bridging declarations for translators.
    #[serde(default)]
    pub metadata: Metadata,
    /// Interfaces the instance is reachable through.
    pub interfaces: Vec<ServiceInterface>,
}

impl ServiceInstance {
    /// Creates an instance without metadata or interfaces.
    #[must_use]
    pub fn new(
        instance_id: ServiceInstanceId,
        provider: SystemName,
        service_definition: ServiceDefinitionName,
    ) -> Self {
        Self {
            instance_id,
            provider,
            service_definition,
            metadata: Metadata::new(),
            interfaces: Vec::new(),
        }
    }

    /// Sets the instance metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Appends an interface.
    #[must_use]
    pub fn with_interface(mut self, interface: ServiceInterface) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Returns the interface used to reach a translator instance.
    #[must_use]
    pub fn primary_interface(&self) -> Option<&ServiceInterface> {
        self.interfaces.first()
    }

    /// Returns the interface instantiating `template`, if any.
    #[must_use]
    pub fn interface_for(&self, template: &InterfaceTemplateName) -> Option<&ServiceInterface> {
        self.interfaces
            .iter()
            .find(|interface| &interface.template_name == template)
    }

    /// Returns the template names of all interfaces.
    #[must_use]
    pub fn template_names(&self) -> Vec<InterfaceTemplateName> {
        self.interfaces
            .iter()
            .map(|interface| interface.template_name.clone())
            .collect()
    }
}
