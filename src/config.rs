//! Broker configuration.
//!
//! [`BrokerConfig`] is deserialisable from any serde format; every field
//! falls back to its default when missing.

use crate::bridge::domain::{DiscoveryFlags, SystemName};
use crate::bridge::ports::BlacklistPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

const SECONDS_PER_HOUR: u64 = 3600;

/// How systems authenticate towards the local cloud.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthenticationPolicy {
    /// Systems declare their own identity.
    #[default]
    Declared,
    /// Systems authenticate with X.509 certificates.
    Certificate,
    /// Authentication is delegated to an identity provider.
    Outsourced,
}

/// Blacklist settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlacklistConfig {
    /// Whether blacklist checks run at all.
    pub enabled: bool,
    /// Treat every system as blacklisted when the blacklist is unavailable.
    pub forced: bool,
    /// Systems never checked against the blacklist.
    pub exempt_systems: Vec<SystemName>,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            forced: false,
            exempt_systems: Vec::new(),
        }
    }
}

impl BlacklistConfig {
    /// Returns the failure policy applied by core-systems clients.
    #[must_use]
    pub fn policy(&self) -> BlacklistPolicy {
        BlacklistPolicy {
            forced: self.forced,
            exempt: self.exempt_systems.clone(),
        }
    }
}

/// Location of the core services the broker consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSystemsEndpoints {
    /// Base URL of the service registry.
    pub service_registry_url: String,
    /// Path of the registry lookup operation.
    pub lookup_path: String,
    /// Base URL of the authorization service.
    pub authorization_url: String,
    /// Path of the bulk authorization verification operation.
    pub verify_path: String,
    /// Path of the bulk token generation operation.
    pub token_generation_path: String,
    /// Base URL of the blacklist service.
    pub blacklist_url: String,
    /// Path of the blacklist query operation.
    pub blacklist_query_path: String,
}

impl Default for CoreSystemsEndpoints {
    fn default() -> Self {
        Self {
            service_registry_url: "http://localhost:8443/serviceregistry".to_owned(),
            lookup_path: "/service-discovery/lookup".to_owned(),
            authorization_url: "http://localhost:8445/consumerauthorization".to_owned(),
            verify_path: "/authorization/mgmt/check-policies".to_owned(),
            token_generation_path: "/authorization-token/mgmt/generate-tokens".to_owned(),
            blacklist_url: "http://localhost:8463/blacklist".to_owned(),
            blacklist_query_path: "/blacklist/mgmt/query".to_owned(),
        }
    }
}

/// Settings of the translation bridge broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Name the broker uses towards core services.
    pub system_name: SystemName,
    /// Blacklist settings.
    pub blacklist: BlacklistConfig,
    /// Whether authorization checks run.
    pub authorization_enabled: bool,
    /// Whether translators receive operator settings.
    pub custom_configuration_enabled: bool,
    /// Operator settings per translator system.
    pub custom_configurations: HashMap<SystemName, Map<String, Value>>,
    /// Whether per-request discovery flags are honoured.
    pub discovery_flags_allowed: bool,
    /// Minimum remaining availability of translators, in minutes; 0 disables.
    pub translator_min_availability_minutes: u32,
    /// Age after which unselected discovery rows are closed, in hours.
    pub discovery_max_age_hours: u64,
    /// Period of the bridge cleaner, in seconds.
    pub cleaner_interval_secs: u64,
    /// Whether translators are reached over HTTPS.
    pub ssl_enabled: bool,
    /// Local cloud authentication policy.
    pub authentication_policy: AuthenticationPolicy,
    /// Core service locations.
    pub core_systems: CoreSystemsEndpoints,
    /// Request timeout of outbound HTTP calls, in seconds.
    pub http_timeout_secs: u64,
    /// Largest accepted query page.
    pub max_page_size: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            system_name: SystemName::translation_manager(),
            blacklist: BlacklistConfig::default(),
            authorization_enabled: false,
            custom_configuration_enabled: false,
            custom_configurations: HashMap::new(),
            discovery_flags_allowed: true,
            translator_min_availability_minutes: 5,
            discovery_max_age_hours: 1,
            cleaner_interval_secs: 300,
            ssl_enabled: false,
            authentication_policy: AuthenticationPolicy::Declared,
            core_systems: CoreSystemsEndpoints::default(),
            http_timeout_secs: 10,
            max_page_size: 1000,
        }
    }
}

impl BrokerConfig {
    /// Configuration with every security check switched off.
    ///
    /// Useful for local development against in-memory adapters.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            blacklist: BlacklistConfig {
                enabled: false,
                ..BlacklistConfig::default()
            },
            authorization_enabled: false,
            ..Self::default()
        }
    }

    /// Configuration with every security check switched on and a fail-closed
    /// blacklist.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            blacklist: BlacklistConfig {
                enabled: true,
                forced: true,
                exempt_systems: Vec::new(),
            },
            authorization_enabled: true,
            discovery_flags_allowed: false,
            ..Self::default()
        }
    }

    /// Returns the discovery flags used when a request carries none.
    #[must_use]
    pub const fn default_discovery_flags(&self) -> DiscoveryFlags {
        DiscoveryFlags::system_defaults(self.blacklist.enabled, self.authorization_enabled)
    }

    /// Merges requested flags with the system-wide switches.
    #[must_use]
    pub const fn effective_discovery_flags(&self, requested: Option<DiscoveryFlags>) -> DiscoveryFlags {
        match requested {
            Some(flags) if self.discovery_flags_allowed => {
                flags.restricted_to(self.blacklist.enabled, self.authorization_enabled)
            }
            _ => self.default_discovery_flags(),
        }
    }

    /// Returns whether data model translators may use certificate
    /// authentication.
    #[must_use]
    pub const fn certificate_authentication(&self) -> bool {
        matches!(
            self.authentication_policy,
            AuthenticationPolicy::Certificate
        )
    }

    /// Returns how old a discovery row may get before the cleaner closes it.
    #[must_use]
    pub const fn discovery_max_age(&self) -> Duration {
        Duration::from_secs(self.discovery_max_age_hours.saturating_mul(SECONDS_PER_HOUR))
    }

    /// Returns the cleaner period.
    #[must_use]
    pub const fn cleaner_interval(&self) -> Duration {
        Duration::from_secs(self.cleaner_interval_secs)
    }

    /// Returns the outbound HTTP request timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}
