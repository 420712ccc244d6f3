//! Shared fixtures for the in-memory broker integration tests.

use mockable::DefaultClock;
use rstest::fixture;
use serde_json::{Value, json};
use std::sync::Arc;
use translation_bridge::bridge::{
    adapters::{
        matchmaking::FirstCandidateMatchmaker,
        memory::{InMemoryBridgeStore, InMemoryCoreSystems, InMemoryTranslatorClient},
    },
    domain::{
        BridgeId, BridgeStatus, InterfacePolicy, InterfaceTemplateName, Metadata,
        ServiceDefinitionName, ServiceInstance, ServiceInstanceId, ServiceInterface, SystemName,
    },
    ports::{BlacklistPolicy, BridgeStore},
    services::{
        BridgeManagementService, BridgeReportService, BridgeService, DiscoveryPayload,
        NegotiationEngine, ReportPayload,
    },
};
use translation_bridge::config::BrokerConfig;

/// Operation every test target exposes.
pub const OPERATION: &str = "query-temperature";

/// Consumer used by self-service calls.
pub const CONSUMER: &str = "ConsumerOne";

/// Engine over the in-memory adapters.
pub type MemoryEngine =
    NegotiationEngine<InMemoryBridgeStore, InMemoryCoreSystems, InMemoryTranslatorClient>;

/// Parses a system name.
///
/// # Panics
///
/// Panics when `name` is not a valid system name.
pub fn system(name: &str) -> SystemName {
    SystemName::new(name).expect("valid system name")
}

fn template(name: &str) -> InterfaceTemplateName {
    InterfaceTemplateName::new(name).expect("valid interface template")
}

fn metadata(value: Value) -> Metadata {
    let Value::Object(map) = value else {
        return Metadata::new();
    };
    Metadata::from_map(map)
}

fn instance(provider: &str, service_definition: &str) -> ServiceInstance {
    ServiceInstance::new(
        ServiceInstanceId::new(format!("{provider}|{service_definition}|1.0.0"))
            .expect("valid instance id"),
        system(provider),
        ServiceDefinitionName::new(service_definition).expect("valid service definition"),
    )
}

/// A temperature provider reachable over `generic_http`.
pub fn http_target(provider: &str) -> ServiceInstance {
    instance(provider, "temperatureInfo").with_interface(
        ServiceInterface::new(template("generic_http"), InterfacePolicy::None).with_properties(
            metadata(json!({
                "accessAddresses": ["10.0.0.5"],
                "accessPort": 8080,
                "basePath": "/temperature"
            })),
        ),
    )
}

/// A temperature provider whose interface declares `input` as the request
/// data model of [`OPERATION`].
pub fn http_target_expecting(provider: &str, input: &str) -> ServiceInstance {
    instance(provider, "temperatureInfo").with_interface(
        ServiceInterface::new(template("generic_http"), InterfacePolicy::None).with_properties(
            metadata(json!({
                "accessAddresses": ["10.0.0.5"],
                "accessPort": 8080,
                "dataModels": { OPERATION: { "input": input } }
            })),
        ),
    )
}

/// An interface translator from MQTT consumers to HTTP targets.
pub fn mqtt_to_http_translator(provider: &str) -> ServiceInstance {
    instance(provider, "interfaceBridgeManagement")
        .with_metadata(metadata(json!({
            "interfaceBridge": { "from": ["generic_mqtt"], "to": ["generic_http"] }
        })))
        .with_interface(
            ServiceInterface::new(template("generic_http"), InterfacePolicy::None)
                .with_properties(metadata(json!({
                    "accessAddresses": ["10.0.1.7"],
                    "accessPort": 9000
                }))),
        )
}

/// A discovery payload for an MQTT consumer.
pub fn mqtt_discovery(candidates: Vec<ServiceInstance>) -> DiscoveryPayload {
    DiscoveryPayload {
        candidates,
        operation: Some(OPERATION.to_owned()),
        interface_template_names: vec!["generic_mqtt".to_owned()],
        ..DiscoveryPayload::default()
    }
}

/// A report payload stamped with the current time.
pub fn report_payload(bridge_id: BridgeId, state: &str) -> ReportPayload {
    ReportPayload {
        bridge_id: bridge_id.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        state: state.to_owned(),
        error_message: None,
    }
}

/// A broker wired to in-memory adapters, with one MQTT-to-HTTP translator
/// registered as `TranslatorA`.
pub struct Broker {
    /// Bridge state store.
    pub store: Arc<InMemoryBridgeStore>,
    /// Registry, authorization and blacklist.
    pub core: Arc<InMemoryCoreSystems>,
    /// Interface translator instances.
    pub translators: Arc<InMemoryTranslatorClient>,
    /// Broker settings.
    pub config: Arc<BrokerConfig>,
}

impl Broker {
    /// Builds the engine shared by the services.
    pub fn engine(&self) -> MemoryEngine {
        NegotiationEngine::new(
            Arc::clone(&self.store),
            Arc::clone(&self.core),
            Arc::clone(&self.translators),
        )
        .with_interface_matchmaker(Arc::new(FirstCandidateMatchmaker))
        .with_data_model_matchmaker(Arc::new(FirstCandidateMatchmaker))
    }

    /// Self-service operations.
    pub fn bridges(
        &self,
    ) -> BridgeService<InMemoryBridgeStore, InMemoryCoreSystems, InMemoryTranslatorClient> {
        BridgeService::new(self.engine(), Arc::clone(&self.config))
    }

    /// Management operations.
    pub fn management(
        &self,
    ) -> BridgeManagementService<InMemoryBridgeStore, InMemoryCoreSystems, InMemoryTranslatorClient>
    {
        BridgeManagementService::new(self.engine(), Arc::clone(&self.config))
    }

    /// Translator reports.
    pub fn reports(&self) -> BridgeReportService<InMemoryBridgeStore, DefaultClock> {
        BridgeReportService::new(Arc::clone(&self.store), Arc::new(DefaultClock))
    }

    /// Returns the stored status of `bridge_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the store fails or the bridge is unknown.
    pub async fn status_of(&self, bridge_id: BridgeId) -> eyre::Result<BridgeStatus> {
        let Some(header) = self.store.find_header(bridge_id).await? else {
            eyre::bail!("bridge {bridge_id} is not stored");
        };
        Ok(header.status())
    }
}

/// Provides a permissive broker for each test.
#[fixture]
pub fn broker() -> Broker {
    broker_with_blacklist_policy(BlacklistPolicy::default())
}

/// Builds a permissive broker whose blacklist outages follow `policy`.
///
/// # Panics
///
/// Panics when the translator cannot be registered.
pub fn broker_with_blacklist_policy(policy: BlacklistPolicy) -> Broker {
    let core = InMemoryCoreSystems::new().with_blacklist_policy(policy);
    core.register(mqtt_to_http_translator("TranslatorA"))
        .expect("registration succeeds");
    Broker {
        store: Arc::new(InMemoryBridgeStore::new()),
        core: Arc::new(core),
        translators: Arc::new(InMemoryTranslatorClient::new()),
        config: Arc::new(BrokerConfig::permissive()),
    }
}
