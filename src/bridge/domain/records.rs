//! Records owned by a bridge header.

use super::{
    BridgeHeader, BridgeId, BridgeStatus, DataModelTranslationDescriptor,
    InterfaceTranslationDescriptor, OperationName, ServiceDefinitionName, SystemName,
    TranslationDiscoveryModel,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored discovery candidate waiting for negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDiscovery {
    /// Row identifier.
    pub id: Uuid,
    /// Owning bridge.
    pub bridge_id: BridgeId,
    /// Candidate snapshot.
    pub model: TranslationDiscoveryModel,
    /// Creation timestamp, used by the cleaner.
    pub created_at: DateTime<Utc>,
}

impl BridgeDiscovery {
    /// Creates a discovery row for `model`.
    #[must_use]
    pub fn new(bridge_id: BridgeId, model: TranslationDiscoveryModel, clock: &impl Clock) -> Self {
        Self {
            id: Uuid::new_v4(),
            bridge_id,
            model,
            created_at: clock.utc(),
        }
    }
}

/// The finalized arrangement of a negotiated bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeDetails {
    /// Owning bridge.
    pub bridge_id: BridgeId,
    /// Consumer system.
    pub consumer: SystemName,
    /// Target provider.
    pub provider: SystemName,
    /// Target service definition.
    pub service_definition: ServiceDefinitionName,
    /// Target operation.
    pub operation: OperationName,
    /// Interface translator serving the bridge.
    pub interface_translator: SystemName,
    /// Interface translator configuration; `None` until negotiation finalizes it.
    pub interface_translator_data: Option<InterfaceTranslationDescriptor>,
    /// Request payload translator, if any.
    pub input_dm_translator: Option<SystemName>,
    /// Request payload translator configuration.
    pub input_dm_translator_data: Option<DataModelTranslationDescriptor>,
    /// Response payload translator, if any.
    pub result_dm_translator: Option<SystemName>,
    /// Response payload translator configuration.
    pub result_dm_translator_data: Option<DataModelTranslationDescriptor>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl BridgeDetails {
    /// Creates the details row for a selected candidate with a placeholder
    /// interface translator configuration.
    #[must_use]
    pub fn from_model(
        bridge_id: BridgeId,
        model: &TranslationDiscoveryModel,
        clock: &impl Clock,
    ) -> Self {
        let timestamp = clock.utc();
        Self {
            bridge_id,
            consumer: model.consumer.clone(),
            provider: model.provider.clone(),
            service_definition: model.service_definition.clone(),
            operation: model.operation.clone(),
            interface_translator: model.interface_translator.name.clone(),
            interface_translator_data: None,
            input_dm_translator: model
                .input_data_model_translator
                .as_ref()
                .map(|choice| choice.name.clone()),
            input_dm_translator_data: None,
            result_dm_translator: model
                .output_data_model_translator
                .as_ref()
                .map(|choice| choice.name.clone()),
            result_dm_translator_data: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }
}

/// A header joined with its details row, as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeRecord {
    /// Bridge header.
    pub header: BridgeHeader,
    /// Bridge details.
    pub details: BridgeDetails,
}

/// Outcome of an abort attempt on one bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortOutcome {
    /// Whether this call moved the bridge to [`BridgeStatus::Aborted`].
    pub happened: bool,
    /// Status before the call; `None` for unknown bridges.
    pub previous_status: Option<BridgeStatus>,
    /// Details row of the aborted bridge, when it had one.
    pub details: Option<BridgeDetails>,
}

impl AbortOutcome {
    /// Outcome for a bridge identifier the store does not know.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            happened: false,
            previous_status: None,
            details: None,
        }
    }

    /// Returns whether the caller's abort request is satisfied.
    ///
    /// Unknown bridges report `false`. Bridges that were already in an end
    /// state report `true`.
    #[must_use]
    pub fn is_satisfied(&self) -> bool {
        self.happened || self.previous_status.is_some_and(BridgeStatus::is_end)
    }
}
