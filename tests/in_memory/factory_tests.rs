//! On-demand data model translators provided by a factory.

use super::helpers::{Broker, CONSUMER, broker, http_target_expecting, mqtt_discovery, system};
use async_trait::async_trait;
use eyre::{bail, ensure};
use rstest::rstest;
use std::sync::{Arc, Mutex};
use translation_bridge::bridge::{
    domain::{BridgeStatus, DataModelId, DataModelTranslatorChoice, Metadata, SystemName},
    ports::{BridgeStore, DataModelTranslatorFactory, FactoryError, FactoryResult},
    services::{BrokerErrorKind, DiscoveryPayload, validate_discovery},
};

/// Factory that announces one placeholder and records instantiations.
#[derive(Default)]
struct StubFactory {
    failing: bool,
    instantiated: Mutex<Vec<(String, String)>>,
}

impl StubFactory {
    fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn instantiated(&self) -> Vec<(String, String)> {
        self.instantiated
            .lock()
            .expect("instantiation log is not poisoned")
            .clone()
    }
}

#[async_trait]
impl DataModelTranslatorFactory for StubFactory {
    async fn find(
        &self,
        _from: &DataModelId,
        _to: &DataModelId,
    ) -> FactoryResult<Option<DataModelTranslatorChoice>> {
        Ok(Some(DataModelTranslatorChoice {
            name: system("XmlFactory"),
            properties: Metadata::new(),
            factory: true,
        }))
    }

    async fn instantiate(
        &self,
        placeholder: &DataModelTranslatorChoice,
        from: &DataModelId,
        to: &DataModelId,
    ) -> FactoryResult<DataModelTranslatorChoice> {
        if self.failing {
            return Err(FactoryError::Failed {
                factory: placeholder.name.clone(),
                reason: "no capacity left".to_owned(),
            });
        }
        self.instantiated
            .lock()
            .expect("instantiation log is not poisoned")
            .push((from.to_string(), to.to_string()));
        Ok(DataModelTranslatorChoice {
            name: system("XmlWorker"),
            properties: Metadata::new().with("accessPort", 9200),
            factory: false,
        })
    }
}

fn json_discovery() -> DiscoveryPayload {
    DiscoveryPayload {
        input_data_model_id: Some("json-v1".to_owned()),
        ..mqtt_discovery(vec![http_target_expecting("ProviderA", "xml-v1")])
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn factory_translators_are_instantiated_on_negotiation(
    broker: Broker,
) -> eyre::Result<()> {
    let factory = Arc::new(StubFactory::default());
    let engine = broker.engine().with_factory(factory.clone());
    let request = validate_discovery(
        json_discovery(),
        &system(CONSUMER),
        system(CONSUMER),
        broker.config.default_discovery_flags(),
    )?;

    let response = engine.discover(&request).await?;
    let Some(bridge_id) = response.bridge_id else {
        bail!("discovery found nothing");
    };
    let rows = broker.store.find_discoveries(bridge_id).await?;
    ensure!(
        rows.iter().all(|row| row
            .model
            .input_data_model_translator
            .as_ref()
            .is_some_and(|choice| choice.factory))
    );
    ensure!(factory.instantiated().is_empty());
    let Some(candidate) = response.candidates.first() else {
        bail!("no candidate returned");
    };

    engine
        .negotiate(bridge_id, &candidate.target_instance_id)
        .await?;

    ensure!(factory.instantiated() == vec![("json-v1".to_owned(), "xml-v1".to_owned())]);
    let Some(details) = broker.store.find_details(bridge_id).await? else {
        bail!("details row missing");
    };
    ensure!(details.input_dm_translator == Some(SystemName::new("XmlWorker")?));
    ensure!(details.input_dm_translator_data.is_some());
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Initialized);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_instantiation_fails_the_bridge(broker: Broker) -> eyre::Result<()> {
    let engine = broker.engine().with_factory(Arc::new(StubFactory::failing()));
    let request = validate_discovery(
        json_discovery(),
        &system(CONSUMER),
        system(CONSUMER),
        broker.config.default_discovery_flags(),
    )?;
    let response = engine.discover(&request).await?;
    let (Some(bridge_id), Some(candidate)) = (response.bridge_id, response.candidates.first())
    else {
        bail!("discovery found nothing");
    };

    let Err(err) = engine
        .negotiate(bridge_id, &candidate.target_instance_id)
        .await
    else {
        bail!("negotiation succeeded without a translator");
    };

    ensure!(err.kind() == BrokerErrorKind::ExternalService);
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Error);
    ensure!(broker.translators.initialized().is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn without_a_factory_the_candidate_is_dropped(broker: Broker) -> eyre::Result<()> {
    let response = broker
        .bridges()
        .discovery(&system(CONSUMER), json_discovery())
        .await?;

    ensure!(response.bridge_id.is_none());
    ensure!(response.candidates.is_empty());
    Ok(())
}
