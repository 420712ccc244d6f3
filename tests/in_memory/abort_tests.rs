//! Abort semantics under concurrency and management bulk abort.

use super::helpers::{Broker, CONSUMER, broker, http_target, mqtt_discovery, system};
use eyre::{bail, ensure};
use rstest::rstest;
use std::sync::Arc;
use translation_bridge::bridge::{
    adapters::memory::InitializationGate,
    domain::{BridgeId, BridgeStatus, ServiceInstanceId},
    ports::BridgeStore,
    services::{BrokerErrorKind, NegotiationPayload},
};

async fn discovered(broker: &Broker) -> eyre::Result<(BridgeId, ServiceInstanceId)> {
    let target = http_target("ProviderA");
    let target_id = target.instance_id.clone();
    let response = broker
        .bridges()
        .discovery(&system(CONSUMER), mqtt_discovery(vec![target]))
        .await?;
    let Some(bridge_id) = response.bridge_id else {
        bail!("discovery found nothing");
    };
    Ok((bridge_id, target_id))
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_aborts_take_effect_once(broker: Broker) -> eyre::Result<()> {
    let (bridge_id, _) = discovered(&broker).await?;
    let first = Arc::clone(&broker.store);
    let second = Arc::clone(&broker.store);

    let (left, right) = tokio::join!(
        tokio::spawn(async move { first.abort(bridge_id, None).await }),
        tokio::spawn(async move { second.abort(bridge_id, None).await }),
    );
    let outcomes = [left??, right??];

    let happened: Vec<_> = outcomes.iter().filter(|outcome| outcome.happened).collect();
    ensure!(happened.len() == 1, "unexpected outcomes: {outcomes:?}");
    ensure!(
        outcomes
            .iter()
            .filter(|outcome| !outcome.happened)
            .all(|outcome| outcome.previous_status == Some(BridgeStatus::Aborted))
    );
    ensure!(outcomes.iter().all(|outcome| outcome.is_satisfied()));
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Aborted);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn abort_during_initialization_wins(broker: Broker) -> eyre::Result<()> {
    let (bridge_id, target_id) = discovered(&broker).await?;
    let gate = InitializationGate::new();
    broker.translators.pause_initialization(gate.clone());
    let engine = broker.engine();
    let negotiating = broker.engine();
    let negotiation =
        tokio::spawn(async move { negotiating.negotiate(bridge_id, &target_id).await });

    gate.wait_until_reached().await;
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Pending);
    let results = engine.abort(&[bridge_id], None).await?;
    gate.open();
    let outcome = negotiation.await?;

    ensure!(results.get(&bridge_id) == Some(&true));
    let Err(err) = outcome else {
        bail!("negotiation succeeded on an aborted bridge");
    };
    ensure!(err.kind() == BrokerErrorKind::InvalidParameter);
    ensure!(err.message().contains("end state"), "unexpected message: {}", err.message());
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Aborted);
    ensure!(
        broker
            .translators
            .aborted()
            .iter()
            .any(|(translator, aborted)| translator.as_str() == "TranslatorA"
                && *aborted == bridge_id)
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn aborting_a_selected_bridge_leaves_only_its_details(broker: Broker) -> eyre::Result<()> {
    let (bridge_id, target_id) = discovered(&broker).await?;
    broker
        .store
        .select_from_discoveries(bridge_id, &target_id)
        .await?;

    let outcome = broker.store.abort(bridge_id, None).await?;

    ensure!(outcome.happened);
    ensure!(outcome.previous_status == Some(BridgeStatus::Pending));
    ensure!(outcome.details.is_some());
    ensure!(broker.store.find_discoveries(bridge_id).await?.is_empty());
    ensure!(broker.store.find_details(bridge_id).await?.is_some());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn consumers_cannot_abort_foreign_bridges(broker: Broker) -> eyre::Result<()> {
    let (bridge_id, _) = discovered(&broker).await?;

    let Err(err) = broker
        .bridges()
        .abort(&system("ConsumerTwo"), &bridge_id.to_string())
        .await
    else {
        bail!("foreign abort was accepted");
    };

    ensure!(err.kind() == BrokerErrorKind::Forbidden);
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Discovered);
    Ok(())
}

mod management {
    use super::*;

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn bulk_abort_reports_per_bridge(broker: Broker) -> eyre::Result<()> {
        let (discovered_id, _) = discovered(&broker).await?;
        let (negotiated_id, _) = discovered(&broker).await?;
        broker
            .bridges()
            .negotiation(
                &system(CONSUMER),
                NegotiationPayload {
                    bridge_id: Some(negotiated_id.to_string()),
                    target: Some(http_target("ProviderA")),
                    ..NegotiationPayload::default()
                },
            )
            .await?;
        let unknown = BridgeId::new();

        let results = broker
            .management()
            .abort(&[
                discovered_id.to_string(),
                negotiated_id.to_string(),
                unknown.to_string(),
            ])
            .await?;

        ensure!(results.get(&discovered_id) == Some(&true));
        ensure!(results.get(&negotiated_id) == Some(&true));
        ensure!(results.get(&unknown) == Some(&false));
        ensure!(broker.translators.aborted() == vec![(system("TranslatorA"), negotiated_id)]);
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn ended_bridges_count_as_aborted(broker: Broker) -> eyre::Result<()> {
        let (bridge_id, _) = discovered(&broker).await?;
        let management = broker.management();
        management.abort(&[bridge_id.to_string()]).await?;

        let results = management.abort(&[bridge_id.to_string()]).await?;

        ensure!(results.get(&bridge_id) == Some(&true));
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn empty_id_lists_are_rejected(broker: Broker) -> eyre::Result<()> {
        let Err(err) = broker.management().abort(&[]).await else {
            bail!("empty abort was accepted");
        };

        ensure!(err.kind() == BrokerErrorKind::InvalidParameter);
        Ok(())
    }
}
