//! Periodic closing of discovery results nobody negotiated.

use super::helpers::{Broker, CONSUMER, broker, http_target, mqtt_discovery, system};
use eyre::{bail, ensure};
use mockable::DefaultClock;
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use translation_bridge::bridge::{
    adapters::memory::InMemoryBridgeStore,
    domain::{BridgeId, BridgeStatus},
    ports::{BridgeStore, store::OBSOLETE_DISCOVERY_MESSAGE},
    services::{BridgeCleaner, NegotiationPayload},
};

const SETTLE: Duration = Duration::from_millis(20);

fn cleaner(broker: &Broker, max_age: Duration) -> BridgeCleaner<InMemoryBridgeStore, DefaultClock> {
    BridgeCleaner::new(
        Arc::clone(&broker.store),
        Arc::new(DefaultClock),
        max_age,
        Duration::from_secs(1),
    )
}

async fn discover(broker: &Broker) -> eyre::Result<BridgeId> {
    let response = broker
        .bridges()
        .discovery(&system(CONSUMER), mqtt_discovery(vec![http_target("ProviderA")]))
        .await?;
    let Some(bridge_id) = response.bridge_id else {
        bail!("discovery found nothing");
    };
    Ok(bridge_id)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stale_discoveries_are_closed(broker: Broker) -> eyre::Result<()> {
    let bridge_id = discover(&broker).await?;
    tokio::time::sleep(SETTLE).await;

    let closed = cleaner(&broker, Duration::ZERO).run_once().await?;

    ensure!(closed == 1);
    let Some(header) = broker.store.find_header(bridge_id).await? else {
        bail!("bridge missing");
    };
    ensure!(header.status() == BridgeStatus::Closed);
    ensure!(header.message() == Some(OBSOLETE_DISCOVERY_MESSAGE));
    ensure!(broker.store.find_discoveries(bridge_id).await?.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn fresh_discoveries_survive(broker: Broker) -> eyre::Result<()> {
    let bridge_id = discover(&broker).await?;

    let closed = cleaner(&broker, Duration::from_secs(3600)).run_once().await?;

    ensure!(closed == 0);
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Discovered);
    ensure!(broker.store.find_discoveries(bridge_id).await?.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn active_bridges_are_left_alone(broker: Broker) -> eyre::Result<()> {
    let bridge_id = discover(&broker).await?;
    let snapshot = broker.store.find_discoveries(bridge_id).await?;
    broker
        .bridges()
        .negotiation(
            &system(CONSUMER),
            NegotiationPayload {
                bridge_id: Some(bridge_id.to_string()),
                target: Some(http_target("ProviderA")),
                ..NegotiationPayload::default()
            },
        )
        .await?;
    tokio::time::sleep(SETTLE).await;

    let closed = cleaner(&broker, Duration::ZERO).run_once().await?;
    for row in &snapshot {
        broker.store.close_obsolete(row).await?;
    }

    ensure!(closed == 0);
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Initialized);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn the_spawned_sweep_runs_immediately(broker: Broker) -> eyre::Result<()> {
    let bridge_id = discover(&broker).await?;
    tokio::time::sleep(SETTLE).await;

    let handle = cleaner(&broker, Duration::ZERO).spawn();
    let mut status = broker.status_of(bridge_id).await?;
    for _ in 0..50 {
        if status == BridgeStatus::Closed {
            break;
        }
        tokio::time::sleep(SETTLE).await;
        status = broker.status_of(bridge_id).await?;
    }
    handle.abort();

    ensure!(status == BridgeStatus::Closed, "bridge still {status}");
    Ok(())
}
