//! Management discovery and bridge queries.

use super::helpers::{Broker, broker, http_target, mqtt_discovery, system};
use eyre::{bail, ensure};
use rstest::rstest;
use translation_bridge::bridge::{
    domain::{BridgeId, BridgeStatus, DiscoveryFlags},
    ports::BridgeStore,
    services::{BrokerErrorKind, BrokerOperation, NegotiationPayload, QueryPayload},
};

async fn negotiated_for(broker: &Broker, consumer: &str, provider: &str) -> eyre::Result<BridgeId> {
    let requester = system(consumer);
    let target = http_target(provider);
    let bridges = broker.bridges();
    let discovered = bridges
        .discovery(&requester, mqtt_discovery(vec![target.clone()]))
        .await?;
    let Some(bridge_id) = discovered.bridge_id else {
        bail!("discovery found nothing");
    };
    bridges
        .negotiation(
            &requester,
            NegotiationPayload {
                bridge_id: Some(bridge_id.to_string()),
                target: Some(target),
                ..NegotiationPayload::default()
            },
        )
        .await?;
    Ok(bridge_id)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn queries_only_return_negotiated_bridges(broker: Broker) -> eyre::Result<()> {
    let negotiated = negotiated_for(&broker, "ConsumerOne", "ProviderA").await?;
    broker
        .bridges()
        .discovery(&system("ConsumerOne"), mqtt_discovery(vec![http_target("ProviderB")]))
        .await?;

    let page = broker.management().query(&QueryPayload::default()).await?;

    ensure!(page.total == 1);
    ensure!(
        page.items
            .iter()
            .map(|record| record.header.bridge_id())
            .eq([negotiated])
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn filters_narrow_the_result(broker: Broker) -> eyre::Result<()> {
    negotiated_for(&broker, "ConsumerOne", "ProviderA").await?;
    let second = negotiated_for(&broker, "ConsumerTwo", "ProviderB").await?;
    broker
        .management()
        .abort(&[second.to_string()])
        .await?;

    let by_consumer = broker
        .management()
        .query(&QueryPayload {
            consumers: vec!["ConsumerTwo".to_owned()],
            ..QueryPayload::default()
        })
        .await?;
    let by_status = broker
        .management()
        .query(&QueryPayload {
            statuses: vec!["INITIALIZED".to_owned()],
            ..QueryPayload::default()
        })
        .await?;

    ensure!(by_consumer.items.len() == 1);
    ensure!(
        by_consumer
            .items
            .iter()
            .all(|record| record.header.status() == BridgeStatus::Aborted
                && record.details.provider.as_str() == "ProviderB")
    );
    ensure!(by_status.items.len() == 1);
    ensure!(
        by_status
            .items
            .iter()
            .all(|record| record.details.consumer.as_str() == "ConsumerOne")
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn pages_keep_the_total(broker: Broker) -> eyre::Result<()> {
    for provider in ["ProviderA", "ProviderB", "ProviderC"] {
        negotiated_for(&broker, "ConsumerOne", provider).await?;
    }

    let page = broker
        .management()
        .query(&QueryPayload {
            page: Some(1),
            size: Some(2),
            ..QueryPayload::default()
        })
        .await?;

    ensure!(page.total == 3);
    ensure!(page.items.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn default_order_is_creation_order(broker: Broker) -> eyre::Result<()> {
    let mut created = Vec::new();
    for provider in [
        "ProviderA", "ProviderB", "ProviderC", "ProviderD", "ProviderE", "ProviderF",
    ] {
        created.push(negotiated_for(&broker, "ConsumerOne", provider).await?);
    }

    let page = broker.management().query(&QueryPayload::default()).await?;
    let listed: Vec<BridgeId> = page
        .items
        .iter()
        .map(|record| record.header.bridge_id())
        .collect();
    let second_page = broker
        .management()
        .query(&QueryPayload {
            page: Some(1),
            size: Some(4),
            ..QueryPayload::default()
        })
        .await?;

    ensure!(listed == created, "listed {listed:?}, created {created:?}");
    ensure!(
        page.items
            .windows(2)
            .all(|pair| matches!(pair, [earlier, later] if earlier.header.id() < later.header.id()))
    );
    ensure!(
        second_page
            .items
            .iter()
            .map(|record| record.header.bridge_id())
            .eq(created.iter().skip(4).copied())
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_queries_are_rejected(broker: Broker) -> eyre::Result<()> {
    let Err(err) = broker
        .management()
        .query(&QueryPayload {
            statuses: vec!["SLEEPING".to_owned()],
            ..QueryPayload::default()
        })
        .await
    else {
        bail!("unknown status was accepted");
    };

    ensure!(err.kind() == BrokerErrorKind::InvalidParameter);
    ensure!(err.origin() == Some(BrokerOperation::Query));
    Ok(())
}

mod management_discovery {
    use super::*;

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn the_operator_creates_bridges_for_a_consumer(broker: Broker) -> eyre::Result<()> {
        let mut payload = mqtt_discovery(vec![http_target("ProviderA")]);
        payload.consumer = Some("ConsumerOne".to_owned());

        let response = broker
            .management()
            .discovery(&system("OperatorConsole"), payload)
            .await?;

        let Some(bridge_id) = response.bridge_id else {
            bail!("discovery found nothing");
        };
        let Some(header) = broker.store.find_header(bridge_id).await? else {
            bail!("bridge missing");
        };
        ensure!(header.created_by().as_str() == "OperatorConsole");
        let rows = broker.store.find_discoveries(bridge_id).await?;
        ensure!(
            rows.iter()
                .all(|row| row.model.consumer.as_str() == "ConsumerOne")
        );
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn a_consumer_is_required(broker: Broker) -> eyre::Result<()> {
        let Err(err) = broker
            .management()
            .discovery(
                &system("OperatorConsole"),
                mqtt_discovery(vec![http_target("ProviderA")]),
            )
            .await
        else {
            bail!("discovery without consumer was accepted");
        };

        ensure!(err.kind() == BrokerErrorKind::InvalidParameter);
        ensure!(err.message() == "Consumer is missing");
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn switched_off_checks_stay_off(broker: Broker) -> eyre::Result<()> {
        broker.core.blacklist(&system("ConsumerOne"))?;
        let mut payload = mqtt_discovery(vec![http_target("ProviderA")]);
        payload.consumer = Some("ConsumerOne".to_owned());
        payload.flags = Some(DiscoveryFlags {
            consumer_blacklist_check: true,
            ..DiscoveryFlags::default()
        });

        let response = broker
            .management()
            .discovery(&system("OperatorConsole"), payload)
            .await?;

        ensure!(response.bridge_id.is_some());
        Ok(())
    }
}
