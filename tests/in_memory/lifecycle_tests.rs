//! End-to-end bridge lifecycle through the public services.

use super::helpers::{
    Broker, CONSUMER, OPERATION, broker, http_target, mqtt_discovery, report_payload, system,
};
use eyre::{bail, ensure};
use rstest::rstest;
use translation_bridge::bridge::{
    domain::{BridgeId, BridgeStatus},
    ports::BridgeStore,
    services::{
        BrokerErrorKind, BrokerOperation, DiscoveryResponse, NegotiationPayload,
        NegotiationResponse,
    },
};

async fn negotiated(broker: &Broker) -> eyre::Result<BridgeId> {
    let consumer = system(CONSUMER);
    let target = http_target("ProviderA");
    let bridges = broker.bridges();
    let discovered = bridges
        .discovery(&consumer, mqtt_discovery(vec![target.clone()]))
        .await?;
    let Some(bridge_id) = discovered.bridge_id else {
        bail!("discovery found nothing");
    };
    bridges
        .negotiation(
            &consumer,
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
async fn discovery_without_reachable_interfaces_returns_nothing(
    broker: Broker,
) -> eyre::Result<()> {
    let mut payload = mqtt_discovery(vec![http_target("ProviderA")]);
    payload.interface_template_names = vec!["generic_coap".to_owned()];

    let response = broker.bridges().discovery(&system(CONSUMER), payload).await?;

    ensure!(response == DiscoveryResponse::empty(), "unexpected response: {response:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn discovery_stores_one_row_per_bridged_candidate(broker: Broker) -> eyre::Result<()> {
    let response = broker
        .bridges()
        .discovery(&system(CONSUMER), mqtt_discovery(vec![http_target("ProviderA")]))
        .await?;

    let Some(bridge_id) = response.bridge_id else {
        bail!("discovery found nothing");
    };
    ensure!(response.candidates.len() == 1);
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Discovered);
    ensure!(broker.store.find_discoveries(bridge_id).await?.len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn negotiation_initializes_the_selected_bridge(broker: Broker) -> eyre::Result<()> {
    let consumer = system(CONSUMER);
    let target = http_target("ProviderA");
    let bridges = broker.bridges();
    let discovered = bridges
        .discovery(&consumer, mqtt_discovery(vec![target.clone()]))
        .await?;
    let Some(bridge_id) = discovered.bridge_id else {
        bail!("discovery found nothing");
    };

    let response = bridges
        .negotiation(
            &consumer,
            NegotiationPayload {
                bridge_id: Some(bridge_id.to_string()),
                target: Some(target),
                ..NegotiationPayload::default()
            },
        )
        .await?;

    ensure!(response.bridge_id == Some(bridge_id));
    ensure!(response.interface.is_some(), "no access descriptor returned");
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Initialized);
    let Some(details) = broker.store.find_details(bridge_id).await? else {
        bail!("details row missing");
    };
    ensure!(details.consumer == consumer);
    ensure!(details.interface_translator.as_str() == "TranslatorA");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn inline_negotiation_discovers_first(broker: Broker) -> eyre::Result<()> {
    let response = broker
        .bridges()
        .negotiation(
            &system(CONSUMER),
            NegotiationPayload {
                target: Some(http_target("ProviderA")),
                operation: Some(OPERATION.to_owned()),
                interface_template_name: Some("generic_mqtt".to_owned()),
                ..NegotiationPayload::default()
            },
        )
        .await?;

    let Some(bridge_id) = response.bridge_id else {
        bail!("inline negotiation found nothing");
    };
    ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Initialized);
    ensure!(broker.translators.initialized().len() == 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn inline_negotiation_without_bridge_is_empty(broker: Broker) -> eyre::Result<()> {
    let response = broker
        .bridges()
        .negotiation(
            &system(CONSUMER),
            NegotiationPayload {
                target: Some(http_target("ProviderA")),
                operation: Some(OPERATION.to_owned()),
                interface_template_name: Some("generic_coap".to_owned()),
                ..NegotiationPayload::default()
            },
        )
        .await?;

    ensure!(response == NegotiationResponse::empty());
    ensure!(broker.translators.initialized().is_empty());
    Ok(())
}

mod reports {
    use super::*;

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn usage_reports_mark_the_bridge_used(broker: Broker) -> eyre::Result<()> {
        let bridge_id = negotiated(&broker).await?;

        let header = broker
            .reports()
            .report(&system("TranslatorA"), report_payload(bridge_id, "USED"))
            .await?;

        ensure!(header.status() == BridgeStatus::Used);
        ensure!(header.usage_report_count() == 1);
        ensure!(header.alive_at().is_some());
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn closing_reports_end_the_bridge(broker: Broker) -> eyre::Result<()> {
        let bridge_id = negotiated(&broker).await?;
        let reports = broker.reports();
        let translator = system("TranslatorA");
        reports
            .report(&translator, report_payload(bridge_id, "USED"))
            .await?;

        let header = reports
            .report(&translator, report_payload(bridge_id, "CLOSED"))
            .await?;

        ensure!(header.status() == BridgeStatus::Closed);
        let Err(err) = reports
            .report(&translator, report_payload(bridge_id, "USED"))
            .await
        else {
            bail!("closed bridge accepted a report");
        };
        ensure!(err.kind() == BrokerErrorKind::InvalidParameter);
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn error_reports_keep_the_message(broker: Broker) -> eyre::Result<()> {
        let bridge_id = negotiated(&broker).await?;
        let mut payload = report_payload(bridge_id, "ERROR");
        payload.error_message = Some("target refused connection".to_owned());

        let header = broker
            .reports()
            .report(&system("TranslatorA"), payload)
            .await?;

        ensure!(header.status() == BridgeStatus::Error);
        ensure!(header.message() == Some("target refused connection"));
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn only_the_bridge_translator_may_report(broker: Broker) -> eyre::Result<()> {
        let bridge_id = negotiated(&broker).await?;

        let Err(err) = broker
            .reports()
            .report(&system("TranslatorB"), report_payload(bridge_id, "USED"))
            .await
        else {
            bail!("foreign translator report was accepted");
        };

        ensure!(err.kind() == BrokerErrorKind::Forbidden);
        ensure!(err.origin() == Some(BrokerOperation::Report));
        ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Initialized);
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn reports_on_unknown_bridges_are_invalid_references(
        broker: Broker,
    ) -> eyre::Result<()> {
        let Err(err) = broker
            .reports()
            .report(&system("TranslatorA"), report_payload(BridgeId::new(), "USED"))
            .await
        else {
            bail!("report on unknown bridge was accepted");
        };

        ensure!(err.kind() == BrokerErrorKind::InvalidReference);
        Ok(())
    }
}

mod self_service_abort {
    use super::*;

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_bridges_report_false(broker: Broker) -> eyre::Result<()> {
        let aborted = broker
            .bridges()
            .abort(&system(CONSUMER), "00000000-0000-0000-0000-000000000000")
            .await?;

        ensure!(!aborted);
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn negotiated_bridges_are_aborted(broker: Broker) -> eyre::Result<()> {
        let bridge_id = negotiated(&broker).await?;

        let aborted = broker
            .bridges()
            .abort(&system(CONSUMER), &bridge_id.to_string())
            .await?;

        ensure!(aborted);
        ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Aborted);
        ensure!(broker.translators.aborted() == vec![(system("TranslatorA"), bridge_id)]);
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_ids_are_rejected(broker: Broker) -> eyre::Result<()> {
        let Err(err) = broker
            .bridges()
            .abort(&system(CONSUMER), "not-a-bridge")
            .await
        else {
            bail!("malformed id was accepted");
        };

        ensure!(err.kind() == BrokerErrorKind::InvalidParameter);
        ensure!(err.origin() == Some(BrokerOperation::Abort));
        Ok(())
    }
}

mod blacklist_outages {
    use super::*;
    use crate::in_memory::helpers::broker_with_blacklist_policy;
    use translation_bridge::bridge::{
        domain::DiscoveryFlags,
        ports::{BlacklistPolicy, CoreSystemsError},
        services::{BrokerResult, validate_discovery},
    };

    const ALL_BLACKLIST_CHECKS: DiscoveryFlags = DiscoveryFlags {
        consumer_blacklist_check: true,
        candidates_blacklist_check: true,
        candidates_auth_check: false,
        translators_blacklist_check: true,
        translators_auth_check: false,
    };

    const CONSUMER_CHECK: DiscoveryFlags = DiscoveryFlags {
        consumer_blacklist_check: true,
        candidates_blacklist_check: false,
        candidates_auth_check: false,
        translators_blacklist_check: false,
        translators_auth_check: false,
    };

    const CANDIDATES_CHECK: DiscoveryFlags = DiscoveryFlags {
        consumer_blacklist_check: false,
        candidates_blacklist_check: true,
        candidates_auth_check: false,
        translators_blacklist_check: false,
        translators_auth_check: false,
    };

    fn forced(exempt: &[&str]) -> BlacklistPolicy {
        BlacklistPolicy {
            forced: true,
            exempt: exempt.iter().map(|name| system(name)).collect(),
        }
    }

    async fn discover(broker: &Broker, flags: DiscoveryFlags) -> BrokerResult<DiscoveryResponse> {
        let request = validate_discovery(
            mqtt_discovery(vec![http_target("ProviderA")]),
            &system(CONSUMER),
            system(CONSUMER),
            flags,
        )?;
        broker.engine().discover(&request).await
    }

    #[rstest]
    #[case::unreachable(CoreSystemsError::Unavailable("connection refused".to_owned()))]
    #[case::server_error(CoreSystemsError::Rejected {
        status: 503,
        message: "maintenance".to_owned(),
    })]
    #[case::garbled(CoreSystemsError::InvalidResponse("truncated body".to_owned()))]
    #[tokio::test(flavor = "multi_thread")]
    async fn outages_fail_open_when_not_forced(#[case] failure: CoreSystemsError) -> eyre::Result<()> {
        let broker = broker_with_blacklist_policy(BlacklistPolicy::default());
        broker.core.blacklist(&system(CONSUMER))?;
        broker.core.fail_blacklist(Some(failure))?;

        let response = discover(&broker, ALL_BLACKLIST_CHECKS).await?;

        let Some(bridge_id) = response.bridge_id else {
            bail!("outage dropped every candidate");
        };
        ensure!(response.candidates.len() == 1);
        ensure!(broker.status_of(bridge_id).await? == BridgeStatus::Discovered);
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn forced_outages_reject_the_consumer() -> eyre::Result<()> {
        let broker = broker_with_blacklist_policy(forced(&[]));
        broker
            .core
            .fail_blacklist(Some(CoreSystemsError::Unavailable("timeout".to_owned())))?;

        let Err(err) = discover(&broker, CONSUMER_CHECK).await else {
            bail!("consumer passed an unavailable forced blacklist");
        };

        ensure!(err.kind() == BrokerErrorKind::Forbidden);
        ensure!(err.message() == "ConsumerOne is blacklisted", "got {}", err.message());
        ensure!(err.origin() == Some(BrokerOperation::Discovery));
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn forced_outages_drop_every_candidate() -> eyre::Result<()> {
        let broker = broker_with_blacklist_policy(forced(&[]));
        broker
            .core
            .fail_blacklist(Some(CoreSystemsError::Unavailable("timeout".to_owned())))?;

        let response = discover(&broker, CANDIDATES_CHECK).await?;

        ensure!(response.bridge_id.is_none());
        ensure!(response.candidates.is_empty());
        Ok(())
    }

    #[rstest]
    #[case::forbidden_open(CoreSystemsError::Forbidden("certificate revoked".to_owned()), false)]
    #[case::forbidden_forced(CoreSystemsError::Forbidden("certificate revoked".to_owned()), true)]
    #[case::unauthorized_open(CoreSystemsError::Unauthorized("certificate revoked".to_owned()), false)]
    #[case::unauthorized_forced(CoreSystemsError::Unauthorized("certificate revoked".to_owned()), true)]
    #[tokio::test(flavor = "multi_thread")]
    async fn refusals_of_the_broker_are_reported(
        #[case] failure: CoreSystemsError,
        #[case] forced_policy: bool,
    ) -> eyre::Result<()> {
        let broker = broker_with_blacklist_policy(BlacklistPolicy {
            forced: forced_policy,
            exempt: Vec::new(),
        });
        broker.core.fail_blacklist(Some(failure))?;

        let Err(err) = discover(&broker, ALL_BLACKLIST_CHECKS).await else {
            bail!("refused blacklist lookup was ignored");
        };

        ensure!(err.kind() == BrokerErrorKind::ExternalService);
        ensure!(err.message().contains("certificate revoked"), "got {}", err.message());
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn exempt_systems_skip_the_lookup() -> eyre::Result<()> {
        let broker = broker_with_blacklist_policy(forced(&[CONSUMER, "ProviderA", "TranslatorA"]));
        broker
            .core
            .fail_blacklist(Some(CoreSystemsError::Forbidden("certificate revoked".to_owned())))?;

        let response = discover(&broker, ALL_BLACKLIST_CHECKS).await?;

        ensure!(response.bridge_id.is_some());
        ensure!(response.candidates.len() == 1);
        Ok(())
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn restored_blacklists_are_consulted_again() -> eyre::Result<()> {
        let broker = broker_with_blacklist_policy(forced(&[]));
        broker.core.blacklist(&system(CONSUMER))?;
        broker
            .core
            .fail_blacklist(Some(CoreSystemsError::Unavailable("timeout".to_owned())))?;
        broker.core.fail_blacklist(None)?;

        let blocked = discover(&broker, CONSUMER_CHECK).await;
        let response = discover(&broker, CANDIDATES_CHECK).await?;

        ensure!(blocked.is_err_and(|err| err.kind() == BrokerErrorKind::Forbidden));
        ensure!(response.bridge_id.is_some());
        Ok(())
    }
}
