//! Unit tests for bridge query filtering and paging.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use rstest::{fixture, rstest};

use super::fixtures::{operation, system};
use crate::bridge::domain::{
    BaseFilter, BridgeDetails, BridgeHeader, BridgeId, BridgeQuery, BridgeRecord, BridgeStatus,
    PageRequest, PersistedBridgeHeaderData, ServiceDefinitionName, SortDirection, SortField,
    TimeRange,
};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

struct RecordShape<'a> {
    id: i64,
    consumer: &'a str,
    translator: &'a str,
    data_model_translator: Option<&'a str>,
    status: BridgeStatus,
    usage: u64,
    created_hour: u32,
    alive_hour: Option<u32>,
}

fn record(shape: &RecordShape<'_>) -> BridgeRecord {
    let bridge_id = BridgeId::new();
    let created_at = at(shape.created_hour);
    let header = BridgeHeader::from_persisted(PersistedBridgeHeaderData {
        id: shape.id,
        bridge_id,
        created_by: system(shape.consumer),
        status: shape.status,
        message: None,
        usage_report_count: shape.usage,
        alive_at: shape.alive_hour.map(at),
        created_at,
        updated_at: created_at + Duration::minutes(i64::from(shape.created_hour)),
    });
    let details = BridgeDetails {
        bridge_id,
        consumer: system(shape.consumer),
        provider: system("TemperatureProvider"),
        service_definition: ServiceDefinitionName::new("temperatureInfo")
            .expect("valid service definition"),
        operation: operation(),
        interface_translator: system(shape.translator),
        interface_translator_data: None,
        input_dm_translator: shape.data_model_translator.map(system),
        input_dm_translator_data: None,
        result_dm_translator: None,
        result_dm_translator_data: None,
        created_at,
        updated_at: created_at,
    };
    BridgeRecord { header, details }
}

#[fixture]
fn records() -> Vec<BridgeRecord> {
    vec![
        record(&RecordShape {
            id: 2,
            consumer: "ConsumerOne",
            translator: "TranslatorA",
            data_model_translator: Some("JsonToXml"),
            status: BridgeStatus::Used,
            usage: 4,
            created_hour: 1,
            alive_hour: Some(5),
        }),
        record(&RecordShape {
            id: 3,
            consumer: "ConsumerTwo",
            translator: "TranslatorA",
            data_model_translator: None,
            status: BridgeStatus::Initialized,
            usage: 0,
            created_hour: 2,
            alive_hour: None,
        }),
        record(&RecordShape {
            id: 1,
            consumer: "ConsumerOne",
            translator: "TranslatorB",
            data_model_translator: None,
            status: BridgeStatus::Aborted,
            usage: 1,
            created_hour: 3,
            alive_hour: Some(3),
        }),
    ]
}

fn consumers_of(records: &[BridgeRecord], query: &BridgeQuery) -> Vec<String> {
    records
        .iter()
        .filter(|candidate| query.matches(candidate))
        .map(|candidate| candidate.details.consumer.to_string())
        .collect()
}

#[rstest]
fn empty_query_matches_everything(records: Vec<BridgeRecord>) {
    let query = BridgeQuery::default();
    assert!(query.is_unfiltered());
    assert!(query.base_filter().is_none());
    assert!(records.iter().all(|candidate| query.matches(candidate)));
}

#[rstest]
fn filters_are_conjunctive(records: Vec<BridgeRecord>) {
    let query = BridgeQuery {
        consumers: vec![system("ConsumerOne")],
        interface_translators: vec![system("TranslatorA")],
        ..BridgeQuery::default()
    };
    assert_eq!(consumers_of(&records, &query), vec!["ConsumerOne"]);
}

#[rstest]
fn data_model_translator_filter_matches_either_direction(records: Vec<BridgeRecord>) {
    let query = BridgeQuery {
        data_model_translators: vec![system("JsonToXml")],
        ..BridgeQuery::default()
    };
    assert_eq!(consumers_of(&records, &query), vec!["ConsumerOne"]);
}

#[rstest]
#[case(Some(1), None, 2)]
#[case(None, Some(0), 1)]
#[case(Some(1), Some(1), 1)]
#[case(Some(5), None, 0)]
fn usage_bounds_are_inclusive(
    records: Vec<BridgeRecord>,
    #[case] min_usage: Option<u64>,
    #[case] max_usage: Option<u64>,
    #[case] expected: usize,
) {
    let query = BridgeQuery {
        min_usage,
        max_usage,
        ..BridgeQuery::default()
    };
    assert_eq!(consumers_of(&records, &query).len(), expected);
}

#[rstest]
fn liveness_ranges_exclude_bridges_never_seen_alive(records: Vec<BridgeRecord>) {
    let query = BridgeQuery {
        alive: TimeRange {
            from: Some(at(0)),
            to: None,
        },
        ..BridgeQuery::default()
    };
    assert_eq!(consumers_of(&records, &query), vec!["ConsumerOne", "ConsumerOne"]);
}

#[rstest]
fn creation_range_is_inclusive_on_both_ends(records: Vec<BridgeRecord>) {
    let query = BridgeQuery {
        created: TimeRange {
            from: Some(at(2)),
            to: Some(at(3)),
        },
        ..BridgeQuery::default()
    };
    assert_eq!(consumers_of(&records, &query), vec!["ConsumerTwo", "ConsumerOne"]);
}

#[rstest]
fn base_filter_follows_priority_order() {
    let query = BridgeQuery {
        creators: vec![system("ConsumerOne")],
        statuses: vec![BridgeStatus::Used],
        providers: vec![system("TemperatureProvider")],
        ..BridgeQuery::default()
    };
    assert_eq!(query.base_filter(), Some(BaseFilter::Providers));
    assert!(!query.is_unfiltered());
}

#[rstest]
#[case(SortField::Id, SortDirection::Asc, vec![3, 1])]
#[case(SortField::Id, SortDirection::Desc, vec![2, 1])]
#[case(SortField::CreatedAt, SortDirection::Asc, vec![1, 2])]
#[case(SortField::CreatedAt, SortDirection::Desc, vec![3, 2])]
#[case(SortField::UpdatedAt, SortDirection::Desc, vec![3, 2])]
fn pages_are_sorted_before_slicing(
    records: Vec<BridgeRecord>,
    #[case] field: SortField,
    #[case] direction: SortDirection,
    #[case] expected_hours: Vec<u32>,
) {
    let page = PageRequest::new(0, 2).sorted_by(field, direction).apply(records);
    let hours: Vec<u32> = page
        .items
        .iter()
        .map(|item| item.header.created_at().hour())
        .collect();
    assert_eq!(page.total, 3);
    assert_eq!(hours, expected_hours);
}

#[rstest]
fn pages_past_the_end_are_empty(records: Vec<BridgeRecord>) {
    let page = PageRequest::new(3, 2).apply(records);
    assert!(page.items.is_empty());
    assert_eq!(page.total, 3);
}

#[rstest]
fn default_order_follows_the_surrogate_key(records: Vec<BridgeRecord>) {
    let page = PageRequest::default().apply(records);
    let ids: Vec<i64> = page.items.iter().map(|item| item.header.id()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}
