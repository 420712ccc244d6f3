//! Request payloads as callers send them, and their validation into domain
//! values.
//!
//! Validation runs before any engine call; a payload that passes is
//! normalized (trimmed, case-folded identifiers).

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::engine::DiscoveryRequest;
use super::{BrokerError, BrokerResult};
use crate::bridge::domain::{
    BridgeEventState, BridgeId, BridgeQuery, BridgeReport, BridgeStatus, DataModelId,
    DiscoveryFlags, InterfaceTemplateName, OperationName, PageRequest, ServiceDefinitionName,
    ServiceInstance, ServiceInstanceId, SortDirection, SortField, SystemName, TimeRange,
};

/// Discovery payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiscoveryPayload {
    /// Target candidates.
    pub candidates: Vec<ServiceInstance>,
    /// Consumer on whose behalf a management discovery runs.
    pub consumer: Option<String>,
    /// Target operation.
    pub operation: Option<String>,
    /// Interface templates the consumer accepts.
    pub interface_template_names: Vec<String>,
    /// Data model of the request payload.
    pub input_data_model_id: Option<String>,
    /// Data model the consumer expects back.
    pub output_data_model_id: Option<String>,
    /// Requested security checks.
    pub flags: Option<DiscoveryFlags>,
}

/// Negotiation payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NegotiationPayload {
    /// Bridge returned by an earlier discovery.
    pub bridge_id: Option<String>,
    /// Chosen target.
    pub target: Option<ServiceInstance>,
    /// Target operation; needed without a bridge id.
    pub operation: Option<String>,
    /// Interface template the consumer will use; needed without a bridge id.
    pub interface_template_name: Option<String>,
    /// Data model of the request payload.
    pub input_data_model_id: Option<String>,
    /// Data model the consumer expects back.
    pub output_data_model_id: Option<String>,
}

/// Report payload sent by interface translators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportPayload {
    /// Reported bridge.
    pub bridge_id: String,
    /// RFC 3339 time of the event.
    pub timestamp: String,
    /// `USED`, `ERROR` or `CLOSED`.
    pub state: String,
    /// Error description.
    pub error_message: Option<String>,
}

/// Query payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryPayload {
    /// Bridge identifiers.
    pub bridge_ids: Vec<String>,
    /// Systems that created the bridges.
    pub creators: Vec<String>,
    /// Bridge statuses.
    pub statuses: Vec<String>,
    /// Consumers.
    pub consumers: Vec<String>,
    /// Target providers.
    pub providers: Vec<String>,
    /// Target service definitions.
    pub service_definitions: Vec<String>,
    /// Interface translators.
    pub interface_translators: Vec<String>,
    /// Data model translators, in either direction.
    pub data_model_translators: Vec<String>,
    /// Earliest creation time.
    pub creation_from: Option<String>,
    /// Latest creation time.
    pub creation_to: Option<String>,
    /// Earliest liveness time.
    pub alives_from: Option<String>,
    /// Latest liveness time.
    pub alives_to: Option<String>,
    /// Minimum usage report count.
    pub min_usage: Option<i64>,
    /// Maximum usage report count.
    pub max_usage: Option<i64>,
    /// Zero-based page number.
    pub page: Option<usize>,
    /// Page size.
    pub size: Option<usize>,
    /// `bridgeId`, `createdAt` or `updatedAt`.
    pub sort_field: Option<String>,
    /// `ASC` or `DESC`.
    pub direction: Option<String>,
}

/// What a negotiation has to do first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationPlan {
    /// Select `target` out of the candidates stored under `bridge_id`.
    Prepared {
        /// Bridge from an earlier discovery.
        bridge_id: BridgeId,
        /// Chosen target.
        target: ServiceInstanceId,
    },
    /// Discover bridges to the single target first.
    Inline(DiscoveryRequest),
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

fn required<'a>(value: Option<&'a str>, field: &str) -> BrokerResult<&'a str> {
    present(value).ok_or_else(|| BrokerError::invalid_parameter(format!("{field} is missing")))
}

fn optional_data_model(value: Option<&str>) -> BrokerResult<Option<DataModelId>> {
    Ok(present(value).map(DataModelId::new).transpose()?)
}

fn names<'a, T, E>(
    values: &'a [String],
    parse: impl Fn(&'a str) -> Result<T, E>,
) -> BrokerResult<Vec<T>>
where
    BrokerError: From<E>,
{
    Ok(values
        .iter()
        .map(String::as_str)
        .map(parse)
        .collect::<Result<Vec<_>, E>>()?)
}

fn timestamp(value: &str, field: &str) -> BrokerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| BrokerError::invalid_parameter(format!("{field} is invalid: {err}")))
}

fn optional_timestamp(value: Option<&str>, field: &str) -> BrokerResult<Option<DateTime<Utc>>> {
    present(value)
        .map(|text| timestamp(text, field))
        .transpose()
}

fn time_range(from: Option<&str>, to: Option<&str>, field: &str) -> BrokerResult<TimeRange> {
    let range = TimeRange {
        from: optional_timestamp(from, field)?,
        to: optional_timestamp(to, field)?,
    };
    if range
        .from
        .zip(range.to)
        .is_some_and(|(start, end)| end < start)
    {
        return Err(BrokerError::invalid_parameter(format!(
            "{field} range ends before it starts"
        )));
    }
    Ok(range)
}

fn usage_bound(value: Option<i64>, field: &str) -> BrokerResult<Option<u64>> {
    value
        .map(|bound| {
            u64::try_from(bound)
                .map_err(|_| BrokerError::invalid_parameter(format!("{field} must not be negative")))
        })
        .transpose()
}

/// Checks the candidate list shared by every discovery flavour.
///
/// # Errors
///
/// Returns an invalid-parameter error when the list is empty, a candidate
/// has no usable interface or the candidates disagree on the service
/// definition.
pub fn validate_candidates(candidates: &[ServiceInstance]) -> BrokerResult<()> {
    let Some(first) = candidates.first() else {
        return Err(BrokerError::invalid_parameter("Candidate list is missing"));
    };
    for candidate in candidates {
        if candidate.interfaces.is_empty() {
            return Err(BrokerError::invalid_parameter(format!(
                "{} declares no interfaces",
                candidate.instance_id
            )));
        }
        if candidate
            .interfaces
            .iter()
            .any(|interface| interface.properties.is_empty())
        {
            return Err(BrokerError::invalid_parameter(format!(
                "{} declares an interface without properties",
                candidate.instance_id
            )));
        }
        if candidate.service_definition != first.service_definition {
            return Err(BrokerError::invalid_parameter(
                "Candidates must share the same service definition",
            ));
        }
    }
    Ok(())
}

/// Validates a discovery payload for `consumer`, recording `requester` as
/// the creator.
///
/// # Errors
///
/// Returns an invalid-parameter error describing the first problem found.
pub fn validate_discovery(
    payload: DiscoveryPayload,
    requester: &SystemName,
    consumer: SystemName,
    flags: DiscoveryFlags,
) -> BrokerResult<DiscoveryRequest> {
    validate_candidates(&payload.candidates)?;
    let operation = OperationName::new(required(payload.operation.as_deref(), "Operation")?)?;
    if payload.interface_template_names.is_empty() {
        return Err(BrokerError::invalid_parameter(
            "Interface template names list is missing",
        ));
    }
    let interface_templates = names(&payload.interface_template_names, InterfaceTemplateName::new)?;
    Ok(DiscoveryRequest {
        requester: requester.clone(),
        consumer,
        candidates: payload.candidates,
        operation,
        interface_templates,
        input_data_model: optional_data_model(payload.input_data_model_id.as_deref())?,
        output_data_model: optional_data_model(payload.output_data_model_id.as_deref())?,
        flags,
    })
}

/// Parses the explicit consumer of a management discovery.
///
/// # Errors
///
/// Returns an invalid-parameter error when the consumer is missing or
/// malformed.
pub fn validate_consumer(payload: &DiscoveryPayload) -> BrokerResult<SystemName> {
    Ok(SystemName::new(required(
        payload.consumer.as_deref(),
        "Consumer",
    )?)?)
}

/// Validates a negotiation payload sent by `requester`.
///
/// # Errors
///
/// Returns an invalid-parameter error describing the first problem found.
pub fn validate_negotiation(
    payload: NegotiationPayload,
    requester: &SystemName,
    flags: DiscoveryFlags,
) -> BrokerResult<NegotiationPlan> {
    let Some(target) = payload.target else {
        return Err(BrokerError::invalid_parameter("Target is missing"));
    };
    if let Some(raw_id) = present(payload.bridge_id.as_deref()) {
        return Ok(NegotiationPlan::Prepared {
            bridge_id: BridgeId::parse(raw_id)?,
            target: target.instance_id,
        });
    }
    let operation = OperationName::new(required(payload.operation.as_deref(), "Operation")?)?;
    let template = InterfaceTemplateName::new(required(
        payload.interface_template_name.as_deref(),
        "Interface template name",
    )?)?;
    let candidates = vec![target];
    validate_candidates(&candidates)?;
    Ok(NegotiationPlan::Inline(DiscoveryRequest {
        requester: requester.clone(),
        consumer: requester.clone(),
        candidates,
        operation,
        interface_templates: vec![template],
        input_data_model: optional_data_model(payload.input_data_model_id.as_deref())?,
        output_data_model: optional_data_model(payload.output_data_model_id.as_deref())?,
        flags,
    }))
}

/// Parses bridge identifiers of an abort request.
///
/// # Errors
///
/// Returns an invalid-parameter error when the list is empty or an
/// identifier is not a UUID.
pub fn validate_bridge_ids(values: &[String]) -> BrokerResult<Vec<BridgeId>> {
    if values.is_empty() {
        return Err(BrokerError::invalid_parameter("Bridge id list is missing"));
    }
    names(values, BridgeId::parse)
}

/// Validates a report sent by `requester`, rejecting events later than
/// `now`.
///
/// # Errors
///
/// Returns an invalid-parameter error describing the first problem found.
pub fn validate_report(
    payload: ReportPayload,
    requester: &SystemName,
    now: DateTime<Utc>,
) -> BrokerResult<BridgeReport> {
    let bridge_id = BridgeId::parse(required(Some(payload.bridge_id.as_str()), "Bridge id")?)?;
    let reported_at = timestamp(required(Some(payload.timestamp.as_str()), "Timestamp")?, "Timestamp")?;
    if reported_at > now {
        return Err(BrokerError::invalid_parameter(
            "Timestamp is in the future",
        ));
    }
    let state = BridgeEventState::try_from(required(Some(payload.state.as_str()), "State")?)?;
    Ok(BridgeReport {
        requester: requester.clone(),
        bridge_id,
        timestamp: reported_at,
        state,
        error_message: payload
            .error_message
            .filter(|message| !message.trim().is_empty()),
    })
}

fn sort_field(value: Option<&str>) -> BrokerResult<SortField> {
    let Some(text) = present(value) else {
        return Ok(SortField::default());
    };
    match text.to_ascii_lowercase().as_str() {
        "id" => Ok(SortField::Id),
        "bridgeid" => Ok(SortField::BridgeId),
        "createdat" => Ok(SortField::CreatedAt),
        "updatedat" => Ok(SortField::UpdatedAt),
        _ => Err(BrokerError::invalid_parameter(format!(
            "Sort field is invalid: {text}"
        ))),
    }
}

fn sort_direction(value: Option<&str>) -> BrokerResult<SortDirection> {
    let Some(text) = present(value) else {
        return Ok(SortDirection::default());
    };
    match text.to_ascii_uppercase().as_str() {
        "ASC" => Ok(SortDirection::Asc),
        "DESC" => Ok(SortDirection::Desc),
        _ => Err(BrokerError::invalid_parameter(format!(
            "Direction is invalid: {text}"
        ))),
    }
}

/// Validates a query payload against the largest accepted page.
///
/// # Errors
///
/// Returns an invalid-parameter error describing the first problem found.
pub fn validate_query(
    payload: &QueryPayload,
    max_page_size: usize,
) -> BrokerResult<(BridgeQuery, PageRequest)> {
    let min_usage = usage_bound(payload.min_usage, "Minimum usage")?;
    let max_usage = usage_bound(payload.max_usage, "Maximum usage")?;
    if min_usage
        .zip(max_usage)
        .is_some_and(|(min, max)| max < min)
    {
        return Err(BrokerError::invalid_parameter(
            "Maximum usage is less than minimum usage",
        ));
    }
    let size = payload.size.unwrap_or(max_page_size);
    if size == 0 || size > max_page_size {
        return Err(BrokerError::invalid_parameter(format!(
            "Page size must be between 1 and {max_page_size}"
        )));
    }
    let statuses = payload
        .statuses
        .iter()
        .map(|status| {
            BridgeStatus::try_from(status.as_str())
                .map_err(|err| BrokerError::invalid_parameter(err.to_string()))
        })
        .collect::<BrokerResult<Vec<_>>>()?;
    let query = BridgeQuery {
        bridge_ids: names(&payload.bridge_ids, BridgeId::parse)?,
        creators: names(&payload.creators, SystemName::new)?,
        statuses,
        consumers: names(&payload.consumers, SystemName::new)?,
        providers: names(&payload.providers, SystemName::new)?,
        service_definitions: names(&payload.service_definitions, ServiceDefinitionName::new)?,
        interface_translators: names(&payload.interface_translators, SystemName::new)?,
        data_model_translators: names(&payload.data_model_translators, SystemName::new)?,
        created: time_range(
            payload.creation_from.as_deref(),
            payload.creation_to.as_deref(),
            "Creation",
        )?,
        alive: time_range(
            payload.alives_from.as_deref(),
            payload.alives_to.as_deref(),
            "Liveness",
        )?,
        min_usage,
        max_usage,
    };
    let page = PageRequest::new(payload.page.unwrap_or_default(), size).sorted_by(
        sort_field(payload.sort_field.as_deref())?,
        sort_direction(payload.direction.as_deref())?,
    );
    Ok((query, page))
}
